//! Typed identifiers for batches, sessions and subscriptions, backed by UUIDs.
//!
//! The twin itself is addressed by names (`provider/service/resource`);
//! these ids only label transient runtime objects in logs and on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Identifier of one flushed [`NotificationBatch`](crate::notification::NotificationBatch).
    BatchId
);

define_id!(
    /// Identifier of a northbound session.
    SessionId
);

define_id!(
    /// Identifier of a notification subscription.
    SubscriptionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_label_each_batch_uniquely() {
        let ids: std::collections::HashSet<BatchId> = (0..32).map(|_| BatchId::new()).collect();
        assert_eq!(ids.len(), 32);
    }

    #[test]
    fn should_parse_displayed_session_id() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_subscription_id_as_plain_uuid_string() {
        let uuid = uuid::Uuid::new_v4();
        let id = SubscriptionId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn should_reject_malformed_batch_id() {
        assert!(BatchId::from_str("batch-1").is_err());
    }
}
