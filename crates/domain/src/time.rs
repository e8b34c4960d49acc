//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp carried by values, metadata and notifications.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whether a write stamped `candidate` may replace state stamped `current`.
///
/// Writes are accepted when nothing is stored yet or when `candidate` is
/// strictly newer. Equal timestamps lose.
#[must_use]
pub fn supersedes(candidate: Timestamp, current: Option<Timestamp>) -> bool {
    current.is_none_or(|current| candidate > current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_supersede_when_nothing_is_stored() {
        assert!(supersedes(now(), None));
    }

    #[test]
    fn should_supersede_only_strictly_newer_timestamps() {
        let t1 = now();
        assert!(supersedes(t1 + Duration::milliseconds(1), Some(t1)));
        assert!(!supersedes(t1, Some(t1)));
        assert!(!supersedes(t1 - Duration::seconds(1), Some(t1)));
    }
}
