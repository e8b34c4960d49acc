//! Topic patterns used by subscriptions.
//!
//! Topics are `/`-separated (`DATA/provider/service/resource`). In a
//! pattern, `+` matches exactly one segment and a trailing `#` matches any
//! remainder, including nothing.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
    Rest,
}

/// A parsed subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Pattern matching every topic.
    #[must_use]
    pub fn all() -> Self {
        Self {
            raw: "#".to_string(),
            segments: vec![Segment::Rest],
        }
    }

    /// Parse a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTopicPattern`] for empty patterns,
    /// empty segments, or a `#` that is not the last segment.
    pub fn parse(pattern: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTopicPattern(pattern.to_string());
        if pattern.is_empty() {
            return Err(invalid());
        }
        let parts: Vec<&str> = pattern.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (idx, part) in parts.iter().enumerate() {
            let segment = match *part {
                "" => return Err(invalid()),
                "+" => Segment::Single,
                "#" if idx + 1 == parts.len() => Segment::Rest,
                "#" => return Err(invalid()),
                literal => Segment::Literal(literal.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Whether `topic` matches this pattern.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        let mut parts = topic.split('/');
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for TopicPattern {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
