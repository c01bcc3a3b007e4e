use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A song runtime in whole seconds.
///
/// On the wire this is always the string `"<N> seconds"` — `151` encodes as
/// `"151 seconds"` and nothing else decodes. A bare number, a different unit,
/// or a malformed prefix is rejected with [`ParseDurationError`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i32);

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid duration format")]
pub struct ParseDurationError;

impl Duration {
    #[must_use]
    pub const fn from_seconds(seconds: i32) -> Self {
        Self(seconds)
    }

    #[must_use]
    pub const fn seconds(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} seconds", self.0)
    }
}

impl FromStr for Duration {
    type Err = ParseDurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split(' ');
        let (Some(number), Some("seconds"), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseDurationError);
        };
        let seconds = number.parse::<i32>().map_err(|_| ParseDurationError)?;
        Ok(Self(seconds))
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{Duration, ParseDurationError};

    #[test]
    fn encodes_as_seconds_string() {
        let encoded = serde_json::to_string(&Duration::from_seconds(151)).expect("encode");
        assert_eq!(encoded, "\"151 seconds\"");
    }

    #[test]
    fn decodes_seconds_string() {
        let decoded: Duration = serde_json::from_str("\"151 seconds\"").expect("decode");
        assert_eq!(decoded, Duration::from_seconds(151));
    }

    #[test]
    fn rejects_other_formats() {
        let invalid = [
            "\"151\"",
            "\"151 minutes\"",
            "\"151  seconds\"",
            "\"seconds\"",
            "\"one seconds\"",
            "\"151 seconds extra\"",
            "151",
        ];
        for value in invalid {
            let result = serde_json::from_str::<Duration>(value);
            assert!(result.is_err(), "{value}");
        }
    }

    #[test]
    fn parse_error_message_is_stable() {
        assert_eq!(ParseDurationError.to_string(), "invalid duration format");
    }
}
