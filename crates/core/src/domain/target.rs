// Probe target (address + repeat count)

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{DomainError, Result};

/// Number of echo requests sent per probe. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RepeatCount(u32);

impl RepeatCount {
    /// Validate a repeat count. Upper bounds are enforced by the front end.
    pub fn new(count: u32) -> Result<Self> {
        if count == 0 {
            return Err(DomainError::InvalidRepeatCount(count));
        }
        Ok(Self(count))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for RepeatCount {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RepeatCount> for u32 {
    fn from(count: RepeatCount) -> Self {
        count.0
    }
}

impl fmt::Display for RepeatCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One address to probe within a run. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    address: String,
    repeat_count: RepeatCount,
}

impl Target {
    /// Build a target from raw user input.
    ///
    /// The address is trimmed. Empty addresses and addresses starting with `-`
    /// (which ping would read as an option) are rejected.
    pub fn new(address: impl AsRef<str>, repeat_count: RepeatCount) -> Result<Self> {
        let address = address.as_ref().trim();
        if address.is_empty() || address.starts_with('-') {
            return Err(DomainError::InvalidAddress(address.to_string()));
        }
        if address.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidAddress(address.to_string()));
        }
        Ok(Self {
            address: address.to_string(),
            repeat_count,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn repeat_count(&self) -> RepeatCount {
        self.repeat_count
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (x{})", self.address, self.repeat_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(n: u32) -> RepeatCount {
        RepeatCount::new(n).unwrap()
    }

    #[test]
    fn test_repeat_count_rejects_zero() {
        assert_eq!(
            RepeatCount::new(0),
            Err(DomainError::InvalidRepeatCount(0))
        );
        assert_eq!(RepeatCount::new(1).unwrap().get(), 1);
    }

    #[test]
    fn test_target_trims_address() {
        let target = Target::new("  10.0.0.1 \n", count(3)).unwrap();
        assert_eq!(target.address(), "10.0.0.1");
        assert_eq!(target.repeat_count().get(), 3);
    }

    #[test]
    fn test_target_rejects_blank_and_option_like_addresses() {
        assert!(Target::new("   ", count(1)).is_err());
        assert!(Target::new("-f", count(1)).is_err());
        assert!(Target::new("10.0.0.1 -f", count(1)).is_err());
    }

    #[test]
    fn test_repeat_count_deserialize_validates() {
        let ok: RepeatCount = serde_json::from_str("5").unwrap();
        assert_eq!(ok.get(), 5);
        assert!(serde_json::from_str::<RepeatCount>("0").is_err());
    }
}
