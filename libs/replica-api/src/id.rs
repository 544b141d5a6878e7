use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SUFFIX: &str = "-cai";

/// Opaque canister identity. Assigned at install, stable across upgrades.
///
/// Textual form: 16 lowercase hex digits followed by `-cai`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanisterId(u64);

impl CanisterId {
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CanisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{SUFFIX}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCanisterIdError(pub String);

impl fmt::Display for ParseCanisterIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid canister id '{}'", self.0)
    }
}

impl std::error::Error for ParseCanisterIdError {}

impl FromStr for CanisterId {
    type Err = ParseCanisterIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_suffix(SUFFIX)
            .filter(|hex| hex.len() == 16)
            .ok_or_else(|| ParseCanisterIdError(s.to_string()))?;
        u64::from_str_radix(hex, 16)
            .map(CanisterId)
            .map_err(|_| ParseCanisterIdError(s.to_string()))
    }
}

impl Serialize for CanisterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanisterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_form_round_trips() {
        let id = CanisterId::from_u64(0x2a);
        assert_eq!(id.to_string(), "000000000000002a-cai");
        assert_eq!("000000000000002a-cai".parse::<CanisterId>().unwrap(), id);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!("2a-cai".parse::<CanisterId>().is_err());
        assert!("000000000000002a".parse::<CanisterId>().is_err());
        assert!("zzzzzzzzzzzzzzzz-cai".parse::<CanisterId>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let id = CanisterId::from_u64(1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0000000000000001-cai\"");
        assert_eq!(serde_json::from_str::<CanisterId>(&json).unwrap(), id);
    }
}
