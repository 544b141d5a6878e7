//! JSON bodies of the replica HTTP API.
//!
//! Module artifacts, install arguments and call payloads are binary and travel
//! as base64 strings.

use serde::{Deserialize, Serialize};

use crate::id::CanisterId;
use crate::program::Persistence;

/// What happens to the program's main memory during an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPersistence {
    /// Retain the live stable record. Requires enhanced persistence.
    Keep,
    /// Discard main memory; only the stable-memory snapshot survives.
    #[default]
    Replace,
}

/// Upgrade flags. Unset fields take the replica defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpgradeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wasm_memory_persistence: Option<MemoryPersistence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_pre_upgrade: Option<bool>,
}

impl UpgradeOptions {
    pub fn keep() -> Self {
        Self {
            wasm_memory_persistence: Some(MemoryPersistence::Keep),
            skip_pre_upgrade: None,
        }
    }

    pub fn memory_persistence(&self) -> MemoryPersistence {
        self.wasm_memory_persistence.unwrap_or_default()
    }

    pub fn skips_pre_upgrade(&self) -> bool {
        self.skip_pre_upgrade.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub instance_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBody {
    /// Nanoseconds since the Unix epoch (`GET`) or to advance by (`POST`).
    pub nanos: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRequest {
    pub times: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickResponse {
    /// Timer callbacks actually run (including ones that trapped).
    pub executed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    #[serde(with = "base64_bytes")]
    pub module: Vec<u8>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub arg: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResponse {
    pub canister_id: CanisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    #[serde(with = "base64_bytes")]
    pub module: Vec<u8>,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub arg: Option<Vec<u8>>,
    #[serde(default)]
    pub options: UpgradeOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRequest {
    pub method: String,
    #[serde(with = "base64_bytes")]
    pub arg: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResponse {
    #[serde(with = "base64_bytes")]
    pub reply: Vec<u8>,
}

/// Snapshot of a canister's installed code and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanisterStatus {
    pub canister_id: CanisterId,
    pub entry: String,
    pub version: String,
    pub persistence: Persistence,
    /// Candid-like rendering of the installed interface.
    pub interface: String,
    pub pending_timers: usize,
    pub has_stable_memory: bool,
}

/// Error category carried in HTTP error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    BadRequest,
    InvalidModule,
    InstallRejected,
    UpgradeRejected,
    CallRejected,
    Decode,
    Capacity,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// base64 serde helpers
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => super::base64_bytes::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_fields_are_base64() {
        let req = CallRequest { method: "getCounter".into(), arg: b"DIDL\x00".to_vec() };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["arg"], "RElETAA=");
        let back: CallRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn upgrade_options_default_to_replace() {
        let req: UpgradeRequest = serde_json::from_str(r#"{"module":"AGNubQ=="}"#).unwrap();
        assert_eq!(req.module, b"\0cnm");
        assert_eq!(req.arg, None);
        assert_eq!(req.options.memory_persistence(), MemoryPersistence::Replace);
        assert!(!req.options.skips_pre_upgrade());

        let keep: UpgradeOptions =
            serde_json::from_str(r#"{"wasm_memory_persistence":"keep","skip_pre_upgrade":true}"#)
                .unwrap();
        assert_eq!(keep.memory_persistence(), MemoryPersistence::Keep);
        assert!(keep.skips_pre_upgrade());
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = serde_json::from_str::<CallResponse>(r#"{"reply":"***"}"#);
        assert!(err.is_err());
    }
}
