use serde::{Deserialize, Serialize};

use crate::program::Program;

/// Current module ABI version. Host checks this against the module header.
pub const MODULE_ABI_VERSION: u32 = 1;

/// First four bytes of every module artifact.
pub const MODULE_MAGIC: &[u8; 4] = b"\0cnm";

/// Conventional file extension for module artifacts.
pub const MODULE_EXTENSION: &str = "canister";

/// JSON manifest carried after the module header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Program symbol resolved in the host's `ProgramCatalog`.
    pub entry: String,
    /// Free-form version tag, reported by canister status.
    pub version: String,
}

/// Header view over raw module bytes. The manifest is not parsed yet.
#[derive(Debug, Clone, Copy)]
pub struct ModuleImage<'a> {
    pub abi_version: u32,
    pub manifest: &'a [u8],
}

/// Split `bytes` into ABI version and manifest.
///
/// Returns `None` if the magic is missing or the header is truncated.
pub fn read_header(bytes: &[u8]) -> Option<ModuleImage<'_>> {
    let rest = bytes.strip_prefix(MODULE_MAGIC.as_slice())?;
    let (version, manifest) = rest.split_first_chunk::<4>()?;
    Some(ModuleImage {
        abi_version: u32::from_le_bytes(*version),
        manifest,
    })
}

/// Serialize a module artifact: magic, ABI version, JSON manifest.
pub fn build_module(manifest: &ModuleManifest) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(manifest)?;
    let mut out = Vec::with_capacity(MODULE_MAGIC.len() + 4 + json.len());
    out.extend_from_slice(MODULE_MAGIC);
    out.extend_from_slice(&MODULE_ABI_VERSION.to_le_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}

/// Signature of a program factory registered under an entry symbol.
pub type CreateProgramFn = fn() -> Box<dyn Program>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_exposes_version_and_manifest() {
        let manifest = ModuleManifest { entry: "example".into(), version: "1".into() };
        let bytes = build_module(&manifest).unwrap();
        let image = read_header(&bytes).unwrap();
        assert_eq!(image.abi_version, MODULE_ABI_VERSION);
        let parsed: ModuleManifest = serde_json::from_slice(image.manifest).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn missing_magic_or_short_header() {
        assert!(read_header(b"\0asm\x01\x00\x00\x00").is_none());
        assert!(read_header(b"\0cnm\x01").is_none());
        assert!(read_header(b"").is_none());
    }
}
