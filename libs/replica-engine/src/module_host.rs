use std::path::{Path, PathBuf};

use replica_api::module::{self, ModuleManifest, MODULE_ABI_VERSION, MODULE_EXTENSION};
use replica_api::program::Program;
use replica_api::ProgramCatalog;

use crate::error::ModuleError;

/// A module whose header and manifest checked out, with a fresh program instance.
pub struct LoadedModule {
    pub manifest: ModuleManifest,
    pub program: Box<dyn Program>,
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule").field("manifest", &self.manifest).finish()
    }
}

/// Parse module bytes, verify the ABI version, resolve the entry symbol.
pub fn load_module(bytes: &[u8], catalog: &ProgramCatalog) -> Result<LoadedModule, ModuleError> {
    let image = module::read_header(bytes).ok_or(ModuleError::BadHeader)?;
    if image.abi_version != MODULE_ABI_VERSION {
        return Err(ModuleError::AbiMismatch {
            found: image.abi_version,
            expected: MODULE_ABI_VERSION,
        });
    }

    let manifest: ModuleManifest =
        serde_json::from_slice(image.manifest).map_err(|e| ModuleError::Manifest(e.to_string()))?;
    let program = catalog
        .resolve(&manifest.entry)
        .ok_or_else(|| ModuleError::UnknownEntry(manifest.entry.clone()))?;

    Ok(LoadedModule { manifest, program })
}

/// Read a module artifact from disk and load it.
pub fn load_module_file(path: &Path, catalog: &ProgramCatalog) -> Result<LoadedModule, ModuleError> {
    let bytes = std::fs::read(path)?;
    load_module(&bytes, catalog)
}

/// Path of the artifact for `entry` under a build output directory.
pub fn artifact_path(out_dir: &Path, entry: &str) -> PathBuf {
    out_dir.join(entry).join(format!("{entry}.{MODULE_EXTENSION}"))
}

/// Write one artifact per catalog program to `<out>/<entry>/<entry>.canister`.
pub fn build_artifacts(catalog: &ProgramCatalog, out_dir: &Path) -> Result<Vec<PathBuf>, ModuleError> {
    let mut written = Vec::with_capacity(catalog.len());
    for manifest in catalog.manifests() {
        let bytes =
            module::build_module(&manifest).map_err(|e| ModuleError::Manifest(e.to_string()))?;
        let path = artifact_path(out_dir, &manifest.entry);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        tracing::info!(program = %manifest.entry, path = %path.display(), "wrote module artifact");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn loads_catalog_programs() {
        let catalog = testing::catalog();
        let bytes = module::build_module(&ModuleManifest {
            entry: testing::COUNTER.into(),
            version: "1".into(),
        })
        .unwrap();

        let loaded = load_module(&bytes, &catalog).unwrap();
        assert_eq!(loaded.manifest.entry, testing::COUNTER);
        assert!(loaded.program.interface().get("increment").is_some());
    }

    #[test]
    fn rejects_malformed_modules() {
        let catalog = testing::catalog();

        assert!(matches!(load_module(b"\0asm\x01\0\0\0", &catalog), Err(ModuleError::BadHeader)));

        let mut wrong_abi = b"\0cnm".to_vec();
        wrong_abi.extend_from_slice(&7u32.to_le_bytes());
        wrong_abi.extend_from_slice(b"{}");
        assert!(matches!(
            load_module(&wrong_abi, &catalog),
            Err(ModuleError::AbiMismatch { found: 7, .. })
        ));

        let mut bad_json = b"\0cnm".to_vec();
        bad_json.extend_from_slice(&MODULE_ABI_VERSION.to_le_bytes());
        bad_json.extend_from_slice(b"not json");
        assert!(matches!(load_module(&bad_json, &catalog), Err(ModuleError::Manifest(_))));

        let unknown = module::build_module(&ModuleManifest {
            entry: "nope".into(),
            version: "1".into(),
        })
        .unwrap();
        assert!(matches!(load_module(&unknown, &catalog), Err(ModuleError::UnknownEntry(e)) if e == "nope"));
    }

    #[test]
    fn build_writes_one_artifact_per_program() {
        let catalog = testing::catalog();
        let dir = tempfile::tempdir().unwrap();

        let written = build_artifacts(&catalog, dir.path()).unwrap();
        assert_eq!(written.len(), catalog.len());

        let path = artifact_path(dir.path(), testing::COUNTER);
        assert!(path.ends_with("counter/counter.canister"));
        let loaded = load_module_file(&path, &catalog).unwrap();
        assert_eq!(loaded.manifest.entry, testing::COUNTER);
    }

    #[test]
    fn missing_file_is_io_error() {
        let catalog = testing::catalog();
        let err = load_module_file(Path::new("/nonexistent/x.canister"), &catalog).unwrap_err();
        assert!(matches!(err, ModuleError::Io(_)));
    }
}
