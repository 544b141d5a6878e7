use std::path::{Path, PathBuf};

use replica_api::module::MODULE_EXTENSION;

use crate::error::ClientError;

/// Where module bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ModuleSource {
    /// Artifact of `name` in a build output directory: `<dir>/<name>/<name>.canister`.
    pub fn artifact(dir: impl AsRef<Path>, name: &str) -> Self {
        ModuleSource::Path(dir.as_ref().join(name).join(format!("{name}.{MODULE_EXTENSION}")))
    }

    pub async fn load(self) -> Result<Vec<u8>, ClientError> {
        match self {
            ModuleSource::Bytes(bytes) => Ok(bytes),
            ModuleSource::Path(path) => tokio::fs::read(&path).await.map_err(|e| {
                ClientError::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
            }),
        }
    }
}

impl From<PathBuf> for ModuleSource {
    fn from(path: PathBuf) -> Self {
        ModuleSource::Path(path)
    }
}

impl From<&Path> for ModuleSource {
    fn from(path: &Path) -> Self {
        ModuleSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ModuleSource {
    fn from(bytes: Vec<u8>) -> Self {
        ModuleSource::Bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_layout() {
        let source = ModuleSource::artifact("/out", "migratable_v1");
        assert_eq!(
            source,
            ModuleSource::Path(PathBuf::from("/out/migratable_v1/migratable_v1.canister"))
        );
    }

    #[tokio::test]
    async fn loads_bytes_and_files() {
        assert_eq!(ModuleSource::from(vec![1, 2]).load().await.unwrap(), vec![1, 2]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.canister");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(ModuleSource::from(path).load().await.unwrap(), b"abc");

        let missing = ModuleSource::artifact(dir.path(), "nope").load().await.unwrap_err();
        assert!(matches!(missing, ClientError::Io(_)));
    }
}
