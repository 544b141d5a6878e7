use std::collections::BTreeMap;

use crate::module::{CreateProgramFn, ModuleManifest};
use crate::program::Program;

#[derive(Debug, Clone)]
struct CatalogEntry {
    version: String,
    create: CreateProgramFn,
}

/// Program factories known to the host, keyed by entry symbol.
///
/// A module artifact names its entry symbol; installing the module resolves
/// the symbol here and instantiates a fresh program.
#[derive(Debug, Clone, Default)]
pub struct ProgramCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ProgramCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A later registration of the same entry replaces the earlier one.
    pub fn register(
        &mut self,
        entry: impl Into<String>,
        version: impl Into<String>,
        create: CreateProgramFn,
    ) -> &mut Self {
        self.entries.insert(
            entry.into(),
            CatalogEntry { version: version.into(), create },
        );
        self
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    /// Instantiate the program registered under `entry`.
    pub fn resolve(&self, entry: &str) -> Option<Box<dyn Program>> {
        self.entries.get(entry).map(|e| (e.create)())
    }

    /// Manifest a module artifact for `entry` would carry.
    pub fn manifest(&self, entry: &str) -> Option<ModuleManifest> {
        self.entries.get(entry).map(|e| ModuleManifest {
            entry: entry.to_string(),
            version: e.version.clone(),
        })
    }

    /// All manifests, ordered by entry symbol.
    pub fn manifests(&self) -> Vec<ModuleManifest> {
        self.entries
            .iter()
            .map(|(entry, e)| ModuleManifest { entry: entry.clone(), version: e.version.clone() })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProgramError;
    use crate::program::ProgramContext;
    use crate::types::{RecordType, ServiceType};
    use crate::value::Value;

    struct Noop;

    impl Program for Noop {
        fn interface(&self) -> ServiceType {
            ServiceType::new()
        }

        fn stable_layout(&self) -> RecordType {
            RecordType::new()
        }

        fn init(&self, _ctx: &mut dyn ProgramContext, _args: Vec<Value>) -> Result<(), ProgramError> {
            Ok(())
        }

        fn call(
            &self,
            _ctx: &mut dyn ProgramContext,
            method: &str,
            _args: Vec<Value>,
        ) -> Result<Vec<Value>, ProgramError> {
            Err(ProgramError::logic(format!("unknown method '{method}'")))
        }
    }

    fn create_noop() -> Box<dyn Program> {
        Box::new(Noop)
    }

    #[test]
    fn resolves_registered_entries() {
        let mut catalog = ProgramCatalog::new();
        catalog.register("noop", "1.0", create_noop);

        assert!(catalog.contains("noop"));
        assert!(catalog.resolve("noop").is_some());
        assert!(catalog.resolve("missing").is_none());
        assert_eq!(
            catalog.manifest("noop"),
            Some(ModuleManifest { entry: "noop".into(), version: "1.0".into() })
        );
        assert_eq!(catalog.len(), 1);
    }
}
