use std::collections::BTreeMap;

use replica_api::module::ModuleManifest;
use replica_api::program::{Program, StableRecord};
use replica_api::types::RecordType;
use replica_api::CanisterId;

use crate::context::Effects;

/// An installed program with its persisted state.
pub struct Canister {
    id: CanisterId,
    manifest: ModuleManifest,
    program: Box<dyn Program>,
    stable: StableRecord,
    stable_memory: Option<Vec<u8>>,
}

impl std::fmt::Debug for Canister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canister")
            .field("id", &self.id)
            .field("manifest", &self.manifest)
            .finish()
    }
}

impl Canister {
    pub fn new(id: CanisterId, manifest: ModuleManifest, program: Box<dyn Program>) -> Self {
        Self {
            id,
            manifest,
            program,
            stable: StableRecord::new(),
            stable_memory: None,
        }
    }

    pub fn id(&self) -> CanisterId {
        self.id
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    pub fn program(&self) -> &dyn Program {
        self.program.as_ref()
    }

    pub fn stable(&self) -> &StableRecord {
        &self.stable
    }

    pub fn stable_memory(&self) -> Option<&[u8]> {
        self.stable_memory.as_deref()
    }

    /// Swap in new code. State is replaced separately through `apply`.
    pub fn replace_code(&mut self, manifest: ModuleManifest, program: Box<dyn Program>) {
        self.manifest = manifest;
        self.program = program;
    }

    /// Commit stable state and stable memory. Timers are the caller's business.
    pub fn apply(&mut self, effects: &mut Effects) {
        self.stable = std::mem::take(&mut effects.stable);
        self.stable_memory = effects.stable_memory.take();
    }
}

/// Whether `record` holds exactly the fields of `layout`, each of its declared type.
pub fn record_matches(record: &StableRecord, layout: &RecordType) -> bool {
    record.len() == layout.len()
        && layout
            .fields()
            .all(|(name, ty)| record.get(name).is_some_and(|v| v.conforms_to(ty)))
}

/// Installed canisters, keyed by id. Ids are minted sequentially and never reused.
#[derive(Debug)]
pub struct CanisterTable {
    canisters: BTreeMap<CanisterId, Canister>,
    next_id: u64,
}

impl CanisterTable {
    pub fn new() -> Self {
        Self { canisters: BTreeMap::new(), next_id: 1 }
    }

    /// Next id `insert` will use.
    pub fn peek_id(&self) -> CanisterId {
        CanisterId::from_u64(self.next_id)
    }

    pub fn insert(&mut self, canister: Canister) {
        self.next_id = self.next_id.max(canister.id().as_u64() + 1);
        self.canisters.insert(canister.id(), canister);
    }

    pub fn get(&self, id: CanisterId) -> Option<&Canister> {
        self.canisters.get(&id)
    }

    pub fn get_mut(&mut self, id: CanisterId) -> Option<&mut Canister> {
        self.canisters.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<CanisterId> {
        self.canisters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.canisters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canisters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_api::types::Type;
    use replica_api::Value;

    #[test]
    fn record_must_match_layout_exactly() {
        let layout = RecordType::new().field("count", Type::Nat);
        let mut record = StableRecord::new();
        assert!(!record_matches(&record, &layout));

        record.insert("count".into(), Value::Nat(1));
        assert!(record_matches(&record, &layout));

        record.insert("count".into(), Value::Int(1));
        assert!(!record_matches(&record, &layout));
    }
}
