//! Carrying stable state across an upgrade.
//!
//! 1. Pick the retained image from the memory-persistence mode.
//! 2. If the new program declares a migration, it must consume exactly the
//!    retained layout, and its output must match the new layout.
//! 3. Otherwise the retained layout must be assignable to the new one, field
//!    by field. New fields must be `opt` and start as `null`.

use replica_api::program::{self, MigrationContext, Persistence, Program, StableRecord};
use replica_api::protocol::MemoryPersistence;
use replica_api::types::{RecordType, Type};
use replica_api::Value;

use crate::canister::record_matches;
use crate::error::UpgradeError;

/// Stable state that survived the old code, with the layout it was written in.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedState {
    pub layout: RecordType,
    pub record: StableRecord,
}

/// Decide what survives the upgrade.
///
/// `live` is the stable record after the pre-upgrade hook; `stable_memory` is
/// the snapshot it may have written. `Ok(None)` means nothing is retained.
pub fn retained_state(
    mode: MemoryPersistence,
    old: &dyn Program,
    new: &dyn Program,
    live: StableRecord,
    stable_memory: Option<&[u8]>,
) -> Result<Option<RetainedState>, UpgradeError> {
    match mode {
        MemoryPersistence::Keep => {
            if new.persistence() != Persistence::Enhanced {
                return Err(UpgradeError::KeepRequiresEnhanced);
            }
            Ok(Some(RetainedState { layout: old.stable_layout(), record: live }))
        }
        MemoryPersistence::Replace => {
            if old.persistence() == Persistence::Enhanced {
                return Err(UpgradeError::ReplaceDiscardsState(old.stable_layout().to_string()));
            }
            let Some(bytes) = stable_memory else {
                return Ok(None);
            };
            let (layout, record) = program::decode_snapshot(bytes)
                .map_err(|error| UpgradeError::Hook { hook: "stable memory", error })?;
            Ok(Some(RetainedState { layout, record }))
        }
    }
}

/// Produce the new program's stable record from the retained state.
pub fn carry_over(
    retained: RetainedState,
    new: &dyn Program,
    ctx: &MigrationContext,
) -> Result<StableRecord, UpgradeError> {
    let target = new.stable_layout();

    let Some(migration) = new.migration() else {
        return adapt(retained, &target);
    };

    let expected = migration.source_layout();
    if expected != retained.layout {
        return Err(UpgradeError::MigrationSourceMismatch { expected, found: retained.layout });
    }
    let migrated = migration
        .migrate(ctx, retained.record)
        .map_err(|error| UpgradeError::Hook { hook: "migration", error })?;
    if !record_matches(&migrated, &target) {
        return Err(UpgradeError::MigrationOutput(target));
    }
    Ok(migrated)
}

/// Check that a retained layout can be read by a program declaring `to`.
pub fn check_compatible(from: &RecordType, to: &RecordType) -> Result<(), UpgradeError> {
    for (name, ty) in from.fields() {
        let target = to.get(name).ok_or_else(|| UpgradeError::DroppedField(name.to_string()))?;
        if !ty.is_assignable_to(target) {
            return Err(UpgradeError::IncompatibleField {
                name: name.to_string(),
                from: ty.clone(),
                to: target.clone(),
            });
        }
    }
    for (name, ty) in to.fields() {
        if !from.contains(name) && !matches!(ty, Type::Opt(_)) {
            return Err(UpgradeError::UninitializedField { name: name.to_string(), ty: ty.clone() });
        }
    }
    Ok(())
}

fn adapt(retained: RetainedState, target: &RecordType) -> Result<StableRecord, UpgradeError> {
    check_compatible(&retained.layout, target)?;

    let RetainedState { layout, mut record } = retained;
    let mut out = StableRecord::new();
    for (name, ty) in target.fields() {
        let value = match (layout.get(name), record.remove(name)) {
            (Some(from), Some(value)) => {
                value.widen(from, ty).map_err(|e| UpgradeError::IncompatibleField {
                    name: format!("{name} ({e})"),
                    from: from.clone(),
                    to: ty.clone(),
                })?
            }
            _ => Value::none(),
        };
        out.insert(name.to_string(), value);
    }
    Ok(out)
}
