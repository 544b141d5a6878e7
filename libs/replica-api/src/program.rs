use std::collections::BTreeMap;
use std::time::Duration;

use crate::codec;
use crate::error::ProgramError;
use crate::id::CanisterId;
use crate::types::{RecordType, ServiceType, Type};
use crate::value::{IdlRecord, Value};

/// How a program's stable state survives an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    /// The live stable record is retained; upgrades must use `keep`.
    Enhanced,
    /// Only the stable-memory snapshot written by `pre_upgrade` survives.
    Classical,
}

/// Stable variables of a canister, keyed by name.
pub type StableRecord = BTreeMap<String, Value>;

/// Read-only facts about the executing canister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub canister_id: CanisterId,
    /// Replica time in nanoseconds since the Unix epoch.
    pub now_nanos: i64,
}

/// System API visible to program code during one execution.
///
/// Every change made through the context is provisional: the replica commits
/// it only if the execution returns `Ok`.
pub trait ProgramContext {
    fn env(&self) -> Environment;

    fn stable(&self) -> &StableRecord;

    fn stable_mut(&mut self) -> &mut StableRecord;

    /// Schedule `on_timer(tag)` to run once `delay` has elapsed on the replica clock.
    fn set_timer(&mut self, delay: Duration, tag: &str);

    /// Replace the stable-memory snapshot.
    fn stable_memory_write(&mut self, snapshot: Vec<u8>);

    fn stable_memory(&self) -> Option<&[u8]>;
}

/// Load the stable record as a typed struct.
pub fn load_state<S: IdlRecord>(ctx: &dyn ProgramContext) -> Result<S, ProgramError> {
    S::from_value(Value::Record(ctx.stable().clone()))
        .map_err(|e| ProgramError::state(e.to_string()))
}

/// Replace the stable record with a typed struct.
pub fn store_state<S: IdlRecord>(ctx: &mut dyn ProgramContext, state: S) -> Result<(), ProgramError> {
    match state.into_value() {
        Value::Record(fields) => {
            *ctx.stable_mut() = fields;
            Ok(())
        }
        other => Err(ProgramError::state(format!(
            "stable state must be a record, got {}",
            other.kind_name()
        ))),
    }
}

/// Context handed to a migration routine.
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext {
    pub env: Environment,
}

/// One-shot transformation from a retained stable layout to a new one.
pub trait Migration: Send + Sync {
    /// The exact layout this routine consumes. The replica refuses to run it
    /// against anything else.
    fn source_layout(&self) -> RecordType;

    fn migrate(&self, ctx: &MigrationContext, old: StableRecord) -> Result<StableRecord, ProgramError>;
}

/// A deployable program: the code installed into a canister.
///
/// The replica doesn't know concrete implementations. For the replica, a
/// program is just this trait.
pub trait Program: Send + Sync {
    /// Interface descriptor of this program version.
    fn interface(&self) -> ServiceType;

    /// Declared stable variables.
    fn stable_layout(&self) -> RecordType;

    fn persistence(&self) -> Persistence {
        Persistence::Enhanced
    }

    /// Fresh install. Must leave a stable record that matches `stable_layout`.
    fn init(&self, ctx: &mut dyn ProgramContext, args: Vec<Value>) -> Result<(), ProgramError>;

    fn migration(&self) -> Option<&dyn Migration> {
        None
    }

    /// Runs on the old code before an upgrade, unless the caller skips it.
    ///
    /// Default: classical programs save their stable record to stable memory.
    fn pre_upgrade(&self, ctx: &mut dyn ProgramContext) -> Result<(), ProgramError> {
        if self.persistence() == Persistence::Classical {
            let snapshot = encode_snapshot(&self.stable_layout(), ctx.stable())?;
            ctx.stable_memory_write(snapshot);
        }
        Ok(())
    }

    /// Runs on the new code after the stable record has been carried over.
    fn post_upgrade(&self, _ctx: &mut dyn ProgramContext, _args: Vec<Value>) -> Result<(), ProgramError> {
        Ok(())
    }

    /// Execute a method declared in `interface()`. Arguments are already
    /// decoded against the method signature.
    fn call(
        &self,
        ctx: &mut dyn ProgramContext,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ProgramError>;

    fn on_timer(&self, _ctx: &mut dyn ProgramContext, tag: &str) -> Result<(), ProgramError> {
        Err(ProgramError::logic(format!("no handler for timer '{tag}'")))
    }
}

/// Encode a stable record as a one-value IDL message.
pub fn encode_snapshot(layout: &RecordType, record: &StableRecord) -> Result<Vec<u8>, ProgramError> {
    codec::encode(&[Type::Record(layout.clone())], &[Value::Record(record.clone())])
        .map_err(ProgramError::from)
}

/// Decode a stable-memory snapshot written by `encode_snapshot`.
pub fn decode_snapshot(bytes: &[u8]) -> Result<(RecordType, StableRecord), ProgramError> {
    let (types, values) = codec::decode(bytes)?;
    match (types.into_iter().next(), values.into_iter().next()) {
        (Some(Type::Record(layout)), Some(Value::Record(record))) => Ok((layout, record)),
        _ => Err(ProgramError::state("stable memory does not hold a record snapshot")),
    }
}
