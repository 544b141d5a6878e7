use replica_api::error::{CodecError, ProgramError};
use replica_api::protocol::ErrorCode;
use replica_api::types::{RecordType, Type};
use replica_api::CanisterId;

/// Failure to turn module bytes into a program.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("not a canister module (bad magic or truncated header)")]
    BadHeader,

    #[error("module ABI version mismatch: module={found}, host={expected}")]
    AbiMismatch { found: u32, expected: u32 },

    #[error("invalid module manifest: {0}")]
    Manifest(String),

    #[error("unknown program entry '{0}'")]
    UnknownEntry(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an upgrade was refused. The canister is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("wasm_memory_persistence 'keep' requires a program with enhanced persistence")]
    KeepRequiresEnhanced,

    #[error("wasm_memory_persistence 'replace' would discard the enhanced state of '{0}'; use 'keep'")]
    ReplaceDiscardsState(String),

    #[error("migration expects stable layout {expected}, but the retained layout is {found}")]
    MigrationSourceMismatch { expected: RecordType, found: RecordType },

    #[error("migration produced state that does not match the new stable layout {0}")]
    MigrationOutput(RecordType),

    #[error("stable variable '{name}' of type {from} cannot be stored as {to}")]
    IncompatibleField { name: String, from: Type, to: Type },

    #[error("stable variable '{0}' is missing from the new program")]
    DroppedField(String),

    #[error("new stable variable '{name}' of type {ty} must be opt or set by a migration")]
    UninitializedField { name: String, ty: Type },

    #[error("invalid upgrade argument: {0}")]
    Arguments(CodecError),

    #[error("{hook} trapped: {error}")]
    Hook { hook: &'static str, error: ProgramError },

    #[error("{hook} left stable state that does not match layout {layout}")]
    StateMismatch { hook: &'static str, layout: RecordType },
}

/// Why a call was rejected. State changes made by the call are discarded.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("method '{0}' not found")]
    UnknownMethod(String),

    #[error("invalid arguments: {0}")]
    Arguments(CodecError),

    #[error("canister trapped: {0}")]
    Trap(ProgramError),

    #[error("reply does not match the method signature: {0}")]
    BadReply(CodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error("config error: {0}")]
    Config(String),

    #[error("canister not found: {0}")]
    CanisterNotFound(CanisterId),

    #[error("invalid module: {0}")]
    Module(#[from] ModuleError),

    #[error("install rejected: {0}")]
    Install(String),

    #[error("upgrade rejected: {0}")]
    Upgrade(#[from] UpgradeError),

    #[error("call rejected: {0}")]
    Call(#[from] CallError),
}

impl ReplicaError {
    /// Add context to the error.
    ///
    /// For traps, context is added to the inner `ProgramError`.
    /// For string variants, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            ReplicaError::Config(msg) => ReplicaError::Config(format!("{ctx}: {msg}")),
            ReplicaError::Install(msg) => ReplicaError::Install(format!("{ctx}: {msg}")),
            ReplicaError::Call(CallError::Trap(e)) => {
                ReplicaError::Call(CallError::Trap(e.with_context(ctx)))
            }
            ReplicaError::Upgrade(UpgradeError::Hook { hook, error }) => {
                ReplicaError::Upgrade(UpgradeError::Hook { hook, error: error.with_context(ctx) })
            }
            other => other,
        }
    }

    /// Category reported to HTTP clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            ReplicaError::Config(_) => ErrorCode::BadRequest,
            ReplicaError::CanisterNotFound(_) => ErrorCode::NotFound,
            ReplicaError::Module(ModuleError::Io(_)) => ErrorCode::Internal,
            ReplicaError::Module(_) => ErrorCode::InvalidModule,
            ReplicaError::Install(_) => ErrorCode::InstallRejected,
            ReplicaError::Upgrade(_) => ErrorCode::UpgradeRejected,
            ReplicaError::Call(_) => ErrorCode::CallRejected,
        }
    }
}
