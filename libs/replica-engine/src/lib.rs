pub mod canister;
pub mod config;
pub mod context;
pub mod error;
pub mod module_host;
pub mod persistence;
pub mod replica;
pub mod timers;

#[cfg(test)]
mod testing;

pub use config::ReplicaConfig;
pub use error::{CallError, ModuleError, ReplicaError, UpgradeError};
pub use replica::Replica;
