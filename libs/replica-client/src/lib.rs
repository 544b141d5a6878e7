//! Client for a replica server: instance control, deployment, upgrades and
//! typed remote calls.

pub mod actor;
pub mod client;
pub mod error;
pub mod module;

pub use actor::{Actor, TypedActor};
pub use client::ReplicaClient;
pub use error::ClientError;
pub use module::ModuleSource;
pub use replica_api::protocol::{MemoryPersistence, UpgradeOptions};
