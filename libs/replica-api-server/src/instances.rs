use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use replica_api::ProgramCatalog;
use replica_engine::{Replica, ReplicaConfig};

use crate::error::ServerError;

pub type SharedReplica = Arc<Mutex<Replica>>;

/// Isolated replica instances hosted by one server.
///
/// The map itself sits behind a std lock held only for lookups; each replica
/// has its own async mutex so operations on one instance run serially.
#[derive(Debug)]
pub struct InstancePool {
    instances: std::sync::RwLock<HashMap<u64, SharedReplica>>,
    next_id: AtomicU64,
    config: ReplicaConfig,
    catalog: Arc<ProgramCatalog>,
}

impl InstancePool {
    pub fn new(config: ReplicaConfig, catalog: Arc<ProgramCatalog>) -> Self {
        Self {
            instances: std::sync::RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            config,
            catalog,
        }
    }

    pub fn create(&self) -> Result<u64, ServerError> {
        let mut instances = self.instances.write().unwrap_or_else(|e| e.into_inner());
        if instances.len() >= self.config.max_instances {
            return Err(ServerError::Capacity(self.config.max_instances));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let replica = Replica::new(self.config.clone(), Arc::clone(&self.catalog));
        instances.insert(id, Arc::new(Mutex::new(replica)));
        tracing::info!(instance = id, "created instance");
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<SharedReplica, ServerError> {
        let instances = self.instances.read().unwrap_or_else(|e| e.into_inner());
        instances.get(&id).cloned().ok_or(ServerError::InstanceNotFound(id))
    }

    pub fn remove(&self, id: u64) -> Result<(), ServerError> {
        let mut instances = self.instances.write().unwrap_or_else(|e| e.into_inner());
        instances.remove(&id).ok_or(ServerError::InstanceNotFound(id))?;
        tracing::info!(instance = id, "deleted instance");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instances.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
