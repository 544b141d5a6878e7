//! v2 after migration: same wire interface as `migratable_v2`, no init argument.

use replica_api::types::{FuncType, ServiceType, Type};
use replica_api::{IdlType, Value};
use replica_client::ClientError;

pub use crate::migratable_v2::StateInfo;

pub const NAME: &str = "migratable_v2_post";

pub fn idl_factory() -> ServiceType {
    ServiceType::new()
        .method("getCounter", FuncType::update(vec![], vec![Type::Nat]))
        .method("getLastUpdated", FuncType::update(vec![], vec![Type::Int]))
        .method("getMessage", FuncType::update(vec![], vec![Type::Text]))
        .method("getStateInfo", FuncType::update(vec![], vec![StateInfo::idl_type()]))
        .method("getVersion", FuncType::update(vec![], vec![Type::Text]))
        .method("increment", FuncType::update(vec![], vec![Type::Nat]))
        .method("setMessage", FuncType::update(vec![Type::Text], vec![]))
}

crate::typed_actor!(MigratableV2Post, idl_factory);

impl MigratableV2Post {
    pub async fn get_counter(&self) -> Result<u64, ClientError> {
        self.actor.call_one("getCounter", vec![]).await
    }

    pub async fn get_last_updated(&self) -> Result<i64, ClientError> {
        self.actor.call_one("getLastUpdated", vec![]).await
    }

    pub async fn get_message(&self) -> Result<String, ClientError> {
        self.actor.call_one("getMessage", vec![]).await
    }

    pub async fn get_state_info(&self) -> Result<StateInfo, ClientError> {
        self.actor.call_one("getStateInfo", vec![]).await
    }

    pub async fn get_version(&self) -> Result<String, ClientError> {
        self.actor.call_one("getVersion", vec![]).await
    }

    pub async fn increment(&self) -> Result<u64, ClientError> {
        self.actor.call_one("increment", vec![]).await
    }

    pub async fn set_message(&self, message: &str) -> Result<(), ClientError> {
        self.actor.call_none("setMessage", vec![Value::text(message)]).await
    }
}
