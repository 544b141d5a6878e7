use replica_api::codec;
use replica_api::types::{FuncType, ServiceType, Type};
use replica_api::{CodecError, IdlRecord, IdlType, Value};
use replica_client::ClientError;

pub const NAME: &str = "migratable_v2";

#[derive(Debug, Clone, PartialEq, Eq, IdlRecord)]
pub struct StateInfo {
    pub counter: u64,
    #[idl(rename = "lastUpdated")]
    pub last_updated: i64,
    pub version: String,
    pub message: String,
}

/// `opt record { message : opt text }`
#[derive(Debug, Clone, PartialEq, Eq, Default, IdlRecord)]
pub struct InitArgs {
    pub message: Option<String>,
}

pub fn init() -> Vec<Type> {
    vec![Type::opt(InitArgs::idl_type())]
}

/// Encode the install argument.
pub fn encode_init(args: Option<InitArgs>) -> Result<Vec<u8>, CodecError> {
    codec::encode(&init(), &[args.into_value()])
}

pub fn idl_factory() -> ServiceType {
    ServiceType::new()
        .init_args(init())
        .method("getCounter", FuncType::update(vec![], vec![Type::Nat]))
        .method("getLastUpdated", FuncType::update(vec![], vec![Type::Int]))
        .method("getMessage", FuncType::update(vec![], vec![Type::Text]))
        .method("getStateInfo", FuncType::update(vec![], vec![StateInfo::idl_type()]))
        .method("getVersion", FuncType::update(vec![], vec![Type::Text]))
        .method("increment", FuncType::update(vec![], vec![Type::Nat]))
        .method("setMessage", FuncType::update(vec![Type::Text], vec![]))
}

crate::typed_actor!(MigratableV2, idl_factory);

impl MigratableV2 {
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
