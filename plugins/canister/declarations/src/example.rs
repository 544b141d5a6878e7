use replica_api::types::{FuncType, ServiceType, Type};
use replica_api::Value;
use replica_client::ClientError;

pub const NAME: &str = "example";

pub fn idl_factory() -> ServiceType {
    ServiceType::new()
        .method("SetMessage", FuncType::update(vec![Type::Text], vec![]))
        .method("getMessage", FuncType::update(vec![], vec![Type::Text]))
}

crate::typed_actor!(Example, idl_factory);

impl Example {
    pub async fn set_message(&self, message: &str) -> Result<(), ClientError> {
        self.actor.call_none("SetMessage", vec![Value::text(message)]).await
    }

    pub async fn get_message(&self) -> Result<String, ClientError> {
        self.actor.call_one("getMessage", vec![]).await
    }
}
