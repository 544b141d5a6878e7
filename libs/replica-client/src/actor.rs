use std::sync::Arc;

use replica_api::codec;
use replica_api::protocol::{CallRequest, CallResponse};
use replica_api::types::ServiceType;
use replica_api::value::{self, IdlType};
use replica_api::{CanisterId, Value};

use crate::client::{read_json, ReplicaClient};
use crate::error::ClientError;

/// Remote-call proxy for one canister, typed by an interface descriptor.
///
/// Arguments are checked and encoded with the descriptor before sending;
/// replies must match the descriptor's return types exactly. After an
/// upgrade, bind a new descriptor with `rebind`.
#[derive(Debug, Clone)]
pub struct Actor {
    client: ReplicaClient,
    canister_id: CanisterId,
    interface: Arc<ServiceType>,
}

impl Actor {
    pub(crate) fn new(client: ReplicaClient, canister_id: CanisterId, interface: ServiceType) -> Self {
        Self { client, canister_id, interface: Arc::new(interface) }
    }

    pub fn canister_id(&self) -> CanisterId {
        self.canister_id
    }

    pub fn interface(&self) -> &ServiceType {
        &self.interface
    }

    pub fn client(&self) -> &ReplicaClient {
        &self.client
    }

    /// Same canister, new descriptor. The old handle is consumed.
    pub fn rebind(self, interface: ServiceType) -> Actor {
        Actor { interface: Arc::new(interface), ..self }
    }

    /// Call `method` with already-built values.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Vec<Value>, ClientError> {
        let func = self
            .interface
            .get(method)
            .ok_or_else(|| ClientError::UnknownMethod(method.to_string()))?;
        let arg = codec::encode(&func.args, &args)
            .map_err(|error| ClientError::Arguments { method: method.to_string(), error })?;

        let url = self.client.url(&format!("/canisters/{}/call", self.canister_id));
        let res: CallResponse = read_json(
            self.client
                .http()
                .post(url)
                .json(&CallRequest { method: method.to_string(), arg }),
        )
        .await
        .map_err(|e| e.with_context(format!("{}.{method}", self.canister_id)))?;

        tracing::debug!(canister = %self.canister_id, method, "call returned");
        codec::decode_as(&res.reply, &func.rets).map_err(ClientError::Decode)
    }

    /// Call a method returning exactly one value.
    pub async fn call_one<T: IdlType>(&self, method: &str, args: Vec<Value>) -> Result<T, ClientError> {
        let values = self.call(method, args).await?;
        value::decode_one(values).map_err(ClientError::Decode)
    }

    /// Call a method returning nothing.
    pub async fn call_none(&self, method: &str, args: Vec<Value>) -> Result<(), ClientError> {
        let values = self.call(method, args).await?;
        value::decode_none(values).map_err(ClientError::Decode)
    }
}

/// Generated-style binding over an `Actor` for one interface version.
pub trait TypedActor: Sized {
    /// Descriptor of the version this binding speaks.
    fn interface() -> ServiceType;

    fn from_actor(actor: Actor) -> Self;

    fn actor(&self) -> &Actor;

    fn into_actor(self) -> Actor;

    fn canister_id(&self) -> CanisterId {
        self.actor().canister_id()
    }

    /// Rebind the same canister to another version's binding.
    fn rebind<B: TypedActor>(self) -> B {
        B::from_actor(self.into_actor().rebind(B::interface()))
    }
}
