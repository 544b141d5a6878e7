use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use replica_api::protocol::{
    CanisterStatus, ErrorBody, ErrorCode, InstallRequest, InstallResponse, InstanceInfo,
    TickRequest, TickResponse, TimeBody, UpgradeOptions, UpgradeRequest,
};
use replica_api::types::ServiceType;
use replica_api::CanisterId;

use crate::actor::{Actor, TypedActor};
use crate::error::ClientError;
use crate::module::ModuleSource;

/// Handle to one isolated replica instance on a replica server.
///
/// Cheap to clone; clones address the same instance.
#[derive(Debug, Clone)]
pub struct ReplicaClient {
    http: reqwest::Client,
    instance_url: String,
    instance_id: u64,
}

impl ReplicaClient {
    /// Create a fresh instance on the server at `server_url`.
    pub async fn create(server_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::new();
        let base = server_url.trim_end_matches('/');
        let info: InstanceInfo = read_json(http.post(format!("{base}/instances"))).await?;
        tracing::debug!(instance = info.instance_id, server = %base, "created replica instance");
        Ok(Self {
            http,
            instance_url: format!("{base}/instances/{}", info.instance_id),
            instance_id: info.instance_id,
        })
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Tear the instance down. Actors bound to it stop working.
    pub async fn delete(self) -> Result<(), ClientError> {
        expect_success(self.http.delete(&self.instance_url)).await?;
        tracing::debug!(instance = self.instance_id, "deleted replica instance");
        Ok(())
    }

    // --- clock ---

    /// Logical time, nanoseconds since the Unix epoch.
    pub async fn get_time(&self) -> Result<u64, ClientError> {
        let time: TimeBody = read_json(self.http.get(self.url("/time"))).await?;
        Ok(time.nanos)
    }

    /// Move the clock forward without running anything. Returns the new time.
    pub async fn advance_time(&self, by: Duration) -> Result<u64, ClientError> {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let time: TimeBody =
            read_json(self.http.post(self.url("/time")).json(&TimeBody { nanos })).await?;
        Ok(time.nanos)
    }

    /// Run up to `times` due timers. Returns how many ran.
    pub async fn tick(&self, times: u32) -> Result<u32, ClientError> {
        let res: TickResponse =
            read_json(self.http.post(self.url("/tick")).json(&TickRequest { times })).await?;
        Ok(res.executed)
    }

    // --- deployment ---

    /// Install a module under a new canister id and bind an actor to it.
    pub async fn setup_canister(
        &self,
        interface: ServiceType,
        module: impl Into<ModuleSource>,
        arg: Option<Vec<u8>>,
    ) -> Result<Actor, ClientError> {
        let module = module.into().load().await?;
        let res: InstallResponse = read_json(
            self.http.post(self.url("/canisters")).json(&InstallRequest { module, arg }),
        )
        .await?;
        tracing::debug!(instance = self.instance_id, canister = %res.canister_id, "installed canister");
        Ok(self.create_actor(interface, res.canister_id))
    }

    /// `setup_canister` with a typed binding.
    pub async fn setup_typed<A: TypedActor>(
        &self,
        module: impl Into<ModuleSource>,
        arg: Option<Vec<u8>>,
    ) -> Result<A, ClientError> {
        let actor = self.setup_canister(A::interface(), module, arg).await?;
        Ok(A::from_actor(actor))
    }

    /// Replace the code of `canister_id` in place.
    ///
    /// Actors bound to the old interface keep working only as far as the new
    /// interface is wire-compatible; rebind them with `Actor::rebind`.
    pub async fn upgrade_canister(
        &self,
        canister_id: CanisterId,
        module: impl Into<ModuleSource>,
        arg: Option<Vec<u8>>,
        options: UpgradeOptions,
    ) -> Result<(), ClientError> {
        let module = module.into().load().await?;
        let url = self.url(&format!("/canisters/{canister_id}/upgrade"));
        expect_success(self.http.post(url).json(&UpgradeRequest { module, arg, options }))
            .await
            .map_err(|e| e.with_context(format!("upgrade {canister_id}")))?;
        tracing::debug!(instance = self.instance_id, canister = %canister_id, "upgraded canister");
        Ok(())
    }

    /// Bind an actor to an existing canister.
    pub fn create_actor(&self, interface: ServiceType, canister_id: CanisterId) -> Actor {
        Actor::new(self.clone(), canister_id, interface)
    }

    pub async fn canister_status(&self, canister_id: CanisterId) -> Result<CanisterStatus, ClientError> {
        read_json(self.http.get(self.url(&format!("/canisters/{canister_id}")))).await
    }

    // --- plumbing ---

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.instance_url)
    }
}

/// Send a request and decode a JSON success body.
pub(crate) async fn read_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let res = expect_success(req).await?;
    Ok(res.json().await?)
}

/// Send a request; turn non-2xx answers into `ClientError::Rejected`.
pub(crate) async fn expect_success(req: RequestBuilder) -> Result<Response, ClientError> {
    let res = req.send().await?;
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await?;
    let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.kind, body.message),
        Err(_) if status == reqwest::StatusCode::NOT_FOUND => (ErrorCode::NotFound, text),
        Err(_) => (ErrorCode::BadRequest, text),
    };
    Err(ClientError::Rejected { status: status.as_u16(), kind, message })
}
