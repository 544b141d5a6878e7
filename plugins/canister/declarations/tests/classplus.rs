//! ClassPlus scenarios against a live replica server: the example canister,
//! the v1 -> v2 migration path and fresh v2 installs.

use std::time::Duration;

use canister_declarations::example::{self, Example};
use canister_declarations::migratable_v1::{self, MigratableV1};
use canister_declarations::migratable_v2::{self, InitArgs, MigratableV2};
use canister_declarations::migratable_v2_post::{self, MigratableV2Post};
use replica_api::protocol::ErrorCode;
use replica_api::types::{FuncMode, ServiceType};
use replica_api::ProgramCatalog;
use replica_api_server::{ReplicaServer, ServerConfig};
use replica_client::{ClientError, ModuleSource, ReplicaClient, TypedActor, UpgradeOptions};
use tempfile::TempDir;

struct Fixture {
    server: ReplicaServer,
    pic: ReplicaClient,
    build: TempDir,
}

impl Fixture {
    async fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let mut catalog = ProgramCatalog::new();
        canister_example::register(&mut catalog);
        canister_migratable::register(&mut catalog);

        let build = tempfile::tempdir().unwrap();
        replica_engine::module_host::build_artifacts(&catalog, build.path()).unwrap();

        let server = ReplicaServer::start(ServerConfig::ephemeral(), catalog).await.unwrap();
        let pic = ReplicaClient::create(&server.url()).await.unwrap();
        Self { server, pic, build }
    }

    fn wasm(&self, name: &str) -> ModuleSource {
        ModuleSource::artifact(self.build.path(), name)
    }

    async fn setup<A: TypedActor>(&self, name: &str) -> A {
        self.pic.setup_typed::<A>(self.wasm(name), None).await.unwrap()
    }

    async fn upgrade_keep(&self, actor: &impl TypedActor, name: &str) -> Result<(), ClientError> {
        self.pic
            .upgrade_canister(actor.canister_id(), self.wasm(name), None, UpgradeOptions::keep())
            .await
    }

    /// Let the ClassPlus init timer run.
    async fn settle(&self) {
        self.pic.advance_time(Duration::from_secs(1)).await.unwrap();
        self.pic.tick(10).await.unwrap();
    }

    async fn stop(self) {
        self.pic.delete().await.unwrap();
        self.server.stop().await.unwrap();
    }
}

#[test]
fn declarations_match_program_interfaces() {
    let mut catalog = ProgramCatalog::new();
    canister_example::register(&mut catalog);
    canister_migratable::register(&mut catalog);

    let declared: [(&str, ServiceType); 4] = [
        (example::NAME, example::idl_factory()),
        (migratable_v1::NAME, migratable_v1::idl_factory()),
        (migratable_v2::NAME, migratable_v2::idl_factory()),
        (migratable_v2_post::NAME, migratable_v2_post::idl_factory()),
    ];
    for (name, service) in declared {
        let program = catalog.resolve(name).unwrap();
        let implemented = program.interface();
        assert_eq!(
            implemented.methods().collect::<Vec<_>>(),
            service.methods().collect::<Vec<_>>(),
            "{name}"
        );
        for (method, func) in service.methods() {
            assert_eq!(func.mode, FuncMode::Update, "{name}.{method}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Example canister
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn example_initializes_with_default_message() {
    let fx = Fixture::start().await;
    let canister: Example = fx.setup(example::NAME).await;

    assert_eq!(canister.get_message().await.unwrap(), "");
    fx.settle().await;
    assert!(canister.get_message().await.unwrap().contains("Hello World"));

    fx.stop().await;
}

#[tokio::test]
async fn example_sets_and_gets_message() {
    let fx = Fixture::start().await;
    let canister: Example = fx.setup(example::NAME).await;
    fx.settle().await;

    canister.set_message("New Test Message").await.unwrap();
    assert_eq!(canister.get_message().await.unwrap(), "New Test Message");

    fx.stop().await;
}

#[tokio::test]
async fn example_state_persists_across_upgrade() {
    let fx = Fixture::start().await;
    let canister: Example = fx.setup(example::NAME).await;
    fx.settle().await;

    canister.set_message("Pre-upgrade message").await.unwrap();
    assert_eq!(canister.get_message().await.unwrap(), "Pre-upgrade message");

    fx.upgrade_keep(&canister, example::NAME).await.unwrap();
    fx.settle().await;
    assert_eq!(canister.get_message().await.unwrap(), "Pre-upgrade message");

    fx.stop().await;
}

// ═══════════════════════════════════════════════════════════════
//  Migration path: v1 -> v2 -> v2_post
// ═══════════════════════════════════════════════════════════════

async fn v1_with_history(fx: &Fixture) -> MigratableV1 {
    let v1: MigratableV1 = fx.setup(migratable_v1::NAME).await;
    fx.settle().await;
    for _ in 0..3 {
        v1.increment().await.unwrap();
    }
    v1.set_message("Test message before migration").await.unwrap();
    v1
}

#[tokio::test]
async fn v1_initializes_correctly() {
    let fx = Fixture::start().await;
    let v1: MigratableV1 = fx.setup(migratable_v1::NAME).await;
    fx.settle().await;

    let info = v1.get_state_info().await.unwrap();
    assert!(info.message.contains("Hello World v1"));
    assert_eq!(info.counter, 0);
    assert_eq!(v1.get_version().await.unwrap(), "v1");

    fx.stop().await;
}

#[tokio::test]
async fn v1_tracks_counter_and_message() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;

    assert_eq!(v1.get_counter().await.unwrap(), 3);
    assert_eq!(v1.get_message().await.unwrap(), "Test message before migration");

    fx.stop().await;
}

#[tokio::test]
async fn v1_state_persists_across_repeated_v1_upgrades() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;
    let before = v1.get_state_info().await.unwrap();

    for _ in 0..2 {
        fx.upgrade_keep(&v1, migratable_v1::NAME).await.unwrap();
        fx.settle().await;
        assert_eq!(v1.get_state_info().await.unwrap(), before);
    }

    fx.stop().await;
}

#[tokio::test]
async fn v1_to_v2_migration_preserves_message_and_counter() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;
    let v1_state = v1.get_state_info().await.unwrap();

    fx.upgrade_keep(&v1, migratable_v2::NAME).await.unwrap();
    let v2: MigratableV2 = v1.rebind();
    fx.settle().await;

    let v2_state = v2.get_state_info().await.unwrap();
    assert_eq!(v2_state.message, v1_state.message);
    assert_eq!(v2_state.counter, v1_state.counter);
    assert!(v2_state.last_updated > 0);
    assert_eq!(v2_state.version, "v2-migrated");

    fx.stop().await;
}

#[tokio::test]
async fn v2_has_new_functionality_after_migration() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;
    fx.upgrade_keep(&v1, migratable_v2::NAME).await.unwrap();
    let v2 = MigratableV2::from_actor(fx.pic.create_actor(migratable_v2::idl_factory(), v1.canister_id()));

    let before = v2.get_last_updated().await.unwrap();
    assert!(before > 0);
    assert_eq!(v2.get_version().await.unwrap(), "v2-migrated");

    fx.pic.advance_time(Duration::from_secs(1)).await.unwrap();
    assert_eq!(v2.increment().await.unwrap(), 4);
    let after = v2.get_last_updated().await.unwrap();
    assert!(after >= before);

    fx.stop().await;
}

#[tokio::test]
async fn v1_proxy_cannot_decode_v2_state_info() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;
    fx.upgrade_keep(&v1, migratable_v2::NAME).await.unwrap();

    // Unchanged methods still line up on the wire.
    assert_eq!(v1.get_counter().await.unwrap(), 3);
    let err = v1.get_state_info().await.unwrap_err();
    assert!(err.is_decode(), "{err}");

    fx.stop().await;
}

#[tokio::test]
async fn reapplying_the_migration_is_rejected() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;
    fx.upgrade_keep(&v1, migratable_v2::NAME).await.unwrap();
    let v2: MigratableV2 = v1.rebind();
    let before = v2.get_state_info().await.unwrap();

    let err = fx.upgrade_keep(&v2, migratable_v2::NAME).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UpgradeRejected));
    assert_eq!(v2.get_state_info().await.unwrap(), before);

    fx.stop().await;
}

#[tokio::test]
async fn v2_state_persists_across_upgrade_to_v2_post() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;
    fx.upgrade_keep(&v1, migratable_v2::NAME).await.unwrap();
    let v2: MigratableV2 = v1.rebind();
    let before = v2.get_state_info().await.unwrap();

    fx.upgrade_keep(&v2, migratable_v2_post::NAME).await.unwrap();
    let post: MigratableV2Post = v2.rebind();
    fx.settle().await;

    let after = post.get_state_info().await.unwrap();
    assert_eq!(after.message, before.message);
    assert_eq!(after.counter, before.counter);
    assert_eq!(after.version, before.version);

    fx.upgrade_keep(&post, migratable_v2_post::NAME).await.unwrap();
    assert_eq!(post.get_state_info().await.unwrap(), after);

    fx.stop().await;
}

#[tokio::test]
async fn v1_to_v2_post_is_rejected() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;
    let before = v1.get_state_info().await.unwrap();

    let err = fx.upgrade_keep(&v1, migratable_v2_post::NAME).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UpgradeRejected));
    assert_eq!(v1.get_state_info().await.unwrap(), before);

    fx.stop().await;
}

#[tokio::test]
async fn replace_mode_is_rejected_for_enhanced_programs() {
    let fx = Fixture::start().await;
    let v1 = v1_with_history(&fx).await;

    let err = fx
        .pic
        .upgrade_canister(v1.canister_id(), fx.wasm(migratable_v1::NAME), None, UpgradeOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UpgradeRejected));
    assert_eq!(v1.get_counter().await.unwrap(), 3);

    fx.stop().await;
}

// ═══════════════════════════════════════════════════════════════
//  Fresh v2 installation
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn fresh_v2_uses_initial_state() {
    let fx = Fixture::start().await;
    let v2: MigratableV2 = fx.setup(migratable_v2::NAME).await;
    fx.settle().await;

    let state = v2.get_state_info().await.unwrap();
    assert!(state.message.contains("Hello World v2"));
    assert_eq!(state.counter, 0);
    assert_eq!(state.version, "v2");
    assert_eq!(v2.get_version().await.unwrap(), "v2");
    assert!(v2.get_last_updated().await.unwrap() >= 0);

    fx.stop().await;
}

#[tokio::test]
async fn fresh_v2_accepts_an_init_message() {
    let fx = Fixture::start().await;
    let arg = migratable_v2::encode_init(Some(InitArgs { message: Some("from init".into()) })).unwrap();
    let v2: MigratableV2 = fx
        .pic
        .setup_typed(fx.wasm(migratable_v2::NAME), Some(arg))
        .await
        .unwrap();

    assert_eq!(v2.get_message().await.unwrap(), "from init");
    assert_eq!(v2.get_version().await.unwrap(), "v2");

    fx.stop().await;
}
