//! The migratable example in three versions.
//!
//! `migratable_v1` keeps a message and a counter. `migratable_v2` adds a
//! last-updated timestamp and a version tag and carries a one-shot migration
//! from the v1 layout. `migratable_v2_post` is v2 with the migration removed,
//! for canisters that have already been migrated.

pub mod v1;
pub mod v2;

use replica_api::ProgramCatalog;

pub const V1: &str = "migratable_v1";
pub const V2: &str = "migratable_v2";
pub const V2_POST: &str = "migratable_v2_post";

pub fn register(catalog: &mut ProgramCatalog) {
    catalog
        .register(V1, "1.0.0", v1::create)
        .register(V2, "2.0.0", v2::create)
        .register(V2_POST, "2.0.0", v2::create_post);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use replica_api::codec;
    use replica_api::module::build_module;
    use replica_api::protocol::UpgradeOptions;
    use replica_api::value::{self, IdlType};
    use replica_api::{CanisterId, Type};
    use replica_engine::error::{ReplicaError, UpgradeError};
    use replica_engine::{Replica, ReplicaConfig};

    use super::*;
    use crate::v1::StateInfoV1;
    use crate::v2::StateInfoV2;

    fn catalog() -> ProgramCatalog {
        let mut catalog = ProgramCatalog::new();
        register(&mut catalog);
        catalog
    }

    fn replica() -> Replica {
        Replica::new(ReplicaConfig::default(), Arc::new(catalog()))
    }

    fn module(entry: &str) -> Vec<u8> {
        build_module(&catalog().manifest(entry).unwrap()).unwrap()
    }

    fn call<T: IdlType>(replica: &mut Replica, id: CanisterId, method: &str) -> T {
        let reply = replica.call(id, method, &[]).unwrap();
        value::decode_one(codec::decode_as(&reply, &[T::idl_type()]).unwrap()).unwrap()
    }

    #[test]
    fn v1_to_v2_migrates_once() {
        let mut replica = replica();
        let id = replica.install(&module(V1), None).unwrap();
        for _ in 0..3 {
            let _: u64 = call(&mut replica, id, "increment");
        }
        let before: StateInfoV1 = call(&mut replica, id, "getStateInfo");
        assert_eq!(before.counter, 3);

        replica.advance_time(std::time::Duration::from_secs(5));
        replica.upgrade(id, &module(V2), None, UpgradeOptions::keep()).unwrap();
        let after: StateInfoV2 = call(&mut replica, id, "getStateInfo");
        assert_eq!(after.counter, 3);
        assert_eq!(after.message, "Hello World v1");
        assert_eq!(after.version, "v2-migrated");
        assert_eq!(after.last_updated, replica.time() as i64);

        let err = replica
            .upgrade(id, &module(V2), None, UpgradeOptions::keep())
            .unwrap_err();
        assert!(matches!(err, ReplicaError::Upgrade(UpgradeError::MigrationSourceMismatch { .. })));

        replica.upgrade(id, &module(V2_POST), None, UpgradeOptions::keep()).unwrap();
        let post: StateInfoV2 = call(&mut replica, id, "getStateInfo");
        assert_eq!(post, after);
    }

    #[test]
    fn v2_init_argument_sets_the_message() {
        let mut replica = replica();
        let arg = codec::encode(
            &[Type::opt(v2::InitArgs::idl_type())],
            &[Some(v2::InitArgs { message: Some("custom".into()) }).into_value()],
        )
        .unwrap();
        let id = replica.install(&module(V2), Some(&arg)).unwrap();
        let info: StateInfoV2 = call(&mut replica, id, "getStateInfo");
        assert_eq!(info.message, "custom");
        assert_eq!(info.version, "v2");
    }

    #[test]
    fn v2_post_rejects_v1_state() {
        let mut replica = replica();
        let id = replica.install(&module(V1), None).unwrap();
        let err = replica
            .upgrade(id, &module(V2_POST), None, UpgradeOptions::keep())
            .unwrap_err();
        assert!(matches!(err, ReplicaError::Upgrade(UpgradeError::UninitializedField { .. })));
        let info: StateInfoV1 = call(&mut replica, id, "getStateInfo");
        assert_eq!(info.message, "Hello World v1");
    }
}
