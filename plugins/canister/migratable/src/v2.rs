use classplus::{Class, ClassPlus, TypedMigration};
use replica_api::program::{Environment, Migration, MigrationContext, Program};
use replica_api::types::{FuncType, ServiceType, Type};
use replica_api::value::{self, IdlType};
use replica_api::{IdlRecord, ProgramError, Value};

use crate::v1::StateInfoV1;

pub const VERSION_FRESH: &str = "v2";
pub const VERSION_MIGRATED: &str = "v2-migrated";

const DEFAULT_MESSAGE: &str = "Hello World v2";

/// Stable variables of v2 and v2_post. Also the reply of `getStateInfo`.
#[derive(Debug, Clone, PartialEq, IdlRecord)]
pub struct StateInfoV2 {
    pub message: String,
    pub counter: u64,
    #[idl(rename = "lastUpdated")]
    pub last_updated: i64,
    pub version: String,
}

/// Install argument: `opt record { message : opt text }`.
#[derive(Debug, Clone, PartialEq, Default, IdlRecord)]
pub struct InitArgs {
    pub message: Option<String>,
}

pub fn interface() -> ServiceType {
    ServiceType::new()
        .init_args(vec![Type::opt(InitArgs::idl_type())])
        .method("getCounter", FuncType::update(vec![], vec![Type::Nat]))
        .method("getLastUpdated", FuncType::update(vec![], vec![Type::Int]))
        .method("getMessage", FuncType::update(vec![], vec![Type::Text]))
        .method("getStateInfo", FuncType::update(vec![], vec![StateInfoV2::idl_type()]))
        .method("getVersion", FuncType::update(vec![], vec![Type::Text]))
        .method("increment", FuncType::update(vec![], vec![Type::Nat]))
        .method("setMessage", FuncType::update(vec![Type::Text], vec![]))
}

fn from_v1(ctx: &MigrationContext, old: StateInfoV1) -> Result<StateInfoV2, ProgramError> {
    tracing::info!(canister = %ctx.env.canister_id, counter = old.counter, "migrating v1 state");
    Ok(StateInfoV2 {
        message: old.message,
        counter: old.counter,
        last_updated: ctx.env.now_nanos,
        version: VERSION_MIGRATED.to_string(),
    })
}

struct MigratableV2 {
    migration: Option<TypedMigration<StateInfoV1, StateInfoV2>>,
}

impl Class for MigratableV2 {
    type State = StateInfoV2;

    fn interface(&self) -> ServiceType {
        interface()
    }

    fn initial_state(&self, env: &Environment, args: Vec<Value>) -> Result<StateInfoV2, ProgramError> {
        let args: Option<InitArgs> = if args.is_empty() { None } else { value::decode_one(args)? };
        let message = args
            .and_then(|a| a.message)
            .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
        Ok(StateInfoV2 {
            message,
            counter: 0,
            last_updated: env.now_nanos,
            version: VERSION_FRESH.to_string(),
        })
    }

    fn migration(&self) -> Option<&dyn Migration> {
        self.migration.as_ref().map(|m| m as &dyn Migration)
    }

    fn call(
        &self,
        state: &mut StateInfoV2,
        env: &Environment,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ProgramError> {
        match method {
            "getCounter" => Ok(value::encode_one(state.counter)),
            "getLastUpdated" => Ok(value::encode_one(state.last_updated)),
            "getMessage" => Ok(value::encode_one(state.message.clone())),
            "getStateInfo" => Ok(vec![state.clone().into_value()]),
            "getVersion" => Ok(value::encode_one(state.version.clone())),
            "increment" => {
                state.counter += 1;
                state.last_updated = env.now_nanos;
                Ok(value::encode_one(state.counter))
            }
            "setMessage" => {
                state.message = value::decode_one(args)?;
                state.last_updated = env.now_nanos;
                Ok(vec![])
            }
            other => Err(ProgramError::logic(format!("unknown method '{other}'"))),
        }
    }
}

pub(crate) fn create() -> Box<dyn Program> {
    ClassPlus::boxed(MigratableV2 { migration: Some(TypedMigration::new(from_v1)) })
}

pub(crate) fn create_post() -> Box<dyn Program> {
    ClassPlus::boxed(MigratableV2 { migration: None })
}
