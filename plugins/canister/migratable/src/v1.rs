use classplus::{Class, ClassPlus};
use replica_api::program::{Environment, Program};
use replica_api::types::{FuncType, ServiceType, Type};
use replica_api::value::{self, IdlType};
use replica_api::{IdlRecord, ProgramError, Value};

/// Stable variables of v1. Also the reply of `getStateInfo`.
#[derive(Debug, Clone, PartialEq, IdlRecord)]
pub struct StateInfoV1 {
    pub message: String,
    pub counter: u64,
}

pub fn interface() -> ServiceType {
    ServiceType::new()
        .method("getCounter", FuncType::update(vec![], vec![Type::Nat]))
        .method("getMessage", FuncType::update(vec![], vec![Type::Text]))
        .method("getStateInfo", FuncType::update(vec![], vec![StateInfoV1::idl_type()]))
        .method("getVersion", FuncType::update(vec![], vec![Type::Text]))
        .method("increment", FuncType::update(vec![], vec![Type::Nat]))
        .method("setMessage", FuncType::update(vec![Type::Text], vec![]))
}

struct MigratableV1;

impl Class for MigratableV1 {
    type State = StateInfoV1;

    fn interface(&self) -> ServiceType {
        interface()
    }

    fn initial_state(&self, _env: &Environment, _args: Vec<Value>) -> Result<StateInfoV1, ProgramError> {
        Ok(StateInfoV1 { message: "Hello World v1".to_string(), counter: 0 })
    }

    fn call(
        &self,
        state: &mut StateInfoV1,
        _env: &Environment,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ProgramError> {
        match method {
            "getCounter" => Ok(value::encode_one(state.counter)),
            "getMessage" => Ok(value::encode_one(state.message.clone())),
            "getStateInfo" => Ok(vec![state.clone().into_value()]),
            "getVersion" => Ok(value::encode_one("v1".to_string())),
            "increment" => {
                state.counter += 1;
                Ok(value::encode_one(state.counter))
            }
            "setMessage" => {
                state.message = value::decode_one(args)?;
                Ok(vec![])
            }
            other => Err(ProgramError::logic(format!("unknown method '{other}'"))),
        }
    }
}

pub(crate) fn create() -> Box<dyn Program> {
    ClassPlus::boxed(MigratableV1)
}
