//! `example`: a single stable message, greeted into place by the ClassPlus
//! init timer.

use classplus::{Class, ClassPlus};
use replica_api::program::{Environment, Program};
use replica_api::types::{FuncType, ServiceType, Type};
use replica_api::value::{self, IdlType};
use replica_api::{IdlRecord, ProgramCatalog, ProgramError, Value};

pub const ENTRY: &str = "example";
pub const VERSION: &str = "1.0.0";

const GREETING: &str = "Hello World";

#[derive(Debug, Clone, PartialEq, IdlRecord)]
pub struct ExampleState {
    pub message: String,
}

pub fn interface() -> ServiceType {
    ServiceType::new()
        .method("SetMessage", FuncType::update(vec![Type::Text], vec![]))
        .method("getMessage", FuncType::update(vec![], vec![Type::Text]))
}

struct Example;

impl Class for Example {
    type State = ExampleState;

    fn interface(&self) -> ServiceType {
        interface()
    }

    fn initial_state(&self, _env: &Environment, _args: Vec<Value>) -> Result<ExampleState, ProgramError> {
        Ok(ExampleState { message: String::new() })
    }

    fn initialize(&self, state: &mut ExampleState, env: &Environment) -> Result<(), ProgramError> {
        if state.message.is_empty() {
            state.message = GREETING.to_string();
            tracing::debug!(canister = %env.canister_id, "example greeting set");
        }
        Ok(())
    }

    fn call(
        &self,
        state: &mut ExampleState,
        _env: &Environment,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ProgramError> {
        match method {
            "SetMessage" => {
                state.message = value::decode_one(args)?;
                Ok(vec![])
            }
            "getMessage" => Ok(vec![state.message.clone().into_value()]),
            other => Err(ProgramError::logic(format!("unknown method '{other}'"))),
        }
    }
}

// ---- registration ----

fn create_example() -> Box<dyn Program> {
    ClassPlus::boxed(Example)
}

pub fn register(catalog: &mut ProgramCatalog) {
    catalog.register(ENTRY, VERSION, create_example);
}
