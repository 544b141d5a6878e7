// Lets `#[derive(IdlRecord)]` expand to `::replica_api::...` inside this crate too.
extern crate self as replica_api;

pub mod catalog;
pub mod codec;
pub mod error;
pub mod id;
pub mod module;
pub mod program;
pub mod protocol;
pub mod types;
pub mod value;

pub use replica_api_derive::IdlRecord;

pub use catalog::ProgramCatalog;
pub use error::{CodecError, ErrorKind, ProgramError};
pub use id::CanisterId;
pub use program::{Migration, MigrationContext, Persistence, Program, ProgramContext};
pub use types::{FuncMode, FuncType, RecordType, ServiceType, Type};
pub use value::{IdlRecord, IdlType, Value};
