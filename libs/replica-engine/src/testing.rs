//! Small programs for exercising the replica in unit tests.

use std::time::Duration;

use replica_api::module::{self, ModuleManifest};
use replica_api::program::{
    Migration, MigrationContext, Persistence, Program, ProgramContext, StableRecord,
};
use replica_api::types::{FuncType, RecordType, ServiceType, Type};
use replica_api::{ProgramCatalog, ProgramError, Value};

/// Enhanced persistence, `{ count : nat }`.
pub const COUNTER: &str = "counter";
/// Enhanced persistence, `{ count : int }`.
pub const COUNTER_INT: &str = "counter_int";
/// Enhanced persistence, `{ count : nat; note : opt text }`.
pub const COUNTER_NOTE: &str = "counter_note";
/// Enhanced persistence, `{ count : nat; doubled : nat }`, not migrated.
pub const COUNTER_DOUBLED: &str = "counter_doubled";
/// Classical persistence, `{ count : nat }`.
pub const CLASSICAL: &str = "classical";
/// Enhanced persistence, `{ count : nat; doubled : nat }`, migrates from `COUNTER`.
pub const DOUBLER: &str = "doubler";
/// Enhanced persistence, `{}`.
pub const EMPTY: &str = "empty";

pub fn catalog() -> ProgramCatalog {
    let mut catalog = ProgramCatalog::new();
    catalog
        .register(COUNTER, "1", counter)
        .register(COUNTER_INT, "1", counter_int)
        .register(COUNTER_NOTE, "1", counter_note)
        .register(COUNTER_DOUBLED, "1", counter_doubled)
        .register(CLASSICAL, "1", classical)
        .register(DOUBLER, "2", doubler)
        .register(EMPTY, "1", empty);
    catalog
}

fn counter() -> Box<dyn Program> {
    Box::new(TestProgram::counter(Type::Nat))
}

fn counter_int() -> Box<dyn Program> {
    Box::new(TestProgram::counter(Type::Int))
}

fn counter_note() -> Box<dyn Program> {
    Box::new(TestProgram { extra: Some(("note", Type::opt(Type::Text))), ..TestProgram::counter(Type::Nat) })
}

fn counter_doubled() -> Box<dyn Program> {
    Box::new(TestProgram { extra: Some(("doubled", Type::Nat)), ..TestProgram::counter(Type::Nat) })
}

fn classical() -> Box<dyn Program> {
    Box::new(TestProgram { persistence: Persistence::Classical, ..TestProgram::counter(Type::Nat) })
}

fn doubler() -> Box<dyn Program> {
    Box::new(TestProgram {
        extra: Some(("doubled", Type::Nat)),
        migration: Some(Doubling),
        ..TestProgram::counter(Type::Nat)
    })
}

fn empty() -> Box<dyn Program> {
    Box::new(TestProgram { count: None, ..TestProgram::counter(Type::Nat) })
}

/// Module artifact for a catalog entry.
pub fn module(entry: &str) -> Vec<u8> {
    module::build_module(&ModuleManifest { entry: entry.into(), version: "test".into() })
        .expect("manifest serializes")
}

struct TestProgram {
    count: Option<Type>,
    extra: Option<(&'static str, Type)>,
    persistence: Persistence,
    migration: Option<Doubling>,
}

impl TestProgram {
    fn counter(count: Type) -> Self {
        Self { count: Some(count), extra: None, persistence: Persistence::Enhanced, migration: None }
    }

    fn count_type(&self) -> Type {
        self.count.clone().unwrap_or(Type::Nat)
    }

    fn bump(&self, ctx: &mut dyn ProgramContext) -> Result<Value, ProgramError> {
        let next = match ctx.stable().get("count") {
            Some(Value::Nat(n)) => Value::Nat(n + 1),
            Some(Value::Int(i)) => Value::Int(i + 1),
            _ => return Err(ProgramError::state("no counter")),
        };
        ctx.stable_mut().insert("count".into(), next.clone());
        Ok(next)
    }
}

impl Program for TestProgram {
    fn interface(&self) -> ServiceType {
        let count = self.count_type();
        ServiceType::new()
            .init_args(vec![Type::opt(Type::Nat)])
            .method("increment", FuncType::update(vec![], vec![count.clone()]))
            .method("get", FuncType::query(vec![], vec![count.clone()]))
            .method("bump_in_query", FuncType::query(vec![], vec![count]))
            .method("trap", FuncType::update(vec![], vec![]))
            .method("corrupt", FuncType::update(vec![], vec![]))
            .method("schedule", FuncType::update(vec![Type::Nat, Type::Text], vec![]))
    }

    fn stable_layout(&self) -> RecordType {
        let mut layout = RecordType::new();
        if let Some(count) = &self.count {
            layout.insert("count", count.clone());
        }
        if let Some((name, ty)) = &self.extra {
            layout.insert(*name, ty.clone());
        }
        layout
    }

    fn persistence(&self) -> Persistence {
        self.persistence
    }

    fn init(&self, ctx: &mut dyn ProgramContext, args: Vec<Value>) -> Result<(), ProgramError> {
        let start = match args.into_iter().next() {
            Some(Value::Opt(Some(v))) => v.as_nat().unwrap_or(0),
            _ => 0,
        };
        let state = ctx.stable_mut();
        state.clear();
        match &self.count {
            Some(Type::Int) => {
                state.insert("count".into(), Value::Int(start as i64));
            }
            Some(_) => {
                state.insert("count".into(), Value::Nat(start));
            }
            None => {}
        }
        match &self.extra {
            Some((name, Type::Opt(_))) => {
                state.insert((*name).into(), Value::none());
            }
            Some((name, _)) => {
                state.insert((*name).into(), Value::Nat(0));
            }
            None => {}
        }
        Ok(())
    }

    fn migration(&self) -> Option<&dyn Migration> {
        self.migration.as_ref().map(|m| m as &dyn Migration)
    }

    fn call(
        &self,
        ctx: &mut dyn ProgramContext,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ProgramError> {
        match method {
            "increment" | "bump_in_query" => Ok(vec![self.bump(ctx)?]),
            "get" => Ok(vec![ctx.stable().get("count").cloned().unwrap_or(Value::Nat(0))]),
            "trap" => {
                self.bump(ctx)?;
                Err(ProgramError::trap("requested trap"))
            }
            "corrupt" => {
                ctx.stable_mut().insert("count".into(), Value::text("oops"));
                Ok(vec![])
            }
            "schedule" => {
                let mut args = args.into_iter();
                let delay = args.next().and_then(|v| v.as_nat()).unwrap_or(0);
                let tag = args.next().and_then(|v| v.as_text().map(str::to_string)).unwrap_or_default();
                ctx.set_timer(Duration::from_secs(delay), &tag);
                Ok(vec![])
            }
            other => Err(ProgramError::logic(format!("unknown method '{other}'"))),
        }
    }

    fn on_timer(&self, ctx: &mut dyn ProgramContext, tag: &str) -> Result<(), ProgramError> {
        match tag {
            "bump" => self.bump(ctx).map(|_| ()),
            "fail" => {
                self.bump(ctx)?;
                Err(ProgramError::trap("timer failed"))
            }
            "chain" => {
                self.bump(ctx)?;
                ctx.set_timer(Duration::ZERO, "bump");
                Ok(())
            }
            other => Err(ProgramError::logic(format!("no handler for timer '{other}'"))),
        }
    }
}

struct Doubling;

impl Migration for Doubling {
    fn source_layout(&self) -> RecordType {
        RecordType::new().field("count", Type::Nat)
    }

    fn migrate(&self, _ctx: &MigrationContext, mut old: StableRecord) -> Result<StableRecord, ProgramError> {
        let count = old.get("count").and_then(Value::as_nat).ok_or_else(|| ProgramError::state("no counter"))?;
        old.insert("doubled".into(), Value::Nat(count * 2));
        Ok(old)
    }
}
