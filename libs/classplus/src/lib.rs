//! ClassPlus: class-style programs with timer-driven initialization.
//!
//! A `Class` owns a typed stable state. `ClassPlus` adapts it to `Program`:
//! the state is loaded from and stored to the stable record around every
//! call, and a zero-delay `classplus:init` timer runs the class's
//! `initialize` hook after install and after every upgrade.

use std::marker::PhantomData;
use std::time::Duration;

use replica_api::program::{
    self, Environment, Migration, MigrationContext, Persistence, Program, ProgramContext,
    StableRecord,
};
use replica_api::types::{RecordType, ServiceType};
use replica_api::value::IdlRecord;
use replica_api::{ProgramError, Value};

/// Timer tag of the deferred initialization.
pub const INIT_TIMER: &str = "classplus:init";

/// A class hosted by `ClassPlus`.
pub trait Class: Send + Sync + 'static {
    /// Stable variables, one record field per variable.
    type State: IdlRecord;

    fn interface(&self) -> ServiceType;

    fn persistence(&self) -> Persistence {
        Persistence::Enhanced
    }

    /// State of a fresh install, built from the install arguments.
    fn initial_state(&self, env: &Environment, args: Vec<Value>) -> Result<Self::State, ProgramError>;

    fn migration(&self) -> Option<&dyn Migration> {
        None
    }

    /// Deferred one-shot initialization, run by the `classplus:init` timer.
    fn initialize(&self, _state: &mut Self::State, _env: &Environment) -> Result<(), ProgramError> {
        Ok(())
    }

    fn call(
        &self,
        state: &mut Self::State,
        env: &Environment,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ProgramError>;
}

/// `Program` adapter for a `Class`.
pub struct ClassPlus<C: Class> {
    class: C,
}

impl<C: Class> ClassPlus<C> {
    pub fn new(class: C) -> Self {
        Self { class }
    }

    pub fn boxed(class: C) -> Box<dyn Program> {
        Box::new(Self::new(class))
    }

    fn with_state<R>(
        &self,
        ctx: &mut dyn ProgramContext,
        f: impl FnOnce(&C, &mut C::State, &Environment) -> Result<R, ProgramError>,
    ) -> Result<R, ProgramError> {
        let env = ctx.env();
        let mut state: C::State = program::load_state(ctx)?;
        let out = f(&self.class, &mut state, &env)?;
        program::store_state(ctx, state)?;
        Ok(out)
    }
}

impl<C: Class> Program for ClassPlus<C> {
    fn interface(&self) -> ServiceType {
        self.class.interface()
    }

    fn stable_layout(&self) -> RecordType {
        C::State::record_type()
    }

    fn persistence(&self) -> Persistence {
        self.class.persistence()
    }

    fn init(&self, ctx: &mut dyn ProgramContext, args: Vec<Value>) -> Result<(), ProgramError> {
        let state = self.class.initial_state(&ctx.env(), args)?;
        program::store_state(ctx, state)?;
        ctx.set_timer(Duration::ZERO, INIT_TIMER);
        Ok(())
    }

    fn migration(&self) -> Option<&dyn Migration> {
        self.class.migration()
    }

    fn post_upgrade(&self, ctx: &mut dyn ProgramContext, _args: Vec<Value>) -> Result<(), ProgramError> {
        ctx.set_timer(Duration::ZERO, INIT_TIMER);
        Ok(())
    }

    fn call(
        &self,
        ctx: &mut dyn ProgramContext,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ProgramError> {
        self.with_state(ctx, |class, state, env| class.call(state, env, method, args))
    }

    fn on_timer(&self, ctx: &mut dyn ProgramContext, tag: &str) -> Result<(), ProgramError> {
        if tag != INIT_TIMER {
            return Err(ProgramError::logic(format!("no handler for timer '{tag}'")));
        }
        let canister = ctx.env().canister_id;
        self.with_state(ctx, |class, state, env| class.initialize(state, env))?;
        tracing::debug!(%canister, "classplus initialized");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Typed migrations
// ---------------------------------------------------------------------------

/// Migration between two typed state records.
///
/// The source layout is `Src::record_type()`; the replica runs the
/// function only against exactly that layout.
pub struct TypedMigration<Src, Dst> {
    migrate: fn(&MigrationContext, Src) -> Result<Dst, ProgramError>,
    _types: PhantomData<fn(Src) -> Dst>,
}

impl<Src, Dst> TypedMigration<Src, Dst> {
    pub const fn new(migrate: fn(&MigrationContext, Src) -> Result<Dst, ProgramError>) -> Self {
        Self { migrate, _types: PhantomData }
    }
}

impl<Src: IdlRecord, Dst: IdlRecord> Migration for TypedMigration<Src, Dst> {
    fn source_layout(&self) -> RecordType {
        Src::record_type()
    }

    fn migrate(&self, ctx: &MigrationContext, old: StableRecord) -> Result<StableRecord, ProgramError> {
        let old = Src::from_value(Value::Record(old))
            .map_err(|e| ProgramError::state(e.to_string()).with_context("migration input"))?;
        match (self.migrate)(ctx, old)?.into_value() {
            Value::Record(fields) => Ok(fields),
            other => Err(ProgramError::state(format!(
                "migration output must be a record, got {}",
                other.kind_name()
            ))),
        }
    }
}
