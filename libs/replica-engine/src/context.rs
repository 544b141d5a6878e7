use std::time::Duration;

use replica_api::program::{Environment, ProgramContext, StableRecord};

/// Working copy of a canister's state for one execution.
///
/// Program code mutates the copy; the replica decides afterwards whether to
/// commit it (see `Effects`) or drop it.
#[derive(Debug)]
pub struct ExecutionContext {
    env: Environment,
    stable: StableRecord,
    stable_memory: Option<Vec<u8>>,
    timers: Vec<(Duration, String)>,
}

/// Everything an execution produced, ready to be committed.
#[derive(Debug)]
pub struct Effects {
    pub stable: StableRecord,
    pub stable_memory: Option<Vec<u8>>,
    pub timers: Vec<(Duration, String)>,
}

impl ExecutionContext {
    pub fn new(env: Environment, stable: StableRecord, stable_memory: Option<Vec<u8>>) -> Self {
        Self { env, stable, stable_memory, timers: Vec::new() }
    }

    pub fn into_effects(self) -> Effects {
        Effects {
            stable: self.stable,
            stable_memory: self.stable_memory,
            timers: self.timers,
        }
    }
}

impl ProgramContext for ExecutionContext {
    fn env(&self) -> Environment {
        self.env
    }

    fn stable(&self) -> &StableRecord {
        &self.stable
    }

    fn stable_mut(&mut self) -> &mut StableRecord {
        &mut self.stable
    }

    fn set_timer(&mut self, delay: Duration, tag: &str) {
        self.timers.push((delay, tag.to_string()));
    }

    fn stable_memory_write(&mut self, snapshot: Vec<u8>) {
        self.stable_memory = Some(snapshot);
    }

    fn stable_memory(&self) -> Option<&[u8]> {
        self.stable_memory.as_deref()
    }
}
