use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use replica_api::codec;
use replica_api::program::{Environment, MigrationContext, ProgramContext, StableRecord};
use replica_api::protocol::{CanisterStatus, UpgradeOptions};
use replica_api::types::{FuncMode, Type};
use replica_api::{CanisterId, ProgramCatalog, ProgramError};

use crate::canister::{record_matches, Canister, CanisterTable};
use crate::config::ReplicaConfig;
use crate::context::{Effects, ExecutionContext};
use crate::error::{CallError, ReplicaError, UpgradeError};
use crate::module_host::{self, LoadedModule};
use crate::persistence;
use crate::timers::TimerQueue;

/// One isolated replica: its canisters, logical clock and timer queue.
///
/// Every operation is synchronous and either fully applies or leaves the
/// replica unchanged.
pub struct Replica {
    config: ReplicaConfig,
    catalog: Arc<ProgramCatalog>,
    now_nanos: u64,
    canisters: CanisterTable,
    timers: TimerQueue,
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("now_nanos", &self.now_nanos)
            .field("canisters", &self.canisters)
            .field("pending_timers", &self.timers.len())
            .finish()
    }
}

impl Replica {
    pub fn new(config: ReplicaConfig, catalog: Arc<ProgramCatalog>) -> Self {
        let now_nanos = config.initial_time_nanos.unwrap_or_else(wall_clock_nanos);
        Self {
            config,
            catalog,
            now_nanos,
            canisters: CanisterTable::new(),
            timers: TimerQueue::new(),
        }
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════
    //  Clock and timers
    // ═══════════════════════════════════════════════════════════════

    /// Logical time, nanoseconds since the Unix epoch.
    pub fn time(&self) -> u64 {
        self.now_nanos
    }

    /// Move the clock forward. No code runs until the next `tick`.
    pub fn advance_time(&mut self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.now_nanos = self.now_nanos.saturating_add(by);
        tracing::debug!(now_nanos = self.now_nanos, "advanced time");
    }

    /// Run up to `times` due timer callbacks in deadline order.
    ///
    /// Callbacks scheduled with zero delay by a running callback are due
    /// immediately and count against the same budget. A callback that traps
    /// is rolled back and logged; later callbacks still run. Returns the
    /// number of callbacks executed. `times` is capped at the configured
    /// `max_ticks_per_request`.
    pub fn tick(&mut self, times: u32) -> u32 {
        let limit = self.config.max_ticks_per_request;
        if times > limit {
            tracing::debug!(requested = times, limit, "tick budget capped");
        }
        let times = times.min(limit);

        let mut executed = 0;
        while executed < times {
            let Some(timer) = self.timers.pop_due(self.now_nanos) else {
                break;
            };
            executed += 1;

            let env = self.env(timer.canister);
            let Some(canister) = self.canisters.get_mut(timer.canister) else {
                continue;
            };
            let mut ctx = ExecutionContext::new(
                env,
                canister.stable().clone(),
                canister.stable_memory().map(<[u8]>::to_vec),
            );
            let outcome = match canister.program().on_timer(&mut ctx, &timer.tag) {
                Ok(()) => check_state(canister, ctx.into_effects()),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(mut effects) => {
                    tracing::debug!(canister = %timer.canister, tag = %timer.tag, "timer fired");
                    canister.apply(&mut effects);
                    schedule_all(&mut self.timers, timer.canister, self.now_nanos, effects);
                }
                Err(e) => {
                    tracing::warn!(canister = %timer.canister, tag = %timer.tag, error = %e, "timer trapped, rolled back");
                }
            }
        }
        executed
    }

    // ═══════════════════════════════════════════════════════════════
    //  Install
    // ═══════════════════════════════════════════════════════════════

    /// Install `module` under a fresh canister id.
    ///
    /// `arg` is an IDL message checked against the program's init types.
    pub fn install(&mut self, module: &[u8], arg: Option<&[u8]>) -> Result<CanisterId, ReplicaError> {
        let LoadedModule { manifest, program } = module_host::load_module(module, &self.catalog)?;
        let ctx_label = format!("program '{}'", manifest.entry);

        let args = codec::decode_args(arg.unwrap_or_default(), program.interface().init())
            .map_err(|e| ReplicaError::Install(format!("invalid init argument: {e}")).with_context(&ctx_label))?;

        let id = self.canisters.peek_id();
        let mut ctx = ExecutionContext::new(self.env(id), StableRecord::new(), None);
        program
            .init(&mut ctx, args)
            .map_err(|e| ReplicaError::Install(format!("init trapped: {e}")).with_context(&ctx_label))?;

        let mut effects = ctx.into_effects();
        let layout = program.stable_layout();
        if !record_matches(&effects.stable, &layout) {
            return Err(ReplicaError::Install(format!(
                "init left stable state that does not match layout {layout}"
            ))
            .with_context(&ctx_label));
        }

        tracing::info!(canister = %id, program = %manifest.entry, version = %manifest.version, "installed canister");
        let mut canister = Canister::new(id, manifest, program);
        canister.apply(&mut effects);
        self.canisters.insert(canister);
        schedule_all(&mut self.timers, id, self.now_nanos, effects);
        Ok(id)
    }

    // ═══════════════════════════════════════════════════════════════
    //  Upgrade
    // ═══════════════════════════════════════════════════════════════

    /// Replace the code of `id` in place, carrying its stable state over.
    ///
    /// Nothing changes unless every step succeeds.
    pub fn upgrade(
        &mut self,
        id: CanisterId,
        module: &[u8],
        arg: Option<&[u8]>,
        options: UpgradeOptions,
    ) -> Result<(), ReplicaError> {
        let LoadedModule { manifest, program } = module_host::load_module(module, &self.catalog)?;
        let env = self.env(id);
        let canister = self.canisters.get(id).ok_or(ReplicaError::CanisterNotFound(id))?;

        let args = codec::decode_args(arg.unwrap_or_default(), program.interface().init())
            .map_err(UpgradeError::Arguments)?;

        // Pre-upgrade hook of the old code, on a copy.
        let mut pre = ExecutionContext::new(
            env,
            canister.stable().clone(),
            canister.stable_memory().map(<[u8]>::to_vec),
        );
        if !options.skips_pre_upgrade() {
            canister
                .program()
                .pre_upgrade(&mut pre)
                .map_err(|error| UpgradeError::Hook { hook: "pre_upgrade", error })?;
        }
        let Effects { stable: live, stable_memory, .. } = pre.into_effects();

        let retained = persistence::retained_state(
            options.memory_persistence(),
            canister.program(),
            program.as_ref(),
            live,
            stable_memory.as_deref(),
        )?;

        let mut ctx = ExecutionContext::new(env, StableRecord::new(), stable_memory);
        let hook = match retained {
            Some(retained) => {
                let record =
                    persistence::carry_over(retained, program.as_ref(), &MigrationContext { env })?;
                *ctx.stable_mut() = record;
                program
                    .post_upgrade(&mut ctx, args)
                    .map_err(|error| UpgradeError::Hook { hook: "post_upgrade", error })?;
                "post_upgrade"
            }
            None => {
                tracing::warn!(canister = %id, program = %manifest.entry, "no stable state retained, running init");
                program
                    .init(&mut ctx, args)
                    .map_err(|error| UpgradeError::Hook { hook: "init", error })?;
                "init"
            }
        };

        let mut effects = ctx.into_effects();
        let layout = program.stable_layout();
        if !record_matches(&effects.stable, &layout) {
            return Err(UpgradeError::StateMismatch { hook, layout }.into());
        }

        // Commit.
        let from = canister.manifest().version.clone();
        let dropped = self.timers.clear_canister(id);
        let canister = self.canisters.get_mut(id).ok_or(ReplicaError::CanisterNotFound(id))?;
        tracing::info!(
            canister = %id,
            program = %manifest.entry,
            from = %from,
            to = %manifest.version,
            dropped_timers = dropped,
            "upgraded canister"
        );
        canister.replace_code(manifest, program);
        canister.apply(&mut effects);
        schedule_all(&mut self.timers, id, self.now_nanos, effects);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    //  Calls
    // ═══════════════════════════════════════════════════════════════

    /// Execute `method` with an IDL-encoded argument, returning the IDL reply.
    ///
    /// Update calls commit their state changes; query calls never do. A trap
    /// discards everything the call did.
    pub fn call(&mut self, id: CanisterId, method: &str, arg: &[u8]) -> Result<Vec<u8>, ReplicaError> {
        let env = self.env(id);
        let canister = self.canisters.get_mut(id).ok_or(ReplicaError::CanisterNotFound(id))?;
        let interface = canister.program().interface();
        let func = interface
            .get(method)
            .ok_or_else(|| CallError::UnknownMethod(method.to_string()))?;

        let args = codec::decode_args(arg, &func.args).map_err(CallError::Arguments)?;

        let mut ctx = ExecutionContext::new(
            env,
            canister.stable().clone(),
            canister.stable_memory().map(<[u8]>::to_vec),
        );
        let rets = canister
            .program()
            .call(&mut ctx, method, args)
            .map_err(CallError::Trap)
            .map_err(|e| ReplicaError::from(e).with_context(format!("method '{method}'")))?;
        let reply = codec::encode(&func.rets, &rets).map_err(CallError::BadReply)?;
        let mut effects = check_state(canister, ctx.into_effects()).map_err(CallError::Trap)?;

        tracing::debug!(canister = %id, method, mode = ?func.mode, "call completed");
        if func.mode == FuncMode::Update {
            canister.apply(&mut effects);
            schedule_all(&mut self.timers, id, self.now_nanos, effects);
        }
        Ok(reply)
    }

    // ═══════════════════════════════════════════════════════════════
    //  Introspection
    // ═══════════════════════════════════════════════════════════════

    pub fn status(&self, id: CanisterId) -> Result<CanisterStatus, ReplicaError> {
        let canister = self.canisters.get(id).ok_or(ReplicaError::CanisterNotFound(id))?;
        let program = canister.program();
        Ok(CanisterStatus {
            canister_id: id,
            entry: canister.manifest().entry.clone(),
            version: canister.manifest().version.clone(),
            persistence: program.persistence(),
            interface: program.interface().to_string(),
            pending_timers: self.timers.pending_for(id),
            has_stable_memory: canister.stable_memory().is_some(),
        })
    }

    /// Stable record of `id`, typed by its current layout.
    pub fn stable_state(&self, id: CanisterId) -> Result<(Type, StableRecord), ReplicaError> {
        let canister = self.canisters.get(id).ok_or(ReplicaError::CanisterNotFound(id))?;
        Ok((Type::Record(canister.program().stable_layout()), canister.stable().clone()))
    }

    pub fn canister_ids(&self) -> Vec<CanisterId> {
        self.canisters.ids()
    }

    fn env(&self, canister_id: CanisterId) -> Environment {
        Environment {
            canister_id,
            now_nanos: i64::try_from(self.now_nanos).unwrap_or(i64::MAX),
        }
    }
}

/// Reject effects whose stable record no longer matches the program's layout.
fn check_state(canister: &Canister, effects: Effects) -> Result<Effects, ProgramError> {
    let layout = canister.program().stable_layout();
    if record_matches(&effects.stable, &layout) {
        Ok(effects)
    } else {
        Err(ProgramError::state(format!("stable state no longer matches layout {layout}")))
    }
}

fn schedule_all(timers: &mut TimerQueue, id: CanisterId, now_nanos: u64, effects: Effects) {
    for (delay, tag) in effects.timers {
        let delay = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        timers.schedule(id, now_nanos.saturating_add(delay), tag);
    }
}

fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
