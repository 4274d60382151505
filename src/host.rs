//! Host Runtime
//!
//! Drives one strategy run through a fixed lifecycle:
//!
//! ```text
//! Uninitialized -> RuntimeReady -> BindingsRegistered -> ModuleLoaded
//!     -> StrategyConstructed -> Evaluated -> Terminated
//! ```
//!
//! Every step is a method on [`Host`]. A step called out of order fails with
//! [`HostError::InvalidTransition`] and leaves the host where it was; a step
//! that fails also leaves the phase untouched.

use std::fmt;
use std::rc::Rc;

use script_bridge::{ModuleHandle, RuntimeStats, ScriptObject, ScriptRuntime};
use serde::Serialize;
use strategy_host_core::{Acknowledgement, OrderServer};
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::error::{HostError, HostResult};

/// Lifecycle phase of a [`Host`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPhase {
    /// Nothing has been initialized
    Uninitialized,
    /// Script runtime initialized
    RuntimeReady,
    /// Native bindings registered into the namespace
    BindingsRegistered,
    /// User script loaded as a module
    ModuleLoaded,
    /// Strategy object constructed against the order server
    StrategyConstructed,
    /// Strategy evaluated
    Evaluated,
    /// Runtime torn down
    Terminated,
}

impl HostPhase {
    /// Phase the next lifecycle step enters, if any
    pub fn next(self) -> Option<HostPhase> {
        match self {
            HostPhase::Uninitialized => Some(HostPhase::RuntimeReady),
            HostPhase::RuntimeReady => Some(HostPhase::BindingsRegistered),
            HostPhase::BindingsRegistered => Some(HostPhase::ModuleLoaded),
            HostPhase::ModuleLoaded => Some(HostPhase::StrategyConstructed),
            HostPhase::StrategyConstructed => Some(HostPhase::Evaluated),
            HostPhase::Evaluated => Some(HostPhase::Terminated),
            HostPhase::Terminated => None,
        }
    }
}

impl fmt::Display for HostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostPhase::Uninitialized => "uninitialized",
            HostPhase::RuntimeReady => "runtime-ready",
            HostPhase::BindingsRegistered => "bindings-registered",
            HostPhase::ModuleLoaded => "module-loaded",
            HostPhase::StrategyConstructed => "strategy-constructed",
            HostPhase::Evaluated => "evaluated",
            HostPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identifier of the run, also attached to its log span
    pub run_id: Uuid,
    /// Module the script was loaded as
    pub module: String,
    /// Class that was instantiated
    pub class: String,
    /// Orders acknowledged by the run's order server, in id order
    pub orders: Vec<Acknowledgement>,
    /// Lines the script wrote through `host.log`
    pub console: Vec<String>,
    /// Modules loaded into the runtime
    pub modules_loaded: u64,
    /// Fuel consumed by the script, when metered
    pub fuel_consumed: Option<u64>,
}

/// Strategy host: owns one order server and one script runtime
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    run_id: Uuid,
    phase: HostPhase,
    server: Rc<OrderServer>,
    runtime: Option<ScriptRuntime>,
    module: Option<ModuleHandle>,
    strategy: Option<ScriptObject>,
    console: Vec<String>,
    stats: Option<RuntimeStats>,
}

impl Host {
    /// Creates an uninitialized host with a fresh order server
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4(),
            phase: HostPhase::Uninitialized,
            server: Rc::new(OrderServer::new()),
            runtime: None,
            module: None,
            strategy: None,
            console: Vec::new(),
            stats: None,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    /// Identifier of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Configuration the host was created with
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Order server strategies of this run submit to
    pub fn order_server(&self) -> &OrderServer {
        &self.server
    }

    /// Initializes the script runtime
    pub fn init_runtime(&mut self) -> HostResult<()> {
        self.check_step(HostPhase::RuntimeReady)?;
        self.runtime = Some(ScriptRuntime::init(&self.config.runtime)?);
        self.enter(HostPhase::RuntimeReady);
        Ok(())
    }

    /// Registers the native bindings scripts link against
    pub fn register_bindings(&mut self) -> HostResult<()> {
        self.check_step(HostPhase::BindingsRegistered)?;
        self.runtime_mut()?.register_bindings()?;
        self.enter(HostPhase::BindingsRegistered);
        Ok(())
    }

    /// Imports the configured script as the configured module
    pub fn load_script(&mut self) -> HostResult<()> {
        self.check_step(HostPhase::ModuleLoaded)?;
        let module_name = self.config.module_name.clone();
        let script = self.config.script.clone();

        let module = self.runtime_mut()?.import(&module_name, &script)?;
        info!(
            module = module.name(),
            generation = module.generation(),
            exports = module.exports().len(),
            "Script loaded"
        );

        self.module = Some(module);
        self.enter(HostPhase::ModuleLoaded);
        Ok(())
    }

    /// Extracts the configured class and constructs it against the order server
    pub fn construct_strategy(&mut self) -> HostResult<()> {
        self.check_step(HostPhase::StrategyConstructed)?;
        let class = self
            .module
            .as_ref()
            .ok_or(HostError::Missing("module"))?
            .class(&self.config.class_name)?;

        let server = Rc::clone(&self.server);
        let strategy = class.instantiate(self.runtime_mut()?.store_mut(), server)?;

        self.strategy = Some(strategy);
        self.enter(HostPhase::StrategyConstructed);
        Ok(())
    }

    /// Runs the strategy's `eval`
    pub fn evaluate(&mut self) -> HostResult<()> {
        self.check_step(HostPhase::Evaluated)?;
        let strategy = self.strategy.clone().ok_or(HostError::Missing("strategy"))?;

        strategy.eval(self.runtime_mut()?.store_mut())?;
        info!(orders = self.server.issued(), "Strategy evaluated");

        self.enter(HostPhase::Evaluated);
        Ok(())
    }

    /// Tears the script runtime down
    pub fn terminate(&mut self) -> HostResult<()> {
        self.check_step(HostPhase::Terminated)?;
        let runtime = self.runtime.take().ok_or(HostError::Missing("runtime"))?;

        self.strategy = None;
        self.console = runtime.console().to_vec();
        self.stats = Some(runtime.shutdown());

        self.enter(HostPhase::Terminated);
        Ok(())
    }

    /// Report of a terminated run
    pub fn report(&self) -> HostResult<RunReport> {
        if self.phase != HostPhase::Terminated {
            return Err(HostError::InvalidTransition {
                from: self.phase,
                to: HostPhase::Terminated,
            });
        }
        let stats = self.stats.as_ref().ok_or(HostError::Missing("runtime stats"))?;

        Ok(RunReport {
            run_id: self.run_id,
            module: self.config.module_name.clone(),
            class: self.config.class_name.clone(),
            orders: self.server.acknowledgements(),
            console: self.console.clone(),
            modules_loaded: stats.modules_loaded,
            fuel_consumed: stats.fuel_consumed,
        })
    }

    /// Drives every lifecycle step in order
    pub fn run(mut self) -> HostResult<RunReport> {
        let span = info_span!("run", run_id = %self.run_id);
        let _enter = span.enter();

        info!(script = %self.config.script.display(), "Starting strategy run");

        self.init_runtime()?;
        self.register_bindings()?;
        self.load_script()?;
        self.construct_strategy()?;
        self.evaluate()?;
        self.terminate()?;

        let report = self.report()?;
        info!(
            orders = report.orders.len(),
            fuel_consumed = ?report.fuel_consumed,
            "Strategy run complete"
        );
        Ok(report)
    }

    fn check_step(&self, to: HostPhase) -> HostResult<()> {
        if self.phase.next() == Some(to) {
            Ok(())
        } else {
            Err(HostError::InvalidTransition {
                from: self.phase,
                to,
            })
        }
    }

    fn enter(&mut self, phase: HostPhase) {
        debug!(from = %self.phase, to = %phase, "Host transition");
        self.phase = phase;
    }

    fn runtime_mut(&mut self) -> HostResult<&mut ScriptRuntime> {
        self.runtime.as_mut().ok_or(HostError::Missing("runtime"))
    }
}
