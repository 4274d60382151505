//! Embedded runtime state
//!
//! The wasmtime [`Engine`] is process-wide: it is created on first use and
//! lives until the process exits. Everything a run touches (the store, the
//! namespace scripts link against, handle tables) lives in a
//! [`ScriptRuntime`], which is torn down explicitly with
//! [`ScriptRuntime::shutdown`].

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use once_cell::sync::OnceCell;
use strategy_host_core::{OrderServer, StrategyError, StrategyResult};
use tracing::{debug, info};
use wasmtime::{Engine, Instance, Linker, Store, StoreLimits, StoreLimitsBuilder};

use crate::bridge::MethodTable;
use crate::config::RuntimeConfig;
use crate::error::{ScriptError, ScriptResult};
use crate::loader::{self, ModuleHandle};
use crate::marshal::OrderTable;

static ENGINE: OnceCell<Engine> = OnceCell::new();

/// Process-wide script engine, created on first call
pub fn engine() -> ScriptResult<&'static Engine> {
    ENGINE.get_or_try_init(|| {
        let mut config = wasmtime::Config::new();
        config.consume_fuel(true);
        let engine = Engine::new(&config).map_err(ScriptError::Engine)?;
        info!("Script engine initialized");
        Ok(engine)
    })
}

/// Native side of a constructed script object: the order server it submits
/// to and the method table used to call it back
#[derive(Clone)]
pub(crate) struct ObjectBinding {
    pub(crate) server: Rc<OrderServer>,
    pub(crate) methods: Rc<MethodTable>,
    /// Instance the object's class was extracted from
    pub(crate) instance: Instance,
    /// Script object returned by the constructor; `None` while it runs
    pub(crate) object: Option<i32>,
}

/// Data owned by the script store and reachable from every host call
pub struct HostState {
    bindings: Vec<ObjectBinding>,
    pub(crate) orders: OrderTable,
    console: Vec<String>,
    modules_loaded: u64,
    limits: StoreLimits,
}

impl fmt::Debug for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostState")
            .field("bindings", &self.bindings.len())
            .field("orders", &self.orders.len())
            .field("console", &self.console.len())
            .field("modules_loaded", &self.modules_loaded)
            .finish_non_exhaustive()
    }
}

impl HostState {
    fn new(limits: StoreLimits) -> Self {
        Self {
            bindings: Vec::new(),
            orders: OrderTable::default(),
            console: Vec::new(),
            modules_loaded: 0,
            limits,
        }
    }

    /// Lines written by scripts through `host.log`
    pub fn console(&self) -> &[String] {
        &self.console
    }

    /// Number of modules loaded so far
    pub fn modules_loaded(&self) -> u64 {
        self.modules_loaded
    }

    pub(crate) fn push_console(&mut self, line: String) {
        self.console.push(line);
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.modules_loaded += 1;
        self.modules_loaded
    }

    /// Allocates the server handle passed to a script constructor
    pub(crate) fn bind_server(
        &mut self,
        server: Rc<OrderServer>,
        methods: Rc<MethodTable>,
        instance: Instance,
    ) -> i32 {
        self.bindings.push(ObjectBinding {
            server,
            methods,
            instance,
            object: None,
        });
        self.bindings.len() as i32
    }

    pub(crate) fn complete_binding(&mut self, handle: i32, object: i32) -> StrategyResult<()> {
        let binding = self.binding_mut(handle)?;
        binding.object = Some(object);
        Ok(())
    }

    pub(crate) fn binding(&self, handle: i32) -> StrategyResult<&ObjectBinding> {
        usize::try_from(handle)
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| self.bindings.get(index))
            .ok_or_else(|| StrategyError::Marshal(format!("unknown server handle {handle}")))
    }

    fn binding_mut(&mut self, handle: i32) -> StrategyResult<&mut ObjectBinding> {
        usize::try_from(handle)
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| self.bindings.get_mut(index))
            .ok_or_else(|| StrategyError::Marshal(format!("unknown server handle {handle}")))
    }
}

/// Global namespace scripts link against.
///
/// Holds the native bindings and every module loaded so far, each under its
/// module name. Re-binding a name replaces the earlier module.
pub struct Namespace {
    linker: Linker<HostState>,
    modules: Vec<String>,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

impl Namespace {
    /// Creates an empty namespace
    pub fn new(engine: &Engine) -> Self {
        let mut linker = Linker::new(engine);
        linker.allow_shadowing(true);
        Self {
            linker,
            modules: Vec::new(),
        }
    }

    /// Returns true if a script module is bound under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|module| module == name)
    }

    /// Names of the script modules bound so far
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub(crate) fn linker(&self) -> &Linker<HostState> {
        &self.linker
    }

    pub(crate) fn linker_mut(&mut self) -> &mut Linker<HostState> {
        &mut self.linker
    }

    pub(crate) fn bind(
        &mut self,
        store: &mut Store<HostState>,
        name: &str,
        instance: Instance,
    ) -> anyhow::Result<()> {
        self.linker.instance(store, name, instance)?;
        if !self.contains(name) {
            self.modules.push(name.to_string());
        }
        Ok(())
    }
}

/// Summary returned by [`ScriptRuntime::shutdown`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Modules loaded during the runtime's lifetime
    pub modules_loaded: u64,
    /// Fuel consumed by scripts, when metering was limited
    pub fuel_consumed: Option<u64>,
}

/// Per-run script runtime: store, namespace and limits
pub struct ScriptRuntime {
    store: Store<HostState>,
    namespace: Namespace,
    config: RuntimeConfig,
}

impl fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("state", self.store.data())
            .field("namespace", &self.namespace)
            .field("config", &self.config)
            .finish()
    }
}

impl ScriptRuntime {
    /// Initializes a runtime on the process-wide engine
    pub fn init(config: &RuntimeConfig) -> ScriptResult<Self> {
        config.validate()?;
        let engine = engine()?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes)
            .instances(config.max_instances)
            .build();
        let mut store = Store::new(engine, HostState::new(limits));
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(config.fuel_limit.unwrap_or(u64::MAX))
            .map_err(ScriptError::Engine)?;

        debug!(
            fuel_limit = ?config.fuel_limit,
            max_memory_bytes = config.max_memory_bytes,
            "Script runtime ready"
        );

        Ok(Self {
            store,
            namespace: Namespace::new(engine),
            config: config.clone(),
        })
    }

    /// Registers the native type surface into the namespace
    pub fn register_bindings(&mut self) -> ScriptResult<()> {
        crate::bindings::register(&mut self.store, &mut self.namespace)
    }

    /// Imports the script at `path` as `module_name`
    pub fn import(&mut self, module_name: &str, path: impl AsRef<Path>) -> ScriptResult<ModuleHandle> {
        loader::import(&mut self.store, &mut self.namespace, module_name, path)
    }

    /// Loads script source bytes as `module_name`
    pub fn load_module(&mut self, source: &[u8], module_name: &str) -> ScriptResult<ModuleHandle> {
        loader::load_module(&mut self.store, &mut self.namespace, source, module_name)
    }

    /// Store holding every instance of this runtime
    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    /// Mutable store, needed to call into scripts
    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Namespace scripts link against
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Store and namespace borrowed together
    pub fn parts(&mut self) -> (&mut Store<HostState>, &mut Namespace) {
        (&mut self.store, &mut self.namespace)
    }

    /// Lines written by scripts through `host.log`
    pub fn console(&self) -> &[String] {
        self.store.data().console()
    }

    /// Fuel still available to scripts
    pub fn fuel_remaining(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }

    /// Tears the runtime down, dropping every instance and binding it owns.
    ///
    /// The process-wide engine stays alive; a new runtime can be initialized
    /// afterwards.
    pub fn shutdown(self) -> RuntimeStats {
        let fuel_consumed = match (self.config.fuel_limit, self.fuel_remaining()) {
            (Some(limit), Some(remaining)) => Some(limit.saturating_sub(remaining)),
            _ => None,
        };
        let stats = RuntimeStats {
            modules_loaded: self.store.data().modules_loaded(),
            fuel_consumed,
        };

        info!(
            modules_loaded = stats.modules_loaded,
            fuel_consumed = ?stats.fuel_consumed,
            "Script runtime shut down"
        );
        drop(self.store);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_is_shared() {
        let first = engine().unwrap() as *const Engine;
        let second = engine().unwrap() as *const Engine;
        assert_eq!(first, second);
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = RuntimeConfig {
            max_instances: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            ScriptRuntime::init(&config),
            Err(ScriptError::Configuration(_))
        ));
    }

    #[test]
    fn test_shutdown_then_reinit() {
        let runtime = ScriptRuntime::init(&RuntimeConfig::default()).unwrap();
        let stats = runtime.shutdown();
        assert_eq!(stats.modules_loaded, 0);
        assert_eq!(stats.fuel_consumed, Some(0));

        let runtime = ScriptRuntime::init(&RuntimeConfig::default()).unwrap();
        assert!(runtime.console().is_empty());
    }

    #[test]
    fn test_server_handles_start_at_one() {
        let mut runtime = ScriptRuntime::init(&RuntimeConfig::default()).unwrap();
        let module = runtime.load_module(b"(module)", "empty").unwrap();
        let state = runtime.store_mut().data_mut();
        let server = Rc::new(OrderServer::new());
        let methods = Rc::new(MethodTable::for_class("Strategy"));

        let handle = state.bind_server(server, methods, module.instance());
        assert_eq!(handle, 1);
        assert!(state.binding(handle).unwrap().object.is_none());

        state.complete_binding(handle, 42).unwrap();
        assert_eq!(state.binding(handle).unwrap().object, Some(42));
        assert!(state.binding(0).is_err());
        assert!(state.binding(2).is_err());
    }
}
