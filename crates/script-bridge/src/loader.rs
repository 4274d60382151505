//! Module Loader
//!
//! Loads a script source file as a named module: the source is parsed,
//! compiled and instantiated (running its `start` function), and the
//! instance is bound into the [`Namespace`] under the module name so later
//! scripts can import from it.
//!
//! There is no module cache. Loading the same source twice executes it twice
//! and returns two independent handles; the newer instance replaces the older
//! one in the namespace.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use strategy_host_core::{OrderServer, Strategy, StrategyResult};
use tracing::{debug, info};
use wasmtime::{Instance, Module, Store, Trap};

use crate::bindings::RESERVED_MODULES;
use crate::bridge::{ContractMethod, InstanceScope, MethodTable, ScriptStrategy};
use crate::error::{ScriptError, ScriptResult};
use crate::runtime::{HostState, Namespace};

/// Reads the script at `path` and loads it as `module_name`
pub fn import(
    store: &mut Store<HostState>,
    namespace: &mut Namespace,
    module_name: &str,
    path: impl AsRef<Path>,
) -> ScriptResult<ModuleHandle> {
    let path = path.as_ref();
    info!(module = module_name, path = %path.display(), "Importing script");

    let source = fs::read(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_module(store, namespace, &source, module_name)
}

/// Compiles and executes `source` as `module_name` and binds it into
/// `namespace`.
///
/// `source` may be WebAssembly text or binary.
pub fn load_module(
    store: &mut Store<HostState>,
    namespace: &mut Namespace,
    source: &[u8],
    module_name: &str,
) -> ScriptResult<ModuleHandle> {
    if RESERVED_MODULES.contains(&module_name) {
        return Err(ScriptError::ReservedName(module_name.to_string()));
    }

    let wasm = wat::parse_bytes(source).map_err(|source| ScriptError::Syntax {
        module: module_name.to_string(),
        source,
    })?;

    let module = Module::new(store.engine(), &*wasm).map_err(|source| ScriptError::Compile {
        module: module_name.to_string(),
        source,
    })?;

    let unresolved: Vec<String> = module
        .imports()
        .filter(|import| namespace.linker().get_by_import(&mut *store, import).is_none())
        .map(|import| format!("{}.{}", import.module(), import.name()))
        .collect();
    if !unresolved.is_empty() {
        return Err(ScriptError::Link {
            module: module_name.to_string(),
            source: anyhow::anyhow!("unknown imports: {}", unresolved.join(", ")),
        });
    }

    let instance = namespace
        .linker()
        .instantiate(&mut *store, &module)
        .map_err(|source| instantiation_error(module_name, source))?;

    namespace
        .bind(store, module_name, instance)
        .map_err(ScriptError::Binding)?;

    let generation = store.data_mut().next_generation();
    metrics::counter!("strategy_host_script_loads_total", 1);
    debug!(module = module_name, generation, "Module loaded");

    Ok(ModuleHandle {
        name: module_name.to_string(),
        generation,
        module,
        instance,
    })
}

/// Traps and errors raised by host calls happened while the module's top
/// level ran; anything else (store limits, mismatched import types) failed
/// before it started.
fn instantiation_error(module_name: &str, source: anyhow::Error) -> ScriptError {
    let raised = source.downcast_ref::<Trap>().is_some()
        || source
            .downcast_ref::<strategy_host_core::StrategyError>()
            .is_some();

    if raised {
        ScriptError::Runtime {
            module: module_name.to_string(),
            source,
        }
    } else {
        ScriptError::Instantiate {
            module: module_name.to_string(),
            source,
        }
    }
}

/// A loaded script module
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    name: String,
    generation: u64,
    module: Module,
    instance: Instance,
}

impl ModuleHandle {
    /// Name the module was loaded under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load sequence number within the runtime, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Instance created by this load
    pub fn instance(&self) -> Instance {
        self.instance
    }

    /// Names of every export of the module
    pub fn exports(&self) -> Vec<String> {
        self.module
            .exports()
            .map(|export| export.name().to_string())
            .collect()
    }

    /// Returns true if the module exports `name`
    pub fn has_export(&self, name: &str) -> bool {
        self.module.get_export(name).is_some()
    }

    /// Extracts class `class` with the default method table
    pub fn class(&self, class: &str) -> ScriptResult<StrategyClass> {
        self.class_with(MethodTable::for_class(class))
    }

    /// Extracts a class described by an explicit method table.
    ///
    /// Only the constructor is required here; the other methods are resolved
    /// when they are called.
    pub fn class_with(&self, methods: MethodTable) -> ScriptResult<StrategyClass> {
        if !self.has_export(methods.export_name(ContractMethod::Construct)) {
            return Err(ScriptError::ClassNotFound {
                module: self.name.clone(),
                class: methods.class().to_string(),
            });
        }

        Ok(StrategyClass {
            module: self.clone(),
            methods: Rc::new(methods),
        })
    }
}

/// A script class that can be instantiated against an order server
#[derive(Debug, Clone)]
pub struct StrategyClass {
    module: ModuleHandle,
    methods: Rc<MethodTable>,
}

impl StrategyClass {
    /// Class name
    pub fn name(&self) -> &str {
        self.methods.class()
    }

    /// Method table used to dispatch into this class
    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    /// Calls the constructor with a fresh server handle bound to `server`
    pub fn instantiate(
        &self,
        store: &mut Store<HostState>,
        server: Rc<OrderServer>,
    ) -> ScriptResult<ScriptObject> {
        let construct_error = |source| ScriptError::Construct {
            class: self.name().to_string(),
            source,
        };

        let constructor = self
            .module
            .instance
            .get_typed_func::<i32, i32>(&mut *store, self.methods.export_name(ContractMethod::Construct))
            .map_err(construct_error)?;

        let server_handle = store
            .data_mut()
            .bind_server(Rc::clone(&server), Rc::clone(&self.methods), self.module.instance);
        let object = constructor
            .call(&mut *store, server_handle)
            .map_err(construct_error)?;
        store.data_mut().complete_binding(server_handle, object)?;

        info!(
            class = self.name(),
            module = self.module.name(),
            server_handle,
            object,
            "Strategy constructed"
        );

        Ok(ScriptObject {
            instance: self.module.instance,
            server_handle,
            object,
            server,
            methods: Rc::clone(&self.methods),
        })
    }
}

/// A constructed script object
#[derive(Debug, Clone)]
pub struct ScriptObject {
    instance: Instance,
    server_handle: i32,
    object: i32,
    server: Rc<OrderServer>,
    methods: Rc<MethodTable>,
}

impl ScriptObject {
    /// Handle the object was constructed with
    pub fn server_handle(&self) -> i32 {
        self.server_handle
    }

    /// Value the script constructor returned
    pub fn object(&self) -> i32 {
        self.object
    }

    /// Order server the object submits to
    pub fn server(&self) -> &OrderServer {
        &self.server
    }

    /// Binds the object to `store` as a contract strategy
    pub fn bind<'a, 's>(
        &'s self,
        store: &'a mut Store<HostState>,
    ) -> ScriptStrategy<'s, InstanceScope<&'a mut Store<HostState>>> {
        ScriptStrategy::new(
            InstanceScope::new(store, self.instance),
            self.object,
            &self.server,
            &self.methods,
        )
    }

    /// Runs the object's `eval` entry point
    pub fn eval(&self, store: &mut Store<HostState>) -> StrategyResult<()> {
        self.bind(store).eval()
    }
}
