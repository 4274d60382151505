//! Script Bridge
//!
//! [`ScriptStrategy`] implements the strategy contract by forwarding each
//! call to an export of a script instance. Exports are looked up by name on
//! every call through a [`MethodTable`]; a missing export is reported as a
//! pure virtual call from the call that needed it.
//!
//! The bridge runs from the host over the store, and re-entrantly from
//! inside a host function over the wasmtime [`Caller`](wasmtime::Caller).
//! In both cases an [`InstanceScope`] pins lookups to the instance the
//! script object was constructed from.

use std::fmt;

use strategy_host_core::{Order, OrderServer, Strategy, StrategyError, StrategyResult};
use tracing::{debug, trace};
use wasmtime::{
    AsContext, AsContextMut, Extern, Instance, StoreContext, StoreContextMut, TypedFunc,
    WasmParams, WasmResults,
};

use crate::runtime::HostState;

/// Contract methods dispatched through the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractMethod {
    /// Class constructor, `(server) -> self`
    Construct,
    /// Decision entry point, `(self)`
    Eval,
    /// Acknowledgement callback, `(self, order)`
    OnOrder,
}

impl ContractMethod {
    /// Every contract method
    pub const ALL: [ContractMethod; 3] = [
        ContractMethod::Construct,
        ContractMethod::Eval,
        ContractMethod::OnOrder,
    ];

    /// Contract name of the method
    pub fn name(&self) -> &'static str {
        match self {
            ContractMethod::Construct => "new",
            ContractMethod::Eval => "eval",
            ContractMethod::OnOrder => "on_order",
        }
    }
}

/// Maps contract methods to script export names for one class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTable {
    class: String,
    construct: String,
    eval: String,
    on_order: String,
}

impl MethodTable {
    /// Default mapping: `<class>.new`, `<class>.eval`, `<class>.on_order`
    pub fn for_class(class: impl Into<String>) -> Self {
        let class = class.into();
        Self {
            construct: format!("{class}.{}", ContractMethod::Construct.name()),
            eval: format!("{class}.{}", ContractMethod::Eval.name()),
            on_order: format!("{class}.{}", ContractMethod::OnOrder.name()),
            class,
        }
    }

    /// Maps `method` to an explicitly named export
    pub fn map(mut self, method: ContractMethod, export: impl Into<String>) -> Self {
        let export = export.into();
        match method {
            ContractMethod::Construct => self.construct = export,
            ContractMethod::Eval => self.eval = export,
            ContractMethod::OnOrder => self.on_order = export,
        }
        self
    }

    /// Script-side class name
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Export implementing `method`
    pub fn export_name(&self, method: ContractMethod) -> &str {
        match method {
            ContractMethod::Construct => &self.construct,
            ContractMethod::Eval => &self.eval,
            ContractMethod::OnOrder => &self.on_order,
        }
    }
}

/// Store context the bridge resolves exports from
pub trait ScriptScope: AsContextMut<Data = HostState> {
    /// Looks up an export of the bound script instance by name
    fn export(&mut self, name: &str) -> Option<Extern>;
}

impl<S: ScriptScope> ScriptScope for &mut S {
    fn export(&mut self, name: &str) -> Option<Extern> {
        (**self).export(name)
    }
}

/// A store context paired with the instance holding the script object.
///
/// `C` is the store when the host drives the strategy, or the
/// [`Caller`](wasmtime::Caller) of a host function when a script calls back
/// in. Exports are always resolved on `instance`, whichever module made the
/// call.
pub struct InstanceScope<C> {
    context: C,
    instance: Instance,
}

impl<C> fmt::Debug for InstanceScope<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceScope")
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl<C: AsContextMut<Data = HostState>> InstanceScope<C> {
    /// Scopes `instance` within `context`
    pub fn new(context: C, instance: Instance) -> Self {
        Self { context, instance }
    }
}

impl<C: AsContext> AsContext for InstanceScope<C> {
    type Data = C::Data;

    fn as_context(&self) -> StoreContext<'_, C::Data> {
        self.context.as_context()
    }
}

impl<C: AsContextMut> AsContextMut for InstanceScope<C> {
    fn as_context_mut(&mut self) -> StoreContextMut<'_, C::Data> {
        self.context.as_context_mut()
    }
}

impl<C: AsContextMut<Data = HostState>> ScriptScope for InstanceScope<C> {
    fn export(&mut self, name: &str) -> Option<Extern> {
        self.instance.get_export(&mut self.context, name)
    }
}

/// Strategy adapter forwarding contract calls into a script object
pub struct ScriptStrategy<'s, S> {
    scope: S,
    object: i32,
    server: &'s OrderServer,
    methods: &'s MethodTable,
}

impl<'s, S: ScriptScope> ScriptStrategy<'s, S> {
    /// Binds the script object `object` reachable from `scope`
    pub fn new(scope: S, object: i32, server: &'s OrderServer, methods: &'s MethodTable) -> Self {
        Self {
            scope,
            object,
            server,
            methods,
        }
    }

    /// Script object handle
    pub fn object(&self) -> i32 {
        self.object
    }

    /// Resolves the export for `method` as a typed function
    fn resolve<P, R>(&mut self, method: ContractMethod) -> StrategyResult<TypedFunc<P, R>>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let methods = self.methods;
        let export = methods.export_name(method);
        trace!(class = methods.class(), export, "Resolving override");

        let func = self
            .scope
            .export(export)
            .and_then(Extern::into_func)
            .ok_or_else(|| StrategyError::Unimplemented {
                class: methods.class().to_string(),
                method: method.name().to_string(),
            })?;

        func.typed::<P, R>(&self.scope)
            .map_err(|source| StrategyError::Signature {
                export: export.to_string(),
                source,
            })
    }
}

/// Maps an error returned from a script call back to a strategy error.
///
/// Errors raised by a nested bridge call travel through the script as host
/// errors and are returned unchanged.
pub(crate) fn strategy_error(method: ContractMethod, err: anyhow::Error) -> StrategyError {
    match err.downcast::<StrategyError>() {
        Ok(inner) => inner,
        Err(err) => StrategyError::runtime(method.name(), err),
    }
}

impl<'s, S: ScriptScope> Strategy<'s> for ScriptStrategy<'s, S> {
    fn order_server(&self) -> &'s OrderServer {
        self.server
    }

    fn eval(&mut self) -> StrategyResult<()> {
        let func = self.resolve::<i32, ()>(ContractMethod::Eval)?;
        debug!(class = self.methods.class(), object = self.object, "Dispatching eval");

        func.call(&mut self.scope, self.object)
            .map_err(|err| strategy_error(ContractMethod::Eval, err))
    }

    fn on_order(&mut self, order: &Order) -> StrategyResult<()> {
        let func = self.resolve::<(i32, i32), ()>(ContractMethod::OnOrder)?;
        let handle = self
            .scope
            .as_context_mut()
            .data_mut()
            .orders
            .insert(order.clone());
        debug!(
            class = self.methods.class(),
            object = self.object,
            order_id = order.order_id(),
            handle,
            "Dispatching on_order"
        );

        let result = func.call(&mut self.scope, (self.object, handle));
        self.scope.as_context_mut().data_mut().orders.remove(handle);
        result.map_err(|err| strategy_error(ContractMethod::OnOrder, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_prefixes_class() {
        let table = MethodTable::for_class("Strategy");
        assert_eq!(table.class(), "Strategy");
        assert_eq!(table.export_name(ContractMethod::Construct), "Strategy.new");
        assert_eq!(table.export_name(ContractMethod::Eval), "Strategy.eval");
        assert_eq!(table.export_name(ContractMethod::OnOrder), "Strategy.on_order");
    }

    #[test]
    fn test_explicit_mapping_replaces_one_entry() {
        let table = MethodTable::for_class("Momentum")
            .map(ContractMethod::OnOrder, "Momentum.onOrder");

        assert_eq!(table.export_name(ContractMethod::OnOrder), "Momentum.onOrder");
        assert_eq!(table.export_name(ContractMethod::Eval), "Momentum.eval");
    }

    #[test]
    fn test_nested_strategy_errors_pass_through() {
        let nested = StrategyError::Unimplemented {
            class: "Strategy".into(),
            method: "on_order".into(),
        };
        let err = strategy_error(ContractMethod::Eval, anyhow::Error::new(nested));
        assert!(matches!(err, StrategyError::Unimplemented { ref method, .. } if method == "on_order"));

        let err = strategy_error(ContractMethod::Eval, anyhow::anyhow!("trap"));
        assert!(matches!(err, StrategyError::Runtime { ref method, .. } if method == "eval"));
    }

    #[test]
    fn test_contract_method_names() {
        let names: Vec<_> = ContractMethod::ALL.iter().map(|m| m.name()).collect();
        assert_eq!(names, ["new", "eval", "on_order"]);
    }
}
