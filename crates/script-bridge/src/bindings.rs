//! Native bindings
//!
//! Registers the type surface scripts see into a [`Namespace`]:
//!
//! | Import | Signature |
//! |--------|-----------|
//! | `Side.BUY`, `Side.SELL` | `i32` constants |
//! | `Strategy.send_order` | `(server, symbol_ptr, symbol_len, side, size: i64, price: f64)` |
//! | `Order.symbol` | `(order, dst_ptr, dst_cap) -> len` |
//! | `Order.side` | `(order) -> i32` |
//! | `Order.size` / `Order.set_size` | `(order) -> i64` / `(order, i64)` |
//! | `Order.price` / `Order.set_price` | `(order) -> f64` / `(order, f64)` |
//! | `Order.order_id` | `(order) -> i64` |
//! | `host.log` | `(ptr, len)` |
//!
//! `symbol`, `side` and `order_id` have no setters: scripts can only change
//! the size and price of their own copy of an order.

use strategy_host_core::{OrderRequest, SendOrder, Side, StrategyError};
use tracing::info;
use wasmtime::{Caller, Global, GlobalType, Mutability, Store, Val, ValType};

use crate::bridge::{InstanceScope, ScriptStrategy};
use crate::error::{ScriptError, ScriptResult};
use crate::marshal;
use crate::runtime::{HostState, Namespace};

/// Module holding the side constants
pub const SIDE_MODULE: &str = "Side";
/// Module holding the order accessors
pub const ORDER_MODULE: &str = "Order";
/// Module holding the strategy base methods
pub const STRATEGY_MODULE: &str = "Strategy";
/// Module holding host utilities
pub const HOST_MODULE: &str = "host";

/// Module names scripts cannot be loaded under
pub const RESERVED_MODULES: [&str; 4] = [SIDE_MODULE, ORDER_MODULE, STRATEGY_MODULE, HOST_MODULE];

/// Registers every native binding
pub fn register(store: &mut Store<HostState>, namespace: &mut Namespace) -> ScriptResult<()> {
    register_side(store, namespace)?;
    register_order(namespace).map_err(ScriptError::Binding)?;
    register_strategy(namespace).map_err(ScriptError::Binding)?;
    register_host(namespace).map_err(ScriptError::Binding)?;
    info!("Native bindings registered");
    Ok(())
}

fn register_side(store: &mut Store<HostState>, namespace: &mut Namespace) -> ScriptResult<()> {
    for side in Side::ALL {
        let global = Global::new(
            &mut *store,
            GlobalType::new(ValType::I32, Mutability::Const),
            Val::I32(side.code()),
        )
        .map_err(ScriptError::Binding)?;

        namespace
            .linker_mut()
            .define(&*store, SIDE_MODULE, side.name(), global)
            .map_err(ScriptError::Binding)?;
    }
    Ok(())
}

fn register_order(namespace: &mut Namespace) -> anyhow::Result<()> {
    let linker = namespace.linker_mut();

    linker.func_wrap(
        ORDER_MODULE,
        "symbol",
        |mut caller: Caller<'_, HostState>, order: i32, dst: i32, cap: i32| -> anyhow::Result<i32> {
            let symbol = caller.data().orders.get(order)?.symbol.clone();
            Ok(marshal::write_bytes(&mut caller, dst, cap, symbol.as_bytes())?)
        },
    )?;

    linker.func_wrap(
        ORDER_MODULE,
        "side",
        |caller: Caller<'_, HostState>, order: i32| -> anyhow::Result<i32> {
            Ok(caller.data().orders.get(order)?.side.code())
        },
    )?;

    linker.func_wrap(
        ORDER_MODULE,
        "size",
        |caller: Caller<'_, HostState>, order: i32| -> anyhow::Result<i64> {
            Ok(caller.data().orders.get(order)?.size)
        },
    )?;

    linker.func_wrap(
        ORDER_MODULE,
        "set_size",
        |mut caller: Caller<'_, HostState>, order: i32, size: i64| -> anyhow::Result<()> {
            caller.data_mut().orders.get_mut(order)?.size = size;
            Ok(())
        },
    )?;

    linker.func_wrap(
        ORDER_MODULE,
        "price",
        |caller: Caller<'_, HostState>, order: i32| -> anyhow::Result<f64> {
            Ok(caller.data().orders.get(order)?.price)
        },
    )?;

    linker.func_wrap(
        ORDER_MODULE,
        "set_price",
        |mut caller: Caller<'_, HostState>, order: i32, price: f64| -> anyhow::Result<()> {
            caller.data_mut().orders.get_mut(order)?.price = price;
            Ok(())
        },
    )?;

    linker.func_wrap(
        ORDER_MODULE,
        "order_id",
        |caller: Caller<'_, HostState>, order: i32| -> anyhow::Result<i64> {
            let order_id = caller.data().orders.get(order)?.order_id();
            Ok(i64::try_from(order_id)
                .map_err(|_| StrategyError::Marshal(format!("order id {order_id} exceeds i64")))?)
        },
    )?;

    Ok(())
}

fn register_strategy(namespace: &mut Namespace) -> anyhow::Result<()> {
    namespace.linker_mut().func_wrap(
        STRATEGY_MODULE,
        "send_order",
        |mut caller: Caller<'_, HostState>,
         server: i32,
         symbol_ptr: i32,
         symbol_len: i32,
         side: i32,
         size: i64,
         price: f64|
         -> anyhow::Result<()> {
            let symbol = marshal::read_string(&mut caller, symbol_ptr, symbol_len)?;
            let side = Side::from_code(side)?;

            let binding = caller.data().binding(server)?.clone();
            let object = binding.object.ok_or_else(|| {
                StrategyError::Marshal(format!(
                    "send_order on server handle {server} before its constructor returned"
                ))
            })?;

            let scope = InstanceScope::new(&mut caller, binding.instance);
            let mut strategy = ScriptStrategy::new(scope, object, &binding.server, &binding.methods);
            strategy.send_order(OrderRequest::new(symbol, side, size, price))?;
            Ok(())
        },
    )?;

    Ok(())
}

fn register_host(namespace: &mut Namespace) -> anyhow::Result<()> {
    namespace.linker_mut().func_wrap(
        HOST_MODULE,
        "log",
        |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> anyhow::Result<()> {
            let line = marshal::read_string(&mut caller, ptr, len)?;
            info!(target: "script", "{line}");
            caller.data_mut().push_console(line);
            Ok(())
        },
    )?;

    Ok(())
}
