//! Strategy contract
//!
//! A strategy is driven by the host through [`Strategy::eval`] and hears
//! back about acknowledged orders through [`Strategy::on_order`]. Orders go
//! out through [`SendOrder::send_order`], which every strategy gets for free
//! and none can replace.

use crate::error::StrategyResult;
use crate::order_server::OrderServer;
use crate::types::{Order, OrderId, OrderRequest, Side};

/// Capability set every strategy variant implements.
///
/// `'s` is the lifetime of the order server the strategy is bound to; the
/// server must outlive the strategy.
pub trait Strategy<'s> {
    /// Order server this strategy submits to
    fn order_server(&self) -> &'s OrderServer;

    /// Runs the strategy's decision logic
    fn eval(&mut self) -> StrategyResult<()>;

    /// Called synchronously by the order server for every acknowledged order
    fn on_order(&mut self, order: &Order) -> StrategyResult<()>;
}

/// Order submission shared by all strategies.
///
/// Implemented for every [`Strategy`] by a blanket impl, so no strategy can
/// provide its own version.
pub trait SendOrder<'s>: Strategy<'s> {
    /// Submits a request to the bound order server and returns the issued id
    /// once `on_order` has run
    fn send_order(&mut self, request: OrderRequest) -> StrategyResult<OrderId>;

    /// Argument-list form of [`SendOrder::send_order`]
    fn send(
        &mut self,
        symbol: &str,
        side: Side,
        size: i64,
        price: f64,
    ) -> StrategyResult<OrderId> {
        self.send_order(OrderRequest::new(symbol, side, size, price))
    }
}

impl<'s, T> SendOrder<'s> for T
where
    T: Strategy<'s> + ?Sized,
{
    fn send_order(&mut self, request: OrderRequest) -> StrategyResult<OrderId> {
        let server = self.order_server();
        server.send_order(self, request)
    }
}
