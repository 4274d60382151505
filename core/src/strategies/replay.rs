//! Replay strategy
//!
//! Submits a fixed list of requests when evaluated and keeps every order it
//! is called back with.

use tracing::info;

use crate::error::StrategyResult;
use crate::order_server::OrderServer;
use crate::strategy::{SendOrder, Strategy};
use crate::types::{Order, OrderRequest};

/// Native strategy replaying a script of order requests
#[derive(Debug)]
pub struct ReplayStrategy<'s> {
    name: String,
    server: &'s OrderServer,
    requests: Vec<OrderRequest>,
    fills: Vec<Order>,
}

impl<'s> ReplayStrategy<'s> {
    /// Create a replay strategy bound to `server`
    pub fn new(name: impl Into<String>, server: &'s OrderServer, requests: Vec<OrderRequest>) -> Self {
        Self {
            name: name.into(),
            server,
            requests,
            fills: Vec::new(),
        }
    }

    /// Strategy name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Orders received through `on_order`, in callback order
    pub fn fills(&self) -> &[Order] {
        &self.fills
    }
}

impl<'s> Strategy<'s> for ReplayStrategy<'s> {
    fn order_server(&self) -> &'s OrderServer {
        self.server
    }

    fn eval(&mut self) -> StrategyResult<()> {
        let requests = self.requests.clone();
        for request in requests {
            self.send_order(request)?;
        }
        Ok(())
    }

    fn on_order(&mut self, order: &Order) -> StrategyResult<()> {
        info!(strategy = %self.name, order = %order, "Order acknowledged");
        self.fills.push(order.clone());
        Ok(())
    }
}
