use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::fmt;
use tracing::debug;

use crate::error::StrategyResult;
use crate::strategy::Strategy;
use crate::types::{Acknowledgement, Order, OrderId, OrderRequest};

/// Order server simulating acknowledgement of strategy orders.
///
/// The OrderServer is responsible for:
/// - Assigning strictly increasing order ids, starting at 1
/// - Building the acknowledged [`Order`] from a request
/// - Calling the submitting strategy back before `send_order` returns
/// - Journaling every acknowledgement it issued
///
/// The server is single-threaded: the counter lives in a [`Cell`] and is only
/// touched on the call stack of `send_order`.
#[derive(Default)]
pub struct OrderServer {
    /// Last id handed out; 0 before the first order
    next_order_id: Cell<OrderId>,

    /// Acknowledgements in issue order
    journal: RefCell<Vec<Acknowledgement>>,
}

impl fmt::Debug for OrderServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderServer")
            .field("issued", &self.issued())
            .finish_non_exhaustive()
    }
}

impl OrderServer {
    /// Creates an order server whose first issued id is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledges `request` on behalf of `strategy`.
    ///
    /// The new order is passed to `strategy.on_order` before this returns; an
    /// error raised by the callback is returned as-is. The id is consumed even
    /// when the callback fails.
    pub fn send_order<'s, S>(&self, strategy: &mut S, request: OrderRequest) -> StrategyResult<OrderId>
    where
        S: Strategy<'s> + ?Sized,
    {
        let order_id = self.next_order_id.get() + 1;
        self.next_order_id.set(order_id);

        let order = Order::acknowledge(request, order_id);
        debug!(
            order_id,
            symbol = %order.symbol,
            side = %order.side,
            size = order.size,
            price = order.price,
            "Acknowledging order"
        );

        self.journal.borrow_mut().push(Acknowledgement {
            order: order.clone(),
            acknowledged_at: Utc::now(),
        });
        metrics::counter!("strategy_host_orders_acknowledged_total", 1);

        strategy.on_order(&order)?;
        Ok(order_id)
    }

    /// Number of order ids issued so far
    pub fn issued(&self) -> u64 {
        self.next_order_id.get()
    }

    /// Snapshot of every acknowledgement issued, oldest first
    pub fn acknowledgements(&self) -> Vec<Acknowledgement> {
        self.journal.borrow().clone()
    }

    /// Orders acknowledged so far, oldest first
    pub fn orders(&self) -> Vec<Order> {
        self.journal
            .borrow()
            .iter()
            .map(|ack| ack.order.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use crate::strategy::SendOrder;
    use crate::types::Side;

    /// Counts callbacks and can be told to fail them
    struct Probe<'s> {
        server: &'s OrderServer,
        seen: Vec<Order>,
        fail_callbacks: bool,
    }

    impl<'s> Strategy<'s> for Probe<'s> {
        fn order_server(&self) -> &'s OrderServer {
            self.server
        }

        fn eval(&mut self) -> StrategyResult<()> {
            self.send("GOOG", Side::Buy, 100, 759.11)?;
            Ok(())
        }

        fn on_order(&mut self, order: &Order) -> StrategyResult<()> {
            self.seen.push(order.clone());
            if self.fail_callbacks {
                return Err(StrategyError::runtime(
                    "on_order",
                    anyhow::anyhow!("rejected {}", order.order_id()),
                ));
            }
            Ok(())
        }
    }

    fn probe(server: &OrderServer) -> Probe<'_> {
        Probe {
            server,
            seen: Vec::new(),
            fail_callbacks: false,
        }
    }

    #[test]
    fn test_first_order_id_is_one() {
        let server = OrderServer::new();
        let mut strategy = probe(&server);

        strategy.eval().unwrap();

        assert_eq!(server.issued(), 1);
        assert_eq!(strategy.seen.len(), 1);
        assert_eq!(strategy.seen[0].order_id(), 1);
        assert_eq!(strategy.seen[0].symbol, "GOOG");
        assert_eq!(strategy.seen[0].side, Side::Buy);
        assert_eq!(strategy.seen[0].size, 100);
        assert_eq!(strategy.seen[0].price, 759.11);
    }

    #[test]
    fn test_callback_runs_before_send_returns() {
        let server = OrderServer::new();
        let mut strategy = probe(&server);

        let id = strategy
            .send_order(OrderRequest::new("AAPL", Side::Sell, 10, 1.25))
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(strategy.seen.last().map(Order::order_id), Some(id));
    }

    #[test]
    fn test_callback_error_propagates_and_consumes_id() {
        let server = OrderServer::new();
        let mut strategy = probe(&server);
        strategy.fail_callbacks = true;

        let err = strategy.send("MSFT", Side::Buy, 1, 2.0).unwrap_err();
        assert!(matches!(err, StrategyError::Runtime { ref method, .. } if method == "on_order"));

        strategy.fail_callbacks = false;
        assert_eq!(strategy.send("MSFT", Side::Buy, 1, 2.0).unwrap(), 2);
    }

    #[test]
    fn test_journal_records_acknowledgements_in_order() {
        let server = OrderServer::new();
        let mut strategy = probe(&server);

        strategy.send("A", Side::Buy, 1, 1.0).unwrap();
        strategy.send("B", Side::Sell, 2, 2.0).unwrap();

        let acks = server.acknowledgements();
        assert_eq!(acks.len(), 2);
        assert_eq!(acks[0].order.symbol, "A");
        assert_eq!(acks[1].order.order_id(), 2);
        assert!(acks[0].acknowledged_at <= acks[1].acknowledged_at);
        assert_eq!(server.orders(), strategy.seen);
    }

    #[test]
    fn test_servers_count_independently() {
        let first = OrderServer::new();
        let second = OrderServer::new();

        probe(&first).eval().unwrap();
        probe(&first).eval().unwrap();
        probe(&second).eval().unwrap();

        assert_eq!(first.issued(), 2);
        assert_eq!(second.orders()[0].order_id(), 1);
    }
}
