//! Core order types shared by the order server, native strategies and the
//! script bridge.
//!
//! Everything here is plain data: orders are created by value and cloned
//! whenever they cross into a strategy, so no strategy can observe a later
//! mutation made by another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StrategyError, StrategyResult};

/// Order identifier issued by an [`crate::OrderServer`]
pub type OrderId = u64;

/// Trading symbol (e.g., "GOOG", "AAPL")
pub type Symbol = String;

/// Buy or sell direction of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl Side {
    /// Every side, in code order
    pub const ALL: [Side; 2] = [Side::Buy, Side::Sell];

    /// Name under which the side is exposed to scripts
    pub fn name(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Integral code used when the side crosses a runtime boundary
    pub fn code(&self) -> i32 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    /// Decodes a boundary code, rejecting anything but the named constants
    pub fn from_code(code: i32) -> StrategyResult<Self> {
        match code {
            0 => Ok(Side::Buy),
            1 => Ok(Side::Sell),
            other => Err(StrategyError::InvalidSide(other)),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for Side {
    type Error = StrategyError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Side::from_code(code)
    }
}

/// Arguments of a `send_order` call, bundled as a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Trading symbol
    pub symbol: Symbol,

    /// Buy or Sell side
    pub side: Side,

    /// Order quantity
    pub size: i64,

    /// Limit price
    pub price: f64,
}

impl OrderRequest {
    /// Creates a new request
    pub fn new(symbol: impl Into<Symbol>, side: Side, size: i64, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            size,
            price,
        }
    }
}

/// An acknowledged order.
///
/// Only the order server constructs these; `order_id` is fixed at
/// acknowledgement time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Trading symbol, copied from the request
    pub symbol: Symbol,

    /// Buy or Sell side, copied from the request
    pub side: Side,

    /// Order quantity
    pub size: i64,

    /// Order price
    pub price: f64,

    /// Identifier assigned by the order server
    order_id: OrderId,
}

impl Order {
    pub(crate) fn acknowledge(request: OrderRequest, order_id: OrderId) -> Self {
        Self {
            symbol: request.symbol,
            side: request.side,
            size: request.size,
            price: request.price,
            order_id,
        }
    }

    /// Identifier assigned by the order server
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {} @ {}",
            self.order_id, self.side, self.size, self.symbol, self.price
        )
    }
}

/// Journal entry recorded by the order server for every order it issues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// The acknowledged order
    pub order: Order,

    /// When the order server issued the acknowledgement
    pub acknowledged_at: DateTime<Utc>,
}
