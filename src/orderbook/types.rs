//! Fundamental order book types: identifiers, sides, order kinds,
//! time-in-force policies and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique order identifier, assigned by the caller.
pub type OrderId = u64;

/// Account that owns an order; used for fill routing and self-trade checks.
pub type AccountId = u64;

/// Side of the book an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Bid side.
    Buy,
    /// Ask side.
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[inline]
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Whether an order carries a price limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Limit order with a price constraint.
    Limit,
    /// Market order; carries a sentinel price that always crosses.
    Market,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::Market => write!(f, "MARKET"),
        }
    }
}

/// Time-in-force policy governing how long an order may work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-till-cancel: rests until filled or cancelled.
    Gtc,
    /// Immediate-or-cancel: fill what is immediately available, cancel the rest.
    Ioc,
    /// Fill-or-kill: fill completely right away or cancel without trading.
    Fok,
    /// Day order: valid until end of the trading day.
    Day,
}

impl TimeInForce {
    /// Parses the journal/CSV token form.
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "GTC" => Some(TimeInForce::Gtc),
            "IOC" => Some(TimeInForce::Ioc),
            "FOK" => Some(TimeInForce::Fok),
            "DAY" => Some(TimeInForce::Day),
            _ => None,
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
            TimeInForce::Day => write!(f, "DAY"),
        }
    }
}

/// Lifecycle state of an order. Once a terminal state
/// (`Filled`/`Cancelled`/`Rejected`) is reached no further mutation occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// Created but not yet accepted into the book.
    Pending,
    /// Resting or eligible to match.
    Active,
    /// Some quantity filled, remainder still working.
    PartiallyFilled,
    /// Completely filled. Terminal.
    Filled,
    /// Cancelled by the user or by TIF finalization. Terminal.
    Cancelled,
    /// Rejected on entry. Terminal.
    Rejected,
}

impl OrderState {
    /// Integer encoding used by the snapshot text format.
    #[must_use]
    pub fn as_int(self) -> u8 {
        match self {
            OrderState::Pending => 0,
            OrderState::Active => 1,
            OrderState::PartiallyFilled => 2,
            OrderState::Filled => 3,
            OrderState::Cancelled => 4,
            OrderState::Rejected => 5,
        }
    }

    /// Inverse of [`OrderState::as_int`]; unknown codes map to `Rejected`.
    #[must_use]
    pub fn from_int(v: u8) -> Self {
        match v {
            0 => OrderState::Pending,
            1 => OrderState::Active,
            2 => OrderState::PartiallyFilled,
            3 => OrderState::Filled,
            4 => OrderState::Cancelled,
            _ => OrderState::Rejected,
        }
    }

    /// True for `Filled`, `Cancelled` and `Rejected`.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderState::Pending => write!(f, "PENDING"),
            OrderState::Active => write!(f, "ACTIVE"),
            OrderState::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderState::Filled => write!(f, "FILLED"),
            OrderState::Cancelled => write!(f, "CANCELLED"),
            OrderState::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Aggregated view of one price level: all active displayed quantity at a
/// single price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    /// The level's price.
    pub price: f64,
    /// Sum of displayed quantity across orders at this price.
    pub total_quantity: u64,
    /// Number of active orders at this price.
    pub num_orders: usize,
}
