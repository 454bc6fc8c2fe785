//! Price-time priority order book: matching, stops, icebergs, fill
//! routing, event journaling and snapshot recovery.

mod book;
mod error;
mod event;
mod fill;
mod matching;
mod operations;
mod order;
mod router;
mod snapshot;
mod stops;
mod types;

pub use book::OrderBook;
pub use error::OrderBookError;
pub use event::{EventParseError, OrderEvent};
pub use fill::{EnhancedFill, Fill, LiquidityFlag};
pub use order::Order;
pub use router::{FillCallback, FillRouter, SelfTradeCallback};
pub use snapshot::{BookSnapshot, StopRecord};
pub use types::{AccountId, OrderId, OrderKind, OrderState, PriceLevel, Side, TimeInForce};
