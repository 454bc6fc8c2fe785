//! Raw fills produced by matching and the enriched form emitted by the
//! fill router.

use super::types::{AccountId, OrderId, Side};
use serde::Serialize;
use std::fmt;

/// A raw trade between two orders. Produced by the matching engine before
/// routing; `price` is the passive order's price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fill {
    /// Buy-side order id.
    pub buy_order_id: OrderId,
    /// Sell-side order id.
    pub sell_order_id: OrderId,
    /// Trade price (set by the resting order).
    pub price: f64,
    /// Traded quantity; always positive.
    pub quantity: u64,
    /// Monotonic timestamp of the match.
    pub timestamp_ns: u64,
}

impl Fill {
    /// Creates a fill stamped with `timestamp_ns`.
    #[must_use]
    pub fn new(
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        price: f64,
        quantity: u64,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            buy_order_id,
            sell_order_id,
            price,
            quantity,
            timestamp_ns,
        }
    }

    /// Notional value of the trade.
    #[inline]
    #[must_use]
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fill{{buy={}, sell={}, price={:.2}, qty={}}}",
            self.buy_order_id, self.sell_order_id, self.price, self.quantity
        )
    }
}

/// Liquidity role of the buy side of a fill.
///
/// The flag describes who removed liquidity: `Taker` when the buyer was
/// the aggressor, `Maker` when the buyer was resting. `MakerMaker` marks
/// the rare case where neither side crossed the spread (e.g. an auction
/// uncross during replay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiquidityFlag {
    /// The buyer provided liquidity.
    Maker,
    /// The buyer removed liquidity.
    Taker,
    /// Both sides added liquidity.
    MakerMaker,
}

/// A fill enriched by the router with accounts, symbol, fees and
/// liquidity metadata.
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedFill {
    /// The underlying raw fill.
    pub fill: Fill,
    /// Account on the buy side.
    pub buy_account_id: AccountId,
    /// Account on the sell side.
    pub sell_account_id: AccountId,
    /// Symbol the book was trading.
    pub symbol: String,
    /// Router-assigned id, monotonically increasing within a router.
    pub fill_id: u64,
    /// Side of the incoming (aggressing) order.
    pub aggressor_side: Side,
    /// Buy-side liquidity role.
    pub liquidity_flag: LiquidityFlag,
    /// Fee charged to the buyer (0 unless fees are enabled).
    pub buyer_fee: f64,
    /// Fee charged to the seller (0 unless fees are enabled).
    pub seller_fee: f64,
    /// When the match occurred (monotonic).
    pub match_time_ns: u64,
    /// When the router processed the fill (monotonic).
    pub routing_time_ns: u64,
    /// Set when the fill was blocked by self-trade prevention. Such fills
    /// are never stored; the flag exists for callback observers.
    pub self_trade_prevented: bool,
}

impl EnhancedFill {
    /// True when `account` participated on either side.
    #[inline]
    #[must_use]
    pub fn involves_account(&self, account: AccountId) -> bool {
        self.buy_account_id == account || self.sell_account_id == account
    }

    /// Quantity convenience accessor.
    #[inline]
    #[must_use]
    pub fn quantity(&self) -> u64 {
        self.fill.quantity
    }

    /// Price convenience accessor.
    #[inline]
    #[must_use]
    pub fn price(&self) -> f64 {
        self.fill.price
    }
}
