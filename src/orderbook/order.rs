//! The order record and its lifecycle helpers.
//!
//! An order has an immutable identity (`id`, `account_id`, `side`), a
//! mutable lifecycle (kind, time-in-force, prices, quantities, state) and
//! an optional stop overlay. Icebergs keep `display_qty + hidden_qty ==
//! remaining_qty` at all times; a market order carries a sentinel price
//! (`+inf` buy, `0` sell) that always crosses.

use super::types::{AccountId, OrderId, OrderKind, OrderState, Side, TimeInForce};
use serde::Serialize;

/// A single order as tracked by the book's authoritative store.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Unique identifier, assigned by the caller.
    pub id: OrderId,
    /// Owning account, used by the fill router.
    pub account_id: AccountId,
    /// Buy or sell.
    pub side: Side,
    /// Limit or market. Flips from the stop overlay on trigger.
    pub kind: OrderKind,
    /// Time-in-force policy.
    pub time_in_force: TimeInForce,
    /// Limit price; `+inf` for market buys, `0.0` for market sells.
    pub price: f64,
    /// Original quantity at entry.
    pub quantity: u64,
    /// Quantity still unfilled (visible + hidden).
    pub remaining_qty: u64,
    /// Currently displayed quantity.
    pub display_qty: u64,
    /// Hidden reserve (icebergs only).
    pub hidden_qty: u64,
    /// Tranche revealed on each iceberg refresh; 0 for plain orders.
    pub peak_size: u64,
    /// Book-assigned arrival stamp; drives time priority. Refreshed on
    /// amendment and iceberg refresh, which lose priority.
    pub arrival_ns: u64,
    /// Lifecycle state.
    pub state: OrderState,
    /// Stop overlay: order is latent until triggered.
    pub is_stop: bool,
    /// Trigger price for the stop overlay.
    pub stop_price: f64,
    /// Whether the stop has fired.
    pub stop_triggered: bool,
    /// What the order becomes when the stop fires.
    pub stop_becomes: OrderKind,
}

impl Order {
    /// Creates a plain limit order.
    #[must_use]
    pub fn limit(
        id: OrderId,
        account_id: AccountId,
        side: Side,
        price: f64,
        quantity: u64,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            id,
            account_id,
            side,
            kind: OrderKind::Limit,
            time_in_force,
            price,
            quantity,
            remaining_qty: quantity,
            display_qty: quantity,
            hidden_qty: 0,
            peak_size: 0,
            arrival_ns: 0,
            state: OrderState::Pending,
            is_stop: false,
            stop_price: 0.0,
            stop_triggered: false,
            stop_becomes: OrderKind::Limit,
        }
    }

    /// Creates a market order. A GTC time-in-force is coerced to IOC since
    /// market orders never rest.
    #[must_use]
    pub fn market(
        id: OrderId,
        account_id: AccountId,
        side: Side,
        quantity: u64,
        time_in_force: TimeInForce,
    ) -> Self {
        let tif = if time_in_force == TimeInForce::Gtc {
            TimeInForce::Ioc
        } else {
            time_in_force
        };
        Self {
            id,
            account_id,
            side,
            kind: OrderKind::Market,
            time_in_force: tif,
            price: Self::market_sentinel(side),
            quantity,
            remaining_qty: quantity,
            display_qty: quantity,
            hidden_qty: 0,
            peak_size: 0,
            arrival_ns: 0,
            state: OrderState::Pending,
            is_stop: false,
            stop_price: 0.0,
            stop_triggered: false,
            stop_becomes: OrderKind::Market,
        }
    }

    /// Creates an iceberg limit order displaying `peak_size` of
    /// `total_qty`. With `peak_size >= total_qty` (or `peak_size == 0`)
    /// this degenerates to a plain limit order.
    #[must_use]
    pub fn iceberg(
        id: OrderId,
        account_id: AccountId,
        side: Side,
        price: f64,
        total_qty: u64,
        peak_size: u64,
        time_in_force: TimeInForce,
    ) -> Self {
        let mut order = Self::limit(id, account_id, side, price, total_qty, time_in_force);
        if peak_size > 0 && peak_size < total_qty {
            order.peak_size = peak_size;
            order.display_qty = peak_size;
            order.hidden_qty = total_qty - peak_size;
        }
        order
    }

    /// Creates a stop-market order latent until `stop_price` is crossed.
    #[must_use]
    pub fn stop_market(
        id: OrderId,
        account_id: AccountId,
        side: Side,
        stop_price: f64,
        quantity: u64,
        time_in_force: TimeInForce,
    ) -> Self {
        let mut order = Self::market(id, account_id, side, quantity, time_in_force);
        order.is_stop = true;
        order.stop_price = stop_price;
        order.stop_becomes = OrderKind::Market;
        order
    }

    /// Creates a stop-limit order: latent until `stop_price` is crossed,
    /// then works as a limit order at `limit_price`.
    #[must_use]
    pub fn stop_limit(
        id: OrderId,
        account_id: AccountId,
        side: Side,
        stop_price: f64,
        limit_price: f64,
        quantity: u64,
        time_in_force: TimeInForce,
    ) -> Self {
        let mut order = Self::limit(id, account_id, side, limit_price, quantity, time_in_force);
        order.is_stop = true;
        order.stop_price = stop_price;
        order.stop_becomes = OrderKind::Limit;
        order
    }

    /// Sentinel price that always crosses for the given side.
    #[inline]
    #[must_use]
    pub fn market_sentinel(side: Side) -> f64 {
        match side {
            Side::Buy => f64::INFINITY,
            Side::Sell => 0.0,
        }
    }

    /// True once the order has no remaining quantity or is marked filled.
    #[inline]
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.remaining_qty == 0 || self.state == OrderState::Filled
    }

    /// True while the order can still participate in matching.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            OrderState::Active | OrderState::PartiallyFilled
        )
    }

    /// Whether the order carries the market kind.
    #[inline]
    #[must_use]
    pub fn is_market_order(&self) -> bool {
        self.kind == OrderKind::Market
    }

    /// An iceberg still has hidden reserve behind its display.
    #[inline]
    #[must_use]
    pub fn is_iceberg(&self) -> bool {
        self.peak_size > 0 && self.hidden_qty > 0
    }

    /// Only GTC and DAY orders may rest; IOC and FOK execute or cancel.
    #[inline]
    #[must_use]
    pub fn can_rest_in_book(&self) -> bool {
        !self.is_market_order()
            && matches!(self.time_in_force, TimeInForce::Gtc | TimeInForce::Day)
    }

    /// Display exhausted while hidden reserve remains.
    #[inline]
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.display_qty == 0 && self.hidden_qty > 0
    }

    /// Reveals the next iceberg tranche. Refreshing assigns a new arrival
    /// stamp, so the order lands at the tail of its price level.
    pub fn refresh_display(&mut self, arrival_ns: u64) {
        if self.hidden_qty > 0 {
            let reveal = self.peak_size.min(self.hidden_qty);
            self.display_qty = reveal;
            self.hidden_qty -= reveal;
            self.arrival_ns = arrival_ns;
        }
    }

    /// Converts a latent stop into its active form.
    pub fn trigger_stop(&mut self, arrival_ns: u64) {
        if !self.is_stop || self.stop_triggered {
            return;
        }
        self.stop_triggered = true;
        self.is_stop = false;
        self.kind = self.stop_becomes;
        if self.kind == OrderKind::Market {
            self.price = Self::market_sentinel(self.side);
        }
        self.state = OrderState::Active;
        self.arrival_ns = arrival_ns;
    }
}
