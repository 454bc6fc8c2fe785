//! Core order book: price-time priority structures, the authoritative
//! order store and the lifecycle operations that do not involve matching.
//!
//! Each side is a `SkipMap` keyed by `(price, arrival)`; bids store the
//! negated price so both sides pop best-first from the front. The skip
//! maps are never eagerly repaired: cancels, amendments and iceberg
//! refreshes leave stale keys behind, and every pop reconfirms the entry
//! against the authoritative `DashMap` before acting on it. An entry is
//! stale when the order is gone, terminal, carries a different arrival
//! stamp, or shows no display while quantity remains (a refresh in
//! flight).

use super::error::OrderBookError;
use super::event::OrderEvent;
use super::fill::Fill;
use super::order::Order;
use super::router::FillRouter;
use super::types::{OrderId, PriceLevel, Side};
use crate::perf::PerformanceMonitor;
use crate::utils::monotonic_nanos;
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Instant;
use tracing::{debug, trace};

/// Price-time key for the priority structures and the stop maps.
///
/// Ordered by price (IEEE total order), then arrival stamp. Bids negate
/// the price on insertion so ascending key order is priority order on
/// both sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct BookKey {
    pub(super) price: f64,
    pub(super) seq: u64,
}

impl BookKey {
    pub(super) fn new(price: f64, seq: u64) -> Self {
        Self { price, seq }
    }
}

impl Eq for BookKey {}

impl Ord for BookKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.price
            .total_cmp(&other.price)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for BookKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single-symbol, single-threaded limit order book with price-time
/// priority matching, stop orders, iceberg refresh and fill routing.
pub struct OrderBook {
    pub(super) symbol: String,

    /// Bid priority structure; keys carry the negated price.
    pub(super) bids: SkipMap<BookKey, OrderId>,
    /// Ask priority structure.
    pub(super) asks: SkipMap<BookKey, OrderId>,

    /// Authoritative store for live and recently-terminated orders.
    pub(super) orders: DashMap<OrderId, Order>,

    /// Latent stop-buys keyed by ascending stop price.
    pub(super) stop_buys: BTreeMap<BookKey, OrderId>,
    /// Latent stop-sells keyed by ascending stop price.
    pub(super) stop_sells: BTreeMap<BookKey, OrderId>,

    pub(super) last_trade_price: AtomicCell<f64>,
    pub(super) has_traded: AtomicBool,

    pub(super) router: FillRouter,
    /// Raw fills in match order; the snapshot FILLS section.
    pub(super) fills: Vec<Fill>,

    pub(super) event_log: Vec<OrderEvent>,
    pub(super) logging_enabled: bool,

    /// Strictly monotonic arrival stamp assigner.
    pub(super) arrival_clock: u64,
    /// Count of orders ever admitted.
    pub(super) total_orders: u64,

    pub(super) monitor: Option<Arc<PerformanceMonitor>>,
}

impl OrderBook {
    /// Creates an empty book for `symbol` with self-trade prevention on.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            orders: DashMap::new(),
            stop_buys: BTreeMap::new(),
            stop_sells: BTreeMap::new(),
            last_trade_price: AtomicCell::new(0.0),
            has_traded: AtomicBool::new(false),
            router: FillRouter::default(),
            fills: Vec::new(),
            event_log: Vec::new(),
            logging_enabled: false,
            arrival_clock: 0,
            total_orders: 0,
            monitor: None,
        }
    }

    /// The symbol this book trades.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Changes the book's symbol.
    pub fn set_symbol(&mut self, symbol: impl Into<String>) {
        self.symbol = symbol.into();
    }

    /// Shared access to the fill router (queries, statistics).
    #[must_use]
    pub fn fill_router(&self) -> &FillRouter {
        &self.router
    }

    /// Mutable access to the fill router (callback registration,
    /// configuration).
    pub fn fill_router_mut(&mut self) -> &mut FillRouter {
        &mut self.router
    }

    /// Toggles self-trade prevention on the router.
    pub fn enable_self_trade_prevention(&mut self, enable: bool) {
        self.router.set_self_trade_prevention(enable);
    }

    /// Enables fee computation with decimal maker/taker rates.
    pub fn set_fee_schedule(&mut self, maker_rate: f64, taker_rate: f64) {
        self.router.set_fee_schedule(maker_rate, taker_rate);
    }

    /// Attaches a performance monitor; `add_order` latency is recorded
    /// into it.
    pub fn set_monitor(&mut self, monitor: Arc<PerformanceMonitor>) {
        self.monitor = Some(monitor);
    }

    /// Enables event journaling.
    pub fn enable_logging(&mut self) {
        self.logging_enabled = true;
    }

    /// Disables event journaling.
    pub fn disable_logging(&mut self) {
        self.logging_enabled = false;
    }

    /// Whether event journaling is on.
    #[must_use]
    pub fn is_logging(&self) -> bool {
        self.logging_enabled
    }

    /// Journaled events since the last clear.
    #[must_use]
    pub fn events(&self) -> &[OrderEvent] {
        &self.event_log
    }

    /// Number of journaled events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.event_log.len()
    }

    /// Drops all journaled events (typically after a checkpoint).
    pub fn clear_events(&mut self) {
        self.event_log.clear();
    }

    /// Raw fills in match order.
    #[must_use]
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Last executed price, if any trade has occurred.
    #[must_use]
    pub fn last_trade_price(&self) -> Option<f64> {
        if self.has_traded.load(AtomicOrdering::Relaxed) {
            Some(self.last_trade_price.load())
        } else {
            None
        }
    }

    /// Count of orders ever admitted.
    #[must_use]
    pub fn total_orders(&self) -> u64 {
        self.total_orders
    }

    /// Latent (untriggered) stop orders.
    #[must_use]
    pub fn pending_stop_count(&self) -> usize {
        self.stop_buys.len() + self.stop_sells.len()
    }

    /// Authoritative copy of an order, live or recently terminated.
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.value().clone())
    }

    /// Account that owns `order_id`.
    #[must_use]
    pub fn order_account(&self, order_id: OrderId) -> Option<u64> {
        self.orders.get(&order_id).map(|o| o.account_id)
    }

    /// Assigns the next strictly monotonic arrival stamp.
    pub(super) fn next_arrival_ns(&mut self) -> u64 {
        let now = monotonic_nanos().max(self.arrival_clock + 1);
        self.arrival_clock = now;
        now
    }

    /// Inserts a resting order reference into its side's priority
    /// structure.
    pub(super) fn insert_resting(&self, side: Side, price: f64, seq: u64, id: OrderId) {
        let (map, key_price) = match side {
            Side::Buy => (&self.bids, -price),
            Side::Sell => (&self.asks, price),
        };
        map.insert(BookKey::new(key_price, seq), id);
    }

    /// Reconfirms a popped/peeked priority entry against the
    /// authoritative store. Returns the current order copy, or `None`
    /// when the entry is stale and must be discarded.
    pub(super) fn confirm(&self, id: OrderId, seq: u64) -> Option<Order> {
        let order = self.orders.get(&id)?;
        if !order.is_active() || order.arrival_ns != seq {
            return None;
        }
        // Refresh in flight: the live order is elsewhere in the queue.
        if order.display_qty == 0 && order.remaining_qty > 0 {
            return None;
        }
        if order.remaining_qty == 0 {
            return None;
        }
        Some(order.value().clone())
    }

    /// Pops the best entry of the given book side, if any.
    pub(super) fn pop_best(&self, book_side: Side) -> Option<(BookKey, OrderId)> {
        let map = match book_side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let entry = map.front()?;
        let key = *entry.key();
        let id = *entry.value();
        entry.remove();
        Some((key, id))
    }

    /// Best active order on one side, lazily purging stale entries.
    fn best_on(&self, book_side: Side) -> Option<Order> {
        let map = match book_side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        loop {
            let entry = map.front()?;
            let key = *entry.key();
            let id = *entry.value();
            match self.confirm(id, key.seq) {
                Some(order) => return Some(order),
                None => {
                    entry.remove();
                }
            }
        }
    }

    /// Best bid, or `None` for an empty bid side.
    #[must_use]
    pub fn best_bid(&self) -> Option<Order> {
        self.best_on(Side::Buy)
    }

    /// Best ask, or `None` for an empty ask side.
    #[must_use]
    pub fn best_ask(&self) -> Option<Order> {
        self.best_on(Side::Sell)
    }

    /// Ask minus bid; `None` unless both sides are populated.
    #[must_use]
    pub fn spread(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(ask.price - bid.price)
    }

    /// Mid price; `None` unless both sides are populated.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid.price + ask.price) / 2.0)
    }

    /// Aggregated price levels for one side, best-first, up to
    /// `max_levels` (0 = unlimited). Displayed quantity only.
    #[must_use]
    pub fn levels(&self, side: Side, max_levels: usize) -> Vec<PriceLevel> {
        let map = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        let mut out: Vec<PriceLevel> = Vec::new();
        for entry in map.iter() {
            let key = *entry.key();
            let Some(order) = self.confirm(*entry.value(), key.seq) else {
                continue;
            };
            let price = order.price;
            if let Some(level) = out.last_mut() {
                if level.price == price {
                    level.total_quantity += order.display_qty;
                    level.num_orders += 1;
                    continue;
                }
            }
            if max_levels > 0 && out.len() == max_levels {
                break;
            }
            out.push(PriceLevel {
                price,
                total_quantity: order.display_qty,
                num_orders: 1,
            });
        }
        out
    }

    /// Number of live (confirmable) orders on the bid side.
    #[must_use]
    pub fn active_bid_count(&self) -> usize {
        self.bids
            .iter()
            .filter(|e| self.confirm(*e.value(), e.key().seq).is_some())
            .count()
    }

    /// Number of live (confirmable) orders on the ask side.
    #[must_use]
    pub fn active_ask_count(&self) -> usize {
        self.asks
            .iter()
            .filter(|e| self.confirm(*e.value(), e.key().seq).is_some())
            .count()
    }

    /// Cancels an order. Terminal or unknown orders return `false`; the
    /// priority structures are not touched (stale-copy discipline).
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        let Some(mut order) = self.orders.get_mut(&order_id) else {
            trace!(order_id, "cancel of unknown order");
            return false;
        };
        if order.state.is_terminal() {
            return false;
        }
        order.state = super::types::OrderState::Cancelled;
        order.remaining_qty = 0;
        order.display_qty = 0;
        order.hidden_qty = 0;
        let account_id = order.account_id;
        drop(order);

        debug!(order_id, "order cancelled");
        if self.logging_enabled {
            self.event_log.push(OrderEvent::Cancel {
                timestamp_ns: monotonic_nanos(),
                order_id,
                account_id,
            });
        }
        true
    }

    /// Amends price and/or quantity. Amendment refreshes the arrival
    /// stamp: the order loses time priority and is re-keyed at the tail
    /// of its (possibly new) price level. Returns `false` for unknown or
    /// terminal orders.
    ///
    /// `new_quantity` replaces the remaining quantity; an amendment to
    /// zero cancels the order.
    pub fn amend_order(
        &mut self,
        order_id: OrderId,
        new_price: Option<f64>,
        new_quantity: Option<u64>,
    ) -> bool {
        if new_price.is_none() && new_quantity.is_none() {
            return self.orders.get(&order_id).is_some_and(|o| !o.state.is_terminal());
        }
        if new_quantity == Some(0) {
            return self.cancel_order(order_id);
        }

        let arrival = self.next_arrival_ns();
        let Some(mut order) = self.orders.get_mut(&order_id) else {
            return false;
        };
        if order.state.is_terminal() {
            return false;
        }

        if let Some(price) = new_price {
            order.price = price;
        }
        if let Some(qty) = new_quantity {
            let filled = order.quantity - order.remaining_qty;
            order.quantity = filled + qty;
            order.remaining_qty = qty;
            if order.peak_size > 0 {
                order.display_qty = order.peak_size.min(qty);
                order.hidden_qty = qty - order.display_qty;
            } else {
                order.display_qty = qty;
            }
        }
        order.arrival_ns = arrival;
        let (side, price, account_id) = (order.side, order.price, order.account_id);
        let resting = order.is_active() && !order.is_stop;
        drop(order);

        if resting {
            self.insert_resting(side, price, arrival, order_id);
        }
        debug!(order_id, ?new_price, ?new_quantity, "order amended");
        if self.logging_enabled {
            self.event_log.push(OrderEvent::Amend {
                timestamp_ns: monotonic_nanos(),
                order_id,
                new_price,
                new_quantity,
                account_id,
            });
        }
        true
    }

    /// Validates an order before admission. The matching core itself does
    /// not fail; this rejects malformed input at the boundary.
    pub(super) fn validate(&self, order: &Order) -> Result<(), OrderBookError> {
        if order.quantity == 0 {
            return Err(OrderBookError::InvalidOrder {
                order_id: order.id,
                message: "zero quantity".to_string(),
            });
        }
        if !order.is_market_order() && !(order.price > 0.0 && order.price.is_finite()) {
            return Err(OrderBookError::InvalidOrder {
                order_id: order.id,
                message: format!("non-positive limit price {}", order.price),
            });
        }
        if self.orders.contains_key(&order.id) {
            return Err(OrderBookError::InvalidOrder {
                order_id: order.id,
                message: "duplicate order id".to_string(),
            });
        }
        Ok(())
    }

    /// Records one `add_order` latency into the attached monitor.
    pub(super) fn record_latency(&self, started: Instant) {
        if let Some(monitor) = &self.monitor {
            let elapsed = started.elapsed().as_nanos() as u64;
            monitor.record_event_latency(elapsed);
            monitor.record_component_time("order_book.add_order", elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::{OrderState, TimeInForce};

    fn book() -> OrderBook {
        OrderBook::new("TEST")
    }

    #[test]
    fn empty_book_has_no_top() {
        let b = book();
        assert!(b.best_bid().is_none());
        assert!(b.best_ask().is_none());
        assert!(b.spread().is_none());
        assert!(b.mid_price().is_none());
    }

    #[test]
    fn book_key_orders_by_price_then_seq() {
        let a = BookKey::new(10.0, 5);
        let b = BookKey::new(10.0, 6);
        let c = BookKey::new(11.0, 1);
        assert!(a < b);
        assert!(b < c);
        assert!(BookKey::new(-11.0, 0) < BookKey::new(-10.0, 0));
    }

    #[test]
    fn top_of_book_and_spread() {
        let mut b = book();
        b.add_order(Order::limit(1, 1, Side::Buy, 99.0, 10, TimeInForce::Gtc));
        b.add_order(Order::limit(2, 1, Side::Buy, 100.0, 10, TimeInForce::Gtc));
        b.add_order(Order::limit(3, 2, Side::Sell, 101.0, 10, TimeInForce::Gtc));
        b.add_order(Order::limit(4, 2, Side::Sell, 102.0, 10, TimeInForce::Gtc));

        assert_eq!(b.best_bid().unwrap().id, 2);
        assert_eq!(b.best_ask().unwrap().id, 3);
        assert!((b.spread().unwrap() - 1.0).abs() < 1e-12);
        assert!((b.mid_price().unwrap() - 100.5).abs() < 1e-12);
    }

    #[test]
    fn cancel_twice_returns_true_then_false() {
        let mut b = book();
        b.add_order(Order::limit(1, 1, Side::Buy, 100.0, 10, TimeInForce::Gtc));
        assert!(b.cancel_order(1));
        assert!(!b.cancel_order(1));
        let o = b.order(1).unwrap();
        assert_eq!(o.state, OrderState::Cancelled);
        assert_eq!(o.remaining_qty, 0);
        assert!(b.best_bid().is_none());
    }

    #[test]
    fn cancel_unknown_is_false() {
        let mut b = book();
        assert!(!b.cancel_order(99));
    }

    #[test]
    fn amend_refreshes_priority() {
        let mut b = book();
        b.add_order(Order::limit(1, 1, Side::Buy, 100.0, 10, TimeInForce::Gtc));
        b.add_order(Order::limit(2, 1, Side::Buy, 100.0, 10, TimeInForce::Gtc));
        // Order 1 arrived first; amendment pushes it behind order 2.
        assert!(b.amend_order(1, None, Some(20)));
        assert_eq!(b.best_bid().unwrap().id, 2);

        let o = b.order(1).unwrap();
        assert_eq!(o.remaining_qty, 20);
        assert_eq!(o.quantity, 20);
    }

    #[test]
    fn amend_terminal_or_unknown_is_false() {
        let mut b = book();
        b.add_order(Order::limit(1, 1, Side::Buy, 100.0, 10, TimeInForce::Gtc));
        b.cancel_order(1);
        assert!(!b.amend_order(1, Some(101.0), None));
        assert!(!b.amend_order(42, Some(101.0), None));
    }

    #[test]
    fn amend_to_zero_quantity_cancels() {
        let mut b = book();
        b.add_order(Order::limit(1, 1, Side::Buy, 100.0, 10, TimeInForce::Gtc));
        assert!(b.amend_order(1, None, Some(0)));
        assert_eq!(b.order(1).unwrap().state, OrderState::Cancelled);
    }

    #[test]
    fn levels_aggregate_by_price() {
        let mut b = book();
        b.add_order(Order::limit(1, 1, Side::Sell, 101.0, 10, TimeInForce::Gtc));
        b.add_order(Order::limit(2, 1, Side::Sell, 101.0, 15, TimeInForce::Gtc));
        b.add_order(Order::limit(3, 1, Side::Sell, 102.0, 5, TimeInForce::Gtc));

        let levels = b.levels(Side::Sell, 0);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price, 101.0);
        assert_eq!(levels[0].total_quantity, 25);
        assert_eq!(levels[0].num_orders, 2);
        assert_eq!(levels[1].price, 102.0);

        let capped = b.levels(Side::Sell, 1);
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn levels_show_only_display_quantity() {
        let mut b = book();
        b.add_order(Order::iceberg(1, 1, Side::Sell, 101.0, 1000, 100, TimeInForce::Gtc));
        let levels = b.levels(Side::Sell, 0);
        assert_eq!(levels[0].total_quantity, 100);
    }

    #[test]
    fn arrival_stamps_strictly_increase() {
        let mut b = book();
        let a = b.next_arrival_ns();
        let c = b.next_arrival_ns();
        assert!(c > a);
    }
}
