//! Stop-order admission and trigger sweeps.
//!
//! A latent stop lives in one of two side maps keyed by ascending stop
//! price and indexed in the authoritative store. The reference price is
//! the last trade when one exists; in an empty trade history it is
//! synthesized side-conservatively from the top of book. Every trade
//! sweeps both maps and fires all stops crossed by the new trade price;
//! triggered stops match immediately at that point.

use super::book::{BookKey, OrderBook};
use super::order::Order;
use super::types::{OrderId, Side};
use std::sync::atomic::Ordering as AtomicOrdering;
use tracing::debug;

impl OrderBook {
    /// Admits an untriggered stop order: fires it immediately when the
    /// current reference price already crosses the stop, otherwise parks
    /// it in the stop map.
    pub(super) fn admit_stop(&mut self, order: Order) {
        if self.stop_should_trigger_now(&order) {
            let reference = self.reference_price(order.side);
            debug!(
                order_id = order.id,
                stop_price = order.stop_price,
                reference,
                "stop triggered at submission"
            );
            self.fire_stop(order);
            return;
        }

        let key = BookKey::new(order.stop_price, order.arrival_ns);
        let (id, side) = (order.id, order.side);
        self.orders.insert(id, order);
        match side {
            Side::Buy => self.stop_buys.insert(key, id),
            Side::Sell => self.stop_sells.insert(key, id),
        };
    }

    /// Reference price for trigger evaluation on `side`.
    ///
    /// Prefers the last trade. With no trade history, synthesizes
    /// side-conservatively from the top of book: the lowest available
    /// signal for a sell stop, the highest for a buy stop. `NaN` means
    /// no reference exists (truly empty market).
    pub(super) fn reference_price(&self, side: Side) -> f64 {
        if self.has_traded.load(AtomicOrdering::Relaxed) {
            return self.last_trade_price.load();
        }
        let bid = self.best_bid().map(|o| o.price);
        let ask = self.best_ask().map(|o| o.price);
        match (bid, ask, side) {
            (Some(b), Some(a), Side::Sell) => b.min(a),
            (Some(b), Some(a), Side::Buy) => b.max(a),
            (Some(b), None, _) => b,
            (None, Some(a), _) => a,
            (None, None, _) => f64::NAN,
        }
    }

    /// Whether a latent stop should fire against the current reference.
    fn stop_should_trigger_now(&self, order: &Order) -> bool {
        if !order.is_stop || order.stop_triggered {
            return false;
        }
        let reference = self.reference_price(order.side);
        if reference.is_nan() {
            return false;
        }
        match order.side {
            // Sell stop fires when the price falls to or through it.
            Side::Sell => reference <= order.stop_price,
            // Buy stop fires when the price rises to or through it.
            Side::Buy => reference >= order.stop_price,
        }
    }

    /// Converts a stop into its active form and runs it through matching.
    fn fire_stop(&mut self, mut order: Order) {
        let arrival = self.next_arrival_ns();
        order.trigger_stop(arrival);
        self.orders.insert(order.id, order.clone());
        self.match_incoming(&mut order);
    }

    /// Records the trade price and fires every stop it crosses. Called
    /// after each executed trade; triggered stops match immediately and
    /// may recursively trigger further stops.
    pub(crate) fn check_stop_triggers(&mut self, trade_price: f64) {
        self.last_trade_price.store(trade_price);
        self.has_traded.store(true, AtomicOrdering::Relaxed);

        if self.stop_buys.is_empty() && self.stop_sells.is_empty() {
            return;
        }

        let mut triggered: Vec<OrderId> = Vec::new();

        // Buy stops fire at stop_price <= trade_price.
        let boundary = BookKey::new(trade_price, u64::MAX);
        let untriggered = self.stop_buys.split_off(&boundary);
        let fired = std::mem::replace(&mut self.stop_buys, untriggered);
        triggered.extend(fired.into_values());

        // Sell stops fire at stop_price >= trade_price.
        let boundary = BookKey::new(trade_price, 0);
        let fired = self.stop_sells.split_off(&boundary);
        triggered.extend(fired.into_values());

        for id in triggered {
            let Some(stored) = self.orders.get(&id) else {
                continue;
            };
            // Cancelled while latent.
            if stored.state.is_terminal() || stored.stop_triggered {
                continue;
            }
            let order = stored.value().clone();
            drop(stored);
            debug!(order_id = id, trade_price, "stop triggered on trade");
            self.fire_stop(order);
        }
    }
}
