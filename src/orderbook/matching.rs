//! The matching engine: order admission, the price-time priority match
//! loop, iceberg refresh and time-in-force finalization.
//!
//! Matching repeatedly pops the best opposite entry, reconfirms it
//! against the authoritative store (discarding stale copies), executes a
//! trade at the passive price, and routes the raw fill. A routing
//! rejection (self-trade) cancels the aggressor and ends the pass.

use super::book::OrderBook;
use super::event::OrderEvent;
use super::fill::Fill;
use super::order::Order;
use super::types::{OrderState, Side, TimeInForce};
use crate::utils::monotonic_nanos;
use std::time::Instant;
use tracing::{debug, trace};

impl OrderBook {
    /// Admits a new order.
    ///
    /// Untriggered stops are evaluated once against the current reference
    /// price and either fire immediately or land in the stop maps.
    /// Everything else is inserted into the authoritative store and
    /// matched against the opposite side, then finalized per its
    /// time-in-force. Invalid orders (zero quantity, bad limit price,
    /// duplicate id) are marked rejected and dropped.
    pub fn add_order(&mut self, mut order: Order) {
        let started = Instant::now();

        if let Err(err) = self.validate(&order) {
            debug!(order_id = order.id, %err, "order rejected");
            order.state = OrderState::Rejected;
            self.orders.entry(order.id).or_insert(order);
            return;
        }

        let arrival = self.next_arrival_ns();
        order.arrival_ns = arrival;
        self.total_orders += 1;

        if self.logging_enabled {
            self.event_log.push(OrderEvent::New {
                timestamp_ns: arrival,
                order_id: order.id,
                side: order.side,
                kind: order.kind,
                time_in_force: order.time_in_force,
                price: order.price,
                quantity: order.quantity,
                peak_size: order.peak_size,
                account_id: order.account_id,
            });
        }

        if order.is_stop && !order.stop_triggered {
            self.admit_stop(order);
            self.record_latency(started);
            return;
        }

        trace!(
            order_id = order.id,
            side = %order.side,
            price = order.price,
            qty = order.quantity,
            "adding order"
        );
        order.state = OrderState::Active;
        self.orders.insert(order.id, order.clone());
        self.match_incoming(&mut order);
        self.record_latency(started);
    }

    /// Runs the matching pass for an order already present in the
    /// authoritative store, then finalizes per time-in-force. Also the
    /// entry point for freshly triggered stops.
    pub(super) fn match_incoming(&mut self, order: &mut Order) {
        if order.time_in_force == TimeInForce::Fok && !self.fok_can_fill(order) {
            debug!(order_id = order.id, qty = order.quantity, "FOK cancelled: cannot fill");
            order.state = OrderState::Cancelled;
            order.remaining_qty = 0;
            order.display_qty = 0;
            order.hidden_qty = 0;
            if let Some(mut stored) = self.orders.get_mut(&order.id) {
                stored.state = OrderState::Cancelled;
                stored.remaining_qty = 0;
                stored.display_qty = 0;
                stored.hidden_qty = 0;
            }
            return;
        }

        self.match_loop(order);
        self.finalize_after_matching(order);
    }

    /// Whether `aggressor` crosses `passive`.
    fn can_match(aggressor: &Order, passive: &Order) -> bool {
        if aggressor.is_market_order() {
            return true;
        }
        match aggressor.side {
            Side::Buy => aggressor.price >= passive.price,
            Side::Sell => aggressor.price <= passive.price,
        }
    }

    /// Pop / reconfirm / trade until the aggressor is done or the book
    /// side no longer crosses.
    fn match_loop(&mut self, aggressor: &mut Order) {
        let passive_side = aggressor.side.opposite();
        while aggressor.remaining_qty > 0 {
            let Some((key, passive_id)) = self.pop_best(passive_side) else {
                break;
            };

            // Authoritative snapshot; stale copies are simply discarded.
            let Some(mut passive) = self.confirm(passive_id, key.seq) else {
                continue;
            };

            if !Self::can_match(aggressor, &passive) {
                self.insert_resting(passive.side, passive.price, passive.arrival_ns, passive_id);
                break;
            }

            if !self.execute_trade(aggressor, &mut passive) {
                // Routing rejection: the aggressor was cancelled. The
                // passive is reinserted if it is still live.
                if let Some(current) = self.orders.get(&passive_id) {
                    if current.is_active() && current.remaining_qty > 0 {
                        let (price, seq) = (current.price, current.arrival_ns);
                        drop(current);
                        self.insert_resting(passive_side, price, seq, passive_id);
                    }
                }
                break;
            }

            if passive.needs_refresh() {
                // Reveal the next tranche and land at the tail of the
                // level: one logical step.
                let refresh_arrival = self.next_arrival_ns();
                passive.refresh_display(refresh_arrival);
                if let Some(mut stored) = self.orders.get_mut(&passive_id) {
                    stored.display_qty = passive.display_qty;
                    stored.hidden_qty = passive.hidden_qty;
                    stored.arrival_ns = passive.arrival_ns;
                }
                trace!(
                    order_id = passive_id,
                    display = passive.display_qty,
                    hidden = passive.hidden_qty,
                    "iceberg refreshed"
                );
                self.insert_resting(passive.side, passive.price, refresh_arrival, passive_id);
            } else if passive.remaining_qty > 0 && passive.display_qty > 0 {
                self.insert_resting(passive.side, passive.price, passive.arrival_ns, passive_id);
            }
        }
    }

    /// Executes one trade between the aggressor and a confirmed passive
    /// copy. Returns `false` when the router rejected the fill, in which
    /// case the aggressor has been cancelled.
    fn execute_trade(&mut self, aggressor: &mut Order, passive: &mut Order) -> bool {
        let passive_was_iceberg = passive.is_iceberg();
        let available = if passive_was_iceberg {
            passive.display_qty
        } else {
            passive.remaining_qty
        };
        let quantity = aggressor.remaining_qty.min(available);
        let price = passive.price;

        let (buy_id, sell_id, buy_account) = if aggressor.side == Side::Buy {
            (aggressor.id, passive.id, aggressor.account_id)
        } else {
            (passive.id, aggressor.id, passive.account_id)
        };

        let fill = Fill::new(buy_id, sell_id, price, quantity, monotonic_nanos());
        if !self.router.route_fill(&fill, aggressor, passive, &self.symbol) {
            debug!(
                aggressor = aggressor.id,
                passive = passive.id,
                "fill rejected; aggressor cancelled"
            );
            aggressor.state = OrderState::Cancelled;
            aggressor.remaining_qty = 0;
            aggressor.display_qty = 0;
            aggressor.hidden_qty = 0;
            if let Some(mut stored) = self.orders.get_mut(&aggressor.id) {
                stored.state = OrderState::Cancelled;
                stored.remaining_qty = 0;
                stored.display_qty = 0;
                stored.hidden_qty = 0;
            }
            return false;
        }

        self.fills.push(fill);
        if self.logging_enabled {
            self.event_log.push(OrderEvent::Fill {
                timestamp_ns: fill.timestamp_ns,
                order_id: buy_id,
                counterparty_id: sell_id,
                price,
                quantity,
                account_id: buy_account,
            });
        }

        // Debit both sides. Non-iceberg display tracks remaining; a
        // passive iceberg only loses display, an aggressing iceberg is
        // re-derived from its peak.
        aggressor.remaining_qty -= quantity;
        if aggressor.peak_size > 0 {
            aggressor.display_qty = aggressor.peak_size.min(aggressor.remaining_qty);
            aggressor.hidden_qty = aggressor.remaining_qty - aggressor.display_qty;
        } else {
            aggressor.display_qty = aggressor.remaining_qty;
        }
        passive.remaining_qty -= quantity;
        if passive_was_iceberg {
            passive.display_qty -= quantity;
        } else {
            passive.display_qty = passive.remaining_qty;
        }

        self.store_progress(aggressor);
        self.store_progress(passive);

        trace!(buy = buy_id, sell = sell_id, price, quantity, "trade executed");

        // The trade price may fire latent stops, which match immediately.
        self.check_stop_triggers(price);
        true
    }

    /// Writes quantity/state progress back into the authoritative store
    /// and mirrors the state onto the working copy.
    fn store_progress(&self, order: &mut Order) {
        let new_state = if order.remaining_qty == 0 {
            OrderState::Filled
        } else if order.remaining_qty < order.quantity {
            OrderState::PartiallyFilled
        } else {
            order.state
        };
        order.state = new_state;
        if let Some(mut stored) = self.orders.get_mut(&order.id) {
            if stored.state.is_terminal() {
                return;
            }
            stored.remaining_qty = order.remaining_qty;
            stored.display_qty = order.display_qty;
            stored.hidden_qty = order.hidden_qty;
            stored.state = new_state;
        }
    }

    /// TIF finalization after the matching pass.
    fn finalize_after_matching(&mut self, order: &mut Order) {
        // Do not overwrite a terminal outcome (e.g. an STP cancellation).
        if let Some(stored) = self.orders.get(&order.id) {
            if stored.state.is_terminal() {
                order.state = stored.state;
                return;
            }
        }

        if order.time_in_force == TimeInForce::Ioc {
            let state = if order.remaining_qty > 0 {
                OrderState::Cancelled
            } else {
                OrderState::Filled
            };
            order.state = state;
            if let Some(mut stored) = self.orders.get_mut(&order.id) {
                stored.state = state;
                if state == OrderState::Cancelled {
                    stored.remaining_qty = 0;
                    stored.display_qty = 0;
                    stored.hidden_qty = 0;
                }
            }
            return;
        }

        if order.remaining_qty == 0 {
            order.state = OrderState::Filled;
            return;
        }

        if order.can_rest_in_book() {
            let state = if order.remaining_qty < order.quantity {
                OrderState::PartiallyFilled
            } else {
                OrderState::Active
            };
            order.state = state;
            if let Some(mut stored) = self.orders.get_mut(&order.id) {
                stored.state = state;
            }
            self.insert_resting(order.side, order.price, order.arrival_ns, order.id);
        } else {
            // Market remainders and aborted FOKs cannot rest.
            order.state = OrderState::Cancelled;
            order.remaining_qty = 0;
            order.display_qty = 0;
            order.hidden_qty = 0;
            if let Some(mut stored) = self.orders.get_mut(&order.id) {
                stored.state = OrderState::Cancelled;
                stored.remaining_qty = 0;
                stored.display_qty = 0;
                stored.hidden_qty = 0;
            }
        }
    }

    /// FOK pre-check against a read-only view: aggregate confirmable
    /// opposite quantity at crossable prices.
    fn fok_can_fill(&self, order: &Order) -> bool {
        let map = match order.side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        };
        let mut available: u64 = 0;
        for entry in map.iter() {
            if available >= order.quantity {
                break;
            }
            let key = *entry.key();
            let Some(passive) = self.confirm(*entry.value(), key.seq) else {
                continue;
            };
            if !Self::can_match(order, &passive) {
                break;
            }
            available += passive.remaining_qty;
        }
        available >= order.quantity
    }
}
