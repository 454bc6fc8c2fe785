//! Convenience order-entry operations: construct and admit in one call.
//!
//! Each method builds the order, runs it through [`OrderBook::add_order`]
//! and returns the authoritative copy after matching, so callers can
//! inspect the immediate outcome.

use super::book::OrderBook;
use super::order::Order;
use super::types::{AccountId, OrderId, Side, TimeInForce};
use tracing::trace;

impl OrderBook {
    /// Adds a limit order.
    pub fn add_limit_order(
        &mut self,
        id: OrderId,
        account_id: AccountId,
        side: Side,
        price: f64,
        quantity: u64,
        time_in_force: TimeInForce,
    ) -> Option<Order> {
        trace!(id, %side, price, quantity, %time_in_force, "add limit order");
        self.add_order(Order::limit(id, account_id, side, price, quantity, time_in_force));
        self.order(id)
    }

    /// Submits a market order (never rests; GTC is coerced to IOC).
    pub fn add_market_order(
        &mut self,
        id: OrderId,
        account_id: AccountId,
        side: Side,
        quantity: u64,
    ) -> Option<Order> {
        trace!(id, %side, quantity, "add market order");
        self.add_order(Order::market(id, account_id, side, quantity, TimeInForce::Ioc));
        self.order(id)
    }

    /// Adds an iceberg order displaying `peak_size` of `total_qty`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_iceberg_order(
        &mut self,
        id: OrderId,
        account_id: AccountId,
        side: Side,
        price: f64,
        total_qty: u64,
        peak_size: u64,
        time_in_force: TimeInForce,
    ) -> Option<Order> {
        trace!(id, %side, price, total_qty, peak_size, "add iceberg order");
        self.add_order(Order::iceberg(
            id,
            account_id,
            side,
            price,
            total_qty,
            peak_size,
            time_in_force,
        ));
        self.order(id)
    }

    /// Adds a stop-market order latent until `stop_price` is crossed.
    pub fn add_stop_market_order(
        &mut self,
        id: OrderId,
        account_id: AccountId,
        side: Side,
        stop_price: f64,
        quantity: u64,
    ) -> Option<Order> {
        trace!(id, %side, stop_price, quantity, "add stop-market order");
        self.add_order(Order::stop_market(
            id,
            account_id,
            side,
            stop_price,
            quantity,
            TimeInForce::Gtc,
        ));
        self.order(id)
    }

    /// Adds a stop-limit order: fires at `stop_price`, works at
    /// `limit_price`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_stop_limit_order(
        &mut self,
        id: OrderId,
        account_id: AccountId,
        side: Side,
        stop_price: f64,
        limit_price: f64,
        quantity: u64,
    ) -> Option<Order> {
        trace!(id, %side, stop_price, limit_price, quantity, "add stop-limit order");
        self.add_order(Order::stop_limit(
            id,
            account_id,
            side,
            stop_price,
            limit_price,
            quantity,
            TimeInForce::Gtc,
        ));
        self.order(id)
    }
}
