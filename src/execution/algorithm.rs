//! The execution-scheduler framework.
//!
//! An algorithm consumes market-data snapshots, emits child orders on a
//! slicing schedule, consumes its own fills, and reports implementation
//! shortfall. Polymorphism is a capability set: every scheduler embeds
//! an [`ExecutionCore`] carrying the shared lifecycle state and
//! implements [`ExecutionAlgorithm::compute_child_orders`] for its
//! slicing logic; the trait's provided methods supply the common
//! arrival-capture, fill-ingest and reporting behavior.

use crate::orderbook::{AccountId, Fill, Order, OrderId, Side, TimeInForce};
use serde::Serialize;
use tracing::trace;

/// One market-data snapshot as consumed by the schedulers.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    /// Mid or last-trade price.
    pub price: f64,
    /// Best bid.
    pub bid_price: f64,
    /// Best ask.
    pub ask_price: f64,
    /// Ask minus bid.
    pub spread: f64,
    /// Displayed volume at the best bid.
    pub bid_volume: u64,
    /// Displayed volume at the best ask.
    pub ask_volume: u64,
    /// Cumulative traded volume.
    pub total_volume: u64,
    /// Snapshot time, monotonic nanoseconds.
    pub timestamp_ns: u64,
    /// Symbol.
    pub symbol: String,
}

impl MarketSnapshot {
    /// Snapshot from top-of-book quotes; `price` becomes the mid.
    #[must_use]
    pub fn from_quotes(
        bid: f64,
        ask: f64,
        bid_volume: u64,
        ask_volume: u64,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            price: (bid + ask) / 2.0,
            bid_price: bid,
            ask_price: ask,
            spread: ask - bid,
            bid_volume,
            ask_volume,
            total_volume: 0,
            timestamp_ns,
            symbol: String::new(),
        }
    }

    /// Snapshot from a single trade price.
    #[must_use]
    pub fn from_price(price: f64, total_volume: u64, timestamp_ns: u64) -> Self {
        Self {
            price,
            bid_price: price,
            ask_price: price,
            spread: 0.0,
            bid_volume: 0,
            ask_volume: 0,
            total_volume,
            timestamp_ns,
            symbol: String::new(),
        }
    }
}

/// Post-execution performance report.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Name of the scheduler that produced it.
    pub algorithm_name: String,
    /// Price when execution started.
    pub arrival_price: f64,
    /// Volume-weighted average fill price.
    pub avg_execution_price: f64,
    /// Cost versus arrival in basis points, sign-adjusted by side
    /// (positive is adverse for both buys and sells).
    pub implementation_shortfall_bps: f64,
    /// Child orders emitted.
    pub num_child_orders: u64,
    /// Fills received.
    pub num_fills: usize,
    /// Quantity executed.
    pub executed_quantity: u64,
    /// Quantity targeted.
    pub target_quantity: u64,
    /// `executed / target`.
    pub fill_rate: f64,
    /// First fill to last fill, nanoseconds.
    pub execution_time_ns: u64,
}

/// Shared lifecycle state embedded by every scheduler.
#[derive(Debug, Clone)]
pub struct ExecutionCore {
    name: String,
    account_id: AccountId,
    next_order_id: OrderId,
    /// Quantity to execute.
    pub target_quantity: u64,
    /// Buy (true) or sell (false) execution.
    pub is_buy: bool,
    /// Quantity executed so far.
    pub executed_quantity: u64,
    /// Price at the first snapshot.
    pub arrival_price: f64,
    /// Whether the first snapshot has been seen.
    pub started: bool,
    /// Time of the first snapshot.
    pub start_time_ns: u64,
    fills: Vec<Fill>,
    /// Child orders emitted so far.
    pub orders_generated: u64,
    /// Emit limit orders instead of market orders.
    pub use_limit_orders: bool,
    /// Offset applied to limit prices, in basis points of the snapshot
    /// price.
    pub limit_offset_bps: f64,
}

impl ExecutionCore {
    /// Creates core state for a scheduler named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, target_quantity: u64, is_buy: bool) -> Self {
        Self {
            name: name.into(),
            account_id: 1,
            next_order_id: 1,
            target_quantity,
            is_buy,
            executed_quantity: 0,
            arrival_price: 0.0,
            started: false,
            start_time_ns: 0,
            fills: Vec::new(),
            orders_generated: 0,
            use_limit_orders: false,
            limit_offset_bps: 0.0,
        }
    }

    /// Scheduler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Account stamped onto child orders.
    pub fn set_account_id(&mut self, account_id: AccountId) {
        self.account_id = account_id;
    }

    /// First child-order id to assign.
    pub fn set_starting_order_id(&mut self, id: OrderId) {
        self.next_order_id = id;
    }

    /// Execution side.
    #[must_use]
    pub fn side(&self) -> Side {
        if self.is_buy { Side::Buy } else { Side::Sell }
    }

    /// Quantity still to execute.
    #[must_use]
    pub fn remaining_quantity(&self) -> u64 {
        self.target_quantity.saturating_sub(self.executed_quantity)
    }

    /// Execution progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.target_quantity == 0 {
            return 1.0;
        }
        self.executed_quantity as f64 / self.target_quantity as f64
    }

    /// Whether the target has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.executed_quantity >= self.target_quantity
    }

    /// Caps a requested quantity at the remaining amount.
    #[must_use]
    pub fn clamp_to_remaining(&self, requested: u64) -> u64 {
        requested.min(self.remaining_quantity())
    }

    /// Fills received so far.
    #[must_use]
    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Ingests a fill.
    pub fn record_fill(&mut self, fill: &Fill) {
        self.executed_quantity += fill.quantity;
        self.fills.push(*fill);
    }

    /// Volume-weighted average fill price; 0 with no fills.
    #[must_use]
    pub fn fill_vwap(&self) -> f64 {
        if self.executed_quantity == 0 {
            return 0.0;
        }
        let notional: f64 = self.fills.iter().map(Fill::notional).sum();
        notional / self.executed_quantity as f64
    }

    /// Emits a market child order.
    pub fn market_child(&mut self, quantity: u64) -> Order {
        self.orders_generated += 1;
        let id = self.next_order_id;
        self.next_order_id += 1;
        trace!(id, quantity, side = %self.side(), "market child order");
        Order::market(id, self.account_id, self.side(), quantity, TimeInForce::Ioc)
    }

    /// Emits a limit child order.
    pub fn limit_child(&mut self, price: f64, quantity: u64) -> Order {
        self.orders_generated += 1;
        let id = self.next_order_id;
        self.next_order_id += 1;
        trace!(id, price, quantity, side = %self.side(), "limit child order");
        Order::limit(id, self.account_id, self.side(), price, quantity, TimeInForce::Gtc)
    }

    /// Emits the configured order type for one slice: a market order, or
    /// a limit order priced off the touch with the configured offset
    /// (`ask + offset` for buys, `bid - offset` for sells).
    pub fn slice_order(&mut self, data: &MarketSnapshot, quantity: u64) -> Order {
        if self.use_limit_orders {
            let offset = data.price * (self.limit_offset_bps / 10_000.0);
            let mut price = if self.is_buy {
                data.ask_price + offset
            } else {
                data.bid_price - offset
            };
            if price <= 0.0 {
                price = data.price;
            }
            self.limit_child(price, quantity)
        } else {
            self.market_child(quantity)
        }
    }

    /// Builds the performance report.
    #[must_use]
    pub fn report(&self) -> ExecutionReport {
        let avg_execution_price = self.fill_vwap();

        let mut shortfall = 0.0;
        if self.arrival_price > 0.0 && avg_execution_price > 0.0 {
            shortfall =
                (avg_execution_price - self.arrival_price) / self.arrival_price * 10_000.0;
            if !self.is_buy {
                shortfall = -shortfall;
            }
        }

        let execution_time_ns = match (self.fills.first(), self.fills.last()) {
            (Some(first), Some(last)) => last.timestamp_ns.saturating_sub(first.timestamp_ns),
            _ => 0,
        };

        ExecutionReport {
            algorithm_name: self.name.clone(),
            arrival_price: self.arrival_price,
            avg_execution_price,
            implementation_shortfall_bps: shortfall,
            num_child_orders: self.orders_generated,
            num_fills: self.fills.len(),
            executed_quantity: self.executed_quantity,
            target_quantity: self.target_quantity,
            fill_rate: if self.target_quantity > 0 {
                self.executed_quantity as f64 / self.target_quantity as f64
            } else {
                0.0
            },
            execution_time_ns,
        }
    }

    /// Resets lifecycle state for reuse (target and side are retained).
    pub fn reset(&mut self) {
        self.executed_quantity = 0;
        self.arrival_price = 0.0;
        self.started = false;
        self.start_time_ns = 0;
        self.fills.clear();
        self.orders_generated = 0;
    }

    /// Resets with a new target and side.
    pub fn reset_with_target(&mut self, target_quantity: u64, is_buy: bool) {
        self.reset();
        self.target_quantity = target_quantity;
        self.is_buy = is_buy;
    }
}

/// Equal-interval slice timing shared by the schedulers: the first
/// slice fires immediately, later slices once `slice_interval` has
/// elapsed since the previous one.
#[derive(Debug, Clone)]
pub(crate) struct SliceSchedule {
    pub duration_ns: u64,
    pub slice_interval_ns: u64,
    pub num_slices: usize,
    pub current_slice: usize,
    pub last_slice_time_ns: u64,
}

impl SliceSchedule {
    pub fn new(duration: std::time::Duration, num_slices: usize) -> Self {
        let num_slices = num_slices.max(1);
        let duration_ns = duration.as_nanos() as u64;
        Self {
            duration_ns,
            slice_interval_ns: duration_ns / num_slices as u64,
            num_slices,
            current_slice: 0,
            last_slice_time_ns: 0,
        }
    }

    pub fn is_time_for_slice(&self, now_ns: u64) -> bool {
        if self.current_slice == 0 {
            return true;
        }
        now_ns.saturating_sub(self.last_slice_time_ns) >= self.slice_interval_ns
    }

    pub fn advance(&mut self, now_ns: u64) {
        self.current_slice += 1;
        self.last_slice_time_ns = now_ns;
    }

    pub fn is_last_slice(&self) -> bool {
        self.current_slice >= self.num_slices - 1
    }

    pub fn slices_remaining(&self) -> usize {
        self.num_slices.saturating_sub(self.current_slice).max(1)
    }

    pub fn reset(&mut self) {
        self.current_slice = 0;
        self.last_slice_time_ns = 0;
    }
}

/// Capability set implemented by every execution scheduler.
pub trait ExecutionAlgorithm {
    /// Shared lifecycle state.
    fn core(&self) -> &ExecutionCore;

    /// Mutable shared lifecycle state.
    fn core_mut(&mut self) -> &mut ExecutionCore;

    /// Variant-specific slicing logic.
    fn compute_child_orders(&mut self, data: &MarketSnapshot) -> Vec<Order>;

    /// Scheduler name.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Feeds one snapshot: records arrival on the first call, returns
    /// nothing once complete, otherwise delegates to
    /// [`Self::compute_child_orders`].
    fn on_market_data(&mut self, data: &MarketSnapshot) -> Vec<Order> {
        let core = self.core_mut();
        if !core.started {
            core.started = true;
            core.start_time_ns = data.timestamp_ns;
            core.arrival_price = data.price;
        }
        if core.is_complete() {
            return Vec::new();
        }
        self.compute_child_orders(data)
    }

    /// Ingests a fill for one of this scheduler's child orders.
    fn on_fill(&mut self, fill: &Fill) {
        self.core_mut().record_fill(fill);
    }

    /// Resets for reuse. Implementations with slice state must also
    /// clear it.
    fn reset(&mut self) {
        self.core_mut().reset();
    }

    /// Builds the performance report.
    fn generate_report(&self) -> ExecutionReport {
        self.core().report()
    }
}
