//! Order-flow tracking: time-bucketed buy/sell volume windows and the
//! imbalance metric family.
//!
//! Fills are bucketed into walltime windows of a fixed duration (default
//! 60 s); a bounded deque of windows forms the history. Late or
//! out-of-order fills within the current bucket are accepted as-is.

use super::rolling::RollingWindow;
use crate::orderbook::{EnhancedFill, Side};
use crate::utils::monotonic_nanos;
use std::collections::{HashMap, VecDeque};

/// Samples retained for the imbalance history statistics.
pub const IMBALANCE_HISTORY_SIZE: usize = 1000;

/// Default number of windows retained (one hour of one-minute buckets).
pub const DEFAULT_MAX_WINDOWS: usize = 60;

/// One time bucket of order flow.
#[derive(Debug, Clone, Default)]
pub struct FlowWindow {
    /// Bucket start, monotonic nanoseconds.
    pub window_start_ns: u64,
    /// Aggressive buy volume.
    pub buy_volume: u64,
    /// Aggressive sell volume.
    pub sell_volume: u64,
    /// Number of buy-aggressor fills.
    pub buy_count: u64,
    /// Number of sell-aggressor fills.
    pub sell_count: u64,
    /// Buy notional.
    pub buy_notional: f64,
    /// Sell notional.
    pub sell_notional: f64,
}

/// Tracks order flow for one stream of fills.
pub struct OrderFlowTracker {
    windows: VecDeque<FlowWindow>,
    window_duration_ns: u64,
    max_windows: usize,
    imbalance_history: Box<RollingWindow<IMBALANCE_HISTORY_SIZE>>,
    total_buy_volume: u64,
    total_sell_volume: u64,
    total_buy_count: u64,
    total_sell_count: u64,
    total_buy_notional: f64,
    total_sell_notional: f64,
}

impl OrderFlowTracker {
    /// Creates a tracker with `window_seconds` buckets.
    #[must_use]
    pub fn new(window_seconds: u64) -> Self {
        Self {
            windows: VecDeque::new(),
            window_duration_ns: window_seconds.max(1) * 1_000_000_000,
            max_windows: DEFAULT_MAX_WINDOWS,
            imbalance_history: Box::default(),
            total_buy_volume: 0,
            total_sell_volume: 0,
            total_buy_count: 0,
            total_sell_count: 0,
            total_buy_notional: 0.0,
            total_sell_notional: 0.0,
        }
    }

    /// Caps the number of retained windows.
    pub fn set_max_windows(&mut self, max_windows: usize) {
        self.max_windows = max_windows.max(1);
        while self.windows.len() > self.max_windows {
            self.windows.pop_front();
        }
    }

    /// Changes the bucket duration for subsequently opened windows.
    pub fn set_window_duration(&mut self, seconds: u64) {
        self.window_duration_ns = seconds.max(1) * 1_000_000_000;
    }

    /// Records a fill, classified by aggressor side.
    pub fn record_fill(&mut self, fill: &EnhancedFill) {
        self.record_fill_at(fill, monotonic_nanos());
    }

    /// Records a fill at an explicit clock reading. Rotates the bucket
    /// when the window duration has elapsed and prunes the history.
    pub fn record_fill_at(&mut self, fill: &EnhancedFill, now_ns: u64) {
        let rotate = match self.windows.back() {
            None => true,
            Some(w) => now_ns.saturating_sub(w.window_start_ns) >= self.window_duration_ns,
        };
        if rotate {
            self.windows.push_back(FlowWindow {
                window_start_ns: now_ns,
                ..FlowWindow::default()
            });
            while self.windows.len() > self.max_windows {
                self.windows.pop_front();
            }
        }

        let current = self.windows.back_mut().expect("window just ensured");
        let quantity = fill.quantity();
        let notional = fill.price() * quantity as f64;
        if fill.aggressor_side == Side::Buy {
            current.buy_volume += quantity;
            current.buy_count += 1;
            current.buy_notional += notional;
            self.total_buy_volume += quantity;
            self.total_buy_count += 1;
            self.total_buy_notional += notional;
        } else {
            current.sell_volume += quantity;
            current.sell_count += 1;
            current.sell_notional += notional;
            self.total_sell_volume += quantity;
            self.total_sell_count += 1;
            self.total_sell_notional += notional;
        }

        let imbalance = self.current_imbalance();
        self.imbalance_history.add(imbalance);
    }

    /// Current window's volume imbalance: `(buy - sell) / (buy + sell)`.
    #[must_use]
    pub fn current_imbalance(&self) -> f64 {
        let Some(w) = self.windows.back() else {
            return 0.0;
        };
        let total = w.buy_volume + w.sell_volume;
        if total == 0 {
            0.0
        } else {
            (w.buy_volume as f64 - w.sell_volume as f64) / total as f64
        }
    }

    /// Volume imbalance aggregated over the most recent `num_windows`.
    #[must_use]
    pub fn imbalance(&self, num_windows: usize) -> f64 {
        let (mut buy, mut sell) = (0u64, 0u64);
        for w in self.windows.iter().rev().take(num_windows.max(1)) {
            buy += w.buy_volume;
            sell += w.sell_volume;
        }
        let total = buy + sell;
        if total == 0 {
            0.0
        } else {
            (buy as f64 - sell as f64) / total as f64
        }
    }

    /// Current window's trade-count imbalance.
    #[must_use]
    pub fn trade_count_imbalance(&self) -> f64 {
        let Some(w) = self.windows.back() else {
            return 0.0;
        };
        let total = w.buy_count + w.sell_count;
        if total == 0 {
            0.0
        } else {
            (w.buy_count as f64 - w.sell_count as f64) / total as f64
        }
    }

    /// Current window's notional-weighted imbalance.
    #[must_use]
    pub fn notional_imbalance(&self) -> f64 {
        let Some(w) = self.windows.back() else {
            return 0.0;
        };
        let total = w.buy_notional + w.sell_notional;
        if total == 0.0 {
            0.0
        } else {
            (w.buy_notional - w.sell_notional) / total
        }
    }

    /// Mean of the rolling imbalance history.
    #[must_use]
    pub fn average_imbalance(&self) -> f64 {
        self.imbalance_history.mean()
    }

    /// Standard deviation of the rolling imbalance history.
    #[must_use]
    pub fn imbalance_volatility(&self) -> f64 {
        self.imbalance_history.stddev()
    }

    /// Volume-weighted average price over the retained windows.
    #[must_use]
    pub fn vwap(&self) -> f64 {
        let mut notional = 0.0;
        let mut volume = 0u64;
        for w in &self.windows {
            notional += w.buy_notional + w.sell_notional;
            volume += w.buy_volume + w.sell_volume;
        }
        if volume == 0 {
            0.0
        } else {
            notional / volume as f64
        }
    }

    /// Fraction of retained volume that was aggressive buying; 0.5 with
    /// no data.
    #[must_use]
    pub fn buy_ratio(&self) -> f64 {
        let mut buy = 0u64;
        let mut total = 0u64;
        for w in &self.windows {
            buy += w.buy_volume;
            total += w.buy_volume + w.sell_volume;
        }
        if total == 0 {
            0.5
        } else {
            buy as f64 / total as f64
        }
    }

    /// The currently open window, if any.
    #[must_use]
    pub fn current_window(&self) -> Option<&FlowWindow> {
        self.windows.back()
    }

    /// Number of retained windows.
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Cumulative aggressive buy volume.
    #[must_use]
    pub fn total_buy_volume(&self) -> u64 {
        self.total_buy_volume
    }

    /// Cumulative aggressive sell volume.
    #[must_use]
    pub fn total_sell_volume(&self) -> u64 {
        self.total_sell_volume
    }

    /// Cumulative buy fill count.
    #[must_use]
    pub fn total_buy_count(&self) -> u64 {
        self.total_buy_count
    }

    /// Cumulative sell fill count.
    #[must_use]
    pub fn total_sell_count(&self) -> u64 {
        self.total_sell_count
    }

    /// Drops all flow data.
    pub fn clear(&mut self) {
        self.windows.clear();
        self.imbalance_history.clear();
        self.total_buy_volume = 0;
        self.total_sell_volume = 0;
        self.total_buy_count = 0;
        self.total_sell_count = 0;
        self.total_buy_notional = 0.0;
        self.total_sell_notional = 0.0;
    }
}

/// Per-symbol wrapper maintaining one tracker per traded symbol.
pub struct PerSymbolFlowTracker {
    trackers: HashMap<String, OrderFlowTracker>,
    window_seconds: u64,
    max_windows: usize,
}

impl PerSymbolFlowTracker {
    /// Creates the wrapper; new symbols get `window_seconds` buckets.
    #[must_use]
    pub fn new(window_seconds: u64) -> Self {
        Self {
            trackers: HashMap::new(),
            window_seconds,
            max_windows: DEFAULT_MAX_WINDOWS,
        }
    }

    /// Caps the windows retained by every tracker.
    pub fn set_max_windows(&mut self, max_windows: usize) {
        self.max_windows = max_windows;
        for tracker in self.trackers.values_mut() {
            tracker.set_max_windows(max_windows);
        }
    }

    /// Records a fill into its symbol's tracker.
    pub fn record_fill_at(&mut self, fill: &EnhancedFill, now_ns: u64) {
        let tracker = self
            .trackers
            .entry(fill.symbol.clone())
            .or_insert_with(|| {
                let mut t = OrderFlowTracker::new(self.window_seconds);
                t.set_max_windows(self.max_windows);
                t
            });
        tracker.record_fill_at(fill, now_ns);
    }

    /// The tracker for `symbol`, if any fills were seen.
    #[must_use]
    pub fn tracker(&self, symbol: &str) -> Option<&OrderFlowTracker> {
        self.trackers.get(symbol)
    }

    /// Current imbalance for `symbol`; 0 when unknown.
    #[must_use]
    pub fn imbalance(&self, symbol: &str) -> f64 {
        self.trackers
            .get(symbol)
            .map_or(0.0, OrderFlowTracker::current_imbalance)
    }

    /// All tracked symbols.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.trackers.keys().cloned().collect()
    }

    /// Number of tracked symbols.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.trackers.len()
    }

    /// Drops all trackers.
    pub fn clear(&mut self) {
        self.trackers.clear();
    }
}
