//! # Microstructure Matching Engine
//!
//! A single-venue, single-threaded limit-order-book matching engine
//! with real-time microstructure analytics and execution scheduling.
//!
//! ## Components
//!
//! - **Order book core** ([`orderbook`]): price-time priority matching
//!   for limit, market, iceberg and stop orders under GTC/IOC/FOK/DAY
//!   time-in-force, with self-trade prevention, fill routing, event
//!   journaling and snapshot recovery. Cancels and amendments never
//!   touch the priority structures eagerly; stale entries are skipped
//!   at match time against the authoritative order store.
//! - **Analytics** ([`analytics`]): fixed-capacity rolling statistics,
//!   order-flow imbalance windows, OLS/weighted-OLS regression, and a
//!   power-law market-impact model with a log-log calibrator.
//! - **Execution** ([`execution`]): a polymorphic scheduler framework
//!   with time-sliced, volume-weighted and risk-aware (Almgren-Chriss)
//!   strategies, plus a GBM simulator with probabilistic limit fills
//!   and temporary-impact feedback.
//! - **Hot-path support** ([`perf`], [`queues`]): bump arena, object
//!   pool, lock-free latency histograms, and SPSC/SPMC rings for
//!   inter-stage hand-off.
//! - **Feed boundary** ([`feed`]): the binary wire codec and
//!   market-data CSV replay parser.
//!
//! ## Design notes
//!
//! One symbol per book instance, one matching thread per book. Hot
//! paths do not block, take locks or allocate from the general heap;
//! the rings exist so an external transport thread can hand data into
//! the matching thread. Ordering and latency use a monotonic clock;
//! wall time appears only in snapshot metadata.
//!
//! ## Example
//!
//! ```
//! use microstructure_engine::prelude::*;
//!
//! let mut book = OrderBook::new("DEMO");
//! book.add_limit_order(1, 1, Side::Buy, 100.0, 100, TimeInForce::Gtc);
//! let crossed = book
//!     .add_limit_order(2, 2, Side::Sell, 100.0, 100, TimeInForce::Gtc)
//!     .unwrap();
//! assert_eq!(crossed.state, OrderState::Filled);
//! assert_eq!(book.fill_router().total_fills(), 1);
//! ```

pub mod analytics;
pub mod execution;
pub mod feed;
pub mod orderbook;
pub mod perf;
pub mod prelude;
pub mod queues;
mod utils;

pub use analytics::{
    ImpactCalibrator, ImpactModelParams, MarketImpactModel, MicrostructureAnalytics,
    RollingWindow,
};
pub use execution::{
    AggressiveTimeSliced, ExecutionAlgorithm, ExecutionReport, ExecutionSimulator, MarketSnapshot,
    RiskAware, SimulationConfig, TimeSliced, VolumeProfile, VolumeWeighted,
};
pub use feed::{MarketTick, WireMessage};
pub use orderbook::{
    BookSnapshot, EnhancedFill, Fill, FillRouter, LiquidityFlag, Order, OrderBook, OrderBookError,
    OrderEvent, OrderId, OrderKind, OrderState, Side, TimeInForce,
};
pub use perf::{Arena, ObjectPool, PerformanceMonitor};
pub use queues::{SpmcQueue, SpscQueue};
pub use utils::{current_time_millis, monotonic_nanos};
