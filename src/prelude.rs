//! Prelude re-exporting the types most programs need.
//!
//! ```rust
//! use microstructure_engine::prelude::*;
//! ```

// Order book core
pub use crate::orderbook::{
    AccountId, BookSnapshot, EnhancedFill, Fill, FillCallback, FillRouter, LiquidityFlag, Order,
    OrderBook, OrderBookError, OrderEvent, OrderId, OrderKind, OrderState, PriceLevel, Side,
    StopRecord, TimeInForce,
};

// Analytics
pub use crate::analytics::{
    AnalyticsConfig, CalibratorConfig, ImpactCalibrator, ImpactModelParams, MarketImpactModel,
    MicrostructureAnalytics, OrderFlowTracker, RegressionResult, RollingWindow, TradeMetrics,
};

// Execution scheduling
pub use crate::execution::{
    AggressiveTimeSliced, ExecutionAlgorithm, ExecutionCore, ExecutionReport, ExecutionSimulator,
    MarketSnapshot, RiskAware, SimulationConfig, SimulationResult, TimeSliced, VolumeProfile,
    VolumeWeighted,
};

// Hot-path support
pub use crate::perf::{Arena, ObjectPool, PerformanceMonitor};
pub use crate::queues::{SpmcQueue, SpscQueue};

// Feed boundary
pub use crate::feed::{MarketTick, WireLevel, WireMessage};

// Clocks
pub use crate::{current_time_millis, monotonic_nanos};
