//! Microstructure analytics: rolling statistics, order-flow imbalance,
//! least-squares regression and market-impact calibration.

mod flow;
mod hub;
mod impact;
mod regression;
mod rolling;

pub use flow::{
    DEFAULT_MAX_WINDOWS, FlowWindow, IMBALANCE_HISTORY_SIZE, OrderFlowTracker,
    PerSymbolFlowTracker,
};
pub use hub::{
    AnalyticsConfig, IMPACT_HISTORY_SIZE, MicrostructureAnalytics, PRICE_HISTORY_SIZE,
    PriceImpactObservation, TradeMetrics,
};
pub use impact::{
    CalibratorConfig, ImpactCalibrator, ImpactModelParams, MarketImpactModel,
};
pub use regression::{
    RegressionError, RegressionResult, correlation, linear_regression, weighted_linear_regression,
};
pub use rolling::RollingWindow;
