//! Execution scheduling: the algorithm framework, the three slicing
//! strategies and the market simulator.

mod algorithm;
mod risk_aware;
mod simulator;
mod time_sliced;
mod volume_weighted;

pub use algorithm::{ExecutionAlgorithm, ExecutionCore, ExecutionReport, MarketSnapshot};
pub use risk_aware::RiskAware;
pub use simulator::{ExecutionSimulator, SimulationConfig, SimulationResult};
pub use time_sliced::{AggressiveTimeSliced, TimeSliced};
pub use volume_weighted::{VolumeProfile, VolumeWeighted};
