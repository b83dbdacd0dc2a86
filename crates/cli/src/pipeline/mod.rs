//! Demo composition orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{DemoConfig, DemoPipeline};
pub use stats::{DemoStats, StepRow};
