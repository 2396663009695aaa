//! The alert engine: rule evaluation and cycle orchestration.

pub mod evaluator;
pub mod orchestrator;

pub use orchestrator::MonitoringOrchestrator;
