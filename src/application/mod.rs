//! Application layer - engine, scheduling and reporting

pub mod engine;
pub mod report;
pub mod scheduler;

pub use engine::{ArbitrageEngine, CycleOutcome, EngineSettings};
pub use report::ReportSnapshot;
pub use scheduler::{Scheduler, SchedulerSettings, TriggerSink};
