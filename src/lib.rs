//! Spatial arbitrage between two Solana venues for one token pair
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{ArbitrageEngine, Scheduler};
pub use domain::arbitrage::Evaluator;
pub use domain::execution::{ExecutionCoordinator, SingleFlightGuard};
pub use domain::ledger::Ledger;
