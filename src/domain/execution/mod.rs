//! Execution domain - single-flight guard and two-leg coordinator

mod coordinator;
mod guard;

pub use coordinator::{ExecutionCoordinator, FailureKind, TradeOutcome, NO_INTERMEDIATE_BALANCE};
pub use guard::{FlightPermit, SingleFlightGuard};
