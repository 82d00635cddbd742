//! Arbitrage domain - strategy evaluation and profit model

pub mod evaluator;
pub mod profit_calculator;

pub use evaluator::{EvaluationResult, Evaluator};
pub use profit_calculator::ProfitCalculator;
