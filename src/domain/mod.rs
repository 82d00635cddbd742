//! Domain layer - evaluation, execution and bookkeeping

pub mod arbitrage;
pub mod execution;
pub mod ledger;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;
