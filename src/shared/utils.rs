//! Utility functions and helpers

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;

/// Convert a UI amount into atomic token units (truncating dust).
pub fn to_atomic(amount: Decimal, decimals: u8) -> Option<u64> {
    if amount.is_sign_negative() {
        return None;
    }
    let scale = Decimal::from(10u64.checked_pow(decimals as u32)?);
    amount.checked_mul(scale)?.trunc().to_u64()
}

/// Convert atomic token units into a UI amount.
pub fn from_atomic(amount: u64, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, decimals as u32).normalize()
}

/// Lossy conversion used for feeds that deliver floats.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}

/// Calculate percentage change
pub fn percentage_change(old_value: Decimal, new_value: Decimal) -> Option<Decimal> {
    if old_value.is_zero() {
        return None;
    }
    Some((new_value - old_value) / old_value * Decimal::ONE_HUNDRED)
}

/// Run `fut` with a deadline, mapping expiry onto the caller's error type.
pub async fn with_timeout<T, E, F>(limit: Duration, on_timeout: impl FnOnce() -> E, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
