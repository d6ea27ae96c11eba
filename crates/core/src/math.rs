//! WAD fixed-point arithmetic.
//!
//! All amounts, rates, factors and prices are [`U256`] values. Ratios are scaled
//! by [`WAD`] (1e18). Every product is taken in 512 bits before dividing, so
//! `x * y / d` never loses precision to an intermediate overflow, and every
//! helper states its rounding direction.

use alloy_primitives::{U256, U512};

use crate::error::LendingError;

/// 1e18, the fixed-point unit.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Blocks per year at a 15 second block time.
pub const BLOCKS_PER_YEAR: u64 = 2_102_400;

/// Rounding direction for divisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingDirection {
    Up,
    Down,
}

fn widen(x: U256) -> U512 {
    let l = x.as_limbs();
    U512::from_limbs([l[0], l[1], l[2], l[3], 0, 0, 0, 0])
}

fn narrow(x: U512) -> Result<U256, LendingError> {
    let l = x.as_limbs();
    if l[4..].iter().any(|limb| *limb != 0) {
        return Err(LendingError::ArithmeticOverflow);
    }
    Ok(U256::from_limbs([l[0], l[1], l[2], l[3]]))
}

fn div_rounding(
    numerator: U512,
    denominator: U512,
    rounding: RoundingDirection,
) -> Result<U256, LendingError> {
    if denominator.is_zero() {
        return Err(LendingError::DivisionByZero);
    }
    let quotient = numerator / denominator;
    let quotient = match rounding {
        RoundingDirection::Up if !(numerator % denominator).is_zero() => {
            quotient + U512::from(1u64)
        }
        _ => quotient,
    };
    narrow(quotient)
}

/// Computes `x * y / d` with the given rounding.
pub fn mul_div(x: U256, y: U256, d: U256, rounding: RoundingDirection) -> Result<U256, LendingError> {
    div_rounding(widen(x) * widen(y), widen(d), rounding)
}

/// `x * y / d`, rounded down
pub fn mul_div_down(x: U256, y: U256, d: U256) -> Result<U256, LendingError> {
    mul_div(x, y, d, RoundingDirection::Down)
}

/// `x * y / d`, rounded up
pub fn mul_div_up(x: U256, y: U256, d: U256) -> Result<U256, LendingError> {
    mul_div(x, y, d, RoundingDirection::Up)
}

/// `x * y / WAD`, rounded down
pub fn w_mul_down(x: U256, y: U256) -> Result<U256, LendingError> {
    mul_div_down(x, y, WAD)
}

/// `x * y / WAD`, rounded up
pub fn w_mul_up(x: U256, y: U256) -> Result<U256, LendingError> {
    mul_div_up(x, y, WAD)
}

/// `x * WAD / y`, rounded down
pub fn w_div_down(x: U256, y: U256) -> Result<U256, LendingError> {
    mul_div_down(x, WAD, y)
}

/// `x * WAD / y`, rounded up
pub fn w_div_up(x: U256, y: U256) -> Result<U256, LendingError> {
    mul_div_up(x, WAD, y)
}

/// Computes `(n1 * n2 * ...) / (d1 * d2 * ...)`, rounded down.
///
/// Both products are accumulated in 512 bits; an overflow there or in the
/// final quotient is reported instead of wrapped.
pub fn product_ratio_down(numerators: &[U256], denominators: &[U256]) -> Result<U256, LendingError> {
    let product = |factors: &[U256]| -> Result<U512, LendingError> {
        factors.iter().try_fold(U512::from(1u64), |acc, factor| {
            acc.checked_mul(widen(*factor))
                .ok_or(LendingError::ArithmeticOverflow)
        })
    };
    div_rounding(
        product(numerators)?,
        product(denominators)?,
        RoundingDirection::Down,
    )
}

/// Checked addition reporting [`LendingError::ArithmeticOverflow`].
pub fn checked_add(x: U256, y: U256) -> Result<U256, LendingError> {
    x.checked_add(y).ok_or(LendingError::ArithmeticOverflow)
}

/// Checked subtraction reporting [`LendingError::ArithmeticUnderflow`].
pub fn checked_sub(x: U256, y: U256) -> Result<U256, LendingError> {
    x.checked_sub(y).ok_or(LendingError::ArithmeticUnderflow)
}

/// Checked multiplication reporting [`LendingError::ArithmeticOverflow`].
pub fn checked_mul(x: U256, y: U256) -> Result<U256, LendingError> {
    x.checked_mul(y).ok_or(LendingError::ArithmeticOverflow)
}

/// `max(x - y, 0)`
pub fn zero_floor_sub(x: U256, y: U256) -> U256 {
    x.saturating_sub(y)
}

/// Converts a WAD-scaled value to f64 for display.
pub fn rate_to_f64(rate: U256) -> f64 {
    let whole: u128 = (rate / WAD).saturating_to();
    let frac: u128 = (rate % WAD).saturating_to();
    whole as f64 + frac as f64 / 1e18
}

/// Converts a per-block rate to a compounded annual yield.
pub fn rate_per_block_to_apy(rate: U256) -> f64 {
    let per_block = rate_to_f64(rate);
    (1.0 + per_block).powf(BLOCKS_PER_YEAR as f64) - 1.0
}

/// Converts an annual rate (WAD-scaled) to a per-block rate, rounded down.
pub fn annual_to_per_block(annual: U256) -> U256 {
    annual / U256::from(BLOCKS_PER_YEAR)
}
