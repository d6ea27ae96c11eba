//! Interest rate models.
//!
//! A model maps a market's cash, borrows and reserves to a per-block borrow
//! rate (WAD-scaled). Models are stateless given their inputs: the market
//! accrues interest lazily and asks the model for the rate that applied since
//! its last accrual.
//!
//! # Models
//!
//! | Model | Shape |
//! |-------|-------|
//! | [`JumpRateModel`] | `base + util * multiplier` up to the kink, steeper `jump` slope above it |
//! | [`FixedRateModel`] | hand-set per-market rates, for markets that should not float |
//!
//! # Example
//!
//! ```rust
//! use lending_rs_core::irm::{InterestRateModel, JumpRateModel};
//! use lending_rs_core::WAD;
//! use alloy_primitives::{Address, U256};
//!
//! // 2% base, 20% slope to 80% utilization, 200% slope above
//! let model = JumpRateModel::from_annual(
//!     WAD / U256::from(50),
//!     WAD / U256::from(5),
//!     WAD * U256::from(2),
//!     WAD * U256::from(8) / U256::from(10),
//! );
//!
//! let idle = model.borrow_rate(Address::ZERO, U256::from(100), U256::ZERO, U256::ZERO).unwrap();
//! let busy = model.borrow_rate(Address::ZERO, U256::from(10), U256::from(90), U256::ZERO).unwrap();
//! assert!(busy > idle);
//! ```

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::U256;

use crate::error::{LendingError, MarketId};
use crate::math::{
    annual_to_per_block, checked_add, checked_sub, w_div_down, w_mul_down, zero_floor_sub, WAD,
};

/// Per-block borrow and supply rates for a market.
pub trait InterestRateModel: fmt::Debug + Send + Sync {
    /// Returns the per-block borrow rate (WAD-scaled).
    fn borrow_rate(
        &self,
        market: MarketId,
        cash: U256,
        borrows: U256,
        reserves: U256,
    ) -> Result<U256, LendingError>;

    /// Returns the per-block supply rate (WAD-scaled).
    ///
    /// Suppliers earn the borrow rate on the borrowed share of the pool, minus
    /// the part kept as reserves.
    fn supply_rate(
        &self,
        market: MarketId,
        cash: U256,
        borrows: U256,
        reserves: U256,
        reserve_ratio: U256,
    ) -> Result<U256, LendingError> {
        let borrow_rate = self.borrow_rate(market, cash, borrows, reserves)?;
        let utilization = utilization_rate(cash, borrows, reserves)?;
        let to_suppliers = w_mul_down(borrow_rate, checked_sub(WAD, reserve_ratio)?)?;
        w_mul_down(utilization, to_suppliers)
    }
}

/// Share of the pool that is borrowed: `borrows / (cash + borrows - reserves)`.
pub fn utilization_rate(cash: U256, borrows: U256, reserves: U256) -> Result<U256, LendingError> {
    if borrows.is_zero() {
        return Ok(U256::ZERO);
    }
    let total = checked_sub(checked_add(cash, borrows)?, reserves)?;
    w_div_down(borrows, total)
}

/// Kinked utilization model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpRateModel {
    /// Rate at zero utilization
    pub base_rate_per_block: U256,
    /// Slope below the kink
    pub multiplier_per_block: U256,
    /// Slope above the kink
    pub jump_multiplier_per_block: U256,
    /// Utilization where the jump slope starts (WAD-scaled)
    pub kink: U256,
}

impl JumpRateModel {
    pub fn new(
        base_rate_per_block: U256,
        multiplier_per_block: U256,
        jump_multiplier_per_block: U256,
        kink: U256,
    ) -> Self {
        Self {
            base_rate_per_block,
            multiplier_per_block,
            jump_multiplier_per_block,
            kink,
        }
    }

    /// Builds the model from annual rates, spreading them over
    /// [`BLOCKS_PER_YEAR`](crate::math::BLOCKS_PER_YEAR).
    pub fn from_annual(
        base_rate_per_year: U256,
        multiplier_per_year: U256,
        jump_multiplier_per_year: U256,
        kink: U256,
    ) -> Self {
        Self::new(
            annual_to_per_block(base_rate_per_year),
            annual_to_per_block(multiplier_per_year),
            annual_to_per_block(jump_multiplier_per_year),
            kink,
        )
    }
}

impl InterestRateModel for JumpRateModel {
    fn borrow_rate(
        &self,
        _market: MarketId,
        cash: U256,
        borrows: U256,
        reserves: U256,
    ) -> Result<U256, LendingError> {
        let utilization = utilization_rate(cash, borrows, reserves)?;

        if utilization <= self.kink {
            return checked_add(
                self.base_rate_per_block,
                w_mul_down(utilization, self.multiplier_per_block)?,
            );
        }

        let at_kink = checked_add(
            self.base_rate_per_block,
            w_mul_down(self.kink, self.multiplier_per_block)?,
        )?;
        let excess = zero_floor_sub(utilization, self.kink);
        checked_add(at_kink, w_mul_down(excess, self.jump_multiplier_per_block)?)
    }
}

/// Hand-set per-market rates.
///
/// Markets without a borrow rate pay nothing. Markets without a supply rate
/// derive it from the borrow rate like any other model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedRateModel {
    borrow_rates: HashMap<MarketId, U256>,
    supply_rates: HashMap<MarketId, U256>,
}

impl FixedRateModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-block borrow rate for a market
    pub fn with_borrow_rate(mut self, market: MarketId, rate: U256) -> Self {
        self.borrow_rates.insert(market, rate);
        self
    }

    /// Overrides the per-block supply rate for a market
    pub fn with_supply_rate(mut self, market: MarketId, rate: U256) -> Self {
        self.supply_rates.insert(market, rate);
        self
    }
}

impl InterestRateModel for FixedRateModel {
    fn borrow_rate(
        &self,
        market: MarketId,
        _cash: U256,
        _borrows: U256,
        _reserves: U256,
    ) -> Result<U256, LendingError> {
        Ok(self.borrow_rates.get(&market).copied().unwrap_or_default())
    }

    fn supply_rate(
        &self,
        market: MarketId,
        cash: U256,
        borrows: U256,
        reserves: U256,
        reserve_ratio: U256,
    ) -> Result<U256, LendingError> {
        if let Some(rate) = self.supply_rates.get(&market) {
            return Ok(*rate);
        }
        let borrow_rate = self.borrow_rate(market, cash, borrows, reserves)?;
        let utilization = utilization_rate(cash, borrows, reserves)?;
        w_mul_down(utilization, w_mul_down(borrow_rate, checked_sub(WAD, reserve_ratio)?)?)
    }
}
