//! Market state and interest accrual.
//!
//! A [`Market`] is the accounting unit of one listed asset: it holds the cash
//! pool, the share ledger of suppliers, the borrow snapshots of borrowers and
//! the cumulative borrow index.
//!
//! # Accrual
//!
//! Interest is settled lazily. Every state-mutating entry point first calls
//! [`Market::accrue_interest`], which applies the interest of all blocks since
//! the last accrual in one step:
//!
//! ```text
//! interest_factor = borrow_rate * elapsed_blocks
//! interest        = floor(interest_factor * total_borrows / 1e18)
//! total_borrows  += interest
//! total_reserves += floor(interest * reserve_ratio / 1e18)
//! borrow_index   += floor(borrow_index * interest_factor / 1e18)
//! ```
//!
//! A second accrual in the same block is a no-op.
//!
//! # Variants
//!
//! [`MarketVariant`] is the closed set of market behaviours. Cash markets lend
//! out a pool of supplied underlying. Synthetic-debt markets have no suppliers:
//! borrowing mints a synthetic asset and repaying burns it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lending_rs_core::{Asset, FixedRateModel, Market, MarketVariant, WAD};
//! use alloy_primitives::{Address, U256};
//!
//! let address = Address::repeat_byte(0x11);
//! let model = FixedRateModel::new().with_borrow_rate(address, U256::from(100_000_000_000_000u64));
//! let market = Market::new(
//!     address,
//!     Address::repeat_byte(0xcc),
//!     Asset::Native,
//!     MarketVariant::Cash,
//!     Arc::new(model),
//!     WAD / U256::from(10),
//!     0,
//! );
//!
//! assert_eq!(market.exchange_rate_stored().unwrap(), WAD);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::error::{LendingError, MarketId};
use crate::irm::{utilization_rate, InterestRateModel};
use crate::math::{
    checked_add, checked_mul, checked_sub, mul_div_down, mul_div_up, rate_per_block_to_apy,
    w_mul_down, WAD,
};
use crate::position::{BorrowSnapshot, ShareLedger};

/// Default ceiling on the per-block borrow rate (0.1% per block).
pub const DEFAULT_MAX_BORROW_RATE: U256 = U256::from_limbs([1_000_000_000_000_000, 0, 0, 0]);

/// Exchange rate of a market without supply.
pub const INITIAL_EXCHANGE_RATE: U256 = WAD;

/// All listed markets, keyed by address.
pub type Markets = BTreeMap<MarketId, Market>;

/// Behaviour class of a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketVariant {
    /// Suppliers deposit underlying that borrowers draw from
    Cash,
    /// Borrowing mints a synthetic asset through the MSD controller
    SyntheticDebt,
}

impl MarketVariant {
    /// Whether the market takes deposits and issues shares
    pub fn accepts_supply(self) -> bool {
        match self {
            MarketVariant::Cash => true,
            MarketVariant::SyntheticDebt => false,
        }
    }

    /// Whether the market's shares can be seized in a liquidation
    pub fn is_seizable(self) -> bool {
        match self {
            MarketVariant::Cash => true,
            MarketVariant::SyntheticDebt => false,
        }
    }

    /// Whether borrows are paid out of (and repaid into) a cash pool
    pub fn holds_cash(self) -> bool {
        match self {
            MarketVariant::Cash => true,
            MarketVariant::SyntheticDebt => false,
        }
    }

    /// Whether part of the accrued interest is set aside as reserves.
    ///
    /// Reserves are paid out of cash, so a market without a cash pool keeps
    /// none; its interest all stays in total borrows.
    pub fn accrues_reserves(self) -> bool {
        match self {
            MarketVariant::Cash => true,
            MarketVariant::SyntheticDebt => false,
        }
    }
}

/// Result of an accrual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accrual {
    /// Blocks covered by this accrual
    pub elapsed: u64,
    /// Per-block borrow rate applied
    pub borrow_rate: U256,
    /// Interest added to total borrows
    pub interest: U256,
    /// Part of the interest added to reserves
    pub reserves_added: U256,
}

/// A listed market.
#[derive(Debug, Clone)]
pub struct Market {
    /// Market address
    pub address: MarketId,
    /// Controller the market belongs to
    pub controller: Address,
    /// Underlying asset
    pub underlying: Asset,
    /// Behaviour class
    pub variant: MarketVariant,

    /// Total shares outstanding
    pub total_supply: U256,
    /// Total debt at the last accrual
    pub total_borrows: U256,
    /// Protocol reserves
    pub total_reserves: U256,
    /// Underlying held by the market, as received
    pub cash: U256,
    /// Cumulative interest multiplier (WAD-scaled, starts at 1.0)
    pub borrow_index: U256,
    /// Block of the last accrual
    pub accrual_block_number: u64,

    /// Share of interest kept as reserves (WAD-scaled)
    pub reserve_ratio: U256,
    /// Ceiling on the per-block borrow rate
    pub max_borrow_rate: U256,
    /// Rate model
    pub interest_rate_model: Arc<dyn InterestRateModel>,

    pub(crate) shares: ShareLedger,
    pub(crate) borrows: BTreeMap<Address, BorrowSnapshot>,
    pub(crate) entered: bool,
}

impl Market {
    /// Creates an empty market.
    pub fn new(
        address: MarketId,
        controller: Address,
        underlying: Asset,
        variant: MarketVariant,
        interest_rate_model: Arc<dyn InterestRateModel>,
        reserve_ratio: U256,
        block_number: u64,
    ) -> Self {
        Self {
            address,
            controller,
            underlying,
            variant,
            total_supply: U256::ZERO,
            total_borrows: U256::ZERO,
            total_reserves: U256::ZERO,
            cash: U256::ZERO,
            borrow_index: WAD,
            accrual_block_number: block_number,
            reserve_ratio,
            max_borrow_rate: DEFAULT_MAX_BORROW_RATE,
            interest_rate_model,
            shares: ShareLedger::default(),
            borrows: BTreeMap::new(),
            entered: false,
        }
    }

    /// Underlying per share (WAD-scaled), from stored state.
    ///
    /// `(cash + total_borrows - total_reserves) / total_supply`, rounded down,
    /// or [`INITIAL_EXCHANGE_RATE`] while no shares exist.
    pub fn exchange_rate_stored(&self) -> Result<U256, LendingError> {
        if self.total_supply.is_zero() {
            return Ok(INITIAL_EXCHANGE_RATE);
        }
        let pool = checked_sub(checked_add(self.cash, self.total_borrows)?, self.total_reserves)?;
        mul_div_down(pool, WAD, self.total_supply)
    }

    /// Shares held by `account`
    pub fn balance_of(&self, account: Address) -> U256 {
        self.shares.balance_of(account)
    }

    /// Share allowance granted by `owner` to `spender`
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.shares.allowance(owner, spender)
    }

    /// Borrow snapshot of `account`, if it ever borrowed
    pub fn borrow_snapshot(&self, account: Address) -> Option<BorrowSnapshot> {
        self.borrows.get(&account).copied()
    }

    /// Debt of `account` at the stored borrow index
    pub fn borrow_balance_stored(&self, account: Address) -> Result<U256, LendingError> {
        self.borrows
            .get(&account)
            .map_or(Ok(U256::ZERO), |snapshot| snapshot.current_debt(self.borrow_index))
    }

    /// Underlying value of `account`'s shares, rounded down
    pub fn balance_of_underlying_stored(&self, account: Address) -> Result<U256, LendingError> {
        self.shares_to_underlying(self.balance_of(account))
    }

    /// Total underlying claimed by all shares, rounded down
    pub fn total_supply_underlying(&self) -> Result<U256, LendingError> {
        self.shares_to_underlying(self.total_supply)
    }

    /// `floor(shares * exchange_rate / 1e18)`
    pub fn shares_to_underlying(&self, shares: U256) -> Result<U256, LendingError> {
        w_mul_down(shares, self.exchange_rate_stored()?)
    }

    /// Shares minted for `amount` underlying: `floor(amount * 1e18 / exchange_rate)`
    pub fn shares_for_mint(&self, amount: U256) -> Result<U256, LendingError> {
        mul_div_down(amount, WAD, self.exchange_rate_stored()?)
    }

    /// Shares burned to withdraw exactly `amount`: `ceil(amount * 1e18 / exchange_rate)`
    pub fn shares_for_redeem_underlying(&self, amount: U256) -> Result<U256, LendingError> {
        mul_div_up(amount, WAD, self.exchange_rate_stored()?)
    }

    /// Borrowed share of the pool (WAD-scaled)
    pub fn utilization(&self) -> Result<U256, LendingError> {
        utilization_rate(self.cash, self.total_borrows, self.total_reserves)
    }

    /// Current per-block borrow rate
    pub fn borrow_rate_per_block(&self) -> Result<U256, LendingError> {
        self.interest_rate_model.borrow_rate(
            self.address,
            self.cash,
            self.total_borrows,
            self.total_reserves,
        )
    }

    /// Current per-block supply rate
    pub fn supply_rate_per_block(&self) -> Result<U256, LendingError> {
        self.interest_rate_model.supply_rate(
            self.address,
            self.cash,
            self.total_borrows,
            self.total_reserves,
            self.reserve_ratio,
        )
    }

    /// Borrow APY at the current rate
    pub fn borrow_apy(&self) -> Result<f64, LendingError> {
        Ok(rate_per_block_to_apy(self.borrow_rate_per_block()?))
    }

    /// Supply APY at the current rate
    pub fn supply_apy(&self) -> Result<f64, LendingError> {
        Ok(rate_per_block_to_apy(self.supply_rate_per_block()?))
    }

    /// Accrues interest up to `block_number`.
    ///
    /// # Errors
    ///
    /// - [`LendingError::BlockInPast`] if `block_number` precedes the last accrual
    /// - [`LendingError::BorrowRateTooHigh`] if the model's rate is above
    ///   [`Market::max_borrow_rate`]; the market is left untouched
    pub fn accrue_interest(&mut self, block_number: u64) -> Result<Accrual, LendingError> {
        if block_number < self.accrual_block_number {
            return Err(LendingError::BlockInPast {
                block: block_number,
                last_accrual: self.accrual_block_number,
            });
        }
        let elapsed = block_number - self.accrual_block_number;
        if elapsed == 0 {
            return Ok(Accrual::default());
        }

        let borrow_rate = self.borrow_rate_per_block()?;
        if borrow_rate > self.max_borrow_rate {
            tracing::error!(
                market = %self.address,
                %borrow_rate,
                max = %self.max_borrow_rate,
                "borrow rate above ceiling"
            );
            return Err(LendingError::BorrowRateTooHigh {
                market: self.address,
                rate: borrow_rate,
                max: self.max_borrow_rate,
            });
        }

        let interest_factor = checked_mul(borrow_rate, U256::from(elapsed))?;
        let interest = w_mul_down(interest_factor, self.total_borrows)?;
        let reserves_added = if self.variant.accrues_reserves() {
            w_mul_down(interest, self.reserve_ratio)?
        } else {
            U256::ZERO
        };
        let index_growth = w_mul_down(self.borrow_index, interest_factor)?;

        self.total_borrows = checked_add(self.total_borrows, interest)?;
        self.total_reserves = checked_add(self.total_reserves, reserves_added)?;
        self.borrow_index = checked_add(self.borrow_index, index_growth)?;
        self.accrual_block_number = block_number;

        tracing::debug!(
            market = %self.address,
            elapsed,
            %borrow_rate,
            %interest,
            borrow_index = %self.borrow_index,
            "accrued interest"
        );

        Ok(Accrual {
            elapsed,
            borrow_rate,
            interest,
            reserves_added,
        })
    }

    /// Records a new debt for `account` at the current borrow index
    pub(crate) fn record_debt(&mut self, account: Address, debt: U256) {
        if debt.is_zero() {
            self.borrows.remove(&account);
        } else {
            self.borrows
                .insert(account, BorrowSnapshot::new(debt, self.borrow_index));
        }
    }

    /// Accounts with a borrow snapshot
    pub fn borrowers(&self) -> impl Iterator<Item = Address> + '_ {
        self.borrows.keys().copied()
    }
}
