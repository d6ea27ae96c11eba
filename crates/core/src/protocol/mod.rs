//! The protocol facade.
//!
//! [`Protocol`] owns every market, the controller, the MSD controller, the
//! underlying asset ledgers and the block clock. All user operations go
//! through it.
//!
//! # Atomicity
//!
//! Each public state-mutating call runs as a transaction: the state is
//! snapshotted first and restored if the call fails, so a rejected operation
//! leaves no trace.
//!
//! # Reentrancy
//!
//! Underlying transfers invoke the [`TransferHook`] registered for the asset,
//! with full mutable access to the protocol. While an operation on a market is
//! in progress the market is locked, and any nested call into it fails with
//! [`LendingError::Reentered`].

mod borrow;
mod governance;
mod supply;

use std::cmp::min;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, U256};

use crate::asset::{Asset, AssetParams, Bank};
use crate::controller::{AccountEquity, Controller};
use crate::error::{LendingError, MarketId};
use crate::market::{Accrual, Market, MarketVariant, Markets};
use crate::math::{checked_add, checked_sub};
use crate::msd::MsdController;
use crate::oracle::PriceOracle;
use crate::position::Position;

pub use governance::MarketListing;

/// An underlying transfer that just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderlyingTransfer {
    pub asset: Asset,
    pub from: Address,
    pub to: Address,
    /// Amount requested, before any transfer fee
    pub amount: U256,
}

/// Callback run after every underlying transfer of an asset.
///
/// Models tokens that call back into their holders. The hook gets the
/// protocol itself; whatever it does is part of the enclosing transaction.
pub trait TransferHook: fmt::Debug + Send + Sync {
    fn on_transfer(
        &self,
        protocol: &mut Protocol,
        transfer: &UnderlyingTransfer,
    ) -> Result<(), LendingError>;
}

/// The lending protocol.
#[derive(Debug, Clone)]
pub struct Protocol {
    block_number: u64,
    controller: Controller,
    markets: Markets,
    msd: MsdController,
    bank: Bank,
    oracle: Arc<dyn PriceOracle>,
    hooks: HashMap<Asset, Arc<dyn TransferHook>>,
}

impl Protocol {
    /// Creates an empty protocol at block 0.
    ///
    /// `owner` governs both the controller and the MSD controller.
    pub fn new(
        controller: Address,
        msd_controller: Address,
        owner: Address,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        Self {
            block_number: 0,
            controller: Controller::new(controller, owner),
            markets: Markets::new(),
            msd: MsdController::new(msd_controller, owner),
            bank: Bank::new(),
            oracle,
            hooks: HashMap::new(),
        }
    }

    // ==================== Transactions ====================

    /// Runs `f` atomically: on error the protocol is restored to its state
    /// before the call.
    fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, LendingError>,
    ) -> Result<T, LendingError> {
        let snapshot = self.clone();
        let result = f(self);
        if let Err(err) = &result {
            tracing::debug!(error = %err, kind = ?err.kind(), "transaction reverted");
            *self = snapshot;
        }
        result
    }

    /// Runs `f` atomically with `market` locked against reentry
    fn guarded<T>(
        &mut self,
        market: MarketId,
        f: impl FnOnce(&mut Self) -> Result<T, LendingError>,
    ) -> Result<T, LendingError> {
        self.transact(|protocol| {
            protocol.lock(market)?;
            let value = f(protocol)?;
            protocol.market_mut(market)?.entered = false;
            Ok(value)
        })
    }

    fn lock(&mut self, market: MarketId) -> Result<(), LendingError> {
        let state = self.market_mut(market)?;
        if state.entered {
            tracing::warn!(%market, "reentrant call rejected");
            return Err(LendingError::Reentered { market });
        }
        state.entered = true;
        Ok(())
    }

    pub(crate) fn market_mut(&mut self, market: MarketId) -> Result<&mut Market, LendingError> {
        self.markets
            .get_mut(&market)
            .ok_or(LendingError::MarketNotListed { market })
    }

    fn accrue(&mut self, market: MarketId) -> Result<Accrual, LendingError> {
        let block_number = self.block_number;
        self.market_mut(market)?.accrue_interest(block_number)
    }

    /// Accrues interest of `market` up to the current block
    pub fn accrue_interest(&mut self, market: MarketId) -> Result<Accrual, LendingError> {
        self.transact(|protocol| protocol.accrue(market))
    }

    // ==================== Block clock ====================

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Moves the clock forward by `blocks`
    pub fn advance_blocks(&mut self, blocks: u64) -> Result<(), LendingError> {
        self.block_number = self
            .block_number
            .checked_add(blocks)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Moves the clock to `block`; the clock never goes backwards
    pub fn set_block_number(&mut self, block: u64) -> Result<(), LendingError> {
        if block < self.block_number {
            return Err(LendingError::BlockInPast {
                block,
                last_accrual: self.block_number,
            });
        }
        self.block_number = block;
        Ok(())
    }

    // ==================== Underlying assets ====================

    /// Creates a ledger for an underlying asset
    pub fn register_asset(&mut self, asset: Asset, params: AssetParams) -> Result<(), LendingError> {
        self.bank.register(asset, params)
    }

    /// Credits underlying to an account from outside the protocol
    pub fn deal(&mut self, asset: Asset, account: Address, amount: U256) -> Result<(), LendingError> {
        self.bank.deal(asset, account, amount)
    }

    /// Moves underlying between two accounts outside of any market operation
    pub fn transfer_underlying(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.transact(|protocol| protocol.move_underlying(asset, from, to, amount))
    }

    /// Installs the hook called after every transfer of `asset`
    pub fn set_transfer_hook(&mut self, asset: Asset, hook: Arc<dyn TransferHook>) {
        self.hooks.insert(asset, hook);
    }

    pub fn remove_transfer_hook(&mut self, asset: Asset) {
        self.hooks.remove(&asset);
    }

    /// Bank transfer followed by the asset's hook
    fn move_underlying(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        let delivered = self.bank.transfer(asset, from, to, amount)?;
        self.run_hook(asset, from, to, amount)?;
        Ok(delivered)
    }

    fn run_hook(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        if let Some(hook) = self.hooks.get(&asset).cloned() {
            hook.on_transfer(
                self,
                &UnderlyingTransfer {
                    asset,
                    from,
                    to,
                    amount,
                },
            )?;
        }
        Ok(())
    }

    /// Pulls `amount` of the market's underlying from `from`.
    ///
    /// Returns what the market actually received, measured as the change of
    /// its balance across the bank transfer alone. Whatever the hook moves
    /// afterwards is not credited.
    fn transfer_in(
        &mut self,
        market: MarketId,
        from: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        let asset = self.market(market)?.underlying;
        let before = self.bank.balance_of(asset, market);
        self.bank.transfer(asset, from, market, amount)?;
        let received = checked_sub(self.bank.balance_of(asset, market), before)?;
        if received != amount {
            tracing::debug!(%market, %amount, %received, "underlying received differs from requested");
        }
        self.run_hook(asset, from, market, amount)?;
        Ok(received)
    }

    /// Pays `amount` of the market's underlying to `to`
    fn transfer_out(&mut self, market: MarketId, to: Address, amount: U256) -> Result<(), LendingError> {
        let asset = self.market(market)?.underlying;
        self.move_underlying(asset, market, to, amount)?;
        Ok(())
    }

    // ==================== Views ====================

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn msd_controller(&self) -> &MsdController {
        &self.msd
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn oracle(&self) -> &Arc<dyn PriceOracle> {
        &self.oracle
    }

    pub fn markets(&self) -> &Markets {
        &self.markets
    }

    pub fn market(&self, market: MarketId) -> Result<&Market, LendingError> {
        self.markets
            .get(&market)
            .ok_or(LendingError::MarketNotListed { market })
    }

    /// Copy of `market` accrued up to the current block
    fn accrued(&self, market: MarketId) -> Result<Market, LendingError> {
        let mut state = self.market(market)?.clone();
        state.accrue_interest(self.block_number)?;
        Ok(state)
    }

    pub fn exchange_rate_stored(&self, market: MarketId) -> Result<U256, LendingError> {
        self.market(market)?.exchange_rate_stored()
    }

    /// Exchange rate including interest not yet accrued
    pub fn exchange_rate_current(&self, market: MarketId) -> Result<U256, LendingError> {
        self.accrued(market)?.exchange_rate_stored()
    }

    pub fn borrow_balance_stored(&self, market: MarketId, account: Address) -> Result<U256, LendingError> {
        self.market(market)?.borrow_balance_stored(account)
    }

    /// Debt including interest not yet accrued
    pub fn borrow_balance_current(&self, market: MarketId, account: Address) -> Result<U256, LendingError> {
        self.accrued(market)?.borrow_balance_stored(account)
    }

    pub fn total_borrows_current(&self, market: MarketId) -> Result<U256, LendingError> {
        Ok(self.accrued(market)?.total_borrows)
    }

    pub fn balance_of(&self, market: MarketId, account: Address) -> Result<U256, LendingError> {
        Ok(self.market(market)?.balance_of(account))
    }

    /// Underlying value of `account`'s shares at the current exchange rate
    pub fn balance_of_underlying(&self, market: MarketId, account: Address) -> Result<U256, LendingError> {
        self.accrued(market)?.balance_of_underlying_stored(account)
    }

    pub fn allowance(&self, market: MarketId, owner: Address, spender: Address) -> Result<U256, LendingError> {
        Ok(self.market(market)?.allowance(owner, spender))
    }

    pub fn cash(&self, market: MarketId) -> Result<U256, LendingError> {
        Ok(self.market(market)?.cash)
    }

    pub fn utilization(&self, market: MarketId) -> Result<U256, LendingError> {
        self.market(market)?.utilization()
    }

    pub fn borrow_rate_per_block(&self, market: MarketId) -> Result<U256, LendingError> {
        self.market(market)?.borrow_rate_per_block()
    }

    pub fn supply_rate_per_block(&self, market: MarketId) -> Result<U256, LendingError> {
        self.market(market)?.supply_rate_per_block()
    }

    pub fn borrow_apy(&self, market: MarketId) -> Result<f64, LendingError> {
        self.market(market)?.borrow_apy()
    }

    pub fn supply_apy(&self, market: MarketId) -> Result<f64, LendingError> {
        self.market(market)?.supply_apy()
    }

    /// Valuation of `account` at stored rates
    pub fn calc_account_equity(&self, account: Address) -> Result<AccountEquity, LendingError> {
        self.controller
            .calc_account_equity(&self.markets, self.oracle.as_ref(), account)
    }

    pub fn entered_markets(&self, account: Address) -> Vec<MarketId> {
        self.controller.entered_markets(account)
    }

    pub fn borrowed_markets(&self, account: Address) -> Vec<MarketId> {
        self.controller.borrowed_markets(account)
    }

    /// Amount that can still be borrowed from `market` by anyone.
    ///
    /// Cash markets are bounded by the borrow capacity and their cash.
    /// Synthetic markets are bounded by the borrow capacity and the market's
    /// remaining minter cap.
    pub fn available_borrow_capacity(&self, market: MarketId) -> Result<U256, LendingError> {
        let state = self.market(market)?;
        let config = self.controller.market_config(market)?;
        let by_capacity = config.borrow_capacity.saturating_sub(state.total_borrows);
        let by_source = match state.variant {
            MarketVariant::Cash => state.cash,
            MarketVariant::SyntheticDebt => {
                let token = synthetic_token(state)?;
                self.msd.remaining_cap(token, market)
            }
        };
        Ok(min(by_capacity, by_source))
    }

    /// Collateral shares a liquidation repaying `repay` would seize
    pub fn liquidate_seize_preview(
        &self,
        borrowed: MarketId,
        collateral: MarketId,
        repay: U256,
    ) -> Result<U256, LendingError> {
        self.controller.liquidate_calculate_seize_tokens(
            &self.markets,
            self.oracle.as_ref(),
            borrowed,
            collateral,
            repay,
        )
    }

    /// Every market where `account` holds shares or owes debt
    pub fn positions(&self, account: Address) -> Result<Vec<Position>, LendingError> {
        let mut positions = Vec::new();
        for (id, market) in &self.markets {
            let shares = market.balance_of(account);
            let debt = market.borrow_balance_stored(account)?;
            if shares.is_zero() && debt.is_zero() {
                continue;
            }
            positions.push(Position {
                account,
                market: *id,
                shares,
                supplied: market.shares_to_underlying(shares)?,
                debt,
                is_collateral: self.controller.has_entered(account, *id),
            });
        }
        Ok(positions)
    }

    /// Underlying owed to suppliers: `cash + total_borrows - total_reserves`
    pub fn pool_value(&self, market: MarketId) -> Result<U256, LendingError> {
        let state = self.market(market)?;
        checked_sub(checked_add(state.cash, state.total_borrows)?, state.total_reserves)
    }
}

/// Synthetic asset minted by a synthetic-debt market
fn synthetic_token(market: &Market) -> Result<Address, LendingError> {
    match market.underlying {
        Asset::Token(token) => Ok(token),
        Asset::Native => Err(LendingError::UnsupportedOperation {
            market: market.address,
            operation: "synthetic native asset",
        }),
    }
}

fn ensure_supported(market: &Market, supported: bool, operation: &'static str) -> Result<(), LendingError> {
    if !supported {
        return Err(LendingError::UnsupportedOperation {
            market: market.address,
            operation,
        });
    }
    Ok(())
}
