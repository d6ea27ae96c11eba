//! Per-account bookkeeping inside a market.
//!
//! Supply positions are share balances in a [`ShareLedger`]. Debt positions are
//! [`BorrowSnapshot`]s: the principal owed when the account last touched the
//! market and the borrow index at that moment. Current debt is derived lazily
//! from the market's current index, so accounts never need to be updated when
//! interest accrues.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::{LendingError, MarketId};
use crate::math::{checked_add, mul_div_up};

/// Debt owed by one account to one market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorrowSnapshot {
    /// Debt at the time of the snapshot, including interest up to then
    pub principal: U256,
    /// Market borrow index when the snapshot was taken
    pub interest_index: U256,
}

impl BorrowSnapshot {
    pub fn new(principal: U256, interest_index: U256) -> Self {
        Self {
            principal,
            interest_index,
        }
    }

    /// Debt at the given borrow index
    pub fn current_debt(&self, borrow_index: U256) -> Result<U256, LendingError> {
        current_debt(self.principal, self.interest_index, borrow_index)
    }
}

/// `ceil(principal * current_index / snapshot_index)`; zero principal owes nothing.
pub fn current_debt(
    principal: U256,
    snapshot_index: U256,
    current_index: U256,
) -> Result<U256, LendingError> {
    if principal.is_zero() {
        return Ok(U256::ZERO);
    }
    mul_div_up(principal, current_index, snapshot_index)
}

/// Share balances and allowances of one market.
#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl ShareLedger {
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn credit(&mut self, account: Address, shares: U256) -> Result<(), LendingError> {
        let balance = checked_add(self.balance_of(account), shares)?;
        self.balances.insert(account, balance);
        Ok(())
    }

    pub fn debit(
        &mut self,
        market: MarketId,
        account: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        let balance = self.balance_of(account);
        if balance < shares {
            return Err(LendingError::InsufficientShares {
                market,
                account,
                balance,
                required: shares,
            });
        }
        self.balances.insert(account, balance - shares);
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, shares: U256) {
        self.allowances.insert((owner, spender), shares);
    }

    /// Spends allowance; an unlimited (`U256::MAX`) allowance is left as is
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        let allowance = self.allowance(owner, spender);
        if allowance == U256::MAX {
            return Ok(());
        }
        if allowance < shares {
            return Err(LendingError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                required: shares,
            });
        }
        self.allowances.insert((owner, spender), allowance - shares);
        Ok(())
    }
}

/// An account's standing in one market, as reported by the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub account: Address,
    pub market: MarketId,
    /// Shares held
    pub shares: U256,
    /// Underlying value of the shares at the stored exchange rate
    pub supplied: U256,
    /// Debt at the stored borrow index
    pub debt: U256,
    /// Whether the shares count as collateral
    pub is_collateral: bool,
}
