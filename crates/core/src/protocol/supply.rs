//! Supply side: minting, redeeming and moving shares.

use alloy_primitives::{Address, U256};

use super::{ensure_supported, Protocol};
use crate::error::{LendingError, MarketId};
use crate::math::{checked_add, checked_sub, mul_div_down, WAD};

impl Protocol {
    /// Supplies `amount` underlying from `caller` and credits the minted
    /// shares to `receiver`. Returns the shares minted.
    ///
    /// Shares are priced at the exchange rate before the deposit and computed
    /// from the amount actually received. A zero amount mints nothing.
    pub fn mint(
        &mut self,
        market: MarketId,
        caller: Address,
        receiver: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.guarded(market, |protocol| protocol.mint_fresh(market, caller, receiver, amount))
    }

    /// [`Protocol::mint`], then uses the market as collateral for `receiver`
    pub fn mint_and_enter_market(
        &mut self,
        market: MarketId,
        caller: Address,
        receiver: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.guarded(market, |protocol| {
            let shares = protocol.mint_fresh(market, caller, receiver, amount)?;
            protocol.controller.enter_markets(receiver, &[market])?;
            Ok(shares)
        })
    }

    fn mint_fresh(
        &mut self,
        market: MarketId,
        caller: Address,
        receiver: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.accrue(market)?;
        let state = self.market(market)?;
        ensure_supported(state, state.variant.accepts_supply(), "mint")?;
        self.controller.before_mint(state, amount)?;
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }

        let exchange_rate = state.exchange_rate_stored()?;
        let received = self.transfer_in(market, caller, amount)?;
        let shares = mul_div_down(received, WAD, exchange_rate)?;

        let state = self.market_mut(market)?;
        state.cash = checked_add(state.cash, received)?;
        state.total_supply = checked_add(state.total_supply, shares)?;
        state.shares.credit(receiver, shares)?;

        tracing::info!(%market, %caller, %receiver, %received, %shares, "mint");
        Ok(shares)
    }

    /// Burns `shares` of `caller` and pays the underlying to `receiver`.
    /// Returns the underlying paid, rounded down.
    pub fn redeem(
        &mut self,
        market: MarketId,
        caller: Address,
        receiver: Address,
        shares: U256,
    ) -> Result<U256, LendingError> {
        self.guarded(market, |protocol| {
            protocol.accrue(market)?;
            if shares.is_zero() {
                return Err(LendingError::ZeroAmount);
            }
            let amount = protocol.market(market)?.shares_to_underlying(shares)?;
            protocol.redeem_fresh(market, caller, receiver, shares, amount)?;
            Ok(amount)
        })
    }

    /// Pays exactly `amount` underlying to `receiver`, burning the shares of
    /// `caller` it takes, rounded up. Returns the shares burned.
    pub fn redeem_underlying(
        &mut self,
        market: MarketId,
        caller: Address,
        receiver: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.guarded(market, |protocol| {
            protocol.accrue(market)?;
            if amount.is_zero() {
                return Err(LendingError::ZeroAmount);
            }
            let shares = protocol.market(market)?.shares_for_redeem_underlying(amount)?;
            protocol.redeem_fresh(market, caller, receiver, shares, amount)?;
            Ok(shares)
        })
    }

    fn redeem_fresh(
        &mut self,
        market: MarketId,
        redeemer: Address,
        receiver: Address,
        shares: U256,
        amount: U256,
    ) -> Result<(), LendingError> {
        let state = self.market(market)?;
        ensure_supported(state, state.variant.accepts_supply(), "redeem")?;

        let balance = state.balance_of(redeemer);
        if balance < shares {
            return Err(LendingError::InsufficientShares {
                market,
                account: redeemer,
                balance,
                required: shares,
            });
        }
        self.controller
            .before_redeem(&self.markets, self.oracle.as_ref(), market, redeemer, shares)?;
        if state.cash < amount {
            return Err(LendingError::InsufficientCash {
                market,
                available: state.cash,
                required: amount,
            });
        }

        let state = self.market_mut(market)?;
        state.shares.debit(market, redeemer, shares)?;
        state.total_supply = checked_sub(state.total_supply, shares)?;
        state.cash = checked_sub(state.cash, amount)?;
        self.transfer_out(market, receiver, amount)?;

        tracing::info!(%market, %redeemer, %receiver, %shares, %amount, "redeem");
        Ok(())
    }

    /// Moves `shares` from `from` to `to`
    pub fn transfer(
        &mut self,
        market: MarketId,
        from: Address,
        to: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| protocol.transfer_shares(market, from, from, to, shares))
    }

    /// Moves `shares` from `from` to `to`, spending `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        market: MarketId,
        spender: Address,
        from: Address,
        to: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| {
            protocol.transfer_shares(market, spender, from, to, shares)
        })
    }

    /// Lets `spender` move up to `shares` of `owner`'s shares.
    /// `U256::MAX` is an unlimited allowance.
    pub fn approve(
        &mut self,
        market: MarketId,
        owner: Address,
        spender: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| {
            protocol.accrue(market)?;
            let state = protocol.market_mut(market)?;
            ensure_supported(state, state.variant.accepts_supply(), "approve")?;
            state.shares.approve(owner, spender, shares);
            tracing::debug!(%market, %owner, %spender, %shares, "approve");
            Ok(())
        })
    }

    fn transfer_shares(
        &mut self,
        market: MarketId,
        spender: Address,
        from: Address,
        to: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.accrue(market)?;
        let state = self.market(market)?;
        ensure_supported(state, state.variant.accepts_supply(), "transfer")?;
        let balance = state.balance_of(from);
        if balance < shares {
            return Err(LendingError::InsufficientShares {
                market,
                account: from,
                balance,
                required: shares,
            });
        }
        self.controller
            .before_transfer(&self.markets, self.oracle.as_ref(), market, from, shares)?;

        let state = self.market_mut(market)?;
        if spender != from {
            state.shares.spend_allowance(from, spender, shares)?;
        }
        state.shares.debit(market, from, shares)?;
        state.shares.credit(to, shares)?;

        tracing::info!(%market, %from, %to, %shares, "transfer");
        Ok(())
    }
}
