//! Borrow side: borrowing, repaying, liquidating and seizing.

use alloy_primitives::{Address, U256};

use super::{ensure_supported, synthetic_token, Protocol};
use crate::error::{LendingError, MarketId};
use crate::math::{checked_add, checked_sub};

impl Protocol {
    /// Lends `amount` to `borrower`.
    ///
    /// Cash markets pay out of their pool. Synthetic-debt markets mint the
    /// synthetic asset, which also consumes the market's minter cap.
    pub fn borrow(
        &mut self,
        market: MarketId,
        borrower: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| {
            protocol.accrue(market)?;
            if amount.is_zero() {
                return Err(LendingError::ZeroAmount);
            }
            protocol.controller.before_borrow(
                &protocol.markets,
                protocol.oracle.as_ref(),
                market,
                borrower,
                amount,
            )?;

            let state = protocol.market(market)?;
            let debt = checked_add(state.borrow_balance_stored(borrower)?, amount)?;
            let holds_cash = state.variant.holds_cash();
            if holds_cash && state.cash < amount {
                return Err(LendingError::InsufficientCash {
                    market,
                    available: state.cash,
                    required: amount,
                });
            }

            let state = protocol.market_mut(market)?;
            state.total_borrows = checked_add(state.total_borrows, amount)?;
            state.record_debt(borrower, debt);
            protocol.controller.after_borrow(market, borrower);

            if holds_cash {
                let state = protocol.market_mut(market)?;
                state.cash = checked_sub(state.cash, amount)?;
                protocol.transfer_out(market, borrower, amount)?;
            } else {
                let token = synthetic_token(protocol.market(market)?)?;
                protocol
                    .msd
                    .mint_msd(&mut protocol.bank, token, market, borrower, amount)?;
            }

            tracing::info!(%market, %borrower, %amount, %debt, "borrow");
            Ok(())
        })
    }

    /// Repays debt of `borrower` with funds of `borrower`.
    /// See [`Protocol::repay_borrow_behalf`].
    pub fn repay_borrow(
        &mut self,
        market: MarketId,
        borrower: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.repay_borrow_behalf(market, borrower, borrower, amount)
    }

    /// Repays up to `amount` of `borrower`'s debt with funds of `payer`.
    ///
    /// `U256::MAX` repays the whole debt. A zero amount repays nothing.
    /// Returns the debt actually repaid, which is smaller than `amount` for
    /// fee-on-transfer underlying.
    pub fn repay_borrow_behalf(
        &mut self,
        market: MarketId,
        payer: Address,
        borrower: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.guarded(market, |protocol| {
            protocol.accrue(market)?;
            protocol.repay_fresh(market, payer, borrower, amount)
        })
    }

    fn repay_fresh(
        &mut self,
        market: MarketId,
        payer: Address,
        borrower: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        self.controller.before_repay(market)?;
        let state = self.market(market)?;
        let debt = state.borrow_balance_stored(borrower)?;
        let amount = if amount == U256::MAX { debt } else { amount };
        if amount.is_zero() {
            return Ok(U256::ZERO);
        }
        if amount > debt {
            return Err(LendingError::RepayExceedsDebt {
                borrower,
                repay: amount,
                debt,
            });
        }

        let repaid = if state.variant.holds_cash() {
            let received = self.transfer_in(market, payer, amount)?;
            let state = self.market_mut(market)?;
            state.cash = checked_add(state.cash, received)?;
            received
        } else {
            let token = synthetic_token(state)?;
            self.msd
                .burn_msd(&mut self.bank, token, market, payer, amount)?;
            amount
        };

        let remaining = checked_sub(debt, repaid)?;
        let state = self.market_mut(market)?;
        // Per-account debts round up, so their sum can exceed total borrows by dust
        state.total_borrows = state.total_borrows.saturating_sub(repaid);
        state.record_debt(borrower, remaining);
        self.controller.after_repay(market, borrower, remaining);

        tracing::info!(%market, %payer, %borrower, %repaid, %remaining, "repay borrow");
        Ok(repaid)
    }

    /// Repays `repay` of `borrower`'s debt in `market` on behalf of
    /// `liquidator` and transfers the matching shares of `collateral` to the
    /// liquidator, incentive included. Returns the shares seized.
    pub fn liquidate_borrow(
        &mut self,
        market: MarketId,
        liquidator: Address,
        borrower: Address,
        repay: U256,
        collateral: MarketId,
    ) -> Result<U256, LendingError> {
        self.guarded(market, |protocol| {
            protocol.accrue(market)?;
            if collateral != market {
                protocol.accrue(collateral)?;
            }

            if liquidator == borrower {
                return Err(LendingError::SelfLiquidation { account: borrower });
            }
            if repay.is_zero() {
                return Err(LendingError::ZeroAmount);
            }
            protocol.controller.before_liquidate(
                &protocol.markets,
                protocol.oracle.as_ref(),
                market,
                collateral,
                borrower,
                repay,
            )?;
            let collateral_state = protocol.market(collateral)?;
            ensure_supported(collateral_state, collateral_state.variant.is_seizable(), "seize")?;
            protocol
                .controller
                .before_seize(&protocol.markets, collateral, market)?;

            let repaid = protocol.repay_fresh(market, liquidator, borrower, repay)?;
            let seized = protocol.liquidate_seize_preview(market, collateral, repaid)?;

            if collateral == market {
                protocol.seize_fresh(collateral, market, liquidator, borrower, seized)?;
            } else {
                protocol.seize(collateral, market, liquidator, borrower, seized)?;
            }

            tracing::info!(
                %market,
                %collateral,
                %liquidator,
                %borrower,
                %repaid,
                %seized,
                "liquidate borrow"
            );
            Ok(seized)
        })
    }

    /// Moves `shares` of `collateral` from `borrower` to `liquidator`.
    ///
    /// `caller` is the market running the liquidation: it must be a different
    /// market listed in the same controller.
    pub fn seize(
        &mut self,
        collateral: MarketId,
        caller: Address,
        liquidator: Address,
        borrower: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.guarded(collateral, |protocol| {
            if caller == collateral || !protocol.controller.is_listed(caller) {
                return Err(LendingError::Unauthorized {
                    caller,
                    action: "seize",
                });
            }
            protocol.seize_fresh(collateral, caller, liquidator, borrower, shares)
        })
    }

    fn seize_fresh(
        &mut self,
        collateral: MarketId,
        borrowed: MarketId,
        liquidator: Address,
        borrower: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.accrue(collateral)?;
        let state = self.market(collateral)?;
        ensure_supported(state, state.variant.is_seizable(), "seize")?;
        self.controller
            .before_seize(&self.markets, collateral, borrowed)?;
        if liquidator == borrower {
            return Err(LendingError::SelfSeize { account: borrower });
        }

        let state = self.market_mut(collateral)?;
        state.shares.debit(collateral, borrower, shares)?;
        state.shares.credit(liquidator, shares)?;

        tracing::debug!(%collateral, %liquidator, %borrower, %shares, "seize");
        Ok(())
    }
}
