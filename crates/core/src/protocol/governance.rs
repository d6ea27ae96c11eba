//! Owner-only administration and account membership.

use std::sync::Arc;

use alloy_primitives::{Address, U256};

use super::Protocol;
use crate::asset::Asset;
use crate::controller::{Controller, MarketConfig};
use crate::error::{LendingError, MarketId};
use crate::irm::InterestRateModel;
use crate::market::{Market, MarketVariant};
use crate::math::{checked_sub, WAD};
use crate::msd::MsdController;
use crate::oracle::PriceOracle;

/// Everything needed to list a new market.
#[derive(Debug, Clone)]
pub struct MarketListing {
    pub address: MarketId,
    pub underlying: Asset,
    pub variant: MarketVariant,
    pub interest_rate_model: Arc<dyn InterestRateModel>,
    /// Share of interest kept as reserves (WAD-scaled)
    pub reserve_ratio: U256,
    pub config: MarketConfig,
}

fn validate_reserve_ratio(value: U256) -> Result<(), LendingError> {
    if value > WAD {
        return Err(LendingError::InvalidParameter {
            name: "reserve ratio",
            value,
        });
    }
    Ok(())
}

impl Protocol {
    fn ensure_owner(&self, caller: Address, action: &'static str) -> Result<(), LendingError> {
        if caller != self.controller.owner() {
            return Err(LendingError::Unauthorized { caller, action });
        }
        Ok(())
    }

    /// Controller governance: risk factors, capacities, pause flags, close
    /// factor and liquidation incentive. Every setter checks the owner.
    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// MSD governance: minters and caps. Every setter checks the owner.
    pub fn msd_controller_mut(&mut self) -> &mut MsdController {
        &mut self.msd
    }

    /// Lists a market in the controller and creates its state.
    ///
    /// The underlying must be a registered asset; a synthetic-debt market's
    /// underlying must be a registered MSD token.
    pub fn list_market(&mut self, caller: Address, listing: MarketListing) -> Result<(), LendingError> {
        self.transact(|protocol| {
            let market = listing.address;
            protocol
                .controller
                .add_market(caller, market, listing.config)?;
            validate_reserve_ratio(listing.reserve_ratio)?;
            if !protocol.bank.is_registered(listing.underlying) {
                return Err(LendingError::UnknownAsset {
                    asset: listing.underlying,
                });
            }
            if listing.variant == MarketVariant::SyntheticDebt {
                match listing.underlying {
                    Asset::Token(token) if protocol.msd.is_msd(token) => {}
                    Asset::Token(token) => return Err(LendingError::UnknownMsdToken { token }),
                    Asset::Native => {
                        return Err(LendingError::UnsupportedOperation {
                            market,
                            operation: "synthetic native asset",
                        })
                    }
                }
            }

            let state = Market::new(
                market,
                protocol.controller.address,
                listing.underlying,
                listing.variant,
                listing.interest_rate_model,
                listing.reserve_ratio,
                protocol.block_number,
            );
            protocol.markets.insert(market, state);
            Ok(())
        })
    }

    /// Registers a synthetic asset with the MSD controller
    pub fn add_msd(&mut self, caller: Address, token: Address) -> Result<(), LendingError> {
        self.transact(|protocol| protocol.msd.add_msd(&mut protocol.bank, caller, token))
    }

    /// Mints a synthetic asset as a registered minter outside of any market
    pub fn mint_msd(
        &mut self,
        minter: Address,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        self.transact(|protocol| {
            protocol
                .msd
                .mint_msd(&mut protocol.bank, token, minter, to, amount)
        })
    }

    /// Burns a synthetic asset as a registered minter outside of any market
    pub fn burn_msd(
        &mut self,
        minter: Address,
        token: Address,
        from: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        self.transact(|protocol| {
            protocol
                .msd
                .burn_msd(&mut protocol.bank, token, minter, from, amount)
        })
    }

    /// Replaces the price oracle
    pub fn set_price_oracle(
        &mut self,
        caller: Address,
        oracle: Arc<dyn PriceOracle>,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set price oracle")?;
        self.oracle = oracle;
        tracing::info!("price oracle replaced");
        Ok(())
    }

    /// Pauses or resumes every action of every market
    pub fn set_protocol_paused(&mut self, caller: Address, paused: bool) -> Result<(), LendingError> {
        self.controller.set_protocol_paused(caller, paused)
    }

    /// Changes the reserve ratio after settling interest at the old one
    pub fn set_reserve_ratio(
        &mut self,
        caller: Address,
        market: MarketId,
        reserve_ratio: U256,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| {
            protocol.ensure_owner(caller, "set reserve ratio")?;
            validate_reserve_ratio(reserve_ratio)?;
            protocol.accrue(market)?;
            protocol.market_mut(market)?.reserve_ratio = reserve_ratio;
            tracing::info!(%market, %reserve_ratio, "reserve ratio updated");
            Ok(())
        })
    }

    /// Changes the rate model after settling interest at the old one
    pub fn set_interest_rate_model(
        &mut self,
        caller: Address,
        market: MarketId,
        model: Arc<dyn InterestRateModel>,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| {
            protocol.ensure_owner(caller, "set interest rate model")?;
            protocol.accrue(market)?;
            protocol.market_mut(market)?.interest_rate_model = model;
            tracing::info!(%market, "interest rate model replaced");
            Ok(())
        })
    }

    /// Changes the per-block borrow rate ceiling
    pub fn set_max_borrow_rate(
        &mut self,
        caller: Address,
        market: MarketId,
        max_borrow_rate: U256,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| {
            protocol.ensure_owner(caller, "set max borrow rate")?;
            protocol.accrue(market)?;
            protocol.market_mut(market)?.max_borrow_rate = max_borrow_rate;
            tracing::info!(%market, %max_borrow_rate, "borrow rate ceiling updated");
            Ok(())
        })
    }

    /// Pays `amount` of reserves to the owner
    pub fn withdraw_reserves(
        &mut self,
        caller: Address,
        market: MarketId,
        amount: U256,
    ) -> Result<(), LendingError> {
        self.guarded(market, |protocol| {
            protocol.ensure_owner(caller, "withdraw reserves")?;
            protocol.accrue(market)?;

            let state = protocol.market_mut(market)?;
            if amount > state.total_reserves {
                return Err(LendingError::InsufficientReserves {
                    market,
                    reserves: state.total_reserves,
                    required: amount,
                });
            }
            if amount > state.cash {
                return Err(LendingError::InsufficientCash {
                    market,
                    available: state.cash,
                    required: amount,
                });
            }
            state.total_reserves = checked_sub(state.total_reserves, amount)?;
            state.cash = checked_sub(state.cash, amount)?;
            protocol.transfer_out(market, caller, amount)?;

            tracing::info!(%market, %amount, "reserves withdrawn");
            Ok(())
        })
    }

    /// Uses `markets` as collateral for `account`
    pub fn enter_markets(&mut self, account: Address, markets: &[MarketId]) -> Result<(), LendingError> {
        self.controller.enter_markets(account, markets)
    }

    /// Stops using `markets` as collateral for `account`
    pub fn exit_markets(&mut self, account: Address, markets: &[MarketId]) -> Result<(), LendingError> {
        self.controller.exit_markets(&self.markets, account, markets)
    }
}
