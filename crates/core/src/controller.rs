//! The controller: the protocol's risk engine.
//!
//! The controller lists markets and holds their risk configuration, tracks
//! which markets each account uses as collateral and which it owes, values
//! accounts, and gates every market operation through `before_*` hooks.
//!
//! # Account equity
//!
//! ```text
//! collateral = Σ entered markets   shares * exchange_rate * price * collateral_factor
//! borrowed   = Σ markets with debt debt * price / borrow_factor
//! equity     = max(collateral - borrowed, 0)
//! shortfall  = max(borrowed - collateral, 0)
//! ```
//!
//! Collateral is rounded down and debt up. A missing or zero price for any
//! market involved in the computation aborts it with
//! [`LendingError::PriceUnavailable`].
//!
//! # Liquidation
//!
//! An account with a shortfall can be liquidated. A liquidator repays at most
//! `close_factor` of one debt and receives
//!
//! ```text
//! seize_shares = floor(repay * price_borrowed * incentive
//!                      / (price_collateral * collateral_exchange_rate))
//! ```
//!
//! shares of a collateral market.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use alloy_primitives::{Address, U256};

use crate::error::{Action, LendingError, MarketId};
use crate::market::{Market, Markets};
use crate::math::{checked_add, checked_sub, mul_div_up, product_ratio_down, w_mul_down, WAD};
use crate::oracle::{valid_price, PriceOracle};

/// Close factor of a new controller (50%)
pub const DEFAULT_CLOSE_FACTOR: U256 = U256::from_limbs([500_000_000_000_000_000, 0, 0, 0]);

/// Liquidation incentive of a new controller (107%)
pub const DEFAULT_LIQUIDATION_INCENTIVE: U256 =
    U256::from_limbs([1_070_000_000_000_000_000, 0, 0, 0]);

/// Lowest allowed close factor (5%)
pub const MIN_CLOSE_FACTOR: U256 = U256::from_limbs([50_000_000_000_000_000, 0, 0, 0]);

/// Highest allowed close factor (90%)
pub const MAX_CLOSE_FACTOR: U256 = U256::from_limbs([900_000_000_000_000_000, 0, 0, 0]);

/// Highest allowed liquidation incentive (150%)
pub const MAX_LIQUIDATION_INCENTIVE: U256 =
    U256::from_limbs([1_500_000_000_000_000_000, 0, 0, 0]);

/// Pause switches of one market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseFlags {
    pub mint: bool,
    pub redeem: bool,
    pub borrow: bool,
    pub transfer: bool,
    pub seize: bool,
}

impl PauseFlags {
    /// Every action paused or every action running
    pub fn all(paused: bool) -> Self {
        Self {
            mint: paused,
            redeem: paused,
            borrow: paused,
            transfer: paused,
            seize: paused,
        }
    }

    pub fn is_paused(&self, action: Action) -> bool {
        match action {
            Action::Mint => self.mint,
            Action::Redeem => self.redeem,
            Action::Borrow => self.borrow,
            Action::Transfer => self.transfer,
            Action::Seize => self.seize,
        }
    }

    pub fn set(&mut self, action: Action, paused: bool) {
        let flag = match action {
            Action::Mint => &mut self.mint,
            Action::Redeem => &mut self.redeem,
            Action::Borrow => &mut self.borrow,
            Action::Transfer => &mut self.transfer,
            Action::Seize => &mut self.seize,
        };
        *flag = paused;
    }
}

/// Risk configuration of one listed market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    /// Share of supplied value usable as collateral (WAD-scaled, at most 1.0)
    pub collateral_factor: U256,
    /// Divisor applied to borrowed value (WAD-scaled, in (0, 1.0])
    pub borrow_factor: U256,
    /// Maximum underlying supplied to the market
    pub supply_capacity: U256,
    /// Maximum total borrows of the market
    pub borrow_capacity: U256,
    /// Pause switches
    pub paused: PauseFlags,
}

impl MarketConfig {
    pub fn new(
        collateral_factor: U256,
        borrow_factor: U256,
        supply_capacity: U256,
        borrow_capacity: U256,
    ) -> Self {
        Self {
            collateral_factor,
            borrow_factor,
            supply_capacity,
            borrow_capacity,
            paused: PauseFlags::default(),
        }
    }

    fn validate(&self) -> Result<(), LendingError> {
        validate_collateral_factor(self.collateral_factor)?;
        validate_borrow_factor(self.borrow_factor)
    }
}

fn validate_collateral_factor(value: U256) -> Result<(), LendingError> {
    if value > WAD {
        return Err(LendingError::InvalidParameter {
            name: "collateral factor",
            value,
        });
    }
    Ok(())
}

fn validate_borrow_factor(value: U256) -> Result<(), LendingError> {
    if value.is_zero() || value > WAD {
        return Err(LendingError::InvalidParameter {
            name: "borrow factor",
            value,
        });
    }
    Ok(())
}

/// Valuation of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountEquity {
    /// Risk-weighted collateral left over after debt
    pub equity: U256,
    /// Risk-weighted debt not covered by collateral
    pub shortfall: U256,
    /// Risk-weighted collateral value
    pub collateral_value: U256,
    /// Risk-weighted borrowed value
    pub borrow_value: U256,
}

/// A hypothetical change applied while valuing an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquityEffect {
    pub market: MarketId,
    /// Shares removed from the account's balance
    pub redeem_shares: U256,
    /// Debt added to the account
    pub borrow_amount: U256,
}

impl EquityEffect {
    pub fn redeem(market: MarketId, shares: U256) -> Self {
        Self {
            market,
            redeem_shares: shares,
            borrow_amount: U256::ZERO,
        }
    }

    pub fn borrow(market: MarketId, amount: U256) -> Self {
        Self {
            market,
            redeem_shares: U256::ZERO,
            borrow_amount: amount,
        }
    }
}

/// The risk engine.
#[derive(Debug, Clone)]
pub struct Controller {
    /// Controller address; markets record it to prove they share a controller
    pub address: Address,
    owner: Address,
    close_factor: U256,
    liquidation_incentive: U256,
    transfer_paused: bool,
    seize_paused: bool,
    markets: BTreeMap<MarketId, MarketConfig>,
    collateral: HashMap<Address, BTreeSet<MarketId>>,
    borrowed: HashMap<Address, BTreeSet<MarketId>>,
}

impl Controller {
    /// Creates a controller with the default close factor and incentive
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            close_factor: DEFAULT_CLOSE_FACTOR,
            liquidation_incentive: DEFAULT_LIQUIDATION_INCENTIVE,
            transfer_paused: false,
            seize_paused: false,
            markets: BTreeMap::new(),
            collateral: HashMap::new(),
            borrowed: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn close_factor(&self) -> U256 {
        self.close_factor
    }

    pub fn liquidation_incentive(&self) -> U256 {
        self.liquidation_incentive
    }

    pub fn transfer_paused(&self) -> bool {
        self.transfer_paused
    }

    pub fn seize_paused(&self) -> bool {
        self.seize_paused
    }

    pub fn is_listed(&self, market: MarketId) -> bool {
        self.markets.contains_key(&market)
    }

    /// Risk configuration of a listed market
    pub fn market_config(&self, market: MarketId) -> Result<&MarketConfig, LendingError> {
        self.markets
            .get(&market)
            .ok_or(LendingError::MarketNotListed { market })
    }

    fn market_config_mut(&mut self, market: MarketId) -> Result<&mut MarketConfig, LendingError> {
        self.markets
            .get_mut(&market)
            .ok_or(LendingError::MarketNotListed { market })
    }

    /// Every listed market
    pub fn all_markets(&self) -> Vec<MarketId> {
        self.markets.keys().copied().collect()
    }

    /// Markets `account` uses as collateral
    pub fn entered_markets(&self, account: Address) -> Vec<MarketId> {
        self.collateral
            .get(&account)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Markets `account` owes
    pub fn borrowed_markets(&self, account: Address) -> Vec<MarketId> {
        self.borrowed
            .get(&account)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_entered(&self, account: Address, market: MarketId) -> bool {
        self.collateral
            .get(&account)
            .is_some_and(|set| set.contains(&market))
    }

    pub fn has_borrowed(&self, account: Address, market: MarketId) -> bool {
        self.borrowed
            .get(&account)
            .is_some_and(|set| set.contains(&market))
    }

    // ==================== Governance ====================

    fn ensure_owner(&self, caller: Address, action: &'static str) -> Result<(), LendingError> {
        if caller != self.owner {
            return Err(LendingError::Unauthorized { caller, action });
        }
        Ok(())
    }

    /// Hands governance to a new owner
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), LendingError> {
        self.ensure_owner(caller, "transfer controller ownership")?;
        tracing::info!(old = %self.owner, new = %new_owner, "controller ownership transferred");
        self.owner = new_owner;
        Ok(())
    }

    /// Lists a market. A market can be listed exactly once.
    pub fn add_market(
        &mut self,
        caller: Address,
        market: MarketId,
        config: MarketConfig,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "add market")?;
        if self.markets.contains_key(&market) {
            return Err(LendingError::MarketAlreadyListed { market });
        }
        config.validate()?;
        tracing::info!(
            %market,
            collateral_factor = %config.collateral_factor,
            borrow_factor = %config.borrow_factor,
            "market listed"
        );
        self.markets.insert(market, config);
        Ok(())
    }

    pub fn set_collateral_factor(
        &mut self,
        caller: Address,
        market: MarketId,
        collateral_factor: U256,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set collateral factor")?;
        validate_collateral_factor(collateral_factor)?;
        self.market_config_mut(market)?.collateral_factor = collateral_factor;
        tracing::info!(%market, %collateral_factor, "collateral factor updated");
        Ok(())
    }

    pub fn set_borrow_factor(
        &mut self,
        caller: Address,
        market: MarketId,
        borrow_factor: U256,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set borrow factor")?;
        validate_borrow_factor(borrow_factor)?;
        self.market_config_mut(market)?.borrow_factor = borrow_factor;
        tracing::info!(%market, %borrow_factor, "borrow factor updated");
        Ok(())
    }

    pub fn set_supply_capacity(
        &mut self,
        caller: Address,
        market: MarketId,
        capacity: U256,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set supply capacity")?;
        self.market_config_mut(market)?.supply_capacity = capacity;
        tracing::info!(%market, %capacity, "supply capacity updated");
        Ok(())
    }

    pub fn set_borrow_capacity(
        &mut self,
        caller: Address,
        market: MarketId,
        capacity: U256,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set borrow capacity")?;
        self.market_config_mut(market)?.borrow_capacity = capacity;
        tracing::info!(%market, %capacity, "borrow capacity updated");
        Ok(())
    }

    /// Pauses or resumes one action of one market
    pub fn set_paused(
        &mut self,
        caller: Address,
        market: MarketId,
        action: Action,
        paused: bool,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "pause market")?;
        self.market_config_mut(market)?.paused.set(action, paused);
        tracing::info!(%market, %action, paused, "market pause flag updated");
        Ok(())
    }

    /// Pauses or resumes share transfers in every market
    pub fn set_transfer_paused(&mut self, caller: Address, paused: bool) -> Result<(), LendingError> {
        self.ensure_owner(caller, "pause transfers")?;
        self.transfer_paused = paused;
        tracing::info!(paused, "global transfer pause updated");
        Ok(())
    }

    /// Pauses or resumes seizing in every market
    pub fn set_seize_paused(&mut self, caller: Address, paused: bool) -> Result<(), LendingError> {
        self.ensure_owner(caller, "pause seize")?;
        self.seize_paused = paused;
        tracing::info!(paused, "global seize pause updated");
        Ok(())
    }

    /// Sets every pause flag of every market, plus the global switches
    pub fn set_protocol_paused(&mut self, caller: Address, paused: bool) -> Result<(), LendingError> {
        self.ensure_owner(caller, "pause protocol")?;
        for config in self.markets.values_mut() {
            config.paused = PauseFlags::all(paused);
        }
        self.transfer_paused = paused;
        self.seize_paused = paused;
        tracing::info!(paused, "protocol pause updated");
        Ok(())
    }

    pub fn set_close_factor(&mut self, caller: Address, close_factor: U256) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set close factor")?;
        if close_factor < MIN_CLOSE_FACTOR || close_factor > MAX_CLOSE_FACTOR {
            return Err(LendingError::InvalidParameter {
                name: "close factor",
                value: close_factor,
            });
        }
        self.close_factor = close_factor;
        tracing::info!(%close_factor, "close factor updated");
        Ok(())
    }

    pub fn set_liquidation_incentive(
        &mut self,
        caller: Address,
        incentive: U256,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set liquidation incentive")?;
        if incentive <= WAD || incentive > MAX_LIQUIDATION_INCENTIVE {
            return Err(LendingError::InvalidParameter {
                name: "liquidation incentive",
                value: incentive,
            });
        }
        self.liquidation_incentive = incentive;
        tracing::info!(%incentive, "liquidation incentive updated");
        Ok(())
    }

    // ==================== Membership ====================

    /// Uses `markets` as collateral for `account`.
    ///
    /// Entering a market twice is a no-op. If any market is unlisted nothing
    /// is entered.
    pub fn enter_markets(&mut self, account: Address, markets: &[MarketId]) -> Result<(), LendingError> {
        if let Some(market) = markets.iter().find(|market| !self.is_listed(**market)) {
            return Err(LendingError::MarketNotListed { market: *market });
        }
        let entered = self.collateral.entry(account).or_default();
        for market in markets {
            if entered.insert(*market) {
                tracing::debug!(%account, %market, "entered market");
            }
        }
        Ok(())
    }

    /// Stops using `markets` as collateral for `account`.
    ///
    /// Allowed only for markets where the account holds no shares and owes
    /// nothing. Markets the account never entered are skipped.
    pub fn exit_markets(
        &mut self,
        all: &Markets,
        account: Address,
        markets: &[MarketId],
    ) -> Result<(), LendingError> {
        for market_id in markets {
            if !self.has_entered(account, *market_id) {
                continue;
            }
            let market = market_of(all, *market_id)?;
            let balance = market.balance_of(account);
            let debt = market.borrow_balance_stored(account)?;
            if !balance.is_zero() || !debt.is_zero() {
                return Err(LendingError::ExitMarketRejected {
                    account,
                    market: *market_id,
                    balance,
                    debt,
                });
            }
        }
        if let Some(entered) = self.collateral.get_mut(&account) {
            for market in markets {
                if entered.remove(market) {
                    tracing::debug!(%account, %market, "exited market");
                }
            }
        }
        Ok(())
    }

    // ==================== Valuation ====================

    /// Values `account` at stored exchange rates and borrow indexes
    pub fn calc_account_equity(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        account: Address,
    ) -> Result<AccountEquity, LendingError> {
        self.calc_account_equity_with_effect(markets, oracle, account, None)
    }

    /// Values `account` as if `effect` had already been applied
    pub fn calc_account_equity_with_effect(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        account: Address,
        effect: Option<EquityEffect>,
    ) -> Result<AccountEquity, LendingError> {
        let mut collateral_value = U256::ZERO;
        for market_id in self.collateral.get(&account).into_iter().flatten() {
            let market = market_of(markets, *market_id)?;
            let config = self.market_config(*market_id)?;

            let mut shares = market.balance_of(account);
            if let Some(effect) = effect.filter(|effect| effect.market == *market_id) {
                shares = checked_sub(shares, effect.redeem_shares)?;
            }

            let price = valid_price(oracle, *market_id)?;
            let value = product_ratio_down(
                &[shares, market.exchange_rate_stored()?, price, config.collateral_factor],
                &[WAD, WAD, WAD],
            )?;
            collateral_value = checked_add(collateral_value, value)?;
        }

        let mut debt_markets = self.borrowed.get(&account).cloned().unwrap_or_default();
        if let Some(effect) = effect.filter(|effect| !effect.borrow_amount.is_zero()) {
            debt_markets.insert(effect.market);
        }

        let mut borrow_value = U256::ZERO;
        for market_id in &debt_markets {
            let market = market_of(markets, *market_id)?;
            let config = self.market_config(*market_id)?;

            let mut debt = market.borrow_balance_stored(account)?;
            if let Some(effect) = effect.filter(|effect| effect.market == *market_id) {
                debt = checked_add(debt, effect.borrow_amount)?;
            }
            if debt.is_zero() {
                continue;
            }

            let price = valid_price(oracle, *market_id)?;
            let value = mul_div_up(debt, price, config.borrow_factor)?;
            borrow_value = checked_add(borrow_value, value)?;
        }

        let (equity, shortfall) = if collateral_value >= borrow_value {
            (collateral_value - borrow_value, U256::ZERO)
        } else {
            (U256::ZERO, borrow_value - collateral_value)
        };

        Ok(AccountEquity {
            equity,
            shortfall,
            collateral_value,
            borrow_value,
        })
    }

    fn ensure_no_shortfall(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        account: Address,
        effect: EquityEffect,
    ) -> Result<(), LendingError> {
        let equity = self.calc_account_equity_with_effect(markets, oracle, account, Some(effect))?;
        if !equity.shortfall.is_zero() {
            tracing::debug!(%account, shortfall = %equity.shortfall, "action would leave a shortfall");
            return Err(LendingError::InsufficientEquity {
                account,
                shortfall: equity.shortfall,
            });
        }
        Ok(())
    }

    fn ensure_not_paused(&self, market: MarketId, action: Action) -> Result<(), LendingError> {
        let config = self.market_config(market)?;
        let globally_paused = match action {
            Action::Transfer => self.transfer_paused,
            Action::Seize => self.seize_paused,
            Action::Mint | Action::Redeem | Action::Borrow => false,
        };
        if globally_paused || config.paused.is_paused(action) {
            return Err(LendingError::ActionPaused { market, action });
        }
        Ok(())
    }

    /// Shares may leave `account`'s balance only if that keeps it solvent
    fn redeem_allowed(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        market: MarketId,
        account: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        if !self.has_entered(account, market) {
            return Ok(());
        }
        self.ensure_no_shortfall(markets, oracle, account, EquityEffect::redeem(market, shares))
    }

    // ==================== Hooks ====================

    /// Gate for minting `amount` underlying into `market`
    pub fn before_mint(&self, market: &Market, amount: U256) -> Result<(), LendingError> {
        self.ensure_not_paused(market.address, Action::Mint)?;
        let config = self.market_config(market.address)?;
        let supplied = checked_add(market.total_supply_underlying()?, amount)?;
        if supplied > config.supply_capacity {
            return Err(LendingError::SupplyCapacityExceeded {
                market: market.address,
                capacity: config.supply_capacity,
            });
        }
        Ok(())
    }

    /// Gate for burning `shares` of `redeemer`
    pub fn before_redeem(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        market: MarketId,
        redeemer: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.ensure_not_paused(market, Action::Redeem)?;
        self.redeem_allowed(markets, oracle, market, redeemer, shares)
    }

    /// Gate for borrowing `amount` from `market`
    pub fn before_borrow(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        market: MarketId,
        borrower: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        self.ensure_not_paused(market, Action::Borrow)?;
        let config = self.market_config(market)?;
        let total_borrows = checked_add(market_of(markets, market)?.total_borrows, amount)?;
        if total_borrows > config.borrow_capacity {
            return Err(LendingError::BorrowCapacityExceeded {
                market,
                capacity: config.borrow_capacity,
            });
        }
        self.ensure_no_shortfall(markets, oracle, borrower, EquityEffect::borrow(market, amount))
    }

    /// Records that `borrower` owes `market`
    pub(crate) fn after_borrow(&mut self, market: MarketId, borrower: Address) {
        self.borrowed.entry(borrower).or_default().insert(market);
    }

    /// Gate for repaying debt in `market`
    pub fn before_repay(&self, market: MarketId) -> Result<(), LendingError> {
        self.market_config(market).map(|_| ())
    }

    /// Forgets `market` once `borrower` owes it nothing
    pub(crate) fn after_repay(&mut self, market: MarketId, borrower: Address, remaining_debt: U256) {
        if !remaining_debt.is_zero() {
            return;
        }
        if let Some(borrowed) = self.borrowed.get_mut(&borrower) {
            borrowed.remove(&market);
            if borrowed.is_empty() {
                self.borrowed.remove(&borrower);
            }
        }
    }

    /// Gate for a liquidation repaying `repay` of `borrower`'s debt in `borrowed`
    pub fn before_liquidate(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        borrowed: MarketId,
        collateral: MarketId,
        borrower: Address,
        repay: U256,
    ) -> Result<(), LendingError> {
        self.market_config(borrowed)?;
        self.market_config(collateral)?;

        let equity = self.calc_account_equity(markets, oracle, borrower)?;
        if equity.shortfall.is_zero() {
            tracing::warn!(%borrower, "liquidation refused: account has no shortfall");
            return Err(LendingError::NoShortfall { account: borrower });
        }

        let debt = market_of(markets, borrowed)?.borrow_balance_stored(borrower)?;
        let max = w_mul_down(debt, self.close_factor)?;
        if repay > max {
            return Err(LendingError::RepayExceedsCloseFactor { repay, max });
        }
        Ok(())
    }

    /// Gate for seizing shares of `collateral` on behalf of `borrowed`
    pub fn before_seize(
        &self,
        markets: &Markets,
        collateral: MarketId,
        borrowed: MarketId,
    ) -> Result<(), LendingError> {
        self.market_config(borrowed)?;
        self.ensure_not_paused(collateral, Action::Seize)?;

        let collateral_controller = market_of(markets, collateral)?.controller;
        let borrowed_controller = market_of(markets, borrowed)?.controller;
        if collateral_controller != borrowed_controller || collateral_controller != self.address {
            return Err(LendingError::ControllerMismatch {
                borrowed,
                collateral,
            });
        }
        Ok(())
    }

    /// Gate for moving `shares` out of `from`'s balance
    pub fn before_transfer(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        market: MarketId,
        from: Address,
        shares: U256,
    ) -> Result<(), LendingError> {
        self.ensure_not_paused(market, Action::Transfer)?;
        self.redeem_allowed(markets, oracle, market, from, shares)
    }

    /// Collateral shares a liquidator receives for repaying `repay` of `borrowed`
    pub fn liquidate_calculate_seize_tokens(
        &self,
        markets: &Markets,
        oracle: &dyn PriceOracle,
        borrowed: MarketId,
        collateral: MarketId,
        repay: U256,
    ) -> Result<U256, LendingError> {
        let price_borrowed = valid_price(oracle, borrowed)?;
        let price_collateral = valid_price(oracle, collateral)?;
        let exchange_rate = market_of(markets, collateral)?.exchange_rate_stored()?;

        product_ratio_down(
            &[repay, price_borrowed, self.liquidation_incentive],
            &[price_collateral, exchange_rate],
        )
    }
}

fn market_of(markets: &Markets, market: MarketId) -> Result<&Market, LendingError> {
    markets
        .get(&market)
        .ok_or(LendingError::MarketNotListed { market })
}
