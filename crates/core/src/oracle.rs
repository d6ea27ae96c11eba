//! Price oracle interface.
//!
//! Prices are WAD-scaled quote-currency values of one underlying unit, keyed by
//! market. An oracle that cannot price an asset returns `None`; the controller
//! treats `None` and zero alike and refuses to value the account.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use alloy_primitives::U256;

use crate::error::{LendingError, MarketId};

/// Source of underlying prices.
pub trait PriceOracle: fmt::Debug + Send + Sync {
    /// Price of one unit of the market's underlying, or `None` if unknown.
    fn underlying_price(&self, market: MarketId) -> Option<U256>;
}

/// Fetches a price and fails closed on missing or zero values.
pub fn valid_price(oracle: &dyn PriceOracle, market: MarketId) -> Result<U256, LendingError> {
    match oracle.underlying_price(market) {
        Some(price) if !price.is_zero() => Ok(price),
        _ => {
            tracing::warn!(%market, "oracle returned no valid price");
            Err(LendingError::PriceUnavailable { market })
        }
    }
}

/// Oracle holding hand-set prices.
///
/// Prices can be changed through a shared reference, so a test or a driver
/// can keep an `Arc` to the oracle it handed to the protocol.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    prices: RwLock<HashMap<MarketId, U256>>,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the price for a market
    pub fn set_price(&self, market: MarketId, price: U256) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(market, price);
    }

    /// Removes the price for a market
    pub fn remove_price(&self, market: MarketId) {
        self.prices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&market);
    }
}

impl PriceOracle for StaticPriceOracle {
    fn underlying_price(&self, market: MarketId) -> Option<U256> {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&market)
            .copied()
    }
}
