//! Multi-asset lending core
//!
//! This crate implements the accounting and risk engine of a pooled lending
//! protocol: interest-bearing markets, a controller that values accounts and
//! gates every operation, liquidations, and a registry of synthetic assets
//! minted against debt.
//!
//! # Overview
//!
//! - Suppliers deposit underlying into a market and receive shares
//! - Borrowers draw from a market against collateral in the markets they entered
//! - Interest accrues per block through a cumulative borrow index
//! - Accounts with a shortfall can be liquidated for a fraction of their debt
//! - Synthetic-debt markets mint their asset on borrow and burn it on repay
//!
//! All amounts are `U256` in base units; rates, factors, prices and exchange
//! rates are WAD-scaled (1e18 = 1.0).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use alloy_primitives::{Address, U256};
//! use lending_rs_core::{
//!     Asset, FixedRateModel, MarketConfig, MarketListing, MarketVariant, Protocol,
//!     StaticPriceOracle, WAD,
//! };
//!
//! let owner = Address::repeat_byte(0x01);
//! let alice = Address::repeat_byte(0xa1);
//! let market = Address::repeat_byte(0x11);
//!
//! let oracle = Arc::new(StaticPriceOracle::new());
//! oracle.set_price(market, WAD);
//!
//! let mut protocol = Protocol::new(Address::repeat_byte(0xcc), Address::repeat_byte(0xdd), owner, oracle);
//! protocol.list_market(owner, MarketListing {
//!     address: market,
//!     underlying: Asset::Native,
//!     variant: MarketVariant::Cash,
//!     interest_rate_model: Arc::new(FixedRateModel::new()),
//!     reserve_ratio: U256::ZERO,
//!     config: MarketConfig::new(WAD / U256::from(2), WAD, U256::MAX, U256::MAX),
//! })?;
//!
//! protocol.deal(Asset::Native, alice, U256::from(100) * WAD)?;
//! protocol.mint_and_enter_market(market, alice, alice, U256::from(100) * WAD)?;
//! protocol.borrow(market, alice, U256::from(50) * WAD)?;
//!
//! assert!(protocol.calc_account_equity(alice)?.shortfall.is_zero());
//! # Ok::<(), lending_rs_core::LendingError>(())
//! ```

pub mod asset;
pub mod config;
pub mod controller;
pub mod error;
pub mod irm;
pub mod market;
pub mod math;
pub mod msd;
pub mod oracle;
pub mod position;
pub mod protocol;

// Re-export commonly used types
pub use error::{Action, ErrorKind, LendingError, MarketId};

// Protocol exports
pub use protocol::{MarketListing, Protocol, TransferHook, UnderlyingTransfer};

// Controller exports
pub use controller::{
    AccountEquity, Controller, EquityEffect, MarketConfig, PauseFlags, DEFAULT_CLOSE_FACTOR,
    DEFAULT_LIQUIDATION_INCENTIVE,
};

// Market exports
pub use market::{Accrual, Market, MarketVariant, Markets, DEFAULT_MAX_BORROW_RATE};
pub use position::{BorrowSnapshot, Position};

// Asset and oracle exports
pub use asset::{Asset, AssetParams, Bank};
pub use msd::{MinterCap, MsdController};
pub use oracle::{PriceOracle, StaticPriceOracle};

// IRM exports
pub use irm::{FixedRateModel, InterestRateModel, JumpRateModel};

// Math exports
pub use math::{RoundingDirection, BLOCKS_PER_YEAR, WAD};

// Config exports
pub use config::{InterestModelConfig, MarketSettings, ProtocolConfig};
