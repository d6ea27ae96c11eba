//! Error types for the lending core.
//!
//! Every failure is a [`LendingError`]. Callers that need to decide how to react
//! (retry with other parameters, alert an operator, halt) use
//! [`LendingError::kind`], which sorts errors into the three classes the protocol
//! distinguishes.

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::asset::Asset;

/// Markets are identified by their address.
pub type MarketId = Address;

/// Broad classification of a [`LendingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bookkeeping is inconsistent or a collaborator misbehaves. Never retried.
    InvariantViolation,
    /// The protocol refused the action. Expected and recoverable by the caller.
    PolicyRejection,
    /// A price was missing or invalid, so nothing was valued.
    OracleFailure,
}

/// Market actions that can be paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Mint,
    Redeem,
    Borrow,
    Transfer,
    Seize,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Mint => "mint",
            Action::Redeem => "redeem",
            Action::Borrow => "borrow",
            Action::Transfer => "transfer",
            Action::Seize => "seize",
        };
        f.write_str(name)
    }
}

/// Errors raised by markets, the controller and the MSD registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LendingError {
    // ==================== Invariant violations ====================
    /// The rate model returned a per-block rate above the market's ceiling
    #[error("Borrow rate {rate} of market {market} exceeds the ceiling {max}")]
    BorrowRateTooHigh {
        market: MarketId,
        rate: U256,
        max: U256,
    },

    /// A checked addition or multiplication overflowed
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// A checked subtraction underflowed
    #[error("Arithmetic underflow")]
    ArithmeticUnderflow,

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// The block clock was moved backwards
    #[error("Block {block} is before the last accrual block {last_accrual}")]
    BlockInPast { block: u64, last_accrual: u64 },

    // ==================== Policy rejections ====================
    /// The market is not listed in the controller
    #[error("Market {market} is not listed")]
    MarketNotListed { market: MarketId },

    /// The market was already listed
    #[error("Market {market} is already listed")]
    MarketAlreadyListed { market: MarketId },

    /// The action is paused for this market
    #[error("{action} is paused for market {market}")]
    ActionPaused { market: MarketId, action: Action },

    /// Minting would push the supplied underlying above the market's capacity
    #[error("Supply capacity {capacity} of market {market} exceeded")]
    SupplyCapacityExceeded { market: MarketId, capacity: U256 },

    /// Borrowing would push total borrows above the market's capacity
    #[error("Borrow capacity {capacity} of market {market} exceeded")]
    BorrowCapacityExceeded { market: MarketId, capacity: U256 },

    /// The MSD minter cap would be exceeded
    #[error("Mint cap of minter {minter} for {token} exceeded: remaining {remaining}")]
    MintCapExceeded {
        token: Address,
        minter: Address,
        remaining: U256,
    },

    /// The action would leave the account under-collateralized
    #[error("Account {account} would have a shortfall of {shortfall}")]
    InsufficientEquity { account: Address, shortfall: U256 },

    /// Liquidation requires an existing shortfall
    #[error("Account {account} has no shortfall and cannot be liquidated")]
    NoShortfall { account: Address },

    /// The liquidation repays more than the close factor allows
    #[error("Repay amount {repay} exceeds the close-factor limit {max}")]
    RepayExceedsCloseFactor { repay: U256, max: U256 },

    /// Repaying more than the outstanding debt
    #[error("Repay amount {repay} exceeds the debt {debt} of {borrower}")]
    RepayExceedsDebt {
        borrower: Address,
        repay: U256,
        debt: U256,
    },

    /// The account does not hold enough shares
    #[error("Account {account} holds {balance} shares of {market}, {required} required")]
    InsufficientShares {
        market: MarketId,
        account: Address,
        balance: U256,
        required: U256,
    },

    /// The spender's allowance is too small
    #[error("Allowance {allowance} of {spender} over {owner}'s shares is below {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: U256,
        required: U256,
    },

    /// The market does not hold enough cash
    #[error("Market {market} holds {available} cash, {required} required")]
    InsufficientCash {
        market: MarketId,
        available: U256,
        required: U256,
    },

    /// The account does not hold enough of an underlying asset
    #[error("Account {account} holds {balance} of {asset}, {required} required")]
    InsufficientBalance {
        asset: Asset,
        account: Address,
        balance: U256,
        required: U256,
    },

    /// Reserves are smaller than the requested withdrawal
    #[error("Market {market} holds {reserves} reserves, {required} requested")]
    InsufficientReserves {
        market: MarketId,
        reserves: U256,
        required: U256,
    },

    /// The amount must be greater than zero
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// A liquidator tried to liquidate themselves
    #[error("Account {account} cannot liquidate itself")]
    SelfLiquidation { account: Address },

    /// Seize from and to the same account
    #[error("Account {account} cannot seize its own collateral")]
    SelfSeize { account: Address },

    /// The caller is not allowed to perform this action
    #[error("Caller {caller} is not authorized to {action}")]
    Unauthorized {
        caller: Address,
        action: &'static str,
    },

    /// A nested call entered a market that is already executing
    #[error("Reentrant call into market {market}")]
    Reentered { market: MarketId },

    /// The market variant does not support the operation
    #[error("Market {market} does not support {operation}")]
    UnsupportedOperation {
        market: MarketId,
        operation: &'static str,
    },

    /// The account cannot leave the market while it still holds shares or debt
    #[error("Account {account} cannot exit market {market}: balance {balance}, debt {debt}")]
    ExitMarketRejected {
        account: Address,
        market: MarketId,
        balance: U256,
        debt: U256,
    },

    /// Collateral and borrowed markets belong to different controllers
    #[error("Markets {borrowed} and {collateral} belong to different controllers")]
    ControllerMismatch {
        borrowed: MarketId,
        collateral: MarketId,
    },

    /// Not a registered minter of the synthetic asset
    #[error("{minter} is not a minter of {token}")]
    NotMinter { token: Address, minter: Address },

    /// The synthetic asset is not registered with the MSD controller
    #[error("{token} is not a registered MSD token")]
    UnknownMsdToken { token: Address },

    /// The synthetic asset was already registered
    #[error("{token} is already a registered MSD token")]
    MsdTokenAlreadyAdded { token: Address },

    /// The underlying asset has no ledger
    #[error("Asset {asset} is not registered")]
    UnknownAsset { asset: Asset },

    /// The underlying asset ledger already exists
    #[error("Asset {asset} is already registered")]
    AssetAlreadyRegistered { asset: Asset },

    /// A governance parameter is outside its allowed range
    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: U256 },

    /// Configuration could not be parsed or converted
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ==================== Oracle failures ====================
    /// The oracle has no valid price for the market's underlying
    #[error("Price unavailable for market {market}")]
    PriceUnavailable { market: MarketId },
}

impl LendingError {
    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::BorrowRateTooHigh { .. }
            | LendingError::ArithmeticOverflow
            | LendingError::ArithmeticUnderflow
            | LendingError::DivisionByZero
            | LendingError::BlockInPast { .. } => ErrorKind::InvariantViolation,
            LendingError::PriceUnavailable { .. } => ErrorKind::OracleFailure,
            _ => ErrorKind::PolicyRejection,
        }
    }

    /// Returns true for errors that signal a bug or an attack.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::InvariantViolation
    }
}

impl From<serde_json::Error> for LendingError {
    fn from(err: serde_json::Error) -> Self {
        LendingError::InvalidConfig(err.to_string())
    }
}
