//! Underlying asset ledgers.
//!
//! The [`Bank`] keeps one balance ledger per underlying [`Asset`]: ERC-20 style
//! tokens and the chain's native currency. Ledgers can be configured to skim a
//! fee on every transfer, which is how non-conforming tokens are modelled;
//! markets therefore measure the balance they actually received instead of
//! trusting the requested amount.

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::LendingError;
use crate::math::{checked_add, checked_sub, w_mul_down, WAD};

/// An underlying asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// The chain's native currency
    Native,
    /// A token contract
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Token(address) => write!(f, "token {address}"),
        }
    }
}

/// Behaviour of an asset ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetParams {
    /// Fraction of each transfer burned before it reaches the recipient (WAD-scaled)
    pub transfer_fee: U256,
    /// Account allowed to mint and burn, if any
    pub mint_authority: Option<Address>,
}

impl AssetParams {
    /// A token that skims `fee` (WAD-scaled) from every transfer
    pub fn fee_on_transfer(fee: U256) -> Self {
        Self {
            transfer_fee: fee,
            mint_authority: None,
        }
    }

    /// A token only `authority` can mint and burn
    pub fn mintable_by(authority: Address) -> Self {
        Self {
            transfer_fee: U256::ZERO,
            mint_authority: Some(authority),
        }
    }
}

/// Balances of one asset.
#[derive(Debug, Clone, Default)]
pub struct AssetLedger {
    params: AssetParams,
    balances: HashMap<Address, U256>,
    total_supply: U256,
}

impl AssetLedger {
    fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn credit(&mut self, account: Address, amount: U256) -> Result<(), LendingError> {
        let balance = checked_add(self.balance_of(account), amount)?;
        self.balances.insert(account, balance);
        Ok(())
    }

    fn debit(&mut self, asset: Asset, account: Address, amount: U256) -> Result<(), LendingError> {
        let balance = self.balance_of(account);
        if balance < amount {
            return Err(LendingError::InsufficientBalance {
                asset,
                account,
                balance,
                required: amount,
            });
        }
        self.balances.insert(account, balance - amount);
        Ok(())
    }
}

/// All underlying asset ledgers.
#[derive(Debug, Clone)]
pub struct Bank {
    ledgers: HashMap<Asset, AssetLedger>,
}

impl Default for Bank {
    fn default() -> Self {
        Self::new()
    }
}

impl Bank {
    /// Creates a bank holding only the native currency ledger
    pub fn new() -> Self {
        let mut ledgers = HashMap::new();
        ledgers.insert(Asset::Native, AssetLedger::default());
        Self { ledgers }
    }

    /// Registers a token ledger
    pub fn register(&mut self, asset: Asset, params: AssetParams) -> Result<(), LendingError> {
        if self.ledgers.contains_key(&asset) {
            return Err(LendingError::AssetAlreadyRegistered { asset });
        }
        if params.transfer_fee > WAD {
            return Err(LendingError::InvalidParameter {
                name: "transfer fee",
                value: params.transfer_fee,
            });
        }
        self.ledgers.insert(
            asset,
            AssetLedger {
                params,
                ..AssetLedger::default()
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, asset: Asset) -> bool {
        self.ledgers.contains_key(&asset)
    }

    fn ledger(&self, asset: Asset) -> Result<&AssetLedger, LendingError> {
        self.ledgers
            .get(&asset)
            .ok_or(LendingError::UnknownAsset { asset })
    }

    fn ledger_mut(&mut self, asset: Asset) -> Result<&mut AssetLedger, LendingError> {
        self.ledgers
            .get_mut(&asset)
            .ok_or(LendingError::UnknownAsset { asset })
    }

    /// Balance of `account`; zero for unknown assets
    pub fn balance_of(&self, asset: Asset, account: Address) -> U256 {
        self.ledgers
            .get(&asset)
            .map(|ledger| ledger.balance_of(account))
            .unwrap_or_default()
    }

    /// Total supply of `asset`; zero for unknown assets
    pub fn total_supply(&self, asset: Asset) -> U256 {
        self.ledgers
            .get(&asset)
            .map(|ledger| ledger.total_supply)
            .unwrap_or_default()
    }

    /// Credits `amount` to `account` from outside the protocol (a deposit from
    /// another chain account, a faucet). Not available for assets with a mint
    /// authority.
    pub fn deal(&mut self, asset: Asset, account: Address, amount: U256) -> Result<(), LendingError> {
        let ledger = self.ledger_mut(asset)?;
        if ledger.params.mint_authority.is_some() {
            return Err(LendingError::Unauthorized {
                caller: account,
                action: "deal a mintable asset",
            });
        }
        ledger.credit(account, amount)?;
        ledger.total_supply = checked_add(ledger.total_supply, amount)?;
        Ok(())
    }

    /// Mints `amount` to `to`; only the asset's mint authority may call this
    pub fn mint(
        &mut self,
        asset: Asset,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        let ledger = self.ledger_mut(asset)?;
        if ledger.params.mint_authority != Some(caller) {
            return Err(LendingError::Unauthorized {
                caller,
                action: "mint",
            });
        }
        ledger.credit(to, amount)?;
        ledger.total_supply = checked_add(ledger.total_supply, amount)?;
        Ok(())
    }

    /// Burns `amount` from `from`; only the asset's mint authority may call this
    pub fn burn(
        &mut self,
        asset: Asset,
        caller: Address,
        from: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        let ledger = self.ledger_mut(asset)?;
        if ledger.params.mint_authority != Some(caller) {
            return Err(LendingError::Unauthorized {
                caller,
                action: "burn",
            });
        }
        ledger.debit(asset, from, amount)?;
        ledger.total_supply = checked_sub(ledger.total_supply, amount)?;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Returns the amount the recipient actually received, which is smaller
    /// than `amount` for fee-on-transfer assets.
    pub fn transfer(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<U256, LendingError> {
        let ledger = self.ledger_mut(asset)?;
        let fee = w_mul_down(amount, ledger.params.transfer_fee)?;
        let delivered = checked_sub(amount, fee)?;

        ledger.debit(asset, from, amount)?;
        ledger.credit(to, delivered)?;
        ledger.total_supply = checked_sub(ledger.total_supply, fee)?;
        Ok(delivered)
    }

    /// Parameters of a registered asset
    pub fn params(&self, asset: Asset) -> Result<&AssetParams, LendingError> {
        Ok(&self.ledger(asset)?.params)
    }
}
