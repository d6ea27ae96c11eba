//! MSD controller: registry of synthetic assets and their minters.
//!
//! Every synthetic asset is a [`Bank`] ledger whose mint authority is the MSD
//! controller. Minters (synthetic-debt markets) mint against an individual cap
//! and burn when debt is repaid. A minter's outstanding amount never drops
//! below zero.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{Address, U256};

use crate::asset::{Asset, AssetParams, Bank};
use crate::error::LendingError;
use crate::math::{checked_add, zero_floor_sub};

/// Mint allowance of one minter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinterCap {
    pub cap: U256,
    pub minted: U256,
}

impl MinterCap {
    /// Amount still mintable under the cap
    pub fn remaining(&self) -> U256 {
        self.cap.saturating_sub(self.minted)
    }
}

/// Synthetic asset registry.
#[derive(Debug, Clone)]
pub struct MsdController {
    /// Mint authority of every registered synthetic asset
    pub address: Address,
    owner: Address,
    tokens: BTreeMap<Address, HashMap<Address, MinterCap>>,
}

impl MsdController {
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            tokens: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn ensure_owner(&self, caller: Address, action: &'static str) -> Result<(), LendingError> {
        if caller != self.owner {
            return Err(LendingError::Unauthorized { caller, action });
        }
        Ok(())
    }

    fn minters_mut(&mut self, token: Address) -> Result<&mut HashMap<Address, MinterCap>, LendingError> {
        self.tokens
            .get_mut(&token)
            .ok_or(LendingError::UnknownMsdToken { token })
    }

    /// Registered synthetic assets
    pub fn msd_tokens(&self) -> Vec<Address> {
        self.tokens.keys().copied().collect()
    }

    pub fn is_msd(&self, token: Address) -> bool {
        self.tokens.contains_key(&token)
    }

    /// Minters of `token`, with their caps
    pub fn minters(&self, token: Address) -> Vec<(Address, MinterCap)> {
        let mut minters: Vec<_> = self
            .tokens
            .get(&token)
            .map(|minters| minters.iter().map(|(minter, cap)| (*minter, *cap)).collect())
            .unwrap_or_default();
        minters.sort_by_key(|(minter, _)| *minter);
        minters
    }

    pub fn is_minter(&self, token: Address, minter: Address) -> bool {
        self.tokens
            .get(&token)
            .is_some_and(|minters| minters.contains_key(&minter))
    }

    /// Cap state of a registered minter
    pub fn minter_cap(&self, token: Address, minter: Address) -> Result<MinterCap, LendingError> {
        self.tokens
            .get(&token)
            .ok_or(LendingError::UnknownMsdToken { token })?
            .get(&minter)
            .copied()
            .ok_or(LendingError::NotMinter { token, minter })
    }

    /// Amount `minter` may still mint; zero for non-minters
    pub fn remaining_cap(&self, token: Address, minter: Address) -> U256 {
        self.minter_cap(token, minter)
            .map(|cap| cap.remaining())
            .unwrap_or_default()
    }

    /// Registers a synthetic asset and creates its ledger in `bank`
    pub fn add_msd(
        &mut self,
        bank: &mut Bank,
        caller: Address,
        token: Address,
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "add MSD token")?;
        if self.tokens.contains_key(&token) {
            return Err(LendingError::MsdTokenAlreadyAdded { token });
        }
        bank.register(Asset::Token(token), AssetParams::mintable_by(self.address))?;
        self.tokens.insert(token, HashMap::new());
        tracing::info!(%token, "MSD token added");
        Ok(())
    }

    /// Registers minters with their caps. Existing minters keep what they minted.
    pub fn add_minters(
        &mut self,
        caller: Address,
        token: Address,
        minters: &[(Address, U256)],
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "add MSD minters")?;
        let registered = self.minters_mut(token)?;
        for (minter, cap) in minters {
            registered.entry(*minter).or_default().cap = *cap;
            tracing::info!(%token, %minter, %cap, "MSD minter added");
        }
        Ok(())
    }

    pub fn remove_minters(
        &mut self,
        caller: Address,
        token: Address,
        minters: &[Address],
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "remove MSD minters")?;
        let registered = self.minters_mut(token)?;
        for minter in minters {
            if registered.remove(minter).is_some() {
                tracing::info!(%token, %minter, "MSD minter removed");
            }
        }
        Ok(())
    }

    /// Changes caps of registered minters. A cap below the minted amount
    /// blocks further minting without touching existing debt.
    pub fn set_minter_caps(
        &mut self,
        caller: Address,
        token: Address,
        caps: &[(Address, U256)],
    ) -> Result<(), LendingError> {
        self.ensure_owner(caller, "set MSD minter caps")?;
        let registered = self.minters_mut(token)?;
        if let Some((minter, _)) = caps.iter().find(|(minter, _)| !registered.contains_key(minter)) {
            return Err(LendingError::NotMinter {
                token,
                minter: *minter,
            });
        }
        for (minter, cap) in caps {
            if let Some(state) = registered.get_mut(minter) {
                state.cap = *cap;
            }
            tracing::info!(%token, %minter, %cap, "MSD minter cap updated");
        }
        Ok(())
    }

    /// Mints `amount` of `token` to `to` on behalf of `minter`
    pub fn mint_msd(
        &mut self,
        bank: &mut Bank,
        token: Address,
        minter: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        let authority = self.address;
        let state = self
            .minters_mut(token)?
            .get_mut(&minter)
            .ok_or(LendingError::NotMinter { token, minter })?;

        let minted = checked_add(state.minted, amount)?;
        if minted > state.cap {
            return Err(LendingError::MintCapExceeded {
                token,
                minter,
                remaining: state.remaining(),
            });
        }
        state.minted = minted;
        bank.mint(Asset::Token(token), authority, to, amount)?;
        tracing::debug!(%token, %minter, %to, %amount, "MSD minted");
        Ok(())
    }

    /// Burns `amount` of `token` from `from` on behalf of `minter`
    pub fn burn_msd(
        &mut self,
        bank: &mut Bank,
        token: Address,
        minter: Address,
        from: Address,
        amount: U256,
    ) -> Result<(), LendingError> {
        let authority = self.address;
        let state = self
            .minters_mut(token)?
            .get_mut(&minter)
            .ok_or(LendingError::NotMinter { token, minter })?;

        state.minted = zero_floor_sub(state.minted, amount);
        bank.burn(Asset::Token(token), authority, from, amount)?;
        tracing::debug!(%token, %minter, %from, %amount, "MSD burned");
        Ok(())
    }
}
