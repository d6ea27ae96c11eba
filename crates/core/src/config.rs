//! Protocol configuration.
//!
//! A [`ProtocolConfig`] describes a whole deployment: governance addresses,
//! liquidation parameters, underlying tokens, synthetic assets and markets.
//! Fractions (factors, ratios, annual rates) are written as decimals, e.g.
//! `"0.75"`; amounts are integer strings in base units, decimal or `0x` hex.
//!
//! ```rust
//! use std::sync::Arc;
//! use lending_rs_core::{Protocol, ProtocolConfig, StaticPriceOracle};
//!
//! let json = r#"{
//!     "owner": "0x0000000000000000000000000000000000000001",
//!     "controller": "0x00000000000000000000000000000000000000cc",
//!     "msd_controller": "0x00000000000000000000000000000000000000dd",
//!     "markets": [{
//!         "address": "0x1000000000000000000000000000000000000001",
//!         "underlying": "native",
//!         "variant": "cash",
//!         "collateral_factor": "0.75",
//!         "interest_rate_model": { "type": "fixed", "borrow_rate": "0.05" }
//!     }]
//! }"#;
//!
//! let config = ProtocolConfig::from_json(json).unwrap();
//! let protocol = Protocol::from_config(&config, Arc::new(StaticPriceOracle::new())).unwrap();
//! assert_eq!(protocol.markets().len(), 1);
//! ```

use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::asset::{Asset, AssetParams};
use crate::controller::MarketConfig;
use crate::error::LendingError;
use crate::irm::{FixedRateModel, InterestRateModel, JumpRateModel};
use crate::market::MarketVariant;
use crate::math::annual_to_per_block;
use crate::oracle::PriceOracle;
use crate::protocol::{MarketListing, Protocol};

/// Whole-protocol configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Governance account of the controller and the MSD controller
    pub owner: Address,
    pub controller: Address,
    pub msd_controller: Address,
    #[serde(default = "default_close_factor")]
    pub close_factor: Decimal,
    #[serde(default = "default_liquidation_incentive")]
    pub liquidation_incentive: Decimal,
    /// Token ledgers to create; the native currency always exists
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
    #[serde(default)]
    pub msd_tokens: Vec<MsdTokenConfig>,
    #[serde(default)]
    pub markets: Vec<MarketSettings>,
}

/// An underlying token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetConfig {
    pub token: Address,
    /// Fraction burned on every transfer
    #[serde(default)]
    pub transfer_fee: Decimal,
}

/// A synthetic asset and its minters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MsdTokenConfig {
    pub token: Address,
    #[serde(default)]
    pub minters: Vec<MinterConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinterConfig {
    pub minter: Address,
    #[serde(deserialize_with = "deserialize_amount")]
    pub cap: U256,
}

/// A market to list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketSettings {
    pub address: Address,
    pub underlying: Asset,
    pub variant: MarketVariant,
    pub collateral_factor: Decimal,
    #[serde(default = "one")]
    pub borrow_factor: Decimal,
    #[serde(default = "unlimited", deserialize_with = "deserialize_amount")]
    pub supply_capacity: U256,
    #[serde(default = "unlimited", deserialize_with = "deserialize_amount")]
    pub borrow_capacity: U256,
    #[serde(default)]
    pub reserve_ratio: Decimal,
    pub interest_rate_model: InterestModelConfig,
}

/// Rate model with annual rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterestModelConfig {
    /// Linear up to `kink` utilization, steeper above
    Jump {
        base_rate: Decimal,
        multiplier: Decimal,
        jump_multiplier: Decimal,
        kink: Decimal,
    },
    /// Constant borrow rate
    Fixed { borrow_rate: Decimal },
}

fn default_close_factor() -> Decimal {
    Decimal::new(5, 1)
}

fn default_liquidation_incentive() -> Decimal {
    Decimal::new(107, 2)
}

fn one() -> Decimal {
    Decimal::ONE
}

fn unlimited() -> U256 {
    U256::MAX
}

/// Reads an amount written as a decimal or `0x` hex string.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    U256::from_str(&raw).map_err(serde::de::Error::custom)
}

/// Converts a non-negative decimal fraction to WAD, truncating below 1e-18.
pub fn decimal_to_wad(name: &str, value: Decimal) -> Result<U256, LendingError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(LendingError::InvalidConfig(format!("{name} must not be negative: {value}")));
    }
    value
        .checked_mul(Decimal::from(1_000_000_000_000_000_000u64))
        .and_then(|scaled| scaled.trunc().to_u128())
        .map(U256::from)
        .ok_or_else(|| LendingError::InvalidConfig(format!("{name} is out of range: {value}")))
}

impl ProtocolConfig {
    /// Parses a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, LendingError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl InterestModelConfig {
    /// Builds the per-block model for `market`
    pub fn build(&self, market: Address) -> Result<Arc<dyn InterestRateModel>, LendingError> {
        let model: Arc<dyn InterestRateModel> = match self {
            InterestModelConfig::Jump {
                base_rate,
                multiplier,
                jump_multiplier,
                kink,
            } => Arc::new(JumpRateModel::from_annual(
                decimal_to_wad("base rate", *base_rate)?,
                decimal_to_wad("multiplier", *multiplier)?,
                decimal_to_wad("jump multiplier", *jump_multiplier)?,
                decimal_to_wad("kink", *kink)?,
            )),
            InterestModelConfig::Fixed { borrow_rate } => Arc::new(FixedRateModel::new().with_borrow_rate(
                market,
                annual_to_per_block(decimal_to_wad("borrow rate", *borrow_rate)?),
            )),
        };
        Ok(model)
    }
}

impl MarketSettings {
    fn listing(&self) -> Result<MarketListing, LendingError> {
        Ok(MarketListing {
            address: self.address,
            underlying: self.underlying,
            variant: self.variant,
            interest_rate_model: self.interest_rate_model.build(self.address)?,
            reserve_ratio: decimal_to_wad("reserve ratio", self.reserve_ratio)?,
            config: MarketConfig::new(
                decimal_to_wad("collateral factor", self.collateral_factor)?,
                decimal_to_wad("borrow factor", self.borrow_factor)?,
                self.supply_capacity,
                self.borrow_capacity,
            ),
        })
    }
}

impl Protocol {
    /// Builds a protocol at block 0 from `config`.
    ///
    /// Every parameter goes through the same checks as the governance
    /// setters, so an invalid value is rejected here rather than at use.
    pub fn from_config(
        config: &ProtocolConfig,
        oracle: Arc<dyn PriceOracle>,
    ) -> Result<Self, LendingError> {
        let owner = config.owner;
        let mut protocol = Protocol::new(config.controller, config.msd_controller, owner, oracle);

        let controller = protocol.controller_mut();
        controller.set_close_factor(owner, decimal_to_wad("close factor", config.close_factor)?)?;
        controller.set_liquidation_incentive(
            owner,
            decimal_to_wad("liquidation incentive", config.liquidation_incentive)?,
        )?;

        for asset in &config.assets {
            let fee = decimal_to_wad("transfer fee", asset.transfer_fee)?;
            protocol.register_asset(Asset::Token(asset.token), AssetParams::fee_on_transfer(fee))?;
        }

        for msd in &config.msd_tokens {
            protocol.add_msd(owner, msd.token)?;
            let minters: Vec<(Address, U256)> = msd
                .minters
                .iter()
                .map(|minter| (minter.minter, minter.cap))
                .collect();
            protocol
                .msd_controller_mut()
                .add_minters(owner, msd.token, &minters)?;
        }

        for market in &config.markets {
            protocol.list_market(owner, market.listing()?)?;
        }

        tracing::info!(
            markets = config.markets.len(),
            msd_tokens = config.msd_tokens.len(),
            "protocol built from config"
        );
        Ok(protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WAD;
    use crate::oracle::StaticPriceOracle;
    use alloy_primitives::address;
    use rust_decimal_macros::dec;

    const CONFIG: &str = r#"{
        "owner": "0x0000000000000000000000000000000000000001",
        "controller": "0x00000000000000000000000000000000000000cc",
        "msd_controller": "0x00000000000000000000000000000000000000dd",
        "close_factor": "0.4",
        "assets": [
            { "token": "0x2000000000000000000000000000000000000001" },
            { "token": "0x2000000000000000000000000000000000000002", "transfer_fee": "0.01" }
        ],
        "msd_tokens": [{
            "token": "0x3000000000000000000000000000000000000001",
            "minters": [{ "minter": "0x1000000000000000000000000000000000000003", "cap": "1000000000000000000000" }]
        }],
        "markets": [
            {
                "address": "0x1000000000000000000000000000000000000001",
                "underlying": { "token": "0x2000000000000000000000000000000000000001" },
                "variant": "cash",
                "collateral_factor": "0.75",
                "borrow_factor": "0.9",
                "supply_capacity": "0x3635c9adc5dea00000",
                "reserve_ratio": "0.1",
                "interest_rate_model": {
                    "type": "jump",
                    "base_rate": "0.02",
                    "multiplier": "0.1",
                    "jump_multiplier": "1",
                    "kink": "0.8"
                }
            },
            {
                "address": "0x1000000000000000000000000000000000000003",
                "underlying": { "token": "0x3000000000000000000000000000000000000001" },
                "variant": "synthetic_debt",
                "collateral_factor": "0",
                "interest_rate_model": { "type": "fixed", "borrow_rate": "0.03" }
            }
        ]
    }"#;

    #[test]
    fn test_decimal_to_wad() {
        assert_eq!(decimal_to_wad("x", dec!(1)).unwrap(), WAD);
        assert_eq!(
            decimal_to_wad("x", dec!(0.75)).unwrap(),
            U256::from(750_000_000_000_000_000u64)
        );
        assert_eq!(decimal_to_wad("x", dec!(0.0000000000000000001)).unwrap(), U256::ZERO);
        assert!(matches!(
            decimal_to_wad("x", dec!(-0.1)),
            Err(LendingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_protocol_from_config() {
        let config = ProtocolConfig::from_json(CONFIG).unwrap();
        let protocol = Protocol::from_config(&config, Arc::new(StaticPriceOracle::new())).unwrap();

        let cash_market = address!("1000000000000000000000000000000000000001");
        let synthetic_market = address!("1000000000000000000000000000000000000003");
        let fee_token = address!("2000000000000000000000000000000000000002");
        let msd_token = address!("3000000000000000000000000000000000000001");

        assert_eq!(
            protocol.controller().close_factor(),
            U256::from(400_000_000_000_000_000u64)
        );
        assert_eq!(
            protocol.controller().liquidation_incentive(),
            U256::from(1_070_000_000_000_000_000u64)
        );

        let config = protocol.controller().market_config(cash_market).unwrap();
        assert_eq!(config.supply_capacity, U256::from(1_000u64) * WAD);
        assert_eq!(config.borrow_capacity, U256::MAX);
        assert_eq!(config.borrow_factor, U256::from(900_000_000_000_000_000u64));
        assert_eq!(
            protocol.market(cash_market).unwrap().reserve_ratio,
            WAD / U256::from(10)
        );

        assert_eq!(
            protocol.bank().params(Asset::Token(fee_token)).unwrap().transfer_fee,
            WAD / U256::from(100)
        );
        assert_eq!(
            protocol.msd_controller().remaining_cap(msd_token, synthetic_market),
            U256::from(1_000u64) * WAD
        );
        assert_eq!(
            protocol.market(synthetic_market).unwrap().variant,
            MarketVariant::SyntheticDebt
        );
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let json = r#"{
            "owner": "0x0000000000000000000000000000000000000001",
            "controller": "0x00000000000000000000000000000000000000cc",
            "msd_controller": "0x00000000000000000000000000000000000000dd",
            "colateral_factor": "0.5"
        }"#;
        assert!(matches!(
            ProtocolConfig::from_json(json),
            Err(LendingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let mut config = ProtocolConfig::from_json(CONFIG).unwrap();
        config.liquidation_incentive = dec!(2);

        let result = Protocol::from_config(&config, Arc::new(StaticPriceOracle::new()));

        assert!(matches!(result, Err(LendingError::InvalidParameter { .. })));
    }
}
