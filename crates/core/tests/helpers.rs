//! Shared fixtures for the lending core integration tests.

use std::sync::Arc;

use alloy_primitives::{address, Address, U256};
use lending_rs_core::{
    Asset, AssetParams, FixedRateModel, MarketConfig, MarketListing, MarketVariant, Protocol,
    StaticPriceOracle, WAD,
};

pub const OWNER: Address = address!("0000000000000000000000000000000000000001");
pub const CONTROLLER: Address = address!("00000000000000000000000000000000000000cc");
pub const MSD_CONTROLLER: Address = address!("00000000000000000000000000000000000000dd");

pub const ALICE: Address = address!("000000000000000000000000000000000000a11c");
pub const BOB: Address = address!("0000000000000000000000000000000000000b0b");
pub const CAROL: Address = address!("00000000000000000000000000000000000ca201");
pub const DAVE: Address = address!("000000000000000000000000000000000000da7e");

/// Native currency market
pub const ETH_MARKET: Address = address!("1000000000000000000000000000000000000001");
/// Stablecoin market, the only one that charges interest
pub const USD_MARKET: Address = address!("1000000000000000000000000000000000000002");
/// Synthetic dollar market
pub const USX_MARKET: Address = address!("1000000000000000000000000000000000000003");
/// Market of a token that burns 1% on every transfer
pub const FEE_MARKET: Address = address!("1000000000000000000000000000000000000004");

pub const USD_TOKEN: Address = address!("2000000000000000000000000000000000000002");
pub const FEE_TOKEN: Address = address!("2000000000000000000000000000000000000004");
pub const USX_TOKEN: Address = address!("3000000000000000000000000000000000000001");

pub const USD: Asset = Asset::Token(USD_TOKEN);
pub const FEE: Asset = Asset::Token(FEE_TOKEN);
pub const USX: Asset = Asset::Token(USX_TOKEN);

/// Borrow rate of the USD market: 0.01% per block
pub const USD_RATE: U256 = U256::from_limbs([100_000_000_000_000, 0, 0, 0]);

/// Whole units to base units
pub fn wad(n: u64) -> U256 {
    U256::from(n) * WAD
}

/// Percent to WAD
pub fn pct(n: u64) -> U256 {
    WAD * U256::from(n) / U256::from(100)
}

fn listing(
    address: Address,
    underlying: Asset,
    variant: MarketVariant,
    collateral_factor: U256,
    reserve_ratio: U256,
    borrow_rate: U256,
) -> MarketListing {
    MarketListing {
        address,
        underlying,
        variant,
        interest_rate_model: Arc::new(FixedRateModel::new().with_borrow_rate(address, borrow_rate)),
        reserve_ratio,
        config: MarketConfig::new(collateral_factor, WAD, U256::MAX, U256::MAX),
    }
}

/// A protocol with four markets at block 100:
///
/// | market | underlying | price | collateral factor |
/// |--------|------------|-------|-------------------|
/// | ETH    | native     | 2000  | 75%               |
/// | USD    | USD token  | 1     | 80%               |
/// | USX    | synthetic  | 1     | 0%                |
/// | FEE    | fee token  | 1     | 50%               |
///
/// The USD market keeps 10% of its interest as reserves. The USX market may
/// mint up to 10 000 USX.
pub fn setup() -> (Protocol, Arc<StaticPriceOracle>) {
    let oracle = Arc::new(StaticPriceOracle::new());
    oracle.set_price(ETH_MARKET, wad(2_000));
    oracle.set_price(USD_MARKET, WAD);
    oracle.set_price(USX_MARKET, WAD);
    oracle.set_price(FEE_MARKET, WAD);

    let mut protocol = Protocol::new(CONTROLLER, MSD_CONTROLLER, OWNER, oracle.clone());
    protocol.set_block_number(100).unwrap();

    protocol.register_asset(USD, AssetParams::default()).unwrap();
    protocol
        .register_asset(FEE, AssetParams::fee_on_transfer(pct(1)))
        .unwrap();
    protocol.add_msd(OWNER, USX_TOKEN).unwrap();
    protocol
        .msd_controller_mut()
        .add_minters(OWNER, USX_TOKEN, &[(USX_MARKET, wad(10_000))])
        .unwrap();

    let listings = [
        listing(ETH_MARKET, Asset::Native, MarketVariant::Cash, pct(75), U256::ZERO, U256::ZERO),
        listing(USD_MARKET, USD, MarketVariant::Cash, pct(80), pct(10), USD_RATE),
        listing(USX_MARKET, USX, MarketVariant::SyntheticDebt, U256::ZERO, U256::ZERO, U256::ZERO),
        listing(FEE_MARKET, FEE, MarketVariant::Cash, pct(50), U256::ZERO, U256::ZERO),
    ];
    for listing in listings {
        protocol.list_market(OWNER, listing).unwrap();
    }

    (protocol, oracle)
}

/// Deals `amount` of the market's underlying to `account` and supplies it as collateral
pub fn supply(protocol: &mut Protocol, market: Address, account: Address, amount: U256) -> U256 {
    let underlying = protocol.market(market).unwrap().underlying;
    protocol.deal(underlying, account, amount).unwrap();
    protocol
        .mint_and_enter_market(market, account, account, amount)
        .unwrap()
}

/// ALICE supplies 2000 USD, BOB supplies 1 ETH and borrows `debt` USD
pub fn setup_borrower(debt: U256) -> (Protocol, Arc<StaticPriceOracle>) {
    let (mut protocol, oracle) = setup();
    supply(&mut protocol, USD_MARKET, ALICE, wad(2_000));
    supply(&mut protocol, ETH_MARKET, BOB, wad(1));
    if !debt.is_zero() {
        protocol.borrow(USD_MARKET, BOB, debt).unwrap();
    }
    (protocol, oracle)
}
