//! Supply, borrow and repay flows through the protocol facade.

mod helpers;

use alloy_primitives::U256;
use helpers::*;
use lending_rs_core::{Action, Asset, ErrorKind, LendingError, WAD};

#[test]
fn test_interest_example() {
    let (mut protocol, _) = setup();

    // A mints 200 at the initial exchange rate
    let shares = supply(&mut protocol, USD_MARKET, ALICE, wad(200));
    assert_eq!(shares, wad(200));
    assert_eq!(protocol.cash(USD_MARKET).unwrap(), wad(200));

    // B borrows 100 against ETH
    supply(&mut protocol, ETH_MARKET, BOB, wad(1));
    protocol.borrow(USD_MARKET, BOB, wad(100)).unwrap();
    let market = protocol.market(USD_MARKET).unwrap();
    assert_eq!(market.cash, wad(100));
    assert_eq!(market.total_borrows, wad(100));
    assert_eq!(market.borrow_snapshot(BOB).unwrap().principal, wad(100));
    assert_eq!(protocol.bank().balance_of(USD, BOB), wad(100));

    // One block at 0.01%
    protocol.advance_blocks(1).unwrap();
    protocol.accrue_interest(USD_MARKET).unwrap();
    let market = protocol.market(USD_MARKET).unwrap();
    assert_eq!(market.total_borrows, wad(100) + U256::from(10_000_000_000_000_000u64));
    assert_eq!(market.total_reserves, U256::from(1_000_000_000_000_000u64));
    assert_eq!(market.borrow_index, WAD + USD_RATE);
    assert_eq!(
        protocol.borrow_balance_stored(USD_MARKET, BOB).unwrap(),
        wad(100) + U256::from(10_000_000_000_000_000u64)
    );

    // (100 + 100.01 - 0.001) / 200
    let exchange_rate = U256::from(1_000_045_000_000_000_000u64);
    assert_eq!(protocol.exchange_rate_stored(USD_MARKET).unwrap(), exchange_rate);

    // A's next mint is priced at the new rate
    let deposit = U256::from(100_004_500_000_000_000_000u128);
    let shares = supply(&mut protocol, USD_MARKET, ALICE, deposit);
    assert_eq!(shares, wad(100));
    assert_eq!(protocol.exchange_rate_stored(USD_MARKET).unwrap(), exchange_rate);
}

#[test]
fn test_accrual_is_lazy_and_idempotent() {
    let (mut protocol, _) = setup_borrower(wad(1_000));
    protocol.advance_blocks(10).unwrap();

    // Views see pending interest without touching state
    let pending = protocol.borrow_balance_current(USD_MARKET, BOB).unwrap();
    assert_eq!(protocol.borrow_balance_stored(USD_MARKET, BOB).unwrap(), wad(1_000));
    assert_eq!(pending, wad(1_001));
    assert_eq!(protocol.total_borrows_current(USD_MARKET).unwrap(), wad(1_001));

    let first = protocol.accrue_interest(USD_MARKET).unwrap();
    let second = protocol.accrue_interest(USD_MARKET).unwrap();

    assert_eq!(first.elapsed, 10);
    assert_eq!(second.interest, U256::ZERO);
    assert_eq!(protocol.borrow_balance_stored(USD_MARKET, BOB).unwrap(), pending);
}

#[test]
fn test_mint_redeem_conservation() {
    let (mut protocol, _) = setup();
    let shares = supply(&mut protocol, USD_MARKET, ALICE, wad(500));

    let paid = protocol.redeem(USD_MARKET, ALICE, ALICE, shares).unwrap();

    assert_eq!(paid, wad(500));
    assert_eq!(protocol.bank().balance_of(USD, ALICE), wad(500));
    assert_eq!(protocol.balance_of(USD_MARKET, ALICE).unwrap(), U256::ZERO);
    assert_eq!(protocol.market(USD_MARKET).unwrap().total_supply, U256::ZERO);
    assert_eq!(protocol.cash(USD_MARKET).unwrap(), U256::ZERO);
}

#[test]
fn test_zero_amounts() {
    let (mut protocol, _) = setup_borrower(wad(100));

    assert_eq!(protocol.mint(USD_MARKET, ALICE, ALICE, U256::ZERO).unwrap(), U256::ZERO);
    assert_eq!(
        protocol.redeem(USD_MARKET, ALICE, ALICE, U256::ZERO),
        Err(LendingError::ZeroAmount)
    );
    assert_eq!(
        protocol.redeem_underlying(USD_MARKET, ALICE, ALICE, U256::ZERO),
        Err(LendingError::ZeroAmount)
    );
    assert_eq!(protocol.borrow(USD_MARKET, BOB, U256::ZERO), Err(LendingError::ZeroAmount));
    assert_eq!(protocol.repay_borrow(USD_MARKET, BOB, U256::ZERO).unwrap(), U256::ZERO);
    assert_eq!(protocol.borrow_balance_stored(USD_MARKET, BOB).unwrap(), wad(100));
}

#[test]
fn test_redeem_rounding() {
    let (mut protocol, _) = setup_borrower(wad(100));
    protocol.advance_blocks(1).unwrap();
    protocol.accrue_interest(USD_MARKET).unwrap();
    assert!(protocol.exchange_rate_stored(USD_MARKET).unwrap() > WAD);

    // One wei of underlying still costs a whole share
    let burned = protocol
        .redeem_underlying(USD_MARKET, ALICE, ALICE, U256::from(1))
        .unwrap();
    assert_eq!(burned, U256::from(1));

    // One share pays out less than two wei
    let paid = protocol.redeem(USD_MARKET, ALICE, ALICE, U256::from(1)).unwrap();
    assert_eq!(paid, U256::from(1));
}

#[test]
fn test_borrow_repay_round_trip() {
    let (mut protocol, _) = setup_borrower(wad(100));
    assert_eq!(protocol.borrowed_markets(BOB), vec![USD_MARKET]);

    protocol.advance_blocks(10).unwrap();
    let debt = protocol.borrow_balance_current(USD_MARKET, BOB).unwrap();
    // 100 * (1 + 0.0001 * 10)
    assert_eq!(debt, U256::from(100_100_000_000_000_000_000u128));

    protocol.deal(USD, BOB, debt - wad(100)).unwrap();
    let repaid = protocol.repay_borrow(USD_MARKET, BOB, U256::MAX).unwrap();

    assert_eq!(repaid, debt);
    assert_eq!(protocol.borrow_balance_stored(USD_MARKET, BOB).unwrap(), U256::ZERO);
    assert_eq!(protocol.market(USD_MARKET).unwrap().total_borrows, U256::ZERO);
    assert!(protocol.borrowed_markets(BOB).is_empty());
    assert_eq!(protocol.bank().balance_of(USD, BOB), U256::ZERO);
}

#[test]
fn test_repay_behalf_and_over_repay() {
    let (mut protocol, _) = setup_borrower(wad(100));
    protocol.deal(USD, CAROL, wad(200)).unwrap();

    assert_eq!(
        protocol.repay_borrow_behalf(USD_MARKET, CAROL, BOB, wad(101)),
        Err(LendingError::RepayExceedsDebt {
            borrower: BOB,
            repay: wad(101),
            debt: wad(100),
        })
    );

    let repaid = protocol
        .repay_borrow_behalf(USD_MARKET, CAROL, BOB, wad(40))
        .unwrap();

    assert_eq!(repaid, wad(40));
    assert_eq!(protocol.borrow_balance_stored(USD_MARKET, BOB).unwrap(), wad(60));
    assert_eq!(protocol.bank().balance_of(USD, CAROL), wad(160));
    assert_eq!(protocol.borrowed_markets(BOB), vec![USD_MARKET]);
}

#[test]
fn test_borrow_limited_by_collateral() {
    let (mut protocol, _) = setup_borrower(U256::ZERO);

    // 1 ETH at 2000 with a 75% collateral factor
    assert!(matches!(
        protocol.borrow(USD_MARKET, BOB, wad(1_500) + U256::from(1)),
        Err(LendingError::InsufficientEquity { .. })
    ));
    protocol.borrow(USD_MARKET, BOB, wad(1_500)).unwrap();

    let equity = protocol.calc_account_equity(BOB).unwrap();
    assert_eq!(equity.equity, U256::ZERO);
    assert_eq!(equity.shortfall, U256::ZERO);
}

#[test]
fn test_collateral_locked_by_debt() {
    let (mut protocol, _) = setup_borrower(wad(1_000));
    let shares = protocol.balance_of(ETH_MARKET, BOB).unwrap();

    assert!(matches!(
        protocol.redeem(ETH_MARKET, BOB, BOB, shares),
        Err(LendingError::InsufficientEquity { .. })
    ));
    assert!(matches!(
        protocol.transfer(ETH_MARKET, BOB, CAROL, shares),
        Err(LendingError::InsufficientEquity { .. })
    ));
    assert!(matches!(
        protocol.exit_markets(BOB, &[ETH_MARKET]),
        Err(LendingError::ExitMarketRejected { .. })
    ));

    // A third of the ETH is free: 2/3 * 1500 = 1000
    let free = shares / U256::from(3);
    protocol.redeem(ETH_MARKET, BOB, BOB, free).unwrap();
    assert_eq!(protocol.bank().balance_of(Asset::Native, BOB), free);
}

#[test]
fn test_failed_call_leaves_no_trace() {
    let (mut protocol, _) = setup_borrower(wad(1_000));
    let cash = protocol.cash(USD_MARKET).unwrap();
    let snapshot = protocol.market(USD_MARKET).unwrap().borrow_snapshot(BOB);

    protocol.advance_blocks(5).unwrap();
    let result = protocol.borrow(USD_MARKET, BOB, wad(1_000));

    assert!(matches!(result, Err(LendingError::InsufficientEquity { .. })));
    let market = protocol.market(USD_MARKET).unwrap();
    // Not even the accrual at the start of the call survived
    assert_eq!(market.accrual_block_number, 100);
    assert_eq!(market.cash, cash);
    assert_eq!(market.borrow_snapshot(BOB), snapshot);
    assert_eq!(market.total_borrows, wad(1_000));
}

#[test]
fn test_supply_capacity_boundary() {
    let (mut protocol, _) = setup();
    supply(&mut protocol, USD_MARKET, ALICE, wad(200));
    protocol
        .controller_mut()
        .set_supply_capacity(OWNER, USD_MARKET, wad(300))
        .unwrap();
    protocol.deal(USD, ALICE, wad(200)).unwrap();

    assert!(matches!(
        protocol.mint(USD_MARKET, ALICE, ALICE, wad(100) + U256::from(1)),
        Err(LendingError::SupplyCapacityExceeded { .. })
    ));
    protocol.mint(USD_MARKET, ALICE, ALICE, wad(100)).unwrap();
    assert!(matches!(
        protocol.mint(USD_MARKET, ALICE, ALICE, U256::from(1)),
        Err(LendingError::SupplyCapacityExceeded { .. })
    ));
}

#[test]
fn test_borrow_capacity_boundary() {
    let (mut protocol, _) = setup_borrower(U256::ZERO);
    protocol
        .controller_mut()
        .set_borrow_capacity(OWNER, USD_MARKET, wad(100))
        .unwrap();
    assert_eq!(protocol.available_borrow_capacity(USD_MARKET).unwrap(), wad(100));

    protocol.borrow(USD_MARKET, BOB, wad(100)).unwrap();
    assert_eq!(
        protocol.borrow(USD_MARKET, BOB, U256::from(1)),
        Err(LendingError::BorrowCapacityExceeded {
            market: USD_MARKET,
            capacity: wad(100),
        })
    );
    assert_eq!(protocol.available_borrow_capacity(USD_MARKET).unwrap(), U256::ZERO);
}

#[test]
fn test_borrow_limited_by_cash() {
    let (mut protocol, _) = setup();
    supply(&mut protocol, USD_MARKET, ALICE, wad(10));
    supply(&mut protocol, ETH_MARKET, BOB, wad(1));

    assert_eq!(
        protocol.borrow(USD_MARKET, BOB, wad(11)),
        Err(LendingError::InsufficientCash {
            market: USD_MARKET,
            available: wad(10),
            required: wad(11),
        })
    );
}

#[test]
fn test_pause_flags() {
    let (mut protocol, _) = setup_borrower(U256::ZERO);
    protocol
        .controller_mut()
        .set_paused(OWNER, USD_MARKET, Action::Mint, true)
        .unwrap();
    protocol.deal(USD, ALICE, wad(1)).unwrap();

    assert_eq!(
        protocol.mint(USD_MARKET, ALICE, ALICE, wad(1)),
        Err(LendingError::ActionPaused {
            market: USD_MARKET,
            action: Action::Mint,
        })
    );
    // Other actions of the market keep working
    protocol.borrow(USD_MARKET, BOB, wad(1)).unwrap();

    protocol.set_protocol_paused(OWNER, true).unwrap();
    assert!(matches!(
        protocol.borrow(USD_MARKET, BOB, wad(1)),
        Err(LendingError::ActionPaused { .. })
    ));
    assert!(matches!(
        protocol.transfer(USD_MARKET, ALICE, CAROL, wad(1)),
        Err(LendingError::ActionPaused { .. })
    ));

    protocol.set_protocol_paused(OWNER, false).unwrap();
    protocol.mint(USD_MARKET, ALICE, ALICE, wad(1)).unwrap();
}

#[test]
fn test_missing_price_blocks_borrowing() {
    let (mut protocol, oracle) = setup_borrower(wad(100));
    oracle.remove_price(ETH_MARKET);

    let err = protocol.borrow(USD_MARKET, BOB, wad(1)).unwrap_err();

    assert_eq!(err, LendingError::PriceUnavailable { market: ETH_MARKET });
    assert_eq!(err.kind(), ErrorKind::OracleFailure);
    assert!(protocol.calc_account_equity(BOB).is_err());
    // Supplying does not value the account
    supply(&mut protocol, USD_MARKET, CAROL, wad(1));
}

#[test]
fn test_share_transfers_and_allowances() {
    let (mut protocol, _) = setup();
    protocol.deal(USD, ALICE, wad(100)).unwrap();
    protocol.mint(USD_MARKET, ALICE, ALICE, wad(100)).unwrap();

    protocol.transfer(USD_MARKET, ALICE, BOB, wad(10)).unwrap();
    assert_eq!(protocol.balance_of(USD_MARKET, BOB).unwrap(), wad(10));

    assert!(matches!(
        protocol.transfer_from(USD_MARKET, CAROL, ALICE, CAROL, wad(1)),
        Err(LendingError::InsufficientAllowance { .. })
    ));

    protocol.approve(USD_MARKET, ALICE, CAROL, wad(50)).unwrap();
    protocol
        .transfer_from(USD_MARKET, CAROL, ALICE, CAROL, wad(30))
        .unwrap();
    assert_eq!(protocol.allowance(USD_MARKET, ALICE, CAROL).unwrap(), wad(20));
    assert_eq!(protocol.balance_of(USD_MARKET, CAROL).unwrap(), wad(30));

    protocol.approve(USD_MARKET, ALICE, CAROL, U256::MAX).unwrap();
    protocol
        .transfer_from(USD_MARKET, CAROL, ALICE, CAROL, wad(60))
        .unwrap();
    assert_eq!(protocol.allowance(USD_MARKET, ALICE, CAROL).unwrap(), U256::MAX);
    assert_eq!(protocol.balance_of(USD_MARKET, ALICE).unwrap(), U256::ZERO);
}

#[test]
fn test_transfer_over_balance_from_entered_market() {
    let (mut protocol, _) = setup_borrower(wad(100));
    let balance = protocol.balance_of(ETH_MARKET, BOB).unwrap();
    protocol.approve(ETH_MARKET, BOB, CAROL, U256::MAX).unwrap();

    let expected = LendingError::InsufficientShares {
        market: ETH_MARKET,
        account: BOB,
        balance,
        required: balance + U256::from(1),
    };
    let err = protocol
        .transfer(ETH_MARKET, BOB, CAROL, balance + U256::from(1))
        .unwrap_err();
    assert_eq!(err, expected);
    assert_eq!(err.kind(), ErrorKind::PolicyRejection);

    let err = protocol
        .transfer_from(ETH_MARKET, CAROL, BOB, CAROL, balance + U256::from(1))
        .unwrap_err();
    assert_eq!(err, expected);
    assert_eq!(err.kind(), ErrorKind::PolicyRejection);
    assert_eq!(protocol.balance_of(ETH_MARKET, BOB).unwrap(), balance);
}

#[test]
fn test_fee_on_transfer_token() {
    let (mut protocol, _) = setup_borrower(U256::ZERO);
    protocol.deal(FEE, ALICE, wad(1_000)).unwrap();

    // 1% is burned on the way in; shares follow what arrived
    let shares = protocol.mint(FEE_MARKET, ALICE, ALICE, wad(1_000)).unwrap();
    assert_eq!(shares, wad(990));
    assert_eq!(protocol.cash(FEE_MARKET).unwrap(), wad(990));
    assert_eq!(protocol.exchange_rate_stored(FEE_MARKET).unwrap(), WAD);

    protocol.borrow(FEE_MARKET, BOB, wad(100)).unwrap();
    assert_eq!(protocol.bank().balance_of(FEE, BOB), wad(99));
    assert_eq!(protocol.borrow_balance_stored(FEE_MARKET, BOB).unwrap(), wad(100));

    // Repaying 50 only delivers 49.5
    let repaid = protocol.repay_borrow(FEE_MARKET, BOB, wad(50)).unwrap();
    let delivered = U256::from(49_500_000_000_000_000_000u128);
    assert_eq!(repaid, delivered);
    assert_eq!(
        protocol.borrow_balance_stored(FEE_MARKET, BOB).unwrap(),
        wad(100) - delivered
    );
    assert_eq!(protocol.cash(FEE_MARKET).unwrap(), wad(890) + delivered);
}

#[test]
fn test_donations_do_not_move_exchange_rate() {
    let (mut protocol, _) = setup();
    supply(&mut protocol, USD_MARKET, ALICE, wad(100));
    protocol.deal(USD, CAROL, wad(1_000)).unwrap();

    protocol
        .transfer_underlying(USD, CAROL, USD_MARKET, wad(1_000))
        .unwrap();

    assert_eq!(protocol.exchange_rate_stored(USD_MARKET).unwrap(), WAD);
    assert_eq!(protocol.cash(USD_MARKET).unwrap(), wad(100));
}

#[test]
fn test_reserves() {
    let (mut protocol, _) = setup_borrower(wad(1_000));
    protocol.advance_blocks(100).unwrap();
    protocol.accrue_interest(USD_MARKET).unwrap();

    let market = protocol.market(USD_MARKET).unwrap();
    // 10% of 1000 * 0.0001 * 100
    assert_eq!(market.total_reserves, wad(1));
    let exchange_rate = protocol.exchange_rate_stored(USD_MARKET).unwrap();

    assert!(matches!(
        protocol.withdraw_reserves(OWNER, USD_MARKET, wad(2)),
        Err(LendingError::InsufficientReserves { .. })
    ));
    protocol.withdraw_reserves(OWNER, USD_MARKET, wad(1)).unwrap();

    assert_eq!(protocol.bank().balance_of(USD, OWNER), wad(1));
    assert_eq!(protocol.market(USD_MARKET).unwrap().total_reserves, U256::ZERO);
    assert_eq!(protocol.exchange_rate_stored(USD_MARKET).unwrap(), exchange_rate);
}

#[test]
fn test_reserve_ratio_change_settles_interest_first() {
    let (mut protocol, _) = setup_borrower(wad(1_000));
    protocol.advance_blocks(100).unwrap();

    protocol.set_reserve_ratio(OWNER, USD_MARKET, pct(50)).unwrap();

    // The first 100 blocks were charged at 10%
    assert_eq!(protocol.market(USD_MARKET).unwrap().total_reserves, wad(1));
    assert_eq!(protocol.market(USD_MARKET).unwrap().accrual_block_number, 200);
}

#[test]
fn test_synthetic_market_has_no_supply_side() {
    let (mut protocol, _) = setup();
    assert_eq!(
        protocol.mint(USX_MARKET, ALICE, ALICE, wad(1)),
        Err(LendingError::UnsupportedOperation {
            market: USX_MARKET,
            operation: "mint",
        })
    );
    assert!(matches!(
        protocol.redeem(USX_MARKET, ALICE, ALICE, wad(1)),
        Err(LendingError::UnsupportedOperation { .. })
    ));
    assert!(matches!(
        protocol.transfer(USX_MARKET, ALICE, BOB, wad(1)),
        Err(LendingError::UnsupportedOperation { .. })
    ));
}

#[test]
fn test_membership() {
    let (mut protocol, _) = setup();
    protocol.deal(USD, ALICE, wad(10)).unwrap();
    protocol.mint(USD_MARKET, ALICE, ALICE, wad(10)).unwrap();
    assert!(protocol.entered_markets(ALICE).is_empty());

    protocol.enter_markets(ALICE, &[USD_MARKET, USD_MARKET]).unwrap();
    protocol.enter_markets(ALICE, &[USD_MARKET]).unwrap();
    assert_eq!(protocol.entered_markets(ALICE), vec![USD_MARKET]);
    assert_eq!(
        protocol.calc_account_equity(ALICE).unwrap().collateral_value,
        wad(8)
    );

    protocol.redeem(USD_MARKET, ALICE, ALICE, wad(10)).unwrap();
    protocol.exit_markets(ALICE, &[USD_MARKET]).unwrap();
    assert!(protocol.entered_markets(ALICE).is_empty());
}

#[test]
fn test_positions_view() {
    let (protocol, _) = setup_borrower(wad(100));

    let positions = protocol.positions(BOB).unwrap();

    assert_eq!(positions.len(), 2);
    let eth = positions.iter().find(|p| p.market == ETH_MARKET).unwrap();
    assert_eq!(eth.supplied, wad(1));
    assert!(eth.is_collateral);
    let usd = positions.iter().find(|p| p.market == USD_MARKET).unwrap();
    assert_eq!(usd.debt, wad(100));
    assert_eq!(usd.shares, U256::ZERO);
}

#[test]
fn test_rates_follow_utilization() {
    let (protocol, _) = setup_borrower(wad(1_000));

    // 1000 of 2000 borrowed
    assert_eq!(protocol.utilization(USD_MARKET).unwrap(), pct(50));
    assert_eq!(protocol.borrow_rate_per_block(USD_MARKET).unwrap(), USD_RATE);
    assert!(protocol.supply_rate_per_block(USD_MARKET).unwrap() < USD_RATE);
    assert!(protocol.borrow_apy(USD_MARKET).unwrap() > protocol.supply_apy(USD_MARKET).unwrap());
}

#[test]
fn test_borrow_rate_ceiling_halts_market() {
    let (mut protocol, _) = setup_borrower(wad(100));
    protocol
        .set_max_borrow_rate(OWNER, USD_MARKET, USD_RATE - U256::from(1))
        .unwrap();
    protocol.advance_blocks(1).unwrap();

    let err = protocol.repay_borrow(USD_MARKET, BOB, wad(1)).unwrap_err();

    assert!(matches!(err, LendingError::BorrowRateTooHigh { .. }));
    assert!(err.is_fatal());
}
