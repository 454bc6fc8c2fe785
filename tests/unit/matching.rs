//! End-to-end order book scenarios: matching, priority, icebergs,
//! stops, self-trade prevention and the book invariants.

use microstructure_engine::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

fn book() -> OrderBook {
    let mut b = OrderBook::new("ITEST");
    b.enable_self_trade_prevention(false);
    b
}

#[test]
fn basic_cross_produces_one_enhanced_fill() {
    let mut b = book();
    b.add_limit_order(1, 1, Side::Buy, 100.0, 100, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Sell, 100.0, 100, TimeInForce::Gtc);

    let fills = b.fill_router().all_fills();
    assert_eq!(fills.len(), 1);
    let fill = &fills[0];
    assert_eq!(fill.fill.buy_order_id, 1);
    assert_eq!(fill.fill.sell_order_id, 2);
    assert_eq!(fill.fill.price, 100.0);
    assert_eq!(fill.fill.quantity, 100);
    assert_eq!(fill.buy_account_id, 1);
    assert_eq!(fill.sell_account_id, 2);
    assert_eq!(fill.aggressor_side, Side::Sell);
    // Seller aggressed: the buyer made liquidity.
    assert_eq!(fill.liquidity_flag, LiquidityFlag::Maker);

    assert_eq!(b.order(1).unwrap().state, OrderState::Filled);
    assert_eq!(b.order(2).unwrap().state, OrderState::Filled);
    assert!(b.spread().is_none());
}

#[test]
fn price_time_priority_scenario() {
    let mut b = book();
    b.add_limit_order(1, 1, Side::Buy, 100.0, 50, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Buy, 100.0, 50, TimeInForce::Gtc);
    b.add_limit_order(3, 3, Side::Sell, 100.0, 70, TimeInForce::Ioc);

    let fills = b.fills();
    assert_eq!(fills.len(), 2);
    assert_eq!((fills[0].buy_order_id, fills[0].quantity), (1, 50));
    assert_eq!((fills[1].buy_order_id, fills[1].quantity), (2, 20));

    assert_eq!(b.order(1).unwrap().state, OrderState::Filled);
    let o2 = b.order(2).unwrap();
    assert_eq!(o2.state, OrderState::PartiallyFilled);
    assert_eq!(o2.remaining_qty, 30);
    assert_eq!(b.order(3).unwrap().state, OrderState::Filled);
}

#[test]
fn iceberg_refresh_scenario() {
    let mut b = book();
    b.add_iceberg_order(1, 1, Side::Sell, 100.0, 1000, 100, TimeInForce::Gtc);

    for k in 0..10u64 {
        b.add_limit_order(10 + k, 2, Side::Buy, 100.0, 100, TimeInForce::Ioc);
        let o = b.order(1).unwrap();
        if k < 9 {
            assert_eq!(o.display_qty, 100);
            assert_eq!(o.hidden_qty, 800 - 100 * k);
            assert_eq!(o.display_qty + o.hidden_qty, o.remaining_qty);
            // The refreshed tranche is still quoted on the ask side.
            let levels = b.levels(Side::Sell, 1);
            assert_eq!(levels[0].total_quantity, 100);
        } else {
            assert_eq!(o.state, OrderState::Filled);
        }
    }
    assert_eq!(b.fills().len(), 10);
    assert!(b.fills().iter().all(|f| f.quantity == 100));
}

#[test]
fn self_trade_prevention_scenario() {
    let mut b = OrderBook::new("ITEST");
    b.enable_self_trade_prevention(true);

    let notifications = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&notifications);
    b.fill_router_mut()
        .register_self_trade_callback(Arc::new(move |account, _, _| {
            assert_eq!(account, 7);
            counter.fetch_add(1, Ordering::Relaxed);
        }));

    b.add_limit_order(1, 7, Side::Buy, 100.0, 100, TimeInForce::Gtc);
    b.add_limit_order(2, 7, Side::Sell, 100.0, 100, TimeInForce::Ioc);

    assert_eq!(b.fill_router().all_fills().len(), 0);
    assert_eq!(b.fill_router().self_trades_prevented(), 1);
    assert_eq!(notifications.load(Ordering::Relaxed), 1);

    let o2 = b.order(2).unwrap();
    assert_eq!(o2.state, OrderState::Cancelled);
    assert_eq!(o2.remaining_qty, 0);
    assert_eq!(b.best_bid().unwrap().id, 1);

    // Invariant: no enhanced fill with equal accounts.
    assert!(
        b.fill_router()
            .all_fills()
            .iter()
            .all(|f| f.buy_account_id != f.sell_account_id)
    );
}

#[test]
fn stop_triggers_on_trade_scenario() {
    let mut b = book();
    // Resting cross seeds the last trade at 100.
    b.add_limit_order(1, 1, Side::Buy, 100.0, 100, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Sell, 100.0, 100, TimeInForce::Gtc);

    b.add_stop_market_order(3, 3, Side::Sell, 99.0, 50);
    assert_eq!(b.pending_stop_count(), 1);

    // Liquidity for both the trigger trade and the stop itself.
    b.add_limit_order(5, 5, Side::Buy, 99.0, 50, TimeInForce::Gtc);
    b.add_limit_order(6, 6, Side::Buy, 99.0, 50, TimeInForce::Gtc);
    b.add_limit_order(4, 4, Side::Sell, 99.0, 50, TimeInForce::Ioc);

    assert_eq!(b.pending_stop_count(), 0);
    let o3 = b.order(3).unwrap();
    assert!(o3.stop_triggered);
    assert_eq!(o3.state, OrderState::Filled);
    let stop_fill = b
        .fills()
        .iter()
        .find(|f| f.sell_order_id == 3)
        .expect("stop traded");
    assert_eq!(stop_fill.price, 99.0);
    assert_eq!(stop_fill.quantity, 50);
}

#[test]
fn stop_at_or_through_reference_fires_immediately() {
    let mut b = book();
    b.add_limit_order(1, 1, Side::Buy, 100.0, 60, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Sell, 100.0, 10, TimeInForce::Gtc);
    assert_eq!(b.last_trade_price(), Some(100.0));

    // stop_price >= reference: fires at submission and trades.
    b.add_stop_market_order(3, 3, Side::Sell, 100.0, 25);
    assert_eq!(b.pending_stop_count(), 0);
    assert_eq!(b.order(3).unwrap().state, OrderState::Filled);
}

#[test]
fn fok_depth_boundary() {
    let mut b = book();
    b.add_limit_order(1, 1, Side::Sell, 100.0, 99, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Buy, 100.0, 100, TimeInForce::Fok);
    assert_eq!(b.fills().len(), 0);
    assert_eq!(b.order(2).unwrap().state, OrderState::Cancelled);

    // One more unit of depth and the same order fills completely.
    b.add_limit_order(3, 3, Side::Sell, 100.0, 1, TimeInForce::Gtc);
    b.add_limit_order(4, 4, Side::Buy, 100.0, 100, TimeInForce::Fok);
    assert_eq!(b.order(4).unwrap().state, OrderState::Filled);
}

#[test]
fn market_order_without_liquidity_cancels() {
    let mut b = book();
    let o = b.add_market_order(1, 1, Side::Buy, 100).unwrap();
    assert_eq!(o.state, OrderState::Cancelled);
    assert_eq!(b.fills().len(), 0);
}

#[test]
fn iceberg_with_large_peak_behaves_like_plain_limit() {
    let mut b = book();
    b.add_iceberg_order(1, 1, Side::Sell, 100.0, 100, 500, TimeInForce::Gtc);
    let o = b.order(1).unwrap();
    assert_eq!(o.display_qty, 100);
    assert_eq!(o.hidden_qty, 0);

    b.add_limit_order(2, 2, Side::Buy, 100.0, 100, TimeInForce::Ioc);
    assert_eq!(b.order(1).unwrap().state, OrderState::Filled);
    assert_eq!(b.fills().len(), 1);
}

#[test]
fn fees_are_applied_per_aggressor() {
    let mut b = book();
    b.set_fee_schedule(0.0001, 0.0002);
    b.add_limit_order(1, 1, Side::Buy, 100.0, 100, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Sell, 100.0, 100, TimeInForce::Gtc);

    let fill = &b.fill_router().all_fills()[0];
    // Seller aggressed: taker fee on the seller, maker on the buyer.
    assert!((fill.seller_fee - 10_000.0 * 0.0002).abs() < 1e-9);
    assert!((fill.buyer_fee - 10_000.0 * 0.0001).abs() < 1e-9);
}

#[test]
fn fill_quantities_never_exceed_original() {
    let mut b = book();
    b.add_iceberg_order(1, 1, Side::Sell, 100.0, 777, 50, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Sell, 100.0, 100, TimeInForce::Gtc);
    b.add_market_order(3, 3, Side::Buy, 2_000);

    for id in [1u64, 2] {
        let original = if id == 1 { 777 } else { 100 };
        let sold: u64 = b
            .fills()
            .iter()
            .filter(|f| f.sell_order_id == id)
            .map(|f| f.quantity)
            .sum();
        assert!(sold <= original);
        let order = b.order(id).unwrap();
        if order.state == OrderState::Filled {
            assert_eq!(sold, original);
        }
    }
}

#[test]
fn gtc_remainder_stays_queryable() {
    let mut b = book();
    b.add_limit_order(1, 1, Side::Buy, 100.0, 100, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Sell, 100.0, 40, TimeInForce::Gtc);

    // Invariant 5: the unfilled GTC order is visible both in the
    // authoritative store and at the top of book.
    let o1 = b.order(1).unwrap();
    assert_eq!(o1.state, OrderState::PartiallyFilled);
    assert_eq!(o1.remaining_qty, 60);
    assert_eq!(b.best_bid().unwrap().id, 1);
    assert_eq!(b.levels(Side::Buy, 1)[0].total_quantity, 60);
}

#[test]
fn monitored_book_records_latencies() {
    let monitor = Arc::new(PerformanceMonitor::new("book"));
    let mut b = book();
    b.set_monitor(Arc::clone(&monitor));

    for i in 0..10 {
        b.add_limit_order(i + 1, 1, Side::Buy, 100.0 - i as f64, 10, TimeInForce::Gtc);
    }
    assert_eq!(monitor.events_processed(), 10);
    let stats = monitor
        .component_stats("order_book.add_order")
        .expect("component recorded");
    assert_eq!(stats.count, 10);
    assert!(monitor.percentile_ns(0.5) > 0);
}

#[test]
fn day_orders_rest_like_gtc() {
    let mut b = book();
    b.add_limit_order(1, 1, Side::Buy, 100.0, 50, TimeInForce::Day);
    assert_eq!(b.order(1).unwrap().state, OrderState::Active);
    assert_eq!(b.best_bid().unwrap().id, 1);
}
