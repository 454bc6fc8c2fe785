//! Full analytics pipeline: book -> fill router -> analytics hub.

use microstructure_engine::prelude::*;
use std::sync::{Arc, Mutex};

fn wired_book_and_hub(config: AnalyticsConfig) -> (OrderBook, Arc<Mutex<MicrostructureAnalytics>>) {
    let hub = Arc::new(Mutex::new(MicrostructureAnalytics::with_config(config)));
    let mut book = OrderBook::new("WIRED");
    book.enable_self_trade_prevention(false);
    MicrostructureAnalytics::attach(&hub, &mut book);
    (book, hub)
}

#[test]
fn fills_flow_into_analytics() {
    let (mut book, hub) = wired_book_and_hub(AnalyticsConfig::default());

    book.add_limit_order(1, 1, Side::Buy, 100.0, 60, TimeInForce::Gtc);
    book.add_limit_order(2, 2, Side::Sell, 100.0, 60, TimeInForce::Gtc); // sell aggressor
    book.add_limit_order(3, 3, Side::Sell, 100.5, 40, TimeInForce::Gtc);
    book.add_limit_order(4, 4, Side::Buy, 100.5, 40, TimeInForce::Gtc); // buy aggressor

    let analytics = hub.lock().unwrap();
    assert_eq!(analytics.total_fills_processed(), 2);
    // 40 aggressive buys vs 60 aggressive sells.
    let imbalance = analytics.flow_imbalance();
    assert!((imbalance - (-20.0 / 100.0)).abs() < 1e-12);
    assert!((analytics.buy_ratio() - 0.4).abs() < 1e-12);
    assert_eq!(analytics.last_price("WIRED"), Some(100.5));

    let expected_vwap = (100.0 * 60.0 + 100.5 * 40.0) / 100.0;
    assert!((analytics.vwap() - expected_vwap).abs() < 1e-9);

    let metrics = analytics.current_metrics();
    assert_eq!(metrics.trade_count, 2);
    assert_eq!(metrics.total_volume, 100);
    assert_eq!(metrics.min_price, 100.0);
    assert_eq!(metrics.max_price, 100.5);
}

#[test]
fn per_symbol_flow_tracks_independently() {
    let config = AnalyticsConfig {
        track_per_symbol: true,
        ..AnalyticsConfig::default()
    };
    let (mut book, hub) = wired_book_and_hub(config);

    book.add_limit_order(1, 1, Side::Buy, 50.0, 10, TimeInForce::Gtc);
    book.add_limit_order(2, 2, Side::Sell, 50.0, 10, TimeInForce::Gtc);

    let analytics = hub.lock().unwrap();
    assert!((analytics.symbol_flow_imbalance("WIRED") + 1.0).abs() < 1e-12);
    assert_eq!(analytics.symbol_flow_imbalance("OTHER"), 0.0);
}

#[test]
fn auto_calibration_collects_observations_from_trading() {
    let config = AnalyticsConfig {
        auto_calibrate_impact: true,
        ..AnalyticsConfig::default()
    };
    let (mut book, hub) = wired_book_and_hub(config);
    hub.lock().unwrap().set_symbol_adv("WIRED", 1_000_000);

    // Trade a drifting price with fills large enough to record
    // (qty >= 100) once ten price samples accumulate.
    let mut id = 0u64;
    for i in 0..30u64 {
        let price = 100.0 + i as f64 * 0.8;
        id += 1;
        let buy = id;
        book.add_limit_order(buy, 1 + i, Side::Buy, price, 500, TimeInForce::Gtc);
        id += 1;
        book.add_limit_order(id, 100 + i, Side::Sell, price, 500, TimeInForce::Gtc);
    }

    let mut analytics = hub.lock().unwrap();
    assert_eq!(analytics.total_fills_processed(), 30);
    assert!(
        analytics.impact_observations().len() >= 10,
        "observations {}",
        analytics.impact_observations().len()
    );
    // With a trending price, calibration has real signal to fit.
    let calibrated = analytics.calibrate_impact_model("WIRED");
    if calibrated {
        let params = analytics.calibrated_params().unwrap();
        assert!(params.r_squared >= 0.0 && params.r_squared <= 1.0);
        assert!(params.permanent_coeff > 0.0);
        assert!((0.1..=2.0).contains(&params.exponent));
    }
}

#[test]
fn impact_estimates_scale_with_volume() {
    let analytics = MicrostructureAnalytics::new();
    let small = analytics.estimate_impact_bps(1_000, "ANY");
    let large = analytics.estimate_impact_bps(1_000_000, "ANY");
    assert!(large > small);
    assert!(small > 0.0);
}

#[test]
fn metrics_periods_partition_trading() {
    let (mut book, hub) = wired_book_and_hub(AnalyticsConfig::default());

    book.add_limit_order(1, 1, Side::Buy, 100.0, 10, TimeInForce::Gtc);
    book.add_limit_order(2, 2, Side::Sell, 100.0, 10, TimeInForce::Gtc);
    let closed = hub.lock().unwrap().close_metrics_period();
    assert_eq!(closed.trade_count, 1);
    assert!((closed.vwap - 100.0).abs() < 1e-12);

    book.add_limit_order(3, 3, Side::Buy, 101.0, 20, TimeInForce::Gtc);
    book.add_limit_order(4, 4, Side::Sell, 101.0, 20, TimeInForce::Gtc);

    let analytics = hub.lock().unwrap();
    assert_eq!(analytics.historical_metrics().len(), 1);
    assert_eq!(analytics.current_metrics().trade_count, 1);
    assert_eq!(analytics.current_metrics().total_volume, 20);
}

#[test]
fn rolling_price_statistics_from_fills() {
    let (mut book, hub) = wired_book_and_hub(AnalyticsConfig::default());

    for (i, price) in [100.0f64, 102.0, 98.0, 104.0].iter().enumerate() {
        let base = (i as u64) * 2;
        book.add_limit_order(base + 1, 1, Side::Buy, *price, 10, TimeInForce::Gtc);
        book.add_limit_order(base + 2, 2, Side::Sell, *price, 10, TimeInForce::Gtc);
    }

    let analytics = hub.lock().unwrap();
    assert!((analytics.average_price("WIRED") - 101.0).abs() < 1e-9);
    assert!(analytics.price_volatility("WIRED") > 0.0);
}
