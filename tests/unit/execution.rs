//! Scheduler and simulator integration: slicing behavior end to end,
//! report consistency, and impact-calibration recovery.

use microstructure_engine::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const MS: u64 = 1_000_000;

#[test]
fn time_sliced_schedule_end_to_end() {
    // Target 1000 shares over 1000 ms in 5 slices; step the clock by
    // 220 ms between snapshots.
    let mut algo = TimeSliced::new(1000, Duration::from_millis(1000), 5, true);
    let mut child_orders = Vec::new();
    let mut fill_seq = 0u64;

    let mut price = 100.0;
    for step in 0..6u64 {
        let ts = step * 220 * MS;
        price += 0.01;
        let data = MarketSnapshot::from_price(price, 0, ts);
        for order in algo.on_market_data(&data) {
            child_orders.push(order.quantity);
            fill_seq += 1;
            algo.on_fill(&Fill::new(order.id, fill_seq, price, order.quantity, ts));
        }
    }

    assert_eq!(child_orders, vec![200, 200, 200, 200, 200]);
    assert_eq!(algo.core().executed_quantity, 1000);

    let report = algo.generate_report();
    assert_eq!(report.num_child_orders, 5);
    assert_eq!(report.executed_quantity, 1000);
    assert!((report.fill_rate - 1.0).abs() < 1e-12);
    // Rising prices against a buy: positive shortfall.
    assert!(report.implementation_shortfall_bps > 0.0);
}

#[test]
fn schedulers_complete_in_simulator() {
    let config = SimulationConfig {
        ticks_per_second: 50,
        ..SimulationConfig::default()
    };

    let mut algos: Vec<Box<dyn ExecutionAlgorithm>> = vec![
        Box::new(TimeSliced::new(20_000, Duration::from_millis(800), 8, true)),
        Box::new(AggressiveTimeSliced::new(
            20_000,
            Duration::from_millis(800),
            8,
            true,
        )),
        Box::new(VolumeWeighted::new(
            20_000,
            Duration::from_millis(800),
            8,
            VolumeProfile::UShaped,
            true,
        )),
        Box::new(RiskAware::new(20_000, Duration::from_millis(800), 8, true)),
    ];

    let mut sim = ExecutionSimulator::new(config);
    let results = sim.compare(&mut algos, Duration::from_secs(3));

    assert_eq!(results.len(), 4);
    for result in &results {
        assert!(result.completed, "{}", result.report.algorithm_name);
        assert_eq!(result.report.executed_quantity, 20_000);
        assert!(result.report.num_child_orders >= 1);
        assert!(result.report.avg_execution_price > 0.0);
    }
    // All ran on the identical path.
    let first_tick = results[0].price_path[0].price;
    assert!(
        results
            .iter()
            .all(|r| r.price_path[0].price == first_tick)
    );
}

#[test]
fn volume_weighted_follows_profile_more_than_time_sliced() {
    let mut vwap = VolumeWeighted::new(
        10_000,
        Duration::from_millis(1000),
        10,
        VolumeProfile::MorningWeighted,
        false,
    );
    // Front-loaded: the first precomputed slice dwarfs the last.
    let sizes = vwap.slice_sizes().to_vec();
    assert!(sizes[0] > sizes[9] * 2);

    let mut emitted = Vec::new();
    let mut seq = 0;
    for step in 0..10u64 {
        let ts = step * 110 * MS;
        let data = MarketSnapshot::from_price(100.0, 0, ts);
        for order in vwap.on_market_data(&data) {
            emitted.push(order.quantity);
            seq += 1;
            vwap.on_fill(&Fill::new(seq, order.id, 100.0, order.quantity, ts));
        }
    }
    assert_eq!(emitted.iter().sum::<u64>(), 10_000);
    assert!(emitted[0] > *emitted.last().unwrap());
}

#[test]
fn risk_aware_urgency_orders_schedules() {
    // Identical targets; higher risk aversion must execute more in the
    // first half of the schedule.
    let first_half = |lambda: f64| -> u64 {
        let mut algo = RiskAware::new(100_000, Duration::from_secs(3600), 10, true);
        algo.set_risk_aversion(lambda);
        algo.slice_sizes()[..5].iter().sum()
    };
    let passive = first_half(1e-8);
    let urgent = first_half(1e-3);
    assert!(urgent > passive);
}

#[test]
fn execution_shortfall_sign_flips_with_side() {
    // Deterministic falling price path.
    let path: Vec<MarketSnapshot> = (0..40)
        .map(|i| MarketSnapshot::from_quotes(
            100.0 - i as f64 * 0.05 - 0.05,
            100.0 - i as f64 * 0.05 + 0.05,
            1_000,
            1_000,
            (i + 1) * 50 * MS,
        ))
        .collect();

    let mut sim = ExecutionSimulator::new(SimulationConfig::default());
    let mut buy = TimeSliced::new(1_000, Duration::from_millis(1000), 4, true);
    let buy_result = sim.run_path(&mut buy, &path);
    let mut sell = TimeSliced::new(1_000, Duration::from_millis(1000), 4, false);
    let sell_result = sim.run_path(&mut sell, &path);

    // Falling market: buying gets cheaper (favorable, negative), while
    // selling realizes less than arrival (adverse, positive).
    assert!(buy_result.report.implementation_shortfall_bps < 0.0);
    assert!(sell_result.report.implementation_shortfall_bps > 0.0);
}

#[test]
fn calibration_recovers_square_root_exponent_under_noise() {
    // 100 samples: impact = 0.015 * p^0.5 * (1 + eps), eps ~ N(0, 0.1).
    let mut rng = StdRng::seed_from_u64(7);
    let mut calibrator = ImpactCalibrator::new();
    for i in 0..100 {
        let participation = 0.001 + (i as f64 / 100.0) * 0.099;
        let noise: f64 = rng.sample::<f64, _>(rand_distr::StandardNormal) * 0.1;
        let impact = 0.015 * participation.sqrt() * (1.0 + noise).max(0.01);
        calibrator.add_observation(participation, impact);
    }

    let model = calibrator.calibrate(10_000_000);
    let params = model.params();
    assert!(
        (params.exponent - 0.5).abs() < 0.2,
        "exponent {}",
        params.exponent
    );
    assert!(params.r_squared > 0.5, "r² {}", params.r_squared);
    assert!(params.permanent_coeff > 0.0);
    assert!(params.is_valid(0.1, 10));
}

#[test]
fn simulated_impact_tracks_prediction_direction() {
    let config = SimulationConfig {
        volatility: 0.0001, // isolate impact from noise
        ticks_per_second: 100,
        ..SimulationConfig::default()
    };
    let mut sim = ExecutionSimulator::new(config);
    let mut algo = TimeSliced::new(1_000_000, Duration::from_millis(500), 5, true);
    let result = sim.run(&mut algo, Duration::from_secs(1));

    assert!(result.completed);
    assert!(result.predicted_impact_bps > 0.0);
    // Buying pressure with impact enabled moves the price up.
    assert!(result.realized_impact_bps > 0.0);
}

#[test]
fn child_orders_execute_against_a_real_book() {
    let mut book = OrderBook::new("ALGO");
    book.enable_self_trade_prevention(false);
    // Deep resting ask side.
    for i in 0..10u64 {
        book.add_limit_order(1000 + i, 99, Side::Sell, 100.0, 100, TimeInForce::Gtc);
    }

    let mut algo = TimeSliced::new(400, Duration::from_millis(400), 4, true);
    algo.core_mut().set_starting_order_id(1);
    algo.core_mut().set_account_id(50);

    let mut ts = 0u64;
    while !algo.core().is_complete() {
        let data = MarketSnapshot::from_quotes(99.9, 100.0, 0, 1_000, ts);
        for order in algo.on_market_data(&data) {
            let child_id = order.id;
            book.add_order(order);
            let fills: Vec<Fill> = book
                .fills()
                .iter()
                .filter(|f| f.buy_order_id == child_id)
                .copied()
                .collect();
            assert!(!fills.is_empty(), "child order {child_id} did not trade");
            for fill in &fills {
                algo.on_fill(fill);
            }
        }
        ts += 110 * MS;
    }

    assert_eq!(algo.core().executed_quantity, 400);
    assert_eq!(book.fill_router().total_fills(), 4);
    let report = algo.generate_report();
    assert_eq!(report.num_child_orders, 4);
    // Every fill priced at the resting ask.
    assert!((report.avg_execution_price - 100.0).abs() < 1e-12);
}

#[test]
fn replayed_market_csv_drives_a_scheduler() {
    let csv = "timestamp,symbol,price,volume\n\
               2024-03-01 09:30:00.000,DEMO,100.00,1000\n\
               2024-03-01 09:30:00.300,DEMO,100.10,1500\n\
               2024-03-01 09:30:00.600,DEMO,100.20,2000\n\
               2024-03-01 09:30:00.900,DEMO,100.15,2500\n";
    let ticks = microstructure_engine::feed::parse_csv(csv).unwrap();
    let path: Vec<MarketSnapshot> = ticks.iter().map(MarketTick::to_snapshot).collect();

    let mut sim = ExecutionSimulator::new(SimulationConfig::default());
    let mut algo = TimeSliced::new(900, Duration::from_millis(900), 3, true);
    let result = sim.run_path(&mut algo, &path);

    assert!(result.completed);
    assert_eq!(result.report.num_fills, 3);
    assert_eq!(result.report.target_quantity, 900);
}
