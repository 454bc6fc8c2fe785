//! Snapshot and journal round trips through the public API.

use microstructure_engine::prelude::*;

fn active_book() -> OrderBook {
    let mut b = OrderBook::new("PERSIST");
    b.enable_self_trade_prevention(false);
    b.add_limit_order(1, 1, Side::Buy, 99.5, 100, TimeInForce::Gtc);
    b.add_limit_order(2, 2, Side::Buy, 99.0, 200, TimeInForce::Gtc);
    b.add_iceberg_order(3, 3, Side::Sell, 100.5, 600, 100, TimeInForce::Gtc);
    b.add_limit_order(4, 4, Side::Buy, 100.5, 150, TimeInForce::Ioc);
    b.add_stop_market_order(5, 5, Side::Sell, 95.0, 50);
    b
}

#[test]
fn quiescent_snapshot_round_trip_is_byte_identical() {
    let b = active_book();
    let first = b.create_snapshot().to_text();

    let mut restored = OrderBook::new("X");
    restored
        .restore_from_snapshot(&BookSnapshot::from_text(&first).unwrap())
        .unwrap();
    let second = restored.create_snapshot().to_text();
    assert_eq!(first, second);

    // A third generation stays stable too.
    let mut again = OrderBook::new("Y");
    again
        .restore_from_snapshot(&BookSnapshot::from_text(&second).unwrap())
        .unwrap();
    assert_eq!(second, again.create_snapshot().to_text());
}

#[test]
fn snapshot_preserves_matching_behavior() {
    let b = active_book();
    let snapshot = b.create_snapshot();

    let mut restored = OrderBook::new("X");
    restored.restore_from_snapshot(&snapshot).unwrap();

    // Same top of book.
    assert_eq!(restored.best_bid().unwrap().id, 1);
    assert_eq!(restored.best_ask().unwrap().id, 3);
    assert_eq!(restored.pending_stop_count(), 1);

    // The iceberg's refreshed display quantity survived.
    let iceberg = restored.order(3).unwrap();
    assert_eq!(iceberg.display_qty + iceberg.hidden_qty, iceberg.remaining_qty);

    // Clear the better bids, then trade at 95 to fire the restored stop.
    assert!(restored.cancel_order(1));
    assert!(restored.cancel_order(2));
    restored.add_limit_order(10, 9, Side::Buy, 95.0, 25, TimeInForce::Gtc);
    restored.add_limit_order(11, 8, Side::Buy, 95.0, 50, TimeInForce::Gtc);
    restored.add_limit_order(12, 7, Side::Sell, 95.0, 25, TimeInForce::Ioc);
    assert_eq!(restored.pending_stop_count(), 0);
    assert!(restored.order(5).unwrap().stop_triggered);
}

#[test]
fn binary_snapshot_matches_text_restore() {
    let b = active_book();
    let dir = tempfile::tempdir().unwrap();
    let text_path = dir.path().join("book.snap");
    let bin_path = dir.path().join("book.obks");
    b.save_snapshot(&text_path).unwrap();
    b.save_snapshot_binary(&bin_path).unwrap();

    let mut from_text = OrderBook::new("T");
    from_text.load_snapshot(&text_path).unwrap();
    let mut from_binary = OrderBook::new("B");
    from_binary.load_snapshot_binary(&bin_path).unwrap();

    assert_eq!(
        from_text.create_snapshot().to_text(),
        from_binary.create_snapshot().to_text()
    );

    let bytes = std::fs::read(&bin_path).unwrap();
    assert_eq!(&bytes[..4], b"OBKS");
}

#[test]
fn journal_replay_matches_end_state() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("journal.csv");

    let mut b = OrderBook::new("JRNL");
    b.enable_self_trade_prevention(false);
    b.enable_logging();
    b.add_limit_order(1, 1, Side::Buy, 100.0, 50, TimeInForce::Gtc);
    b.add_iceberg_order(2, 2, Side::Sell, 101.0, 300, 50, TimeInForce::Gtc);
    b.add_limit_order(3, 3, Side::Buy, 101.0, 80, TimeInForce::Ioc);
    b.amend_order(1, Some(100.5), Some(60));
    b.add_limit_order(4, 4, Side::Sell, 100.5, 30, TimeInForce::Gtc);
    b.cancel_order(2);
    b.save_events(&events).unwrap();

    let mut replayed = OrderBook::new("JRNL");
    replayed.enable_self_trade_prevention(false);
    replayed.replay_events(&events).unwrap();

    let original = b.create_snapshot();
    let rebuilt = replayed.create_snapshot();

    assert_eq!(original.orders.len(), rebuilt.orders.len());
    for (a, z) in original.orders.iter().zip(rebuilt.orders.iter()) {
        assert_eq!(a.id, z.id);
        assert_eq!(a.state, z.state, "order {}", a.id);
        assert_eq!(a.remaining_qty, z.remaining_qty, "order {}", a.id);
        assert_eq!(a.display_qty, z.display_qty, "order {}", a.id);
        assert_eq!(a.hidden_qty, z.hidden_qty, "order {}", a.id);
    }
    // Fills regenerate with fresh timestamps but identical economics.
    assert_eq!(original.fills.len(), rebuilt.fills.len());
    for (a, z) in original.fills.iter().zip(rebuilt.fills.iter()) {
        assert_eq!(a.buy_order_id, z.buy_order_id);
        assert_eq!(a.sell_order_id, z.sell_order_id);
        assert_eq!(a.price, z.price);
        assert_eq!(a.quantity, z.quantity);
    }
    assert_eq!(original.last_trade_price, rebuilt.last_trade_price);
}

#[test]
fn corrupted_snapshot_is_rejected_before_restore() {
    let b = active_book();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.snap");
    b.save_snapshot(&path).unwrap();

    let mut text = std::fs::read_to_string(&path).unwrap();
    text = text.replace("ACTIVE_ORDERS", "ACTIVE_0RDERS");
    std::fs::write(&path, text).unwrap();

    let mut restored = OrderBook::new("X");
    assert!(restored.load_snapshot(&path).is_err());
    // The failed restore left the book empty.
    assert!(restored.best_bid().is_none());
    assert_eq!(restored.total_orders(), 0);
}

#[test]
fn snapshot_json_export_is_parseable() {
    let b = active_book();
    let json = b.create_snapshot().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["symbol"], "PERSIST");
    assert!(value["orders"].as_array().unwrap().len() >= 5);
}
