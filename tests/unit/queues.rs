//! Ring hand-off integration: a transport thread feeding decoded wire
//! ticks through an SPSC ring into a matching/scheduling consumer, and
//! SPMC fan-out of fills to workers.

use microstructure_engine::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[test]
fn spsc_feeds_market_data_across_threads() {
    let ring = Arc::new(SpscQueue::<MarketTick>::new(256));
    let done = Arc::new(AtomicBool::new(false));
    const TICKS: u64 = 10_000;

    // Transport thread: produce a deterministic tick stream.
    let producer = {
        let ring = Arc::clone(&ring);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut sent = 0u64;
            while sent < TICKS {
                let tick = MarketTick {
                    timestamp_ns: sent * 1_000,
                    symbol: "RING".to_string(),
                    price: 100.0 + (sent % 100) as f64 * 0.01,
                    volume: sent,
                };
                match ring.push(tick) {
                    Ok(()) => sent += 1,
                    Err(_) => std::hint::spin_loop(),
                }
            }
            done.store(true, Ordering::Release);
        })
    };

    // Matching-thread side: drain in order.
    let mut received = 0u64;
    let mut last_ts = None;
    while !(done.load(Ordering::Acquire) && ring.is_empty()) {
        if let Some(tick) = ring.pop() {
            if let Some(previous) = last_ts {
                assert!(tick.timestamp_ns > previous);
            }
            last_ts = Some(tick.timestamp_ns);
            received += 1;
        } else {
            std::hint::spin_loop();
        }
    }
    producer.join().unwrap();
    assert_eq!(received, TICKS);
}

#[test]
fn spmc_fans_out_fills_to_workers() {
    let ring = Arc::new(SpmcQueue::<Fill>::new(512));
    let produced = Arc::new(AtomicU64::new(0));
    let consumed_quantity = Arc::new(AtomicU64::new(0));
    const FILLS: u64 = 20_000;

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let ring = Arc::clone(&ring);
            let produced = Arc::clone(&produced);
            let consumed_quantity = Arc::clone(&consumed_quantity);
            std::thread::spawn(move || {
                let mut claimed = 0u64;
                loop {
                    match ring.pop() {
                        Some(fill) => {
                            consumed_quantity.fetch_add(fill.quantity, Ordering::Relaxed);
                            claimed += 1;
                        }
                        None => {
                            if produced.load(Ordering::Acquire) >= FILLS && ring.is_empty() {
                                break;
                            }
                            std::hint::spin_loop();
                        }
                    }
                }
                claimed
            })
        })
        .collect();

    let mut sent = 0u64;
    while sent < FILLS {
        let fill = Fill::new(sent, sent + 1, 100.0, (sent % 7) + 1, sent);
        match ring.push(fill) {
            Ok(()) => {
                sent += 1;
                produced.fetch_add(1, Ordering::Release);
            }
            Err(_) => std::hint::spin_loop(),
        }
    }

    let total_claimed: u64 = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(total_claimed, FILLS);

    let expected_quantity: u64 = (0..FILLS).map(|i| (i % 7) + 1).sum();
    assert_eq!(consumed_quantity.load(Ordering::Relaxed), expected_quantity);
}

#[test]
fn wire_frames_through_ring_into_book() {
    // Encode a burst of book updates, ship the frames through a ring,
    // decode on the consumer side and apply to a book.
    let ring = SpscQueue::<Vec<u8>>::new(64);

    for i in 0..10u64 {
        let message = WireMessage::Tick {
            sequence: i + 1,
            timestamp: i * 1_000,
            symbol: *b"WIRE",
            price: 100.0 + i as f32 * 0.5,
            volume: 10,
        };
        ring.push(message.encode()).unwrap();
    }

    let mut book = OrderBook::new("WIRE");
    book.enable_self_trade_prevention(false);
    let mut next_id = 1u64;
    let mut sequence_check = 0u64;

    while let Some(frame) = ring.pop() {
        let (message, consumed) = WireMessage::decode(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert!(message.sequence() > sequence_check);
        sequence_check = message.sequence();

        if let WireMessage::Tick { price, volume, .. } = message {
            // Make a two-sided market around each tick and cross it.
            let price = f64::from(price);
            book.add_limit_order(next_id, 1, Side::Buy, price, volume as u64, TimeInForce::Gtc);
            next_id += 1;
            book.add_limit_order(next_id, 2, Side::Sell, price, volume as u64, TimeInForce::Gtc);
            next_id += 1;
        }
    }

    assert_eq!(book.fills().len(), 10);
    assert_eq!(book.fill_router().total_fills(), 10);
}
