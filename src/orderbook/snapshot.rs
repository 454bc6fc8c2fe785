//! Snapshot and recovery: point-in-time book state in text, binary and
//! JSON forms, plus event-journal replay.
//!
//! The text format is deterministic: the comment header carries only
//! derived state (version, symbol, a SHA-256 checksum of the body), so a
//! quiescent snapshot → restore → snapshot round-trip is byte-for-byte
//! identical. The binary format starts with the `OBKS` magic and ends
//! with a CRC32 trailer over the payload.
//!
//! Replay applies NEW/CANCEL/AMEND events; FILL events are regenerated
//! by matching during replay and are skipped. The journal schema carries
//! no stop-order columns, so latent stops do not survive a journal-only
//! recovery; checkpoints (snapshot + journal) restore them from the
//! snapshot side.

use super::book::OrderBook;
use super::error::OrderBookError;
use super::event::OrderEvent;
use super::fill::Fill;
use super::order::Order;
use super::types::{OrderId, OrderKind, OrderState, Side, TimeInForce};
use crossbeam_skiplist::SkipMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const SNAPSHOT_VERSION: u32 = 1;
const BINARY_MAGIC: &[u8; 4] = b"OBKS";

/// A latent stop's multimap entry as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopRecord {
    /// Order id; the full order lives in the snapshot's order list.
    pub order_id: OrderId,
    /// Stop side.
    pub side: Side,
    /// Trigger price.
    pub stop_price: f64,
    /// Post-trigger limit price (sentinel for stop-markets).
    pub limit_price: f64,
    /// Order quantity.
    pub quantity: u64,
    /// What the stop becomes on trigger.
    pub becomes: OrderKind,
}

/// Point-in-time state of a book.
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    /// Schema version.
    pub version: u32,
    /// Symbol the book trades.
    pub symbol: String,
    /// Last executed price; `0.0` when no trade has occurred.
    pub last_trade_price: f64,
    /// Count of orders ever admitted.
    pub total_orders: u64,
    /// Every order in the authoritative store, sorted by id.
    pub orders: Vec<Order>,
    /// Latent stops in stop-price order, buys then sells.
    pub pending_stops: Vec<StopRecord>,
    /// Raw fills in match order.
    pub fills: Vec<Fill>,
}

impl BookSnapshot {
    /// Validates internal consistency before restore: duplicate ids,
    /// remaining exceeding original, iceberg display/hidden mismatch.
    pub fn validate(&self) -> Result<(), OrderBookError> {
        let mut seen = HashSet::with_capacity(self.orders.len());
        for order in &self.orders {
            if !seen.insert(order.id) {
                return Err(OrderBookError::SnapshotIntegrity {
                    message: format!("duplicate order id {}", order.id),
                });
            }
            if order.remaining_qty > order.quantity {
                return Err(OrderBookError::SnapshotIntegrity {
                    message: format!(
                        "order {}: remaining {} exceeds original {}",
                        order.id, order.remaining_qty, order.quantity
                    ),
                });
            }
            if order.peak_size > 0 && order.display_qty + order.hidden_qty != order.remaining_qty {
                return Err(OrderBookError::SnapshotIntegrity {
                    message: format!(
                        "order {}: display {} + hidden {} != remaining {}",
                        order.id, order.display_qty, order.hidden_qty, order.remaining_qty
                    ),
                });
            }
        }
        for stop in &self.pending_stops {
            if !seen.contains(&stop.order_id) {
                return Err(OrderBookError::SnapshotIntegrity {
                    message: format!("stop record references unknown order {}", stop.order_id),
                });
            }
        }
        for fill in &self.fills {
            if fill.quantity == 0 {
                return Err(OrderBookError::SnapshotIntegrity {
                    message: "fill with zero quantity".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Serializes the body (everything after the comment header).
    fn body(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "LAST_TRADE_PRICE,{:.4}", self.last_trade_price);
        let _ = writeln!(out, "TOTAL_ORDERS,{}", self.total_orders);
        let _ = writeln!(out, "ACTIVE_ORDERS,{}", self.orders.len());
        for o in &self.orders {
            let _ = writeln!(
                out,
                "ORDER,{},{},{},{:.4},{},{},{},{},{},{},{},{},{:.4},{}",
                o.id,
                o.side,
                o.kind,
                o.price,
                o.quantity,
                o.remaining_qty,
                o.display_qty,
                o.hidden_qty,
                o.peak_size,
                o.state.as_int(),
                o.arrival_ns,
                u8::from(o.is_stop),
                o.stop_price,
                u8::from(o.stop_triggered),
            );
        }
        let _ = writeln!(out, "PENDING_STOPS,{}", self.pending_stops.len());
        for s in &self.pending_stops {
            let _ = writeln!(
                out,
                "STOP,{},{},{:.4},{:.4},{},{}",
                s.order_id, s.side, s.stop_price, s.limit_price, s.quantity, s.becomes,
            );
        }
        let _ = writeln!(out, "FILLS,{}", self.fills.len());
        for f in &self.fills {
            let _ = writeln!(
                out,
                "FILL,{},{},{:.4},{},{}",
                f.buy_order_id, f.sell_order_id, f.price, f.quantity, f.timestamp_ns,
            );
        }
        out
    }

    /// Serializes to the text form with a deterministic header.
    #[must_use]
    pub fn to_text(&self) -> String {
        let body = self.body();
        let checksum = hex_digest(&body);
        format!(
            "# Order Book Snapshot\n# Version: {}\n# Symbol: {}\n# Checksum: {}\n{}",
            self.version, self.symbol, checksum, body
        )
    }

    /// Parses the text form, verifying the checksum when present.
    pub fn from_text(text: &str) -> Result<Self, OrderBookError> {
        let mut snapshot = BookSnapshot {
            version: SNAPSHOT_VERSION,
            symbol: String::new(),
            last_trade_price: 0.0,
            total_orders: 0,
            orders: Vec::new(),
            pending_stops: Vec::new(),
            fills: Vec::new(),
        };

        let mut expected_checksum: Option<String> = None;
        let mut body = String::new();
        let mut past_header = false;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if let Some(rest) = line.strip_prefix('#') {
                let rest = rest.trim();
                if let Some(v) = rest.strip_prefix("Version:") {
                    snapshot.version = parse_field(v.trim(), line_no, "version")?;
                } else if let Some(s) = rest.strip_prefix("Symbol:") {
                    snapshot.symbol = s.trim().to_string();
                } else if let Some(c) = rest.strip_prefix("Checksum:") {
                    expected_checksum = Some(c.trim().to_string());
                }
                continue;
            }
            if line.is_empty() {
                continue;
            }
            past_header = true;
            body.push_str(line);
            body.push('\n');

            let (tag, rest) = line.split_once(',').ok_or_else(|| OrderBookError::Parse {
                line: line_no,
                message: "missing comma".to_string(),
            })?;
            match tag {
                "LAST_TRADE_PRICE" => {
                    snapshot.last_trade_price = parse_field(rest, line_no, "last trade price")?;
                }
                "TOTAL_ORDERS" => {
                    snapshot.total_orders = parse_field(rest, line_no, "total orders")?;
                }
                "ACTIVE_ORDERS" | "PENDING_STOPS" | "FILLS" => {
                    // Section counts are advisory; records are self-tagged.
                }
                "ORDER" => snapshot.orders.push(parse_order_row(rest, line_no)?),
                "STOP" => snapshot.pending_stops.push(parse_stop_row(rest, line_no)?),
                "FILL" => snapshot.fills.push(parse_fill_row(rest, line_no)?),
                other => {
                    return Err(OrderBookError::Parse {
                        line: line_no,
                        message: format!("unknown record tag {other}"),
                    });
                }
            }
        }

        if !past_header {
            return Err(OrderBookError::SnapshotIntegrity {
                message: "empty snapshot".to_string(),
            });
        }
        if let Some(expected) = expected_checksum {
            let actual = hex_digest(&body);
            if actual != expected {
                return Err(OrderBookError::ChecksumMismatch {
                    expected,
                    actual,
                });
            }
        }
        Ok(snapshot)
    }

    /// Serializes to the compact binary form (`OBKS` magic, packed
    /// little-endian records, CRC32 trailer).
    #[must_use]
    pub fn to_binary(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(64 + self.orders.len() * 96);
        payload.extend_from_slice(&self.version.to_le_bytes());
        let symbol = self.symbol.as_bytes();
        payload.extend_from_slice(&(symbol.len() as u32).to_le_bytes());
        payload.extend_from_slice(symbol);
        payload.extend_from_slice(&self.last_trade_price.to_le_bytes());
        payload.extend_from_slice(&self.total_orders.to_le_bytes());

        payload.extend_from_slice(&(self.orders.len() as u32).to_le_bytes());
        for o in &self.orders {
            payload.extend_from_slice(&o.id.to_le_bytes());
            payload.push(side_code(o.side));
            payload.push(kind_code(o.kind));
            payload.push(tif_code(o.time_in_force));
            payload.push(o.state.as_int());
            payload.extend_from_slice(&o.price.to_le_bytes());
            payload.extend_from_slice(&o.quantity.to_le_bytes());
            payload.extend_from_slice(&o.remaining_qty.to_le_bytes());
            payload.extend_from_slice(&o.display_qty.to_le_bytes());
            payload.extend_from_slice(&o.hidden_qty.to_le_bytes());
            payload.extend_from_slice(&o.peak_size.to_le_bytes());
            payload.extend_from_slice(&o.arrival_ns.to_le_bytes());
            payload.push(u8::from(o.is_stop));
            payload.extend_from_slice(&o.stop_price.to_le_bytes());
            payload.push(u8::from(o.stop_triggered));
            payload.push(kind_code(o.stop_becomes));
        }

        payload.extend_from_slice(&(self.pending_stops.len() as u32).to_le_bytes());
        for s in &self.pending_stops {
            payload.extend_from_slice(&s.order_id.to_le_bytes());
            payload.push(side_code(s.side));
            payload.extend_from_slice(&s.stop_price.to_le_bytes());
            payload.extend_from_slice(&s.limit_price.to_le_bytes());
            payload.extend_from_slice(&s.quantity.to_le_bytes());
            payload.push(kind_code(s.becomes));
        }

        payload.extend_from_slice(&(self.fills.len() as u32).to_le_bytes());
        for f in &self.fills {
            payload.extend_from_slice(&f.buy_order_id.to_le_bytes());
            payload.extend_from_slice(&f.sell_order_id.to_le_bytes());
            payload.extend_from_slice(&f.price.to_le_bytes());
            payload.extend_from_slice(&f.quantity.to_le_bytes());
            payload.extend_from_slice(&f.timestamp_ns.to_le_bytes());
        }

        let crc = crc32fast::hash(&payload);
        let mut out = Vec::with_capacity(payload.len() + 8);
        out.extend_from_slice(BINARY_MAGIC);
        out.extend_from_slice(&payload);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parses the binary form, verifying magic and CRC32 trailer.
    pub fn from_binary(bytes: &[u8]) -> Result<Self, OrderBookError> {
        if bytes.len() < 8 || &bytes[..4] != BINARY_MAGIC {
            return Err(OrderBookError::SnapshotIntegrity {
                message: "missing OBKS magic".to_string(),
            });
        }
        let payload = &bytes[4..bytes.len() - 4];
        let expected = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        let actual = crc32fast::hash(payload);
        if expected != actual {
            return Err(OrderBookError::ChecksumMismatch {
                expected: format!("{expected:08x}"),
                actual: format!("{actual:08x}"),
            });
        }

        let mut cursor = Reader::new(payload);
        let version = cursor.u32()?;
        let symbol_len = cursor.u32()? as usize;
        let symbol = String::from_utf8(cursor.bytes(symbol_len)?.to_vec()).map_err(|_| {
            OrderBookError::SnapshotIntegrity {
                message: "symbol is not UTF-8".to_string(),
            }
        })?;
        let last_trade_price = cursor.f64()?;
        let total_orders = cursor.u64()?;

        let n_orders = cursor.u32()? as usize;
        let mut orders = Vec::with_capacity(n_orders);
        for _ in 0..n_orders {
            let id = cursor.u64()?;
            let side = side_from_code(cursor.u8()?)?;
            let kind = kind_from_code(cursor.u8()?)?;
            let time_in_force = tif_from_code(cursor.u8()?)?;
            let state = OrderState::from_int(cursor.u8()?);
            let price = cursor.f64()?;
            let quantity = cursor.u64()?;
            let remaining_qty = cursor.u64()?;
            let display_qty = cursor.u64()?;
            let hidden_qty = cursor.u64()?;
            let peak_size = cursor.u64()?;
            let arrival_ns = cursor.u64()?;
            let is_stop = cursor.u8()? != 0;
            let stop_price = cursor.f64()?;
            let stop_triggered = cursor.u8()? != 0;
            let stop_becomes = kind_from_code(cursor.u8()?)?;
            orders.push(Order {
                id,
                account_id: 0,
                side,
                kind,
                time_in_force,
                price,
                quantity,
                remaining_qty,
                display_qty,
                hidden_qty,
                peak_size,
                arrival_ns,
                state,
                is_stop,
                stop_price,
                stop_triggered,
                stop_becomes,
            });
        }

        let n_stops = cursor.u32()? as usize;
        let mut pending_stops = Vec::with_capacity(n_stops);
        for _ in 0..n_stops {
            pending_stops.push(StopRecord {
                order_id: cursor.u64()?,
                side: side_from_code(cursor.u8()?)?,
                stop_price: cursor.f64()?,
                limit_price: cursor.f64()?,
                quantity: cursor.u64()?,
                becomes: kind_from_code(cursor.u8()?)?,
            });
        }

        let n_fills = cursor.u32()? as usize;
        let mut fills = Vec::with_capacity(n_fills);
        for _ in 0..n_fills {
            fills.push(Fill {
                buy_order_id: cursor.u64()?,
                sell_order_id: cursor.u64()?,
                price: cursor.f64()?,
                quantity: cursor.u64()?,
                timestamp_ns: cursor.u64()?,
            });
        }

        Ok(BookSnapshot {
            version,
            symbol,
            last_trade_price,
            total_orders,
            orders,
            pending_stops,
            fills,
        })
    }

    /// JSON export for external tooling.
    pub fn to_json(&self) -> Result<String, OrderBookError> {
        serde_json::to_string_pretty(self).map_err(|e| OrderBookError::Io {
            message: e.to_string(),
        })
    }
}

fn hex_digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn parse_field<T: std::str::FromStr>(
    value: &str,
    line: usize,
    what: &str,
) -> Result<T, OrderBookError> {
    value.trim().parse().map_err(|_| OrderBookError::Parse {
        line,
        message: format!("bad {what}: {value}"),
    })
}

fn parse_side(value: &str, line: usize) -> Result<Side, OrderBookError> {
    match value {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(OrderBookError::Parse {
            line,
            message: format!("bad side: {other}"),
        }),
    }
}

fn parse_kind(value: &str, line: usize) -> Result<OrderKind, OrderBookError> {
    match value {
        "LIMIT" => Ok(OrderKind::Limit),
        "MARKET" => Ok(OrderKind::Market),
        other => Err(OrderBookError::Parse {
            line,
            message: format!("bad order type: {other}"),
        }),
    }
}

fn parse_order_row(rest: &str, line: usize) -> Result<Order, OrderBookError> {
    let cols: Vec<&str> = rest.split(',').collect();
    if cols.len() != 14 {
        return Err(OrderBookError::Parse {
            line,
            message: format!("ORDER row has {} fields, expected 14", cols.len()),
        });
    }
    let side = parse_side(cols[1], line)?;
    let kind = parse_kind(cols[2], line)?;
    let is_stop = cols[11].trim() == "1";
    Ok(Order {
        id: parse_field(cols[0], line, "order id")?,
        account_id: 0,
        side,
        kind,
        time_in_force: TimeInForce::Gtc,
        price: parse_field(cols[3], line, "price")?,
        quantity: parse_field(cols[4], line, "quantity")?,
        remaining_qty: parse_field(cols[5], line, "remaining")?,
        display_qty: parse_field(cols[6], line, "display")?,
        hidden_qty: parse_field(cols[7], line, "hidden")?,
        peak_size: parse_field(cols[8], line, "peak")?,
        state: OrderState::from_int(parse_field(cols[9], line, "state")?),
        arrival_ns: parse_field(cols[10], line, "timestamp")?,
        is_stop,
        stop_price: parse_field(cols[12], line, "stop price")?,
        stop_triggered: cols[13].trim() == "1",
        stop_becomes: kind,
    })
}

fn parse_stop_row(rest: &str, line: usize) -> Result<StopRecord, OrderBookError> {
    let cols: Vec<&str> = rest.split(',').collect();
    if cols.len() != 6 {
        return Err(OrderBookError::Parse {
            line,
            message: format!("STOP row has {} fields, expected 6", cols.len()),
        });
    }
    Ok(StopRecord {
        order_id: parse_field(cols[0], line, "order id")?,
        side: parse_side(cols[1], line)?,
        stop_price: parse_field(cols[2], line, "stop price")?,
        limit_price: parse_field(cols[3], line, "limit price")?,
        quantity: parse_field(cols[4], line, "quantity")?,
        becomes: parse_kind(cols[5], line)?,
    })
}

fn parse_fill_row(rest: &str, line: usize) -> Result<Fill, OrderBookError> {
    let cols: Vec<&str> = rest.split(',').collect();
    if cols.len() != 5 {
        return Err(OrderBookError::Parse {
            line,
            message: format!("FILL row has {} fields, expected 5", cols.len()),
        });
    }
    Ok(Fill {
        buy_order_id: parse_field(cols[0], line, "buy id")?,
        sell_order_id: parse_field(cols[1], line, "sell id")?,
        price: parse_field(cols[2], line, "price")?,
        quantity: parse_field(cols[3], line, "quantity")?,
        timestamp_ns: parse_field(cols[4], line, "timestamp")?,
    })
}

fn side_code(side: Side) -> u8 {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

fn side_from_code(code: u8) -> Result<Side, OrderBookError> {
    match code {
        0 => Ok(Side::Buy),
        1 => Ok(Side::Sell),
        other => Err(OrderBookError::SnapshotIntegrity {
            message: format!("bad side code {other}"),
        }),
    }
}

fn kind_code(kind: OrderKind) -> u8 {
    match kind {
        OrderKind::Limit => 0,
        OrderKind::Market => 1,
    }
}

fn kind_from_code(code: u8) -> Result<OrderKind, OrderBookError> {
    match code {
        0 => Ok(OrderKind::Limit),
        1 => Ok(OrderKind::Market),
        other => Err(OrderBookError::SnapshotIntegrity {
            message: format!("bad kind code {other}"),
        }),
    }
}

fn tif_code(tif: TimeInForce) -> u8 {
    match tif {
        TimeInForce::Gtc => 0,
        TimeInForce::Ioc => 1,
        TimeInForce::Fok => 2,
        TimeInForce::Day => 3,
    }
}

fn tif_from_code(code: u8) -> Result<TimeInForce, OrderBookError> {
    match code {
        0 => Ok(TimeInForce::Gtc),
        1 => Ok(TimeInForce::Ioc),
        2 => Ok(TimeInForce::Fok),
        3 => Ok(TimeInForce::Day),
        other => Err(OrderBookError::SnapshotIntegrity {
            message: format!("bad time-in-force code {other}"),
        }),
    }
}

/// Bounds-checked little-endian reader over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], OrderBookError> {
        if self.pos + n > self.data.len() {
            return Err(OrderBookError::SnapshotIntegrity {
                message: "truncated binary snapshot".to_string(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, OrderBookError> {
        Ok(self.bytes(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, OrderBookError> {
        Ok(u32::from_le_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, OrderBookError> {
        Ok(u64::from_le_bytes(self.bytes(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64, OrderBookError> {
        Ok(f64::from_bits(u64::from_le_bytes(
            self.bytes(8)?.try_into().unwrap(),
        )))
    }
}

impl OrderBook {
    /// Captures the current state as a snapshot.
    #[must_use]
    pub fn create_snapshot(&self) -> BookSnapshot {
        let mut orders: Vec<Order> = self.orders.iter().map(|e| e.value().clone()).collect();
        orders.sort_by_key(|o| o.id);

        let mut pending_stops = Vec::with_capacity(self.pending_stop_count());
        for (key, id) in self.stop_buys.iter().chain(self.stop_sells.iter()) {
            if let Some(order) = self.orders.get(id) {
                if order.state.is_terminal() {
                    continue;
                }
                pending_stops.push(StopRecord {
                    order_id: *id,
                    side: order.side,
                    stop_price: key.price,
                    limit_price: order.price,
                    quantity: order.quantity,
                    becomes: order.stop_becomes,
                });
            }
        }

        BookSnapshot {
            version: SNAPSHOT_VERSION,
            symbol: self.symbol.clone(),
            last_trade_price: self.last_trade_price().unwrap_or(0.0),
            total_orders: self.total_orders,
            orders,
            pending_stops,
            fills: self.fills.clone(),
        }
    }

    /// Clears all state and reconstructs it from `snapshot`. Validation
    /// runs first; an invalid snapshot leaves the book untouched.
    pub fn restore_from_snapshot(&mut self, snapshot: &BookSnapshot) -> Result<(), OrderBookError> {
        snapshot.validate()?;
        debug!(
            orders = snapshot.orders.len(),
            stops = snapshot.pending_stops.len(),
            fills = snapshot.fills.len(),
            "restoring book from snapshot"
        );

        self.bids = SkipMap::new();
        self.asks = SkipMap::new();
        self.orders.clear();
        self.stop_buys.clear();
        self.stop_sells.clear();
        self.fills.clear();
        self.event_log.clear();

        if !snapshot.symbol.is_empty() {
            self.symbol = snapshot.symbol.clone();
        }
        self.total_orders = snapshot.total_orders;
        self.fills = snapshot.fills.clone();
        if snapshot.last_trade_price > 0.0 {
            self.last_trade_price.store(snapshot.last_trade_price);
            self.has_traded
                .store(true, std::sync::atomic::Ordering::Relaxed);
        } else {
            self.last_trade_price.store(0.0);
            self.has_traded
                .store(false, std::sync::atomic::Ordering::Relaxed);
        }

        let mut max_arrival = 0u64;
        for order in &snapshot.orders {
            max_arrival = max_arrival.max(order.arrival_ns);
            self.orders.insert(order.id, order.clone());
            if order.is_active() && !order.is_stop {
                self.insert_resting(order.side, order.price, order.arrival_ns, order.id);
            }
        }
        for stop in &snapshot.pending_stops {
            let arrival = self
                .orders
                .get(&stop.order_id)
                .map(|o| o.arrival_ns)
                .unwrap_or(0);
            let key = super::book::BookKey::new(stop.stop_price, arrival);
            match stop.side {
                Side::Buy => self.stop_buys.insert(key, stop.order_id),
                Side::Sell => self.stop_sells.insert(key, stop.order_id),
            };
        }
        self.arrival_clock = self.arrival_clock.max(max_arrival);
        Ok(())
    }

    /// Saves the text snapshot to `path`.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), OrderBookError> {
        fs::write(path, self.create_snapshot().to_text())?;
        Ok(())
    }

    /// Loads and restores a text snapshot from `path`.
    pub fn load_snapshot(&mut self, path: impl AsRef<Path>) -> Result<(), OrderBookError> {
        let text = fs::read_to_string(path)?;
        let snapshot = BookSnapshot::from_text(&text)?;
        self.restore_from_snapshot(&snapshot)
    }

    /// Saves the binary snapshot to `path`.
    pub fn save_snapshot_binary(&self, path: impl AsRef<Path>) -> Result<(), OrderBookError> {
        fs::write(path, self.create_snapshot().to_binary())?;
        Ok(())
    }

    /// Loads and restores a binary snapshot from `path`.
    pub fn load_snapshot_binary(&mut self, path: impl AsRef<Path>) -> Result<(), OrderBookError> {
        let bytes = fs::read(path)?;
        let snapshot = BookSnapshot::from_binary(&bytes)?;
        self.restore_from_snapshot(&snapshot)
    }

    /// Writes the event journal as CSV.
    pub fn save_events(&self, path: impl AsRef<Path>) -> Result<(), OrderBookError> {
        let mut out = String::with_capacity(64 + self.event_log.len() * 64);
        out.push_str(OrderEvent::csv_header());
        out.push('\n');
        for event in &self.event_log {
            out.push_str(&event.to_csv());
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Replays a CSV event journal into this book. NEW/CANCEL/AMEND are
    /// applied; FILL rows are skipped because matching regenerates them.
    /// Returns the number of applied events.
    pub fn replay_events(&mut self, path: impl AsRef<Path>) -> Result<usize, OrderBookError> {
        let text = fs::read_to_string(path)?;
        let mut applied = 0usize;
        for (idx, line) in text.lines().enumerate() {
            if line.is_empty() || line.starts_with("timestamp") {
                continue;
            }
            let event = OrderEvent::from_csv(line).map_err(|e| OrderBookError::Parse {
                line: idx + 1,
                message: e.to_string(),
            })?;
            match event {
                OrderEvent::New {
                    order_id,
                    side,
                    kind,
                    time_in_force,
                    price,
                    quantity,
                    peak_size,
                    account_id,
                    ..
                } => {
                    let order = if peak_size > 0 {
                        Order::iceberg(
                            order_id,
                            account_id,
                            side,
                            price,
                            quantity,
                            peak_size,
                            time_in_force,
                        )
                    } else if kind == OrderKind::Market {
                        Order::market(order_id, account_id, side, quantity, time_in_force)
                    } else {
                        Order::limit(order_id, account_id, side, price, quantity, time_in_force)
                    };
                    self.add_order(order);
                    applied += 1;
                }
                OrderEvent::Cancel { order_id, .. } => {
                    if !self.cancel_order(order_id) {
                        warn!(order_id, "replay: cancel of unknown/terminal order");
                    }
                    applied += 1;
                }
                OrderEvent::Amend {
                    order_id,
                    new_price,
                    new_quantity,
                    ..
                } => {
                    if !self.amend_order(order_id, new_price, new_quantity) {
                        warn!(order_id, "replay: amend of unknown/terminal order");
                    }
                    applied += 1;
                }
                OrderEvent::Fill { .. } => {
                    // Regenerated by matching during replay.
                }
            }
        }
        debug!(applied, "journal replay complete");
        Ok(applied)
    }

    /// Saves a checkpoint: snapshot plus the event journal since the
    /// previous checkpoint.
    pub fn save_checkpoint(
        &self,
        snapshot_path: impl AsRef<Path>,
        events_path: impl AsRef<Path>,
    ) -> Result<(), OrderBookError> {
        self.save_snapshot(snapshot_path)?;
        self.save_events(events_path)?;
        Ok(())
    }

    /// Restores a checkpoint: loads the snapshot, then replays events
    /// recorded after it.
    pub fn recover_from_checkpoint(
        &mut self,
        snapshot_path: impl AsRef<Path>,
        events_path: impl AsRef<Path>,
    ) -> Result<(), OrderBookError> {
        self.load_snapshot(snapshot_path)?;
        self.replay_events(events_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::TimeInForce;

    fn populated_book() -> OrderBook {
        let mut b = OrderBook::new("SNAP");
        b.enable_self_trade_prevention(false);
        b.add_order(Order::limit(1, 1, Side::Buy, 99.0, 100, TimeInForce::Gtc));
        b.add_order(Order::limit(2, 2, Side::Sell, 101.0, 100, TimeInForce::Gtc));
        b.add_order(Order::iceberg(3, 3, Side::Sell, 102.0, 500, 50, TimeInForce::Gtc));
        b.add_order(Order::limit(4, 4, Side::Buy, 101.0, 40, TimeInForce::Ioc));
        b.add_order(Order::stop_market(5, 5, Side::Sell, 95.0, 25, TimeInForce::Gtc));
        b.add_order(Order::stop_limit(6, 6, Side::Buy, 110.0, 111.0, 25, TimeInForce::Gtc));
        b
    }

    #[test]
    fn text_round_trip_is_byte_identical() {
        let b = populated_book();
        let first = b.create_snapshot().to_text();

        let mut restored = OrderBook::new("OTHER");
        restored
            .restore_from_snapshot(&BookSnapshot::from_text(&first).unwrap())
            .unwrap();
        let second = restored.create_snapshot().to_text();
        assert_eq!(first, second);
    }

    #[test]
    fn restore_rebuilds_matching_state() {
        let b = populated_book();
        let snapshot = b.create_snapshot();

        let mut restored = OrderBook::new("X");
        restored.restore_from_snapshot(&snapshot).unwrap();

        assert_eq!(restored.symbol(), "SNAP");
        assert_eq!(restored.best_bid().unwrap().id, 1);
        assert_eq!(restored.best_ask().unwrap().id, 2);
        assert_eq!(restored.pending_stop_count(), 2);
        assert_eq!(restored.last_trade_price(), Some(101.0));
        assert_eq!(restored.fills().len(), 1);

        // The restored book keeps matching correctly.
        restored.add_order(Order::market(10, 9, Side::Buy, 60, TimeInForce::Ioc));
        assert_eq!(restored.fills().len(), 2);
        assert_eq!(restored.fills()[1].sell_order_id, 2);
    }

    #[test]
    fn binary_round_trip() {
        let b = populated_book();
        let snapshot = b.create_snapshot();
        let bytes = snapshot.to_binary();
        assert_eq!(&bytes[..4], b"OBKS");

        let decoded = BookSnapshot::from_binary(&bytes).unwrap();
        assert_eq!(decoded.symbol, snapshot.symbol);
        assert_eq!(decoded.orders.len(), snapshot.orders.len());
        assert_eq!(decoded.pending_stops.len(), snapshot.pending_stops.len());
        assert_eq!(decoded.fills.len(), snapshot.fills.len());
        assert_eq!(decoded.last_trade_price, snapshot.last_trade_price);
    }

    #[test]
    fn binary_crc_detects_corruption() {
        let b = populated_book();
        let mut bytes = b.create_snapshot().to_binary();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        assert!(matches!(
            BookSnapshot::from_binary(&bytes),
            Err(OrderBookError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn text_checksum_detects_tampering() {
        let b = populated_book();
        let text = b.create_snapshot().to_text();
        let tampered = text.replace("TOTAL_ORDERS,6", "TOTAL_ORDERS,7");
        assert_ne!(text, tampered);
        assert!(matches!(
            BookSnapshot::from_text(&tampered),
            Err(OrderBookError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn validation_rejects_duplicates_and_bad_quantities() {
        let b = populated_book();
        let mut snapshot = b.create_snapshot();
        let first = snapshot.orders[0].clone();
        snapshot.orders.push(first);
        assert!(matches!(
            snapshot.validate(),
            Err(OrderBookError::SnapshotIntegrity { .. })
        ));

        let mut snapshot = b.create_snapshot();
        snapshot.orders[0].remaining_qty = snapshot.orders[0].quantity + 1;
        assert!(snapshot.validate().is_err());

        let mut bad = OrderBook::new("Y");
        assert!(bad.restore_from_snapshot(&snapshot).is_err());
        // Failed restore leaves the book empty as before.
        assert!(bad.best_bid().is_none());
    }

    #[test]
    fn files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("book.snap");
        let bin_path = dir.path().join("book.bin");

        let b = populated_book();
        b.save_snapshot(&text_path).unwrap();
        b.save_snapshot_binary(&bin_path).unwrap();

        let mut from_text = OrderBook::new("A");
        from_text.load_snapshot(&text_path).unwrap();
        assert_eq!(from_text.pending_stop_count(), 2);

        let mut from_bin = OrderBook::new("B");
        from_bin.load_snapshot_binary(&bin_path).unwrap();
        assert_eq!(from_bin.pending_stop_count(), 2);
        assert_eq!(from_bin.best_bid().unwrap().id, 1);
    }

    #[test]
    fn journal_replay_reproduces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let events_path = dir.path().join("events.csv");

        let mut b = OrderBook::new("JRNL");
        b.enable_self_trade_prevention(false);
        b.enable_logging();
        b.add_order(Order::limit(1, 1, Side::Buy, 100.0, 50, TimeInForce::Gtc));
        b.add_order(Order::limit(2, 2, Side::Buy, 100.0, 50, TimeInForce::Gtc));
        b.add_order(Order::limit(3, 3, Side::Sell, 100.0, 70, TimeInForce::Ioc));
        b.cancel_order(2);
        b.add_order(Order::limit(4, 4, Side::Sell, 101.0, 30, TimeInForce::Gtc));
        b.amend_order(4, Some(100.5), None);
        b.save_events(&events_path).unwrap();

        let mut replayed = OrderBook::new("JRNL");
        replayed.enable_self_trade_prevention(false);
        replayed.replay_events(&events_path).unwrap();

        let original = b.create_snapshot();
        let rebuilt = replayed.create_snapshot();

        // Fill timestamps are regenerated; compare everything else.
        assert_eq!(rebuilt.orders.len(), original.orders.len());
        for (a, z) in original.orders.iter().zip(rebuilt.orders.iter()) {
            assert_eq!(a.id, z.id);
            assert_eq!(a.state, z.state);
            assert_eq!(a.remaining_qty, z.remaining_qty);
            assert_eq!(a.price, z.price);
        }
        assert_eq!(original.fills.len(), rebuilt.fills.len());
        for (a, z) in original.fills.iter().zip(rebuilt.fills.iter()) {
            assert_eq!(
                (a.buy_order_id, a.sell_order_id, a.quantity),
                (z.buy_order_id, z.sell_order_id, z.quantity)
            );
            assert_eq!(a.price, z.price);
        }
        assert_eq!(original.last_trade_price, rebuilt.last_trade_price);
    }

    #[test]
    fn checkpoint_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("cp.snap");
        let events = dir.path().join("cp.events");

        let mut b = OrderBook::new("CP");
        b.enable_self_trade_prevention(false);
        b.add_order(Order::limit(1, 1, Side::Buy, 100.0, 50, TimeInForce::Gtc));
        b.save_snapshot(&snap).unwrap();

        // Post-snapshot activity, journaled.
        b.enable_logging();
        b.add_order(Order::limit(2, 2, Side::Sell, 100.0, 20, TimeInForce::Gtc));
        b.save_events(&events).unwrap();

        let mut recovered = OrderBook::new("CP");
        recovered.enable_self_trade_prevention(false);
        recovered.recover_from_checkpoint(&snap, &events).unwrap();

        assert_eq!(recovered.fills().len(), 1);
        let o1 = recovered.order(1).unwrap();
        assert_eq!(o1.remaining_qty, 30);
    }
}
