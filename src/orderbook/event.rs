//! Order event journal records and their CSV codec.
//!
//! One event per line, 16 comma-separated columns with a header line.
//! Fields that do not apply to a given event type are written as `N/A`,
//! `0` or `0.00`. Timestamps are nanoseconds since the monotonic clock
//! epoch, so replayed journals are only meaningful within the process
//! that wrote them (fills are regenerated on replay anyway).

use super::types::{AccountId, OrderId, OrderKind, Side, TimeInForce};
use serde::Serialize;
use thiserror::Error;

/// Journal line that failed to parse.
#[derive(Debug, Error)]
pub enum EventParseError {
    /// The line did not have the required number of columns.
    #[error("expected 16 columns, got {0}")]
    ColumnCount(usize),
    /// A field failed to parse.
    #[error("bad field `{field}`: {value}")]
    BadField {
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

/// One journaled book mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OrderEvent {
    /// A new order entered the book.
    New {
        /// Monotonic timestamp.
        timestamp_ns: u64,
        /// Order id.
        order_id: OrderId,
        /// Order side.
        side: Side,
        /// Limit or market.
        kind: OrderKind,
        /// Time-in-force.
        time_in_force: TimeInForce,
        /// Limit price (sentinel for market orders).
        price: f64,
        /// Original quantity.
        quantity: u64,
        /// Iceberg peak size; 0 for plain orders.
        peak_size: u64,
        /// Owning account.
        account_id: AccountId,
    },
    /// An order was cancelled.
    Cancel {
        /// Monotonic timestamp.
        timestamp_ns: u64,
        /// Order id.
        order_id: OrderId,
        /// Owning account.
        account_id: AccountId,
    },
    /// Price and/or quantity amendment.
    Amend {
        /// Monotonic timestamp.
        timestamp_ns: u64,
        /// Order id.
        order_id: OrderId,
        /// New limit price, if amended.
        new_price: Option<f64>,
        /// New remaining quantity, if amended.
        new_quantity: Option<u64>,
        /// Owning account.
        account_id: AccountId,
    },
    /// A trade occurred. Skipped on replay (fills are regenerated).
    Fill {
        /// Monotonic timestamp.
        timestamp_ns: u64,
        /// Buy-side order id.
        order_id: OrderId,
        /// Sell-side order id.
        counterparty_id: OrderId,
        /// Trade price.
        price: f64,
        /// Trade quantity.
        quantity: u64,
        /// Buy-side account.
        account_id: AccountId,
    },
}

impl OrderEvent {
    /// The event's timestamp.
    #[must_use]
    pub fn timestamp_ns(&self) -> u64 {
        match self {
            OrderEvent::New { timestamp_ns, .. }
            | OrderEvent::Cancel { timestamp_ns, .. }
            | OrderEvent::Amend { timestamp_ns, .. }
            | OrderEvent::Fill { timestamp_ns, .. } => *timestamp_ns,
        }
    }

    /// The journal CSV header.
    #[must_use]
    pub fn csv_header() -> &'static str {
        "timestamp_ns,type,order_id,side,order_type,tif,price,quantity,peak_size,\
         account_id,has_new_price,has_new_qty,new_price,new_qty,counterparty_id,fill_qty"
    }

    /// Serializes to one journal line (no trailing newline).
    #[must_use]
    pub fn to_csv(&self) -> String {
        match self {
            OrderEvent::New {
                timestamp_ns,
                order_id,
                side,
                kind,
                time_in_force,
                price,
                quantity,
                peak_size,
                account_id,
            } => format!(
                "{timestamp_ns},NEW,{order_id},{side},{kind},{time_in_force},{price:.2},{quantity},{peak_size},{account_id},0,0,0.00,0,0,0"
            ),
            OrderEvent::Cancel {
                timestamp_ns,
                order_id,
                account_id,
            } => format!(
                "{timestamp_ns},CANCEL,{order_id},N/A,N/A,N/A,0.00,0,0,{account_id},0,0,0.00,0,0,0"
            ),
            OrderEvent::Amend {
                timestamp_ns,
                order_id,
                new_price,
                new_quantity,
                account_id,
            } => format!(
                "{timestamp_ns},AMEND,{order_id},N/A,N/A,N/A,0.00,0,0,{account_id},{},{},{:.2},{},0,0",
                u8::from(new_price.is_some()),
                u8::from(new_quantity.is_some()),
                new_price.unwrap_or(0.0),
                new_quantity.unwrap_or(0),
            ),
            OrderEvent::Fill {
                timestamp_ns,
                order_id,
                counterparty_id,
                price,
                quantity,
                account_id,
            } => format!(
                "{timestamp_ns},FILL,{order_id},N/A,N/A,N/A,{price:.2},0,0,{account_id},0,0,0.00,0,{counterparty_id},{quantity}"
            ),
        }
    }

    /// Parses one journal line.
    pub fn from_csv(line: &str) -> Result<Self, EventParseError> {
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() != 16 {
            return Err(EventParseError::ColumnCount(cols.len()));
        }

        fn num<T: std::str::FromStr>(
            field: &'static str,
            value: &str,
        ) -> Result<T, EventParseError> {
            value.parse().map_err(|_| EventParseError::BadField {
                field,
                value: value.to_string(),
            })
        }

        let timestamp_ns: u64 = num("timestamp_ns", cols[0])?;
        let order_id: OrderId = num("order_id", cols[2])?;
        let account_id: AccountId = num("account_id", cols[9])?;

        match cols[1] {
            "NEW" => {
                let side = match cols[3] {
                    "BUY" => Side::Buy,
                    "SELL" => Side::Sell,
                    other => {
                        return Err(EventParseError::BadField {
                            field: "side",
                            value: other.to_string(),
                        });
                    }
                };
                let kind = match cols[4] {
                    "LIMIT" => OrderKind::Limit,
                    "MARKET" => OrderKind::Market,
                    other => {
                        return Err(EventParseError::BadField {
                            field: "order_type",
                            value: other.to_string(),
                        });
                    }
                };
                let time_in_force =
                    TimeInForce::from_token(cols[5]).ok_or_else(|| EventParseError::BadField {
                        field: "tif",
                        value: cols[5].to_string(),
                    })?;
                Ok(OrderEvent::New {
                    timestamp_ns,
                    order_id,
                    side,
                    kind,
                    time_in_force,
                    price: num("price", cols[6])?,
                    quantity: num("quantity", cols[7])?,
                    peak_size: num("peak_size", cols[8])?,
                    account_id,
                })
            }
            "CANCEL" => Ok(OrderEvent::Cancel {
                timestamp_ns,
                order_id,
                account_id,
            }),
            "AMEND" => {
                let has_price = cols[10] == "1";
                let has_qty = cols[11] == "1";
                Ok(OrderEvent::Amend {
                    timestamp_ns,
                    order_id,
                    new_price: if has_price {
                        Some(num("new_price", cols[12])?)
                    } else {
                        None
                    },
                    new_quantity: if has_qty {
                        Some(num("new_qty", cols[13])?)
                    } else {
                        None
                    },
                    account_id,
                })
            }
            "FILL" => Ok(OrderEvent::Fill {
                timestamp_ns,
                order_id,
                counterparty_id: num("counterparty_id", cols[14])?,
                price: num("price", cols[6])?,
                quantity: num("fill_qty", cols[15])?,
                account_id,
            }),
            other => Err(EventParseError::BadField {
                field: "type",
                value: other.to_string(),
            }),
        }
    }
}
