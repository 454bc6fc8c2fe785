//! Order book error types.

use super::types::{OrderId, Side};
use std::fmt;

/// Errors surfaced by the order book core.
///
/// The matching hot path never returns these; `NotFound` and state
/// conflicts are reported as `false` from `cancel_order`/`amend_order`,
/// and routing rejections are handled inline. This enum covers the
/// boundary operations: persistence, validation and malformed input.
#[derive(Debug)]
#[non_exhaustive]
pub enum OrderBookError {
    /// Order not found in the authoritative store.
    OrderNotFound(OrderId),

    /// Operation attempted against a terminal order.
    TerminalOrder {
        /// The order that was already terminal.
        order_id: OrderId,
    },

    /// Order failed validation on entry.
    InvalidOrder {
        /// The offending order id.
        order_id: OrderId,
        /// Description of the violation.
        message: String,
    },

    /// Insufficient liquidity for a market order.
    InsufficientLiquidity {
        /// Side of the market order.
        side: Side,
        /// Quantity requested.
        requested: u64,
        /// Quantity available at crossable prices.
        available: u64,
    },

    /// Snapshot failed integrity validation before restore.
    SnapshotIntegrity {
        /// Description of the failed check.
        message: String,
    },

    /// Snapshot or journal checksum did not match its payload.
    ChecksumMismatch {
        /// Expected checksum value.
        expected: String,
        /// Checksum computed from the payload.
        actual: String,
    },

    /// I/O error while persisting or restoring state.
    Io {
        /// Underlying error message.
        message: String,
    },

    /// Malformed persisted record (snapshot row or journal line).
    Parse {
        /// One-based line number when known.
        line: usize,
        /// Description of the problem.
        message: String,
    },
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::OrderNotFound(id) => write!(f, "order not found: {id}"),
            OrderBookError::TerminalOrder { order_id } => {
                write!(f, "order {order_id} is terminal and cannot be mutated")
            }
            OrderBookError::InvalidOrder { order_id, message } => {
                write!(f, "invalid order {order_id}: {message}")
            }
            OrderBookError::InsufficientLiquidity {
                side,
                requested,
                available,
            } => write!(
                f,
                "insufficient liquidity for {side} order: requested {requested}, available {available}"
            ),
            OrderBookError::SnapshotIntegrity { message } => {
                write!(f, "snapshot integrity check failed: {message}")
            }
            OrderBookError::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, got {actual}")
            }
            OrderBookError::Io { message } => write!(f, "I/O error: {message}"),
            OrderBookError::Parse { line, message } => {
                write!(f, "parse error at line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for OrderBookError {}

impl From<std::io::Error> for OrderBookError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        OrderBookError::Io {
            message: err.to_string(),
        }
    }
}
