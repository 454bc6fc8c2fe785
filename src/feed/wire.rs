//! Binary wire codec for the external market-data feed.
//!
//! Frame layout (all integers network byte order, f32 transmitted as
//! its IEEE-754 bit pattern):
//!
//! ```text
//! Offset  Size  Field
//! 0       4     payload length (excludes this 13-byte header)
//! 4       1     message type
//! 5       8     sequence number
//! 13      n     payload
//! ```
//!
//! Message types: TICK `0x01`, ORDER_BOOK_UPDATE `0x02`,
//! SNAPSHOT_REQUEST `0x10`, SNAPSHOT_RESPONSE `0x11`, HEARTBEAT `0xFF`.
//! Codec only; transport is an external collaborator.

use thiserror::Error;

/// Frame header size: length + type + sequence.
pub const HEADER_SIZE: usize = 4 + 1 + 8;

/// Symbol field width on the wire.
pub const SYMBOL_SIZE: usize = 4;

/// The all-symbols sentinel in a snapshot request.
pub const ALL_SYMBOLS: [u8; SYMBOL_SIZE] = *b"ALL\0";

/// Wire decode failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Not enough bytes for the header or declared payload.
    #[error("truncated frame: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        have: usize,
    },
    /// Unknown message-type byte.
    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),
    /// Payload length does not match the message type.
    #[error("bad payload length {got} for type {message_type:#04x}")]
    BadPayloadLength {
        /// Type byte.
        message_type: u8,
        /// Declared payload length.
        got: usize,
    },
}

/// One price level in a snapshot response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireLevel {
    /// Level price.
    pub price: f32,
    /// Level quantity.
    pub quantity: u64,
}

/// A decoded feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Trade tick.
    Tick {
        /// Sender sequence number.
        sequence: u64,
        /// Sender timestamp.
        timestamp: u64,
        /// Fixed four-byte symbol.
        symbol: [u8; SYMBOL_SIZE],
        /// Trade price.
        price: f32,
        /// Trade volume.
        volume: i32,
    },
    /// Incremental book update; `quantity == 0` deletes the level.
    OrderBookUpdate {
        /// Sender sequence number.
        sequence: u64,
        /// Fixed four-byte symbol.
        symbol: [u8; SYMBOL_SIZE],
        /// 0 = bid, 1 = ask.
        side: u8,
        /// Level price.
        price: f32,
        /// Signed level quantity.
        quantity: i64,
    },
    /// Request for a book snapshot (`ALL\0` = every symbol).
    SnapshotRequest {
        /// Sender sequence number.
        sequence: u64,
        /// Fixed four-byte symbol.
        symbol: [u8; SYMBOL_SIZE],
    },
    /// Book snapshot: bid levels then ask levels.
    SnapshotResponse {
        /// Sender sequence number.
        sequence: u64,
        /// Fixed four-byte symbol.
        symbol: [u8; SYMBOL_SIZE],
        /// Bid levels, best first.
        bids: Vec<WireLevel>,
        /// Ask levels, best first.
        asks: Vec<WireLevel>,
    },
    /// Liveness beacon.
    Heartbeat {
        /// Sender sequence number.
        sequence: u64,
        /// Sender timestamp.
        timestamp: u64,
    },
}

impl WireMessage {
    /// The type byte this message encodes to.
    #[must_use]
    pub fn type_byte(&self) -> u8 {
        match self {
            WireMessage::Tick { .. } => 0x01,
            WireMessage::OrderBookUpdate { .. } => 0x02,
            WireMessage::SnapshotRequest { .. } => 0x10,
            WireMessage::SnapshotResponse { .. } => 0x11,
            WireMessage::Heartbeat { .. } => 0xFF,
        }
    }

    /// The message sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        match self {
            WireMessage::Tick { sequence, .. }
            | WireMessage::OrderBookUpdate { sequence, .. }
            | WireMessage::SnapshotRequest { sequence, .. }
            | WireMessage::SnapshotResponse { sequence, .. }
            | WireMessage::Heartbeat { sequence, .. } => *sequence,
        }
    }

    /// Encodes the message into a length-prefixed frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.encode_payload();
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.push(self.type_byte());
        frame.extend_from_slice(&self.sequence().to_be_bytes());
        frame.extend_from_slice(&payload);
        frame
    }

    fn encode_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            WireMessage::Tick {
                timestamp,
                symbol,
                price,
                volume,
                ..
            } => {
                out.extend_from_slice(&timestamp.to_be_bytes());
                out.extend_from_slice(symbol);
                out.extend_from_slice(&price.to_bits().to_be_bytes());
                out.extend_from_slice(&volume.to_be_bytes());
            }
            WireMessage::OrderBookUpdate {
                symbol,
                side,
                price,
                quantity,
                ..
            } => {
                out.extend_from_slice(symbol);
                out.push(*side);
                out.extend_from_slice(&price.to_bits().to_be_bytes());
                out.extend_from_slice(&quantity.to_be_bytes());
            }
            WireMessage::SnapshotRequest { symbol, .. } => {
                out.extend_from_slice(symbol);
            }
            WireMessage::SnapshotResponse {
                symbol, bids, asks, ..
            } => {
                out.extend_from_slice(symbol);
                out.push(bids.len() as u8);
                out.push(asks.len() as u8);
                for level in bids.iter().chain(asks) {
                    out.extend_from_slice(&level.price.to_bits().to_be_bytes());
                    out.extend_from_slice(&level.quantity.to_be_bytes());
                }
            }
            WireMessage::Heartbeat { timestamp, .. } => {
                out.extend_from_slice(&timestamp.to_be_bytes());
            }
        }
        out
    }

    /// Decodes one frame from the front of `bytes`. Returns the message
    /// and the number of bytes consumed, so a stream can be decoded
    /// frame by frame.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        if bytes.len() < HEADER_SIZE {
            return Err(WireError::Truncated {
                needed: HEADER_SIZE,
                have: bytes.len(),
            });
        }
        let payload_len = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let message_type = bytes[4];
        let sequence = u64::from_be_bytes(bytes[5..13].try_into().unwrap());
        let total = HEADER_SIZE + payload_len;
        if bytes.len() < total {
            return Err(WireError::Truncated {
                needed: total,
                have: bytes.len(),
            });
        }
        let payload = &bytes[HEADER_SIZE..total];
        let mut reader = PayloadReader::new(payload, message_type);

        let message = match message_type {
            0x01 => {
                if payload_len != 20 {
                    return Err(WireError::BadPayloadLength {
                        message_type,
                        got: payload_len,
                    });
                }
                WireMessage::Tick {
                    sequence,
                    timestamp: reader.u64()?,
                    symbol: reader.symbol()?,
                    price: f32::from_bits(reader.u32()?),
                    volume: reader.u32()? as i32,
                }
            }
            0x02 => {
                if payload_len != 17 {
                    return Err(WireError::BadPayloadLength {
                        message_type,
                        got: payload_len,
                    });
                }
                WireMessage::OrderBookUpdate {
                    sequence,
                    symbol: reader.symbol()?,
                    side: reader.u8()?,
                    price: f32::from_bits(reader.u32()?),
                    quantity: reader.u64()? as i64,
                }
            }
            0x10 => {
                if payload_len != SYMBOL_SIZE {
                    return Err(WireError::BadPayloadLength {
                        message_type,
                        got: payload_len,
                    });
                }
                WireMessage::SnapshotRequest {
                    sequence,
                    symbol: reader.symbol()?,
                }
            }
            0x11 => {
                let symbol = reader.symbol()?;
                let num_bids = reader.u8()? as usize;
                let num_asks = reader.u8()? as usize;
                if payload_len != 6 + (num_bids + num_asks) * 12 {
                    return Err(WireError::BadPayloadLength {
                        message_type,
                        got: payload_len,
                    });
                }
                let mut read_levels = |count: usize| -> Result<Vec<WireLevel>, WireError> {
                    let mut levels = Vec::with_capacity(count);
                    for _ in 0..count {
                        levels.push(WireLevel {
                            price: f32::from_bits(reader.u32()?),
                            quantity: reader.u64()?,
                        });
                    }
                    Ok(levels)
                };
                let bids = read_levels(num_bids)?;
                let asks = read_levels(num_asks)?;
                WireMessage::SnapshotResponse {
                    sequence,
                    symbol,
                    bids,
                    asks,
                }
            }
            0xFF => {
                if payload_len != 8 {
                    return Err(WireError::BadPayloadLength {
                        message_type,
                        got: payload_len,
                    });
                }
                WireMessage::Heartbeat {
                    sequence,
                    timestamp: reader.u64()?,
                }
            }
            other => return Err(WireError::UnknownType(other)),
        };
        Ok((message, total))
    }
}

/// Bounds-checked big-endian payload reader.
struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
    message_type: u8,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8], message_type: u8) -> Self {
        Self {
            data,
            pos: 0,
            message_type,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.pos + n > self.data.len() {
            return Err(WireError::BadPayloadLength {
                message_type: self.message_type,
                got: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn symbol(&mut self) -> Result<[u8; SYMBOL_SIZE], WireError> {
        Ok(self.take(SYMBOL_SIZE)?.try_into().unwrap())
    }
}
