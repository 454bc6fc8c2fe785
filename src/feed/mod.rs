//! Boundary codecs for external collaborators: the binary feed wire
//! format and market-data CSV replay. No transport lives here.

mod replay;
mod wire;

pub use replay::{FeedError, MarketTick, load_csv, parse_csv, parse_row};
pub use wire::{ALL_SYMBOLS, HEADER_SIZE, SYMBOL_SIZE, WireError, WireLevel, WireMessage};
