//! The fill router: enriches raw fills with account, symbol, liquidity
//! and fee metadata, blocks self-trades, and fans fills out to registered
//! callbacks.
//!
//! Callbacks are registered at setup time and invoked in registration
//! order on the matching thread; they should capture references (via
//! `Arc`) rather than owned data to keep the hot path allocation-free.

use super::fill::{EnhancedFill, Fill, LiquidityFlag};
use super::order::Order;
use super::types::{AccountId, Side};
use crate::utils::monotonic_nanos;
use std::sync::Arc;
use tracing::{debug, trace};

/// Callback invoked for every routed fill.
pub type FillCallback = Arc<dyn Fn(&EnhancedFill) + Send + Sync>;

/// Callback invoked when a self-trade is prevented. Receives the account
/// and both orders involved.
pub type SelfTradeCallback = Arc<dyn Fn(AccountId, &Order, &Order) + Send + Sync>;

/// Routes raw fills from the matching engine, owning the enriched-fill
/// store. `fill_id` is monotonically increasing within a router.
pub struct FillRouter {
    routed_fills: Vec<EnhancedFill>,
    next_fill_id: u64,
    fill_callbacks: Vec<FillCallback>,
    self_trade_callbacks: Vec<SelfTradeCallback>,
    prevent_self_trades: bool,
    enable_fees: bool,
    maker_fee_rate: f64,
    taker_fee_rate: f64,
    self_trades_prevented: u64,
    total_fills_routed: u64,
}

impl FillRouter {
    /// Creates a router; `prevent_self_trades` arms the same-account check.
    #[must_use]
    pub fn new(prevent_self_trades: bool) -> Self {
        Self {
            routed_fills: Vec::new(),
            next_fill_id: 1,
            fill_callbacks: Vec::new(),
            self_trade_callbacks: Vec::new(),
            prevent_self_trades,
            enable_fees: false,
            maker_fee_rate: 0.0,
            taker_fee_rate: 0.0,
            self_trades_prevented: 0,
            total_fills_routed: 0,
        }
    }

    /// Toggles self-trade prevention.
    pub fn set_self_trade_prevention(&mut self, enable: bool) {
        self.prevent_self_trades = enable;
    }

    /// Enables fee computation with decimal rates (e.g. `0.0002` = 2 bps).
    pub fn set_fee_schedule(&mut self, maker_rate: f64, taker_rate: f64) {
        self.enable_fees = true;
        self.maker_fee_rate = maker_rate;
        self.taker_fee_rate = taker_rate;
    }

    /// Registers a fill callback; invoked in registration order.
    pub fn register_fill_callback(&mut self, callback: FillCallback) {
        self.fill_callbacks.push(callback);
    }

    /// Registers a self-trade callback.
    pub fn register_self_trade_callback(&mut self, callback: SelfTradeCallback) {
        self.self_trade_callbacks.push(callback);
    }

    /// Routes one raw fill. Returns `false` when the fill was rejected by
    /// self-trade prevention, in which case nothing is stored and the
    /// matching engine must cancel the aggressor.
    pub fn route_fill(
        &mut self,
        fill: &Fill,
        aggressive: &Order,
        passive: &Order,
        symbol: &str,
    ) -> bool {
        if self.prevent_self_trades && aggressive.account_id == passive.account_id {
            self.self_trades_prevented += 1;
            debug!(
                account = aggressive.account_id,
                aggressor = aggressive.id,
                passive = passive.id,
                "self-trade prevented"
            );
            for cb in &self.self_trade_callbacks {
                cb(aggressive.account_id, aggressive, passive);
            }
            return false;
        }

        let aggressive_is_buyer = aggressive.side == Side::Buy;
        let (buy_account, sell_account) = if aggressive_is_buyer {
            (aggressive.account_id, passive.account_id)
        } else {
            (passive.account_id, aggressive.account_id)
        };

        let (buyer_fee, seller_fee) = if self.enable_fees {
            let notional = fill.notional();
            if aggressive_is_buyer {
                (notional * self.taker_fee_rate, notional * self.maker_fee_rate)
            } else {
                (notional * self.maker_fee_rate, notional * self.taker_fee_rate)
            }
        } else {
            (0.0, 0.0)
        };

        let enhanced = EnhancedFill {
            fill: *fill,
            buy_account_id: buy_account,
            sell_account_id: sell_account,
            symbol: symbol.to_string(),
            fill_id: self.next_fill_id,
            aggressor_side: aggressive.side,
            liquidity_flag: if aggressive_is_buyer {
                LiquidityFlag::Taker
            } else {
                LiquidityFlag::Maker
            },
            buyer_fee,
            seller_fee,
            match_time_ns: fill.timestamp_ns,
            routing_time_ns: monotonic_nanos(),
            self_trade_prevented: false,
        };
        self.next_fill_id += 1;
        self.total_fills_routed += 1;
        trace!(fill_id = enhanced.fill_id, qty = fill.quantity, price = fill.price, "fill routed");

        self.routed_fills.push(enhanced);
        // Safe to index: just pushed.
        let stored = &self.routed_fills[self.routed_fills.len() - 1];
        for cb in &self.fill_callbacks {
            cb(stored);
        }
        true
    }

    /// All routed fills, in routing order.
    #[must_use]
    pub fn all_fills(&self) -> &[EnhancedFill] {
        &self.routed_fills
    }

    /// Fills in which `account` participated on either side.
    #[must_use]
    pub fn fills_for_account(&self, account: AccountId) -> Vec<EnhancedFill> {
        self.routed_fills
            .iter()
            .filter(|f| f.involves_account(account))
            .cloned()
            .collect()
    }

    /// Fills for a given symbol.
    #[must_use]
    pub fn fills_for_symbol(&self, symbol: &str) -> Vec<EnhancedFill> {
        self.routed_fills
            .iter()
            .filter(|f| f.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Looks up a fill by its router-assigned id.
    #[must_use]
    pub fn fill_by_id(&self, fill_id: u64) -> Option<&EnhancedFill> {
        self.routed_fills.iter().find(|f| f.fill_id == fill_id)
    }

    /// Number of self-trades blocked so far.
    #[must_use]
    pub fn self_trades_prevented(&self) -> u64 {
        self.self_trades_prevented
    }

    /// Number of fills routed so far.
    #[must_use]
    pub fn total_fills(&self) -> u64 {
        self.total_fills_routed
    }
}

impl Default for FillRouter {
    fn default() -> Self {
        Self::new(true)
    }
}
