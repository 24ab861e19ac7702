use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::{MarketId, Side, UserId};

/// Accumulated share inventory for one `(market, user, side)` triple.
///
/// Shares go negative when a user ends up short a side through the
/// cross-side convention (the resting counterparty of a trade receives the
/// negated size on the opposite outcome). Downstream valuation interprets
/// negative inventory; the engine just records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub user_id: UserId,
    pub side: Side,
    pub shares: Decimal,
    pub avg_price: Decimal,
}

impl Position {
    pub fn new(market_id: MarketId, user_id: UserId, side: Side) -> Self {
        Self {
            market_id,
            user_id,
            side,
            shares: Decimal::ZERO,
            avg_price: Decimal::ZERO,
        }
    }

    /// Folds one fill into the position: shares accumulate and the average
    /// price becomes the size-weighted mean of the old inventory and the
    /// fill. When the combined inventory lands exactly on zero the average
    /// resets to zero instead of dividing by it.
    pub fn apply_fill(&mut self, delta_shares: Decimal, price: Decimal) {
        let combined = self.shares + delta_shares;
        if combined.is_zero() {
            self.avg_price = Decimal::ZERO;
        } else {
            self.avg_price =
                (self.shares * self.avg_price + delta_shares * price) / combined;
        }
        self.shares = combined;
    }
}
