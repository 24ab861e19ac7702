use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::orders::{MarketId, OrderId, Side, UserId};

/// An executed match between an aggressing order and a resting order.
///
/// - The price comes from the resting order; price improvement accrues to the
///   aggressor.
/// - The aggressor is always the buyer of its own outcome, so `buy_order_id`
///   is the incoming order and `sell_order_id` the resting counterparty.
/// - `side` is the aggressor's side.
///
/// Trades are write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub market_id: MarketId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: SystemTime,
}
