use bincode::error::{DecodeError, EncodeError};
use rust_decimal::Decimal;
use std::future::Future;
use thiserror::Error;

use crate::orders::{MarketId, Order, OrderId, OrderStatus, Side, UserId};
use crate::trade::Trade;

/// Errors surfaced by a [`Persistence`] implementation.
///
/// Any failure propagates to the submitting caller; the in-memory book may
/// then disagree with the store until the market is reloaded.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ParityDB error: {0}")]
    Parity(#[from] parity_db::Error),
    #[error("Serialization/Deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Bincode encode error: {0}")]
    BincodeEncode(#[from] EncodeError),

    #[error("Bincode decode error: {0}")]
    BincodeDecode(#[from] DecodeError),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("unknown market {0}")]
    UnknownMarket(MarketId),

    #[error("Invalid cursor")]
    BadCursor,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// The narrow port the matcher and engine facade write through.
///
/// Implementations may be an in-memory table set ([`crate::memory::MemoryStore`])
/// or a durable store ([`crate::store::TradeStore`]). Every method may
/// suspend; callers hold the per-market lock across the whole submission so a
/// half-applied match is never observable.
pub trait Persistence: Send + Sync {
    /// Records a freshly submitted order before matching begins.
    fn create_order(&self, order: &Order) -> impl Future<Output = PersistenceResult<()>> + Send;

    /// Appends a write-once trade record and returns the trade as
    /// persisted.
    fn create_trade(&self, trade: &Trade) -> impl Future<Output = PersistenceResult<Trade>> + Send;

    /// Overwrites an order's **cumulative** filled total (never a delta).
    fn set_order_filled(
        &self,
        order_id: OrderId,
        filled: Decimal,
    ) -> impl Future<Output = PersistenceResult<()>> + Send;

    /// Transitions an order's status, returning the updated order.
    fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = PersistenceResult<Order>> + Send;

    /// Folds `delta_shares` at `price` into the `(market, user, side)`
    /// position per the size-weighted average rule.
    fn upsert_position(
        &self,
        market_id: MarketId,
        user_id: UserId,
        side: Side,
        delta_shares: Decimal,
        price: Decimal,
    ) -> impl Future<Output = PersistenceResult<()>> + Send;

    /// Publishes the market's top-of-book prices.
    fn set_last_prices(
        &self,
        market_id: MarketId,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> impl Future<Output = PersistenceResult<()>> + Send;

    /// All non-terminal orders of a market, used by warm-load only.
    fn active_orders(
        &self,
        market_id: MarketId,
    ) -> impl Future<Output = PersistenceResult<Vec<Order>>> + Send;

    /// Whether the market is known to the store; backs the facade's
    /// unknown-market rejection.
    fn market_exists(
        &self,
        market_id: MarketId,
    ) -> impl Future<Output = PersistenceResult<bool>> + Send;
}
