use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::decimal;
use crate::matcher::{self, MatchOutcome};
use crate::orderbook::{BookSnapshot, OrderBook};
use crate::orders::{MarketId, Order, OrderId, OrderStatus, OrderType, Side, UserId};
use crate::persistence::{Persistence, PersistenceError};
use crate::trade::Trade;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid order: {0}")]
    InvalidOrder(String),
    #[error("unknown market {0}")]
    MarketUnknown(MarketId),
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// A submission as it arrives from the host transport. Prices and sizes are
/// decimal strings at this boundary; `price` may be omitted for market
/// orders only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub market_id: MarketId,
    pub user_id: UserId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<String>,
    pub size: String,
}

/// What a submission returned: the order in its terminal or resting state,
/// the trades it produced in execution order, and the fill-or-kill rejection
/// flag.
#[derive(Debug, Serialize)]
pub struct SubmitOutcome {
    pub order: Order,
    pub trades: Vec<Trade>,
    pub rejected: bool,
    pub reject_reason: Option<String>,
}

/// The engine facade: one order book per market, created lazily and
/// warm-loaded from persistence on first reference.
///
/// Each market's book is guarded by its own [`Mutex`], held across the whole
/// submission (including every awaited persistence write) so no other
/// submission can observe a half-applied match. Markets are independent;
/// submissions to different markets proceed in parallel.
pub struct Engine<P> {
    store: P,
    books: RwLock<HashMap<MarketId, Arc<Mutex<OrderBook>>>>,
    clock: std::sync::Mutex<SystemTime>,
}

impl<P: Persistence> Engine<P> {
    pub fn new(store: P) -> Self {
        Self {
            store,
            books: RwLock::new(HashMap::new()),
            clock: std::sync::Mutex::new(SystemTime::UNIX_EPOCH),
        }
    }

    /// Creation timestamps must be strictly monotone (time priority and
    /// warm-load ordering depend on it); the wall clock alone can tie or
    /// step backwards, so ties are bumped by a nanosecond.
    fn next_timestamp(&self) -> SystemTime {
        let mut last = self.clock.lock().unwrap();
        let mut now = SystemTime::now();
        if now <= *last {
            now = *last + Duration::from_nanos(1);
        }
        *last = now;
        now
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    /// Consumes the engine, handing the store back to the caller (e.g. to
    /// rebuild an engine over the same persisted state).
    pub fn into_store(self) -> P {
        self.store
    }

    /// Validates a request and runs it through the matcher under the
    /// market's lock. Fill-or-kill insufficiency is reported through
    /// [`SubmitOutcome::rejected`], not as an error.
    pub async fn submit(&self, request: OrderRequest) -> Result<SubmitOutcome, EngineError> {
        let mut order = self.validate(&request)?;
        let book = self.book(order.market_id).await?;
        let mut book = book.lock().await;

        self.store.create_order(&order).await?;
        let MatchOutcome {
            trades,
            rejected,
            reject_reason,
        } = matcher::execute(&mut book, &mut order, &self.store).await?;

        info!(
            order_id = %order.id,
            market_id = %order.market_id,
            status = ?order.status,
            trades = trades.len(),
            rejected,
            "submission processed"
        );
        Ok(SubmitOutcome {
            order,
            trades,
            rejected,
            reject_reason,
        })
    }

    /// Read-only view of a market's book, best price first on both sides.
    pub async fn snapshot(&self, market_id: MarketId) -> Result<BookSnapshot, EngineError> {
        let book = self.book(market_id).await?;
        let book = book.lock().await;
        Ok(book.snapshot(market_id))
    }

    /// Replaces the in-memory book with the store's active orders, inserted
    /// in ascending creation order to reproduce time priority. Used after a
    /// persistence failure left the book potentially stale.
    pub async fn load(&self, market_id: MarketId) -> Result<(), EngineError> {
        let book = self.book(market_id).await?;
        let mut guard = book.lock().await;
        *guard = Self::loaded_book(&self.store, market_id).await?;
        Ok(())
    }

    /// Removes a resting order and marks it cancelled, then republishes the
    /// top-of-book prices. Takes the same per-market lock as submissions.
    pub async fn cancel(
        &self,
        order_id: OrderId,
        market_id: MarketId,
        side: Side,
    ) -> Result<Order, EngineError> {
        let book = self.book(market_id).await?;
        let mut book = book.lock().await;

        if book.cancel(order_id).is_none() {
            return Err(EngineError::OrderNotFound(order_id));
        }
        let cancelled = self
            .store
            .set_order_status(order_id, OrderStatus::Cancelled)
            .await?;
        let (yes_price, no_price) = book.published_prices();
        self.store
            .set_last_prices(market_id, yes_price, no_price)
            .await?;
        info!(order_id = %order_id, market_id = %market_id, side = ?side, "order cancelled");
        Ok(cancelled)
    }

    fn validate(&self, request: &OrderRequest) -> Result<Order, EngineError> {
        let size = decimal::parse_size(&request.size)
            .map_err(|e| EngineError::InvalidOrder(e.to_string()))?;
        let price = match (&request.price, request.order_type) {
            (Some(raw), _) => decimal::parse_price(raw)
                .map_err(|e| EngineError::InvalidOrder(e.to_string()))?,
            // Market orders match at any price; the stored price is a
            // placeholder
            (None, OrderType::Market) => Decimal::ZERO,
            (None, _) => {
                return Err(EngineError::InvalidOrder(
                    "price is required for non-market orders".to_string(),
                ));
            }
        };
        Ok(Order {
            id: Uuid::new_v4(),
            market_id: request.market_id,
            user_id: request.user_id,
            side: request.side,
            order_type: request.order_type,
            price,
            size,
            filled: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: self.next_timestamp(),
        })
    }

    /// Returns the market's book, creating and warm-loading it on first
    /// reference. Unknown markets are rejected before any book exists.
    async fn book(&self, market_id: MarketId) -> Result<Arc<Mutex<OrderBook>>, EngineError> {
        if let Some(book) = self.books.read().await.get(&market_id) {
            return Ok(book.clone());
        }
        if !self.store.market_exists(market_id).await? {
            return Err(EngineError::MarketUnknown(market_id));
        }
        let book = {
            let mut books = self.books.write().await;
            books
                .entry(market_id)
                .or_insert_with(|| Arc::new(Mutex::new(OrderBook::new())))
                .clone()
        };
        {
            // First referent loads; racing callers see `loaded` and skip
            let mut guard = book.lock().await;
            if !guard.loaded {
                *guard = Self::loaded_book(&self.store, market_id).await?;
            }
        }
        Ok(book)
    }

    async fn loaded_book(store: &P, market_id: MarketId) -> Result<OrderBook, EngineError> {
        let mut active = store.active_orders(market_id).await?;
        active.sort_by_key(|o| o.created_at);
        let mut book = OrderBook::new();
        for order in active {
            book.insert(order);
        }
        book.loaded = true;
        Ok(book)
    }
}
