use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::decimal::MIDPOINT;
use crate::orders::{MarketId, Order, OrderId, OrderStatus, Side, UserId};
use crate::persistence::{Persistence, PersistenceError, PersistenceResult};
use crate::position::Position;
use crate::trade::Trade;

#[derive(Default)]
struct Tables {
    markets: HashMap<MarketId, (Decimal, Decimal)>,
    orders: HashMap<OrderId, Order>,
    trades: Vec<Trade>,
    positions: HashMap<(MarketId, UserId, Side), Position>,
}

/// In-memory [`Persistence`] implementation.
///
/// Backs the test suites and is good enough for embedders that don't need
/// durability. No lock is held across an await point, so a plain
/// [`std::sync::Mutex`] suffices.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a market at the midpoint prices. Submissions against an
    /// unregistered market are rejected by the engine facade.
    pub fn create_market(&self, market_id: MarketId) {
        self.tables
            .lock()
            .unwrap()
            .markets
            .entry(market_id)
            .or_insert((MIDPOINT, MIDPOINT));
    }

    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        self.tables.lock().unwrap().orders.get(&order_id).cloned()
    }

    pub fn trades(&self, market_id: MarketId) -> Vec<Trade> {
        self.tables
            .lock()
            .unwrap()
            .trades
            .iter()
            .filter(|t| t.market_id == market_id)
            .cloned()
            .collect()
    }

    pub fn position(
        &self,
        market_id: MarketId,
        user_id: UserId,
        side: Side,
    ) -> Option<Position> {
        self.tables
            .lock()
            .unwrap()
            .positions
            .get(&(market_id, user_id, side))
            .cloned()
    }

    pub fn last_prices(&self, market_id: MarketId) -> Option<(Decimal, Decimal)> {
        self.tables.lock().unwrap().markets.get(&market_id).copied()
    }
}

impl Persistence for MemoryStore {
    async fn create_order(&self, order: &Order) -> PersistenceResult<()> {
        self.tables
            .lock()
            .unwrap()
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn create_trade(&self, trade: &Trade) -> PersistenceResult<Trade> {
        self.tables.lock().unwrap().trades.push(trade.clone());
        Ok(trade.clone())
    }

    async fn set_order_filled(&self, order_id: OrderId, filled: Decimal) -> PersistenceResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or(PersistenceError::UnknownOrder(order_id))?;
        order.filled = filled;
        Ok(())
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> PersistenceResult<Order> {
        let mut tables = self.tables.lock().unwrap();
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or(PersistenceError::UnknownOrder(order_id))?;
        debug_assert!(order.status == status || order.status.can_transition_to(status));
        order.status = status;
        Ok(order.clone())
    }

    async fn upsert_position(
        &self,
        market_id: MarketId,
        user_id: UserId,
        side: Side,
        delta_shares: Decimal,
        price: Decimal,
    ) -> PersistenceResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .positions
            .entry((market_id, user_id, side))
            .or_insert_with(|| Position::new(market_id, user_id, side))
            .apply_fill(delta_shares, price);
        Ok(())
    }

    async fn set_last_prices(
        &self,
        market_id: MarketId,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> PersistenceResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let prices = tables
            .markets
            .get_mut(&market_id)
            .ok_or(PersistenceError::UnknownMarket(market_id))?;
        *prices = (yes_price, no_price);
        Ok(())
    }

    async fn active_orders(&self, market_id: MarketId) -> PersistenceResult<Vec<Order>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| {
                o.market_id == market_id
                    && !o.status.is_terminal()
                    && o.remaining() > Decimal::ZERO
            })
            .cloned()
            .collect())
    }

    async fn market_exists(&self, market_id: MarketId) -> PersistenceResult<bool> {
        Ok(self.tables.lock().unwrap().markets.contains_key(&market_id))
    }
}
