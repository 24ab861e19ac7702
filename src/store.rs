use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use bincode::config;
use parity_db::{BTreeIterator, ColId, Db, Options};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;

use crate::decimal::MIDPOINT;
use crate::orders::{MarketId, Order, OrderId, OrderStatus, Side, UserId};
use crate::persistence::{Persistence, PersistenceError, PersistenceResult};
use crate::position::Position;
use crate::trade::Trade;

const COL_ORDERS: ColId = 0;
const COL_TRADES: ColId = 1;
const COL_POSITIONS: ColId = 2;
const COL_MARKETS: ColId = 3;

/// Pagination cursor naming the last trade a client saw. Travels as
/// URL-safe base64 over a tiny versioned JSON payload; opaque to clients.
#[derive(Serialize, Deserialize)]
struct Cursor {
    v: u8,
    ts_nanos: u128,
    trade_id: Uuid,
}

/// Published top-of-book prices for one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarketRecord {
    yes_price: Decimal,
    no_price: Decimal,
}

/// A ParityDB-backed [`Persistence`] implementation.
///
/// Four columns: orders and trades carry a B-tree index so they can be
/// scanned, positions and markets are plain key/value lookups. A trade's key
/// is its market id, then the big-endian creation time in nanoseconds, then
/// the trade id, so a prefix scan under one market yields that market's
/// trades oldest first and the id breaks timestamp ties.
pub struct TradeStore {
    db: Db,
}

impl TradeStore {
    /// Open (or create) a ParityDB at `path`.
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let mut opts = Options::with_columns(path.as_ref(), 4);
        // B-tree indices for the order scan and the trade prefix scan
        opts.columns[COL_ORDERS as usize].btree_index = true;
        opts.columns[COL_TRADES as usize].btree_index = true;
        let db = Db::open_or_create(&opts)?;
        Ok(TradeStore { db })
    }

    #[inline]
    fn to_nanos(ts: SystemTime) -> u128 {
        ts.duration_since(UNIX_EPOCH).unwrap().as_nanos()
    }

    #[inline]
    fn trade_key(trade: &Trade) -> Vec<u8> {
        let mut key = Vec::with_capacity(48);
        key.extend_from_slice(trade.market_id.as_bytes());
        key.extend_from_slice(&Self::to_nanos(trade.timestamp).to_be_bytes());
        key.extend_from_slice(trade.id.as_bytes());
        key
    }

    #[inline]
    fn position_key(market_id: MarketId, user_id: UserId, side: Side) -> Vec<u8> {
        let mut key = Vec::with_capacity(33);
        key.extend_from_slice(market_id.as_bytes());
        key.extend_from_slice(user_id.as_bytes());
        key.push(match side {
            Side::Yes => 0,
            Side::No => 1,
        });
        key
    }

    #[inline]
    fn encode_cursor(c: &Cursor) -> String {
        B64.encode(serde_json::to_vec(c).unwrap())
    }

    #[inline]
    fn decode_cursor(s: &str) -> PersistenceResult<Cursor> {
        B64.decode(s)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Cursor>(&bytes).ok())
            .filter(|c| c.v == 1)
            .ok_or(PersistenceError::BadCursor)
    }

    #[inline]
    fn key_from_cursor(market_id: MarketId, c: &Cursor) -> Vec<u8> {
        let mut key = Vec::with_capacity(48);
        key.extend_from_slice(market_id.as_bytes());
        key.extend_from_slice(&c.ts_nanos.to_be_bytes());
        key.extend_from_slice(c.trade_id.as_bytes());
        key
    }

    fn put<T: Serialize>(&self, col: ColId, key: Vec<u8>, value: &T) -> PersistenceResult<()> {
        let bytes = bincode::serde::encode_to_vec(value, config::standard())?;
        self.db.commit(vec![(col, key, Some(bytes))])?;
        Ok(())
    }

    fn read_order(&self, order_id: OrderId) -> PersistenceResult<Order> {
        let raw = self
            .db
            .get(COL_ORDERS, order_id.as_bytes())?
            .ok_or(PersistenceError::UnknownOrder(order_id))?;
        let (order, _) = bincode::serde::decode_from_slice(&raw, config::standard())?;
        Ok(order)
    }

    /// Registers a market at the midpoint prices. The engine rejects
    /// submissions against markets this store has never seen.
    pub fn create_market(&self, market_id: MarketId) -> PersistenceResult<()> {
        let record = MarketRecord {
            yes_price: MIDPOINT,
            no_price: MIDPOINT,
        };
        self.put(COL_MARKETS, market_id.as_bytes().to_vec(), &record)
    }

    /// Published top-of-book prices, if the market is known.
    pub fn last_prices(&self, market_id: MarketId) -> PersistenceResult<Option<(Decimal, Decimal)>> {
        match self.db.get(COL_MARKETS, market_id.as_bytes())? {
            None => Ok(None),
            Some(raw) => {
                let (record, _): (MarketRecord, usize) =
                    bincode::serde::decode_from_slice(&raw, config::standard())?;
                Ok(Some((record.yes_price, record.no_price)))
            }
        }
    }

    /// The `(market, user, side)` position, if any fill ever touched it.
    pub fn position(
        &self,
        market_id: MarketId,
        user_id: UserId,
        side: Side,
    ) -> PersistenceResult<Option<Position>> {
        match self
            .db
            .get(COL_POSITIONS, &Self::position_key(market_id, user_id, side))?
        {
            None => Ok(None),
            Some(raw) => {
                let (position, _) = bincode::serde::decode_from_slice(&raw, config::standard())?;
                Ok(Some(position))
            }
        }
    }

    /// Ascending, cursor-paged view of one market's trade history.
    ///
    /// The page begins just past the trade named by `after` (or at the
    /// market's oldest trade when `after` is `None`) and holds at most
    /// `limit` items. A cursor for the last returned trade comes back
    /// whenever the scan saw something beyond the page, so callers keep
    /// paging until it is `None`.
    pub fn page_trades_asc(
        &self,
        market_id: MarketId,
        after: Option<&str>,
        limit: usize,
    ) -> PersistenceResult<(Vec<Trade>, Option<String>)> {
        let prefix = market_id.as_bytes().to_vec();
        let mut it: BTreeIterator<'_> = self.db.iter(COL_TRADES)?;

        match after.map(Self::decode_cursor).transpose()? {
            Some(cursor) => {
                // A cursor is only honored if it names a trade this market
                // actually persisted
                let anchor = Self::key_from_cursor(market_id, &cursor);
                it.seek(&anchor)?;
                let positioned = it.next()?;
                if positioned.map_or(true, |(key, _)| key != anchor) {
                    return Err(PersistenceError::BadCursor);
                }
            }
            None => it.seek(&prefix)?,
        }

        let mut page = Vec::with_capacity(limit.min(256));
        let mut more = false;
        while let Some((key, raw)) = it.next()? {
            if !key.starts_with(&prefix) {
                break;
            }
            if page.len() == limit {
                // One in-prefix key past the page is enough; no need to
                // decode it
                more = true;
                break;
            }
            let (trade, _): (Trade, usize) =
                bincode::serde::decode_from_slice(&raw, config::standard())?;
            page.push(trade);
        }

        let next = match (more, page.last()) {
            (true, Some(last)) => Some(Self::encode_cursor(&Cursor {
                v: 1,
                ts_nanos: Self::to_nanos(last.timestamp),
                trade_id: last.id,
            })),
            _ => None,
        };
        Ok((page, next))
    }
}

impl Persistence for TradeStore {
    async fn create_order(&self, order: &Order) -> PersistenceResult<()> {
        self.put(COL_ORDERS, order.id.as_bytes().to_vec(), order)
    }

    async fn create_trade(&self, trade: &Trade) -> PersistenceResult<Trade> {
        self.put(COL_TRADES, Self::trade_key(trade), trade)?;
        Ok(trade.clone())
    }

    async fn set_order_filled(&self, order_id: OrderId, filled: Decimal) -> PersistenceResult<()> {
        let mut order = self.read_order(order_id)?;
        order.filled = filled;
        self.put(COL_ORDERS, order_id.as_bytes().to_vec(), &order)
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> PersistenceResult<Order> {
        let mut order = self.read_order(order_id)?;
        debug_assert!(order.status == status || order.status.can_transition_to(status));
        order.status = status;
        self.put(COL_ORDERS, order_id.as_bytes().to_vec(), &order)?;
        Ok(order)
    }

    async fn upsert_position(
        &self,
        market_id: MarketId,
        user_id: UserId,
        side: Side,
        delta_shares: Decimal,
        price: Decimal,
    ) -> PersistenceResult<()> {
        let mut position = self
            .position(market_id, user_id, side)?
            .unwrap_or_else(|| Position::new(market_id, user_id, side));
        position.apply_fill(delta_shares, price);
        self.put(
            COL_POSITIONS,
            Self::position_key(market_id, user_id, side),
            &position,
        )
    }

    async fn set_last_prices(
        &self,
        market_id: MarketId,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> PersistenceResult<()> {
        if self.db.get(COL_MARKETS, market_id.as_bytes())?.is_none() {
            return Err(PersistenceError::UnknownMarket(market_id));
        }
        let record = MarketRecord {
            yes_price,
            no_price,
        };
        self.put(COL_MARKETS, market_id.as_bytes().to_vec(), &record)
    }

    async fn active_orders(&self, market_id: MarketId) -> PersistenceResult<Vec<Order>> {
        let mut it = self.db.iter(COL_ORDERS)?;
        it.seek_to_first()?;

        let mut orders = Vec::new();
        while let Some((_key, raw)) = it.next()? {
            let (order, _): (Order, usize) =
                bincode::serde::decode_from_slice(&raw, config::standard())?;
            if order.market_id == market_id
                && !order.status.is_terminal()
                && order.remaining() > Decimal::ZERO
            {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn market_exists(&self, market_id: MarketId) -> PersistenceResult<bool> {
        Ok(self.db.get(COL_MARKETS, market_id.as_bytes())?.is_some())
    }
}
