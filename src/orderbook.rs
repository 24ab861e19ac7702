use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque, btree_map};
use tracing::debug;

use crate::decimal::MIDPOINT;
use crate::orders::{MarketId, Order, OrderId, OrderStatus, Side};

/// An [`OrderBook`] stores the **active** orders of one binary market in two
/// separate [`BTreeMap`]s, one per outcome:
/// - `yes` (resting YES-buy orders)
/// - `no` (resting NO-buy orders)
///
/// Each price level (key) has a FIFO queue of orders stored in a [`VecDeque`]
/// to maintain **price-time** priority. Both sides are buy books; the top of
/// either side is its highest price. Matching consumes the *opposite* side
/// from its crossing end: the NO book from the lowest price up (for a YES
/// aggressor) and the YES book from the highest price down (for a NO
/// aggressor), so the crossing test fails monotonically in both directions.
pub struct OrderBook {
    yes: BTreeMap<Decimal, VecDeque<Order>>,
    no: BTreeMap<Decimal, VecDeque<Order>>,
    /// Set once the book has been warm-loaded from persistence.
    pub(crate) loaded: bool,
}

/// Internal enum to unify forward and reverse BTreeMap iteration.
///
/// - [`LevelIter::Fwd`] walks price levels ascending (NO side crossing order).
/// - [`LevelIter::Rev`] walks price levels descending (YES side crossing
///   order, and presentation order for both sides).
enum LevelIter<'a> {
    Fwd(btree_map::Iter<'a, Decimal, VecDeque<Order>>),
    Rev(std::iter::Rev<btree_map::Iter<'a, Decimal, VecDeque<Order>>>),
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = (&'a Decimal, &'a VecDeque<Order>);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            LevelIter::Fwd(iter) => iter.next(),
            LevelIter::Rev(iter) => iter.next(),
        }
    }
}

fn level_remaining(queue: &VecDeque<Order>) -> Decimal {
    queue.iter().map(Order::remaining).sum()
}

impl OrderBook {
    /// Creates a new, empty book with no resting orders on either side.
    pub fn new() -> Self {
        Self {
            yes: BTreeMap::new(),
            no: BTreeMap::new(),
            loaded: false,
        }
    }

    fn side(&self, side: Side) -> &BTreeMap<Decimal, VecDeque<Order>> {
        match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, VecDeque<Order>> {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }

    /// Inserts a resting order at its limit price, appended to the level's
    /// FIFO queue. A partially filled order contributes its remainder to the
    /// level aggregate. Terminal orders never enter a book.
    pub fn insert(&mut self, order: Order) {
        debug_assert!(!order.status.is_terminal());
        debug!(order_id = %order.id, side = ?order.side, price = %order.price, "resting order");
        self.side_mut(order.side)
            .entry(order.price)
            .or_default()
            .push_back(order);
    }

    /// The top of book for one side: its highest price level. `None` if the
    /// side is empty.
    pub fn peek_best(&self, side: Side) -> Option<(Decimal, &VecDeque<Order>)> {
        self.side(side)
            .iter()
            .next_back()
            .map(|(price, queue)| (*price, queue))
    }

    pub fn best_price(&self, side: Side) -> Option<Decimal> {
        self.peek_best(side).map(|(price, _)| price)
    }

    /// Oldest resting order at the top-of-book level, or `None`.
    pub fn best_queue_front(&self, side: Side) -> Option<&Order> {
        self.peek_best(side).and_then(|(_, queue)| queue.front())
    }

    /// The prices a side publishes: its best price, or the midpoint when the
    /// side is empty.
    pub fn published_prices(&self) -> (Decimal, Decimal) {
        (
            self.best_price(Side::Yes).unwrap_or(MIDPOINT),
            self.best_price(Side::No).unwrap_or(MIDPOINT),
        )
    }

    /// Walks one side's levels in the order a matching aggressor consumes
    /// them: ascending for the NO side, descending for the YES side.
    pub(crate) fn crossing_levels(&self, side: Side) -> impl Iterator<Item = (&Decimal, &VecDeque<Order>)> {
        match side {
            Side::No => LevelIter::Fwd(self.no.iter()),
            Side::Yes => LevelIter::Rev(self.yes.iter().rev()),
        }
    }

    /// The next level a matching aggressor would consume on `side`, with the
    /// oldest order queued there.
    pub(crate) fn peek_crossing(&self, side: Side) -> Option<(Decimal, &Order)> {
        let entry = match side {
            Side::No => self.no.iter().next(),
            Side::Yes => self.yes.iter().next_back(),
        };
        entry.and_then(|(price, queue)| queue.front().map(|order| (*price, order)))
    }

    /// Fills the front order of the crossing level on `side` by `amount`.
    ///
    /// The order's cumulative `filled` grows by `amount`; when the remainder
    /// reaches zero the order is marked `Filled` and popped, and an emptied
    /// level is pruned. Otherwise the order is marked `Partial` and stays at
    /// the front of its queue.
    ///
    /// Returns a snapshot of the updated order. Callers must not pass an
    /// `amount` exceeding the front order's remainder.
    pub(crate) fn decrement_front(&mut self, side: Side, amount: Decimal) -> Option<Order> {
        let book_side = self.side_mut(side);
        let price = match side {
            Side::No => *book_side.keys().next()?,
            Side::Yes => *book_side.keys().next_back()?,
        };
        let queue = book_side.get_mut(&price)?;
        let front = queue.front_mut()?;
        debug_assert!(amount <= front.remaining());

        front.filled += amount;
        front.status = if front.remaining().is_zero() {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
        let updated = front.clone();

        if updated.status == OrderStatus::Filled {
            queue.pop_front();
            if queue.is_empty() {
                book_side.remove(&price);
            }
        }
        Some(updated)
    }

    /// Removes an order by id from whichever side holds it, pruning its
    /// level if emptied. Linear in the queue length at the order's level.
    pub fn cancel(&mut self, order_id: OrderId) -> Option<Order> {
        for book_side in [&mut self.yes, &mut self.no] {
            let mut price_to_prune: Option<Decimal> = None;
            let mut removed: Option<Order> = None;
            for (price, queue) in book_side.iter_mut() {
                if let Some(pos) = queue.iter().position(|o| o.id == order_id) {
                    removed = queue.remove(pos);
                    if queue.is_empty() {
                        price_to_prune = Some(*price);
                    }
                    break;
                }
            }
            if let Some(order) = removed {
                if let Some(price) = price_to_prune {
                    book_side.remove(&price);
                }
                return Some(order);
            }
        }
        None
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        [&self.yes, &self.no].into_iter().any(|side| {
            side.values()
                .any(|queue| queue.iter().any(|o| o.id == order_id))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.yes.is_empty() && self.no.is_empty()
    }

    /// Read-only view of both sides, best (highest) price first, with the
    /// aggregate remaining size and the queued order ids per level.
    pub fn snapshot(&self, market_id: MarketId) -> BookSnapshot {
        let levels = |side: &BTreeMap<Decimal, VecDeque<Order>>| {
            side.iter()
                .rev()
                .map(|(price, queue)| LevelSnapshot {
                    price: *price,
                    size: level_remaining(queue),
                    orders: queue.iter().map(|o| o.id).collect(),
                })
                .collect()
        };
        BookSnapshot {
            market_id,
            yes: levels(&self.yes),
            no: levels(&self.no),
        }
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

/// One price level as presented to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: Decimal,
    pub size: Decimal,
    pub orders: Vec<OrderId>,
}

/// Both sides of a market's book, best price first on each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub market_id: MarketId,
    pub yes: Vec<LevelSnapshot>,
    pub no: Vec<LevelSnapshot>,
}
