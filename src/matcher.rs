use rust_decimal::Decimal;
use std::time::SystemTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::orderbook::OrderBook;
use crate::orders::{Order, OrderStatus, OrderType, Side};
use crate::persistence::{Persistence, PersistenceResult};
use crate::trade::Trade;

/// Reject reason reported when a fill-or-kill order cannot be fully matched.
pub const FOK_REJECT_REASON: &str = "FOK order cannot be completely filled";

/// What one submission produced: the trades in execution order, plus the
/// rejection flag for fill-or-kill insufficiency (a result, not an error).
#[derive(Debug)]
pub struct MatchOutcome {
    pub trades: Vec<Trade>,
    pub rejected: bool,
    pub reject_reason: Option<String>,
}

/// The cross-side crossing test. An incoming YES order crosses a resting NO
/// at `resting` iff its limit is at or above it; an incoming NO crosses a
/// resting YES iff its limit is at or below it. Direct price comparison is
/// the published behavior of this engine (not the complement-price test);
/// both walks consume the opposite book from the end where this test fails
/// monotonically.
fn crosses(incoming_side: Side, limit: Decimal, resting: Decimal) -> bool {
    match incoming_side {
        Side::Yes => limit >= resting,
        Side::No => limit <= resting,
    }
}

/// Maximum quantity an order could fill right now: walks the opposite book
/// in crossing order, summing remainders while the crossing test holds,
/// stopping early once the order's own size is covered.
fn fillable(book: &OrderBook, incoming: &Order) -> Decimal {
    let mut available = Decimal::ZERO;
    for (price, queue) in book.crossing_levels(incoming.side.opposite()) {
        if !crosses(incoming.side, incoming.price, *price) {
            break;
        }
        for order in queue {
            available += order.remaining();
            if available >= incoming.remaining() {
                return available;
            }
        }
    }
    available
}

/// Matches `incoming` against the opposite side of the book, producing a
/// series of [`Trade`]s.
///
/// Per trade: execution at the resting price, size `min(incoming remaining,
/// resting remaining)`, aggressor as buyer. Writes go out in a fixed order
/// (trade record, resting fill and status when it fills out, aggressor
/// cumulative fill, then both position updates) before the next resting
/// order is touched. `enforce_limit` is off for market orders, which match
/// any price top-down.
async fn fill_against_book<P: Persistence>(
    book: &mut OrderBook,
    incoming: &mut Order,
    enforce_limit: bool,
    store: &P,
) -> PersistenceResult<Vec<Trade>> {
    let mut trades = Vec::new();
    let opposite = incoming.side.opposite();

    loop {
        if incoming.remaining() <= Decimal::ZERO {
            break;
        }
        let Some((level_price, front)) = book.peek_crossing(opposite) else {
            break;
        };
        if enforce_limit && !crosses(incoming.side, incoming.price, level_price) {
            break;
        }
        let resting_id = front.id;
        let resting_user = front.user_id;
        let qty = incoming.remaining().min(front.remaining());

        let Some(resting) = book.decrement_front(opposite, qty) else {
            break;
        };
        incoming.filled += qty;

        // The store owns the canonical trade record; keep what it returns
        let trade = store
            .create_trade(&Trade {
                id: Uuid::new_v4(),
                market_id: incoming.market_id,
                buy_order_id: incoming.id,
                sell_order_id: resting_id,
                buyer_id: incoming.user_id,
                seller_id: resting_user,
                side: incoming.side,
                price: level_price,
                size: qty,
                timestamp: SystemTime::now(),
            })
            .await?;
        info!(
            trade_id = %trade.id,
            side = ?trade.side,
            price = %trade.price,
            size = %trade.size,
            "trade executed"
        );

        store.set_order_filled(resting_id, resting.filled).await?;
        if resting.status == OrderStatus::Filled {
            store
                .set_order_status(resting_id, OrderStatus::Filled)
                .await?;
        }
        store.set_order_filled(incoming.id, incoming.filled).await?;
        store
            .upsert_position(trade.market_id, trade.buyer_id, trade.side, qty, trade.price)
            .await?;
        store
            .upsert_position(
                trade.market_id,
                trade.seller_id,
                trade.side.opposite(),
                -qty,
                trade.price,
            )
            .await?;

        trades.push(trade);
    }

    Ok(trades)
}

fn resolved_status(incoming: &Order, trades: &[Trade], none_matched: OrderStatus) -> OrderStatus {
    if incoming.remaining().is_zero() {
        OrderStatus::Filled
    } else if !trades.is_empty() {
        OrderStatus::Partial
    } else {
        none_matched
    }
}

/// Runs one submission through its order-type policy, then persists the
/// aggressor's terminal status and republishes both top-of-book prices.
///
/// - **Limit**: match at or inside the limit; any remainder rests on the
///   aggressor's own side at its limit price.
/// - **Market**: match any price top-down; a remainder after book exhaustion
///   is discarded.
/// - **Ioc**: match at or inside the limit; a remainder is never booked, and
///   an untouched order is cancelled.
/// - **Fok**: pre-scan the opposite book; unless the full size is achievable
///   the order is rejected atomically with no trades and no book mutation.
///
/// Callers hold the market's lock for the duration of the call.
pub async fn execute<P: Persistence>(
    book: &mut OrderBook,
    incoming: &mut Order,
    store: &P,
) -> PersistenceResult<MatchOutcome> {
    info!(
        order_id = %incoming.id,
        side = ?incoming.side,
        order_type = ?incoming.order_type,
        price = %incoming.price,
        size = %incoming.size,
        "matching incoming order"
    );
    let mut rejected = false;
    let mut reject_reason = None;

    let trades = match incoming.order_type {
        OrderType::Limit => {
            let trades = fill_against_book(book, incoming, true, store).await?;
            incoming.status = resolved_status(incoming, &trades, OrderStatus::Pending);
            if incoming.remaining() > Decimal::ZERO {
                book.insert(incoming.clone());
            }
            trades
        }
        OrderType::Market => {
            let trades = fill_against_book(book, incoming, false, store).await?;
            incoming.status = resolved_status(incoming, &trades, OrderStatus::Pending);
            if incoming.remaining() > Decimal::ZERO {
                warn!(
                    order_id = %incoming.id,
                    remaining = %incoming.remaining(),
                    "market order remainder discarded"
                );
            }
            trades
        }
        OrderType::Ioc => {
            let trades = fill_against_book(book, incoming, true, store).await?;
            incoming.status = resolved_status(incoming, &trades, OrderStatus::Cancelled);
            trades
        }
        OrderType::Fok => {
            if fillable(book, incoming) < incoming.remaining() {
                warn!(order_id = %incoming.id, "fill-or-kill order cannot be completely filled");
                incoming.status = OrderStatus::Cancelled;
                rejected = true;
                reject_reason = Some(FOK_REJECT_REASON.to_string());
                Vec::new()
            } else {
                let trades = fill_against_book(book, incoming, true, store).await?;
                incoming.status = OrderStatus::Filled;
                trades
            }
        }
    };

    store.set_order_status(incoming.id, incoming.status).await?;
    let (yes_price, no_price) = book.published_prices();
    store
        .set_last_prices(incoming.market_id, yes_price, no_price)
        .await?;

    Ok(MatchOutcome {
        trades,
        rejected,
        reject_reason,
    })
}
