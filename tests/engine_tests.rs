use binary_market_engine::engine::{Engine, EngineError, OrderRequest};
use binary_market_engine::matcher::FOK_REJECT_REASON;
use binary_market_engine::memory::MemoryStore;
use binary_market_engine::orders::{MarketId, OrderStatus, OrderType, Side, UserId};
use binary_market_engine::store::TradeStore;
use rust_decimal_macros::dec;
use tempfile::tempdir;
use uuid::Uuid;

fn request(
    market_id: MarketId,
    user_id: UserId,
    side: Side,
    order_type: OrderType,
    price: Option<&str>,
    size: &str,
) -> OrderRequest {
    OrderRequest {
        market_id,
        user_id,
        side,
        order_type,
        price: price.map(String::from),
        size: size.to_string(),
    }
}

fn memory_engine() -> (Engine<MemoryStore>, MarketId) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = MemoryStore::new();
    let market = Uuid::new_v4();
    store.create_market(market);
    (Engine::new(store), market)
}

#[tokio::test]
async fn test_submit_to_unknown_market_is_rejected() {
    let engine = Engine::new(MemoryStore::new());
    let market = Uuid::new_v4();

    let res = engine
        .submit(request(
            market,
            Uuid::new_v4(),
            Side::Yes,
            OrderType::Limit,
            Some("0.5"),
            "10",
        ))
        .await;
    assert!(matches!(res, Err(EngineError::MarketUnknown(m)) if m == market));

    let res = engine.snapshot(market).await;
    assert!(matches!(res, Err(EngineError::MarketUnknown(_))));
}

#[tokio::test]
async fn test_invalid_order_is_rejected_before_matching() {
    let (engine, market) = memory_engine();

    let res = engine
        .submit(request(
            market,
            Uuid::new_v4(),
            Side::Yes,
            OrderType::Limit,
            Some("1.5"),
            "10",
        ))
        .await;
    assert!(matches!(res, Err(EngineError::InvalidOrder(_))));

    let snap = engine.snapshot(market).await.unwrap();
    assert!(snap.yes.is_empty() && snap.no.is_empty());
}

#[tokio::test]
async fn test_crossing_submission_end_to_end() {
    let (engine, market) = memory_engine();
    let maker = Uuid::new_v4();
    let taker = Uuid::new_v4();

    let rest = engine
        .submit(request(
            market,
            maker,
            Side::No,
            OrderType::Limit,
            Some("0.40"),
            "100",
        ))
        .await
        .unwrap();
    assert_eq!(rest.order.status, OrderStatus::Pending);
    assert!(rest.trades.is_empty());

    let cross = engine
        .submit(request(
            market,
            taker,
            Side::Yes,
            OrderType::Limit,
            Some("0.60"),
            "50",
        ))
        .await
        .unwrap();

    assert_eq!(cross.order.status, OrderStatus::Filled);
    assert!(!cross.rejected);
    assert_eq!(cross.trades.len(), 1);
    assert_eq!(cross.trades[0].price, dec!(0.40));
    assert_eq!(cross.trades[0].size, dec!(50));
    assert_eq!(cross.trades[0].side, Side::Yes);
    assert_eq!(cross.trades[0].buyer_id, taker);
    assert_eq!(cross.trades[0].seller_id, maker);

    let snap = engine.snapshot(market).await.unwrap();
    assert!(snap.yes.is_empty());
    assert_eq!(snap.no.len(), 1);
    assert_eq!(snap.no[0].price, dec!(0.40));
    assert_eq!(snap.no[0].size, dec!(50));
    assert_eq!(snap.no[0].orders, vec![rest.order.id]);

    let store = engine.store();
    assert_eq!(store.last_prices(market), Some((dec!(0.5), dec!(0.40))));
    assert_eq!(
        store.position(market, taker, Side::Yes).unwrap().shares,
        dec!(50)
    );
    assert_eq!(
        store.position(market, maker, Side::No).unwrap().shares,
        dec!(-50)
    );
    assert_eq!(store.order(rest.order.id).unwrap().filled, dec!(50));
}

#[tokio::test]
async fn test_fok_rejection_leaves_book_untouched() {
    let (engine, market) = memory_engine();

    engine
        .submit(request(
            market,
            Uuid::new_v4(),
            Side::No,
            OrderType::Limit,
            Some("0.50"),
            "30",
        ))
        .await
        .unwrap();
    let before = engine.snapshot(market).await.unwrap();

    let fok = engine
        .submit(request(
            market,
            Uuid::new_v4(),
            Side::Yes,
            OrderType::Fok,
            Some("0.60"),
            "100",
        ))
        .await
        .unwrap();

    assert!(fok.rejected);
    assert_eq!(fok.reject_reason.as_deref(), Some(FOK_REJECT_REASON));
    assert!(fok.trades.is_empty());
    assert_eq!(fok.order.status, OrderStatus::Cancelled);
    assert_eq!(
        engine.store().order(fok.order.id).unwrap().status,
        OrderStatus::Cancelled
    );
    assert_eq!(engine.snapshot(market).await.unwrap(), before);
}

#[tokio::test]
async fn test_cancel_removes_resting_order() {
    let (engine, market) = memory_engine();

    let rest = engine
        .submit(request(
            market,
            Uuid::new_v4(),
            Side::Yes,
            OrderType::Limit,
            Some("0.35"),
            "20",
        ))
        .await
        .unwrap();
    assert_eq!(
        engine.store().last_prices(market),
        Some((dec!(0.35), dec!(0.5)))
    );

    let cancelled = engine
        .cancel(rest.order.id, market, Side::Yes)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let snap = engine.snapshot(market).await.unwrap();
    assert!(snap.yes.is_empty());
    // Cancelling the only YES order rolls the published price back to the
    // midpoint
    assert_eq!(
        engine.store().last_prices(market),
        Some((dec!(0.5), dec!(0.5)))
    );

    let res = engine.cancel(rest.order.id, market, Side::Yes).await;
    assert!(matches!(res, Err(EngineError::OrderNotFound(_))));
}

#[tokio::test]
async fn test_warm_load_reproduces_snapshot() {
    let (engine, market) = memory_engine();

    // Two YES levels plus a FIFO pair on one NO level
    for (side, price, size) in [
        (Side::Yes, "0.30", "10"),
        (Side::Yes, "0.35", "5"),
        (Side::No, "0.60", "7"),
        (Side::No, "0.60", "3"),
    ] {
        engine
            .submit(request(
                market,
                Uuid::new_v4(),
                side,
                OrderType::Limit,
                Some(price),
                size,
            ))
            .await
            .unwrap();
    }
    let before = engine.snapshot(market).await.unwrap();

    let rebuilt = Engine::new(engine.into_store());
    let after = rebuilt.snapshot(market).await.unwrap();

    assert_eq!(after, before);
}

#[tokio::test]
async fn test_explicit_reload_discards_stale_book() {
    let (engine, market) = memory_engine();

    let rest = engine
        .submit(request(
            market,
            Uuid::new_v4(),
            Side::No,
            OrderType::Limit,
            Some("0.45"),
            "15",
        ))
        .await
        .unwrap();

    engine.load(market).await.unwrap();
    let snap = engine.snapshot(market).await.unwrap();
    assert_eq!(snap.no.len(), 1);
    assert_eq!(snap.no[0].orders, vec![rest.order.id]);
}

#[tokio::test]
async fn test_markets_are_independent() {
    let store = MemoryStore::new();
    let market_a = Uuid::new_v4();
    let market_b = Uuid::new_v4();
    store.create_market(market_a);
    store.create_market(market_b);
    let engine = Engine::new(store);

    engine
        .submit(request(
            market_a,
            Uuid::new_v4(),
            Side::No,
            OrderType::Limit,
            Some("0.40"),
            "10",
        ))
        .await
        .unwrap();

    // A crossing YES order on market B finds no liquidity there
    let other = engine
        .submit(request(
            market_b,
            Uuid::new_v4(),
            Side::Yes,
            OrderType::Limit,
            Some("0.60"),
            "10",
        ))
        .await
        .unwrap();
    assert!(other.trades.is_empty());
    assert_eq!(other.order.status, OrderStatus::Pending);

    assert_eq!(engine.snapshot(market_a).await.unwrap().no.len(), 1);
    assert_eq!(engine.snapshot(market_b).await.unwrap().yes.len(), 1);
}

#[tokio::test]
async fn test_parity_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let market = Uuid::new_v4();
    let maker = Uuid::new_v4();
    let taker = Uuid::new_v4();

    let before = {
        let store = TradeStore::open(dir.path()).unwrap();
        store.create_market(market).unwrap();
        let engine = Engine::new(store);

        engine
            .submit(request(
                market,
                maker,
                Side::No,
                OrderType::Limit,
                Some("0.40"),
                "100",
            ))
            .await
            .unwrap();
        engine
            .submit(request(
                market,
                taker,
                Side::Yes,
                OrderType::Limit,
                Some("0.60"),
                "50",
            ))
            .await
            .unwrap();

        engine.snapshot(market).await.unwrap()
    };

    // Reopen the database from disk and rebuild the book from active orders
    let store = TradeStore::open(dir.path()).unwrap();
    assert_eq!(
        store.last_prices(market).unwrap(),
        Some((dec!(0.5), dec!(0.40)))
    );
    let (trades, next) = store.page_trades_asc(market, None, 10).unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, dec!(0.40));
    assert_eq!(trades[0].size, dec!(50));
    assert!(next.is_none());
    assert_eq!(
        store.position(market, maker, Side::No).unwrap().unwrap().shares,
        dec!(-50)
    );

    let engine = Engine::new(store);
    let after = engine.snapshot(market).await.unwrap();
    assert_eq!(after, before);
}
