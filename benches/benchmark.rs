use binary_market_engine::engine::{Engine, OrderRequest};
use binary_market_engine::memory::MemoryStore;
use binary_market_engine::orders::{MarketId, OrderType, Side};
use criterion::{Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use uuid::Uuid;

fn seeded_engine(
    rt: &Runtime,
    market: MarketId,
    depth: u32,
    orders_per_level: u32,
) -> Engine<MemoryStore> {
    let store = MemoryStore::new();
    store.create_market(market);
    let engine = Engine::new(store);
    rt.block_on(async {
        // Populate NO levels from 0.0001 upward; nothing rests on YES, so
        // every seed order parks without matching
        for level in 1..=depth {
            let price = format!("0.{:04}", level);
            for _ in 0..orders_per_level {
                engine
                    .submit(OrderRequest {
                        market_id: market,
                        user_id: Uuid::new_v4(),
                        side: Side::No,
                        order_type: OrderType::Limit,
                        price: Some(price.clone()),
                        size: "50".to_string(),
                    })
                    .await
                    .unwrap();
            }
        }
    });
    engine
}

fn bench_submit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let market = Uuid::new_v4();
    let engine = seeded_engine(&rt, market, 100, 10);

    c.bench_function("match one market order", |b| {
        b.to_async(&rt).iter(|| async {
            engine
                .submit(OrderRequest {
                    market_id: market,
                    user_id: Uuid::new_v4(),
                    side: Side::Yes,
                    order_type: OrderType::Market,
                    price: None,
                    size: "5".to_string(),
                })
                .await
                .unwrap()
        })
    });

    c.bench_function("rest one non-crossing limit order", |b| {
        b.to_async(&rt).iter(|| async {
            engine
                .submit(OrderRequest {
                    market_id: market,
                    user_id: Uuid::new_v4(),
                    side: Side::Yes,
                    order_type: OrderType::Limit,
                    price: Some("0".to_string()),
                    size: "1".to_string(),
                })
                .await
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_submit);
criterion_main!(benches);
