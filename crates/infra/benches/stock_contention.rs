use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use stockledger_core::{ProductId, WarehouseId};
use stockledger_infra::{InMemoryCatalog, InMemoryLedgerStore, StockIndex, TransactionProcessor};
use stockledger_inventory::{DeductionLine, EntryLimits, InboundLine, InboundRequest, OutboundRequest};

const THREADS: usize = 4;
const OPS_PER_THREAD: usize = 250;

type Processor = TransactionProcessor<Arc<InMemoryLedgerStore>, Arc<InMemoryCatalog>>;

/// A processor whose warehouse holds plenty of stock of `products` products.
fn stocked(products: usize) -> (Processor, WarehouseId, Vec<ProductId>) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let warehouse = WarehouseId::new();
    catalog.register_warehouse(warehouse).unwrap();
    let ids: Vec<ProductId> = (0..products).map(|_| ProductId::new()).collect();
    for id in &ids {
        catalog.register_product(*id).unwrap();
    }

    let processor = TransactionProcessor::new(
        Arc::new(StockIndex::new()),
        Arc::new(InMemoryLedgerStore::new()),
        catalog,
        EntryLimits::default(),
    );
    processor
        .create_inbound(&InboundRequest {
            warehouse_id: warehouse,
            timestamp: Utc::now(),
            lines: ids
                .iter()
                .map(|id| InboundLine {
                    product_id: *id,
                    quantity: 1_000_000,
                    buying_price: Decimal::new(1999, 2),
                })
                .collect(),
        })
        .unwrap();
    (processor, warehouse, ids)
}

fn run_outbounds(processor: &Processor, warehouse: WarehouseId, products: &[ProductId], shared: bool) {
    std::thread::scope(|s| {
        for t in 0..THREADS {
            let product = if shared { products[0] } else { products[t] };
            s.spawn(move || {
                for _ in 0..OPS_PER_THREAD {
                    processor
                        .create_outbound(&OutboundRequest {
                            warehouse_id: warehouse,
                            timestamp: Utc::now(),
                            lines: vec![DeductionLine {
                                product_id: product,
                                quantity: 1,
                            }],
                        })
                        .unwrap();
                }
            });
        }
    });
}

fn bench_outbound_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("outbound_contention");
    group.throughput(Throughput::Elements((THREADS * OPS_PER_THREAD) as u64));
    group.sample_size(20);

    for (label, shared) in [("one_key", true), ("disjoint_keys", false)] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &shared, |b, &shared| {
            b.iter_with_setup(
                || stocked(THREADS),
                |(processor, warehouse, products)| run_outbounds(&processor, warehouse, &products, shared),
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_outbound_contention);
criterion_main!(benches);
