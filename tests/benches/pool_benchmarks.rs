//! # Transaction Pool Benchmarks
//!
//! | Operation | Measured |
//! |-----------|----------|
//! | accept    | validate + commit + log append for one signed spend |
//! | resync    | undo, rebase and re-add of the whole pending set    |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qc_06_transaction_pool::test_utils::{signed_transfer, value_output, MockLedger, TestKey};
use qc_06_transaction_pool::{
    NoOpGateway, PoolConfig, TransactionPool, TransactionPoolApi, TransactionPoolBuilder,
};
use shared_types::{Transaction, ValueOutputId};
use std::sync::Arc;
use std::time::Duration;

fn setup(count: usize) -> (Arc<TransactionPool<NoOpGateway>>, Vec<Transaction>) {
    let key = TestKey::new(1);
    let ledger = Arc::new(MockLedger::new());
    let genesis = ledger.genesis(
        (0..count).map(|_| value_output(100, key.unlock_hash())).collect(),
        vec![],
    );
    let pool = TransactionPoolBuilder::new()
        .with_config(PoolConfig::default())
        .with_consensus(ledger)
        .with_gateway(Arc::new(NoOpGateway))
        .build()
        .expect("pool builds");
    let transfers = (0..count)
        .map(|i| {
            let parent: ValueOutputId = genesis.transactions[0].value_output_id(i);
            signed_transfer(&key, &[parent], &[60, 40], 0, key.unlock_hash())
        })
        .collect();
    (pool, transfers)
}

fn bench_accept(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-06-transaction-pool/accept");
    group.measurement_time(Duration::from_secs(10));

    for size in [10usize, 100, 500] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("accept_batch", size), &size, |b, &size| {
            b.iter_batched(
                || setup(size),
                |(pool, transfers)| {
                    for tx in transfers {
                        black_box(pool.accept_transaction(tx).is_ok());
                    }
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_noop_resync(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-06-transaction-pool/resync");

    for size in [10usize, 100, 500] {
        // Every resync appends a log entry, so each iteration gets a fresh pool.
        group.bench_with_input(BenchmarkId::new("noop_resync", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let (pool, transfers) = setup(size);
                    for tx in transfers {
                        pool.accept_transaction(tx).expect("accepted");
                    }
                    pool
                },
                |pool| black_box(pool.resync(&[], &[]).map(|o| o.readded)),
                criterion::BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_accept, bench_noop_resync);
criterion_main!(benches);
