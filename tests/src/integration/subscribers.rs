//! # Subscriber Flows
//!
//! Subscribers follow the pool through the update log. Signals only say
//! "something new"; the log says what.
//!
//! ## Flows Tested:
//!
//! 1. **Replay**: folding every logged diff onto empty maps rebuilds the pool view
//! 2. **Overflow**: a subscriber that misses signals still sees every entry
//! 3. **Lifecycle**: unsubscribe and dropped handles

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use qc_06_transaction_pool::test_utils::{signed_transfer, value_output, MockLedger, TestKey};
    use qc_06_transaction_pool::{
        NoOpGateway, PoolConfig, TransactionPool, TransactionPoolApi, TransactionPoolBuilder,
        UpdateEntry,
    };
    use shared_types::{DiffDirection, ValueOutput, ValueOutputId};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn setup(values: &[u64]) -> (TestKey, Arc<MockLedger>, Arc<TransactionPool<NoOpGateway>>, Vec<ValueOutputId>) {
        let key = TestKey::new(11);
        let ledger = Arc::new(MockLedger::new());
        let genesis = ledger.genesis(
            values.iter().map(|v| value_output(*v, key.unlock_hash())).collect(),
            vec![],
        );
        let pool = TransactionPoolBuilder::new()
            .with_config(PoolConfig::for_testing())
            .with_consensus(ledger.clone())
            .with_gateway(Arc::new(NoOpGateway))
            .build()
            .expect("pool builds");
        let outputs = (0..values.len())
            .map(|i| genesis.transactions[0].value_output_id(i))
            .collect();
        (key, ledger, pool, outputs)
    }

    fn fold(view: &mut HashMap<ValueOutputId, ValueOutput>, entry: &UpdateEntry) {
        for d in &entry.diffs.value_outputs {
            match d.direction {
                DiffDirection::Apply => {
                    view.insert(d.id, d.output.clone());
                }
                DiffDirection::Revert => {
                    view.remove(&d.id);
                }
            }
        }
    }

    // =============================================================================
    // REPLAY
    // =============================================================================

    #[test]
    fn test_replay_from_zero_rebuilds_view() {
        let (key, ledger, pool, outputs) = setup(&[10, 20, 30]);
        let a = signed_transfer(&key, &[outputs[0]], &[10], 0, key.unlock_hash());
        let b = signed_transfer(&key, &[a.value_output_id(0)], &[10], 0, key.unlock_hash());
        let c = signed_transfer(&key, &[outputs[1]], &[20], 0, key.unlock_hash());
        for tx in [&a, &b, &c] {
            pool.accept_transaction(tx.clone()).unwrap();
        }
        ledger.mine_and_notify(vec![a.clone()]);
        let reverted = ledger.revert_tip().unwrap();
        ledger.notify(&[reverted], &[]);

        let mut view = HashMap::new();
        for entry in pool.read_updates(0) {
            fold(&mut view, &entry);
        }

        for id in view.keys() {
            assert!(pool.value_output(id).unwrap().is_some());
        }
        assert_eq!(view.len(), pool.status().unwrap().value_outputs);

        let last = pool.read_updates(0).pop().unwrap();
        assert_eq!(last.unconfirmed_transactions, pool.transaction_set().unwrap());
        assert_eq!(last.reverted_blocks.len(), 1);
    }

    // =============================================================================
    // OVERFLOW
    // =============================================================================

    #[tokio::test]
    async fn test_overflowed_subscriber_catches_up() {
        let (key, ledger, pool, outputs) = setup(&[1, 2, 3, 4, 5]);
        let mut handle = pool.subscribe();
        let mut cursor = pool.status().unwrap().log_entries as u64;

        for (id, value) in outputs.iter().zip(1..=5u64) {
            let tx = signed_transfer(&key, &[*id], &[value], 0, [7; 32]);
            pool.accept_transaction(tx).unwrap();
        }

        // Capacity is one: a single signal is queued, the rest were skipped.
        let signal = timeout(Duration::from_secs(1), handle.recv())
            .await
            .expect("signal queued")
            .expect("channel open");
        assert_eq!(signal, cursor + 1);
        assert_eq!(handle.try_recv(), None);

        let entries = pool.read_updates(cursor);
        assert_eq!(entries.len(), 5);
        for (offset, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence, cursor + offset as u64);
        }
        cursor += entries.len() as u64;
        assert!(pool.read_updates(cursor).is_empty());
    }

    #[tokio::test]
    async fn test_follower_task_sees_every_entry() {
        let (key, ledger, pool, outputs) = setup(&[10, 20, 30]);
        let mut handle = pool.subscribe();
        let start = pool.status().unwrap().log_entries as u64;
        let target = start + 3;

        let follower_pool = pool.clone();
        let follower = tokio::spawn(async move {
            let mut cursor = start;
            let mut seen = Vec::new();
            while cursor < target {
                if handle.recv().await.is_none() {
                    break;
                }
                for entry in follower_pool.read_updates(cursor) {
                    cursor = entry.sequence + 1;
                    seen.push(entry.sequence);
                }
            }
            seen
        });

        for (id, value) in outputs.iter().zip([10u64, 20, 30]) {
            let tx = signed_transfer(&key, &[*id], &[value], 0, [3; 32]);
            pool.accept_transaction(tx).unwrap();
        }

        let seen = timeout(Duration::from_secs(5), follower)
            .await
            .expect("follower finishes")
            .expect("follower task");
        assert_eq!(seen, vec![start, start + 1, start + 2]);
    }

    // =============================================================================
    // LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_unsubscribe_and_drop() {
        let (key, ledger, pool, outputs) = setup(&[10]);
        let mut kept = pool.subscribe();
        let dropped = pool.subscribe();
        assert_eq!(pool.status().unwrap().subscribers, 2);

        drop(dropped);
        let tx = signed_transfer(&key, &[outputs[0]], &[10], 0, [1; 32]);
        pool.accept_transaction(tx).unwrap();
        assert_eq!(pool.status().unwrap().subscribers, 1);
        assert!(kept.recv().await.is_some());

        assert!(pool.unsubscribe(&kept.id()));
        assert!(!pool.unsubscribe(&kept.id()));
        assert_eq!(kept.recv().await, None);
    }
}
