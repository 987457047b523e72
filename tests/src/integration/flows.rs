//! # Transaction Pool Flows
//!
//! Drives the pool the way a node does: the wallet submits transactions,
//! the ledger mines and reverts blocks and notifies the pool.
//!
//! ## Flows Tested:
//!
//! 1. **Wallet → Pool**: accept, double-spend rejection, relay to the gateway
//! 2. **Ledger → Pool**: confirmation, shallow and deep reorganisations
//! 3. **Concurrency**: wallet submissions racing ledger notifications

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use qc_06_transaction_pool::test_utils::{signed_transfer, value_output, MockLedger, TestKey};
    use qc_06_transaction_pool::{
        PoolConfig, PoolError, RecordingGateway, TransactionPool, TransactionPoolApi,
        TransactionPoolBuilder,
    };
    use shared_types::{Transaction, ValueOutputId};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Node {
        key: TestKey,
        ledger: Arc<MockLedger>,
        gateway: Arc<RecordingGateway>,
        pool: Arc<TransactionPool<RecordingGateway>>,
        outputs: Vec<ValueOutputId>,
    }

    /// A ledger with one genesis output per value, all locked to one key,
    /// and a pool subscribed to it.
    fn node(values: &[u64], config: PoolConfig) -> Node {
        let key = TestKey::new(42);
        let ledger = Arc::new(MockLedger::new());
        let genesis = ledger.genesis(
            values.iter().map(|v| value_output(*v, key.unlock_hash())).collect(),
            vec![],
        );
        let gateway = Arc::new(RecordingGateway::new());
        let pool = TransactionPoolBuilder::new()
            .with_config(config)
            .with_consensus(ledger.clone())
            .with_gateway(gateway.clone())
            .build()
            .expect("pool builds");
        let outputs = (0..values.len())
            .map(|i| genesis.transactions[0].value_output_id(i))
            .collect();
        Node {
            key,
            ledger,
            gateway,
            pool,
            outputs,
        }
    }

    fn transfer(node: &Node, parent: ValueOutputId, value: u64, tag: u8) -> Transaction {
        signed_transfer(&node.key, &[parent], &[value], 0, [tag; 32])
    }

    fn keep(node: &Node, parent: ValueOutputId, value: u64) -> Transaction {
        signed_transfer(&node.key, &[parent], &[value], 0, node.key.unlock_hash())
    }

    // =============================================================================
    // WALLET → POOL
    // =============================================================================

    #[test]
    fn test_double_spend_then_confirmation() {
        let n = node(&[10], PoolConfig::for_testing());
        let o1 = n.outputs[0];

        let t1 = transfer(&n, o1, 10, 1);
        let o2 = t1.value_output_id(0);
        n.pool.accept_transaction(t1.clone()).unwrap();

        let t2 = transfer(&n, o1, 10, 2);
        assert_eq!(
            n.pool.accept_transaction(t2),
            Err(PoolError::DoubleSpend(o1.0))
        );
        assert_eq!(n.gateway.relayed(), vec![t1.clone()]);

        n.ledger.mine_and_notify(vec![t1.clone()]);

        assert!(n.pool.transaction_set().unwrap().is_empty());
        assert!(n.pool.value_output(&o2).unwrap().is_some());
        assert!(n.pool.value_output(&o1).unwrap().is_none());
        assert_eq!(n.pool.status().unwrap().reference_objects, 0);
        n.pool.check_invariants().unwrap();
    }

    #[test]
    fn test_chain_of_pending_spends() {
        let n = node(&[100], PoolConfig::for_testing());
        let mut parent = n.outputs[0];
        let mut expected = Vec::new();
        for value in (90..100).rev() {
            let tx = signed_transfer(&n.key, &[parent], &[value], 1, n.key.unlock_hash());
            parent = tx.value_output_id(0);
            n.pool.accept_transaction(tx.clone()).unwrap();
            expected.push(tx);
        }

        assert_eq!(n.pool.transaction_set().unwrap(), expected);
        assert!(n.pool.value_output(&parent).unwrap().is_some());
        n.pool.check_invariants().unwrap();
    }

    // =============================================================================
    // LEDGER → POOL
    // =============================================================================

    #[test]
    fn test_shallow_reorg_readds_block_transactions_first() {
        let n = node(&[10, 20], PoolConfig::for_testing());
        let a = keep(&n, n.outputs[0], 10);
        n.ledger.mine_and_notify(vec![a.clone()]);

        let child = keep(&n, a.value_output_id(0), 10);
        let other = keep(&n, n.outputs[1], 20);
        n.pool.accept_transaction(child.clone()).unwrap();
        n.pool.accept_transaction(other.clone()).unwrap();

        let reverted = n.ledger.revert_tip().unwrap();
        let empty = n.ledger.mine(vec![]);
        n.ledger.notify(&[reverted], &[empty]);

        let ids: Vec<_> = n
            .pool
            .transaction_set()
            .unwrap()
            .iter()
            .map(Transaction::id)
            .collect();
        assert_eq!(ids, vec![a.id(), child.id(), other.id()]);
        assert_eq!(n.pool.status().unwrap().height, 1);
        n.pool.check_invariants().unwrap();
    }

    #[test]
    fn test_deep_reorg_drops_invalidated_chain() {
        let n = node(&[10, 20], PoolConfig::for_testing());
        let a = keep(&n, n.outputs[0], 10);
        let b = keep(&n, a.value_output_id(0), 10);
        n.ledger.mine_and_notify(vec![a.clone()]);
        n.ledger.mine_and_notify(vec![b.clone()]);

        let c = keep(&n, b.value_output_id(0), 10);
        n.pool.accept_transaction(c.clone()).unwrap();

        // Rival chain spends the same genesis output elsewhere.
        let b2 = n.ledger.revert_tip().unwrap();
        let b1 = n.ledger.revert_tip().unwrap();
        let rival = transfer(&n, n.outputs[0], 10, 9);
        let b1_prime = n.ledger.mine(vec![rival.clone()]);
        let outcome = n.pool.resync(&[b2, b1], &[b1_prime]).unwrap();

        assert_eq!(outcome.reverted_blocks, 2);
        assert_eq!(outcome.applied_blocks, 1);
        assert_eq!(outcome.readded, 0);
        assert_eq!(outcome.inconsistent_diffs, 0);
        for id in [a.id(), b.id(), c.id()] {
            assert!(outcome.dropped.contains(&id));
        }
        assert!(n.pool.transaction_set().unwrap().is_empty());
        assert!(n.pool.value_output(&rival.value_output_id(0)).unwrap().is_some());
        assert!(n.pool.value_output(&n.outputs[1]).unwrap().is_some());
        n.pool.check_invariants().unwrap();
    }

    #[test]
    fn test_apply_then_revert_restores_pool() {
        let n = node(&[10, 20, 30], PoolConfig::for_testing());
        let txs: Vec<_> = n
            .outputs
            .iter()
            .zip([10, 20, 30])
            .map(|(id, v)| keep(&n, *id, v))
            .collect();
        for tx in &txs {
            n.pool.accept_transaction(tx.clone()).unwrap();
        }
        let before = n.pool.transaction_set().unwrap();
        let outputs_before: Vec<_> = txs
            .iter()
            .map(|tx| n.pool.value_output(&tx.value_output_id(0)).unwrap())
            .collect();

        let block = n.ledger.mine_and_notify(vec![txs[0].clone(), txs[2].clone()]);
        assert_eq!(n.pool.transaction_set().unwrap(), vec![txs[1].clone()]);

        let reverted = n.ledger.revert_tip().unwrap();
        assert_eq!(reverted.id, block.id);
        n.ledger.notify(&[reverted], &[]);

        let after = n.pool.transaction_set().unwrap();
        assert_eq!(after.len(), before.len());
        for tx in &before {
            assert!(after.contains(tx));
        }
        let outputs_after: Vec<_> = txs
            .iter()
            .map(|tx| n.pool.value_output(&tx.value_output_id(0)).unwrap())
            .collect();
        assert_eq!(outputs_after, outputs_before);
        n.pool.check_invariants().unwrap();
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[test]
    fn test_submissions_race_ledger_notifications() {
        let values: Vec<u64> = (1..=40).collect();
        let n = node(&values, PoolConfig::default());
        let (wallet_outputs, miner_outputs) = n.outputs.split_at(20);
        let wallet: Vec<_> = wallet_outputs
            .iter()
            .zip(&values)
            .map(|(id, v)| keep(&n, *id, *v))
            .collect();
        let mined: Vec<_> = miner_outputs
            .iter()
            .zip(&values[20..])
            .map(|(id, v)| keep(&n, *id, *v))
            .collect();

        std::thread::scope(|scope| {
            for chunk in wallet.chunks(5) {
                let pool = &n.pool;
                scope.spawn(move || {
                    for tx in chunk {
                        pool.accept_transaction(tx.clone()).unwrap();
                    }
                });
            }
            let ledger = &n.ledger;
            scope.spawn(move || {
                for tx in &mined {
                    ledger.mine_and_notify(vec![tx.clone()]);
                }
            });
        });

        let status = n.pool.status().unwrap();
        assert_eq!(status.transactions, 20);
        assert_eq!(status.height, 20);
        // Genesis, twenty accepts, twenty blocks.
        assert_eq!(status.log_entries, 41);
        n.pool.check_invariants().unwrap();
    }
}
