use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::primitives::{Address, B256, Bloom, Bytes, U256};
use anyhow::Result;
use async_trait::async_trait;
use contract_tx_scanner::{
    chains::evm::{
        context::{EvmScannerContext, ScanSettings},
        scanner::EvmScanner,
    },
    core::{
        client::{ChainBlock, ChainClient, ChainHeader, ChainReceipt, ChainTx, MissingData},
        report::write_report,
        resolver::SignatureResolver,
        scanner::Scanner,
        types::{CalldataPrefix, ScanOutcome, ScanRequest, StatusFilter},
    },
    utils::{metrics::NoopScannerMetrics, retry::RetryPolicy},
};
use tokio::sync::broadcast;

const CONTRACT: Address = Address::new([0xc0; 20]);
const OTHER: Address = Address::new([0x0e; 20]);
const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

fn tx_hash(block: u64, index: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&block.to_be_bytes());
    bytes[8..16].copy_from_slice(&index.to_be_bytes());
    B256::from(bytes)
}

/// In-memory chain with per-block latency and injectable failures
#[derive(Default)]
struct FakeChain {
    blocks: HashMap<u64, ChainBlock>,
    receipts: HashMap<B256, ChainReceipt>,
    block_delays: HashMap<u64, Duration>,
    failing_blocks: HashSet<u64>,
    hanging_blocks: HashSet<u64>,
    failing_receipts: HashSet<B256>,
    /// Receipts that fail exactly once before succeeding
    flaky_receipts: HashSet<B256>,
    receipt_calls: AtomicUsize,
}

impl FakeChain {
    fn new(start: u64, end: u64) -> Self {
        let mut chain = Self::default();
        for number in start..=end {
            chain.blocks.insert(
                number,
                ChainBlock {
                    transactions: Vec::new(),
                },
            );
        }
        chain
    }

    fn push_tx(&mut self, block: u64, to: Option<Address>, input: &[u8], success: bool) -> B256 {
        let transactions = &mut self.blocks.get_mut(&block).expect("block exists").transactions;
        let index = transactions.len() as u64;
        let hash = tx_hash(block, index);
        transactions.push(ChainTx {
            hash,
            to,
            nonce: index,
            gas_limit: 100_000,
            gas_price: 1_000_000_000,
            value: U256::ZERO,
            input: Bytes::copy_from_slice(input),
            transaction_index: Some(index),
        });
        self.receipts.insert(
            hash,
            ChainReceipt {
                transaction_hash: hash,
                block_hash: Some(B256::repeat_byte(block as u8)),
                block_number: Some(block),
                transaction_index: Some(index),
                success,
                post_state: None,
                cumulative_gas_used: 21_000 * (index + 1),
                gas_used: 21_000 + block,
                logs_bloom: Bloom::ZERO,
                logs: Vec::new(),
                contract_address: None,
            },
        );
        hash
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_header(&self, _block_number: Option<u64>) -> Result<ChainHeader> {
        let number = self.blocks.keys().max().copied().ok_or(MissingData::Header)?;
        Ok(ChainHeader {
            number,
            excess_blob_gas: None,
            blob_gas_used: None,
        })
    }

    async fn get_block(&self, block_number: u64) -> Result<ChainBlock> {
        if let Some(delay) = self.block_delays.get(&block_number) {
            tokio::time::sleep(*delay).await;
        }
        if self.hanging_blocks.contains(&block_number) {
            std::future::pending::<()>().await;
        }
        if self.failing_blocks.contains(&block_number) {
            anyhow::bail!("connection reset while fetching block {}", block_number);
        }
        Ok(self
            .blocks
            .get(&block_number)
            .cloned()
            .ok_or(MissingData::Block(block_number))?)
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<ChainReceipt> {
        let call = self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_receipts.contains(&tx_hash) {
            anyhow::bail!("receipt backend unavailable");
        }
        if self.flaky_receipts.contains(&tx_hash) && call == 0 {
            anyhow::bail!("temporary receipt failure");
        }
        Ok(self
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(MissingData::Receipt(tx_hash))?)
    }
}

struct MapResolver(HashMap<String, String>);

#[async_trait]
impl SignatureResolver for MapResolver {
    fn name(&self) -> &'static str {
        "map"
    }

    async fn resolve(&self, selector: &str) -> Option<String> {
        self.0.get(selector).cloned()
    }
}

fn resolver() -> Arc<dyn SignatureResolver> {
    Arc::new(MapResolver(HashMap::from([
        ("0xa9059cbb".to_string(), "transfer".to_string()),
        ("0x095ea7b3".to_string(), "approve".to_string()),
    ])))
}

fn settings(retry_policy: RetryPolicy) -> ScanSettings {
    ScanSettings {
        retry_policy,
        launch_stagger: Duration::ZERO,
        channel_capacity: 1,
        max_in_flight: 8,
    }
}

fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 0,
        base_delay: Duration::from_millis(1),
        exponential_backoff: false,
        attempt_timeout: Some(Duration::from_millis(200)),
    }
}

fn query(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|key| key.to_string()).collect()
}

async fn run_scan_with(
    chain: FakeChain,
    request: ScanRequest,
    retry_policy: RetryPolicy,
    shutdown: broadcast::Receiver<()>,
) -> ScanOutcome {
    let context = EvmScannerContext::new(
        Arc::new(request),
        settings(retry_policy),
        Arc::new(chain),
        resolver(),
        Arc::new(NoopScannerMetrics::new()),
    );
    EvmScanner::new(context)
        .scan(shutdown)
        .await
        .expect("scan succeeds")
}

async fn run_scan(chain: FakeChain, request: ScanRequest) -> ScanOutcome {
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    run_scan_with(chain, request, quick_policy(), shutdown_rx).await
}

fn keys_of(outcome: &ScanOutcome) -> Vec<(u64, u64)> {
    outcome
        .records
        .iter()
        .map(|record| record.ordering_key())
        .collect()
}

#[tokio::test]
async fn small_range_reports_matches_in_chain_order() {
    let mut chain = FakeChain::new(100, 104);
    chain.push_tx(100, Some(OTHER), &TRANSFER, true);
    chain.push_tx(100, Some(CONTRACT), &TRANSFER, true);
    chain.push_tx(102, Some(OTHER), &APPROVE, true);
    chain.push_tx(104, Some(CONTRACT), &APPROVE, true);

    let request = ScanRequest::new(CONTRACT, 100, 104, 2)
        .unwrap()
        .with_query_keys(query(&["BlockNumber", "4byte", "func"]));
    let outcome = run_scan(chain, request).await;

    assert_eq!(keys_of(&outcome), vec![(100, 1), (104, 0)]);
    assert_eq!(outcome.summary.batches_launched, 3);
    assert_eq!(outcome.summary.batches_completed, 3);
    assert_eq!(outcome.summary.blocks_scanned, 5);
    assert_eq!(outcome.summary.records, 2);
    assert!(!outcome.summary.interrupted);

    let first = &outcome.records[0];
    assert_eq!(first.tx_fields["4byte"], "0xa9059cbb");
    assert_eq!(first.tx_fields["func"], "transfer");
    assert_eq!(outcome.records[1].tx_fields["func"], "approve");
}

#[tokio::test]
async fn late_finishing_early_batches_do_not_change_order() {
    let mut chain = FakeChain::new(0, 19);
    for block in 0..20u64 {
        chain.push_tx(block, Some(CONTRACT), &TRANSFER, true);
        chain.push_tx(block, Some(CONTRACT), &APPROVE, true);
        // lower blocks answer slowest, so their batches finish last
        chain
            .block_delays
            .insert(block, Duration::from_millis((20 - block) * 3));
    }

    let request = ScanRequest::new(CONTRACT, 0, 19, 3).unwrap();
    let outcome = run_scan(chain, request).await;

    let expected: Vec<(u64, u64)> = (0..20u64).flat_map(|b| [(b, 0), (b, 1)]).collect();
    assert_eq!(keys_of(&outcome), expected);
    assert_eq!(outcome.summary.batches_completed, 7);
}

#[tokio::test]
async fn unfetchable_block_is_skipped() {
    let mut chain = FakeChain::new(10, 13);
    for block in 10..=13 {
        chain.push_tx(block, Some(CONTRACT), &TRANSFER, true);
    }
    chain.failing_blocks.insert(11);
    // 13 is outside the fake chain
    chain.blocks.remove(&13);

    let request = ScanRequest::new(CONTRACT, 10, 13, 2).unwrap();
    let outcome = run_scan(chain, request).await;

    assert_eq!(keys_of(&outcome), vec![(10, 0), (12, 0)]);
    assert_eq!(outcome.summary.blocks_scanned, 2);
    assert_eq!(outcome.summary.blocks_skipped, 2);
}

#[tokio::test]
async fn hanging_block_times_out_and_is_skipped() {
    let mut chain = FakeChain::new(1, 3);
    for block in 1..=3 {
        chain.push_tx(block, Some(CONTRACT), &TRANSFER, true);
    }
    chain.hanging_blocks.insert(2);

    let request = ScanRequest::new(CONTRACT, 1, 3, 1).unwrap();
    let policy = RetryPolicy {
        attempt_timeout: Some(Duration::from_millis(50)),
        ..quick_policy()
    };
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let outcome = run_scan_with(chain, request, policy, shutdown_rx).await;

    assert_eq!(keys_of(&outcome), vec![(1, 0), (3, 0)]);
    assert_eq!(outcome.summary.blocks_skipped, 1);
}

#[tokio::test]
async fn failed_receipt_drops_only_that_transaction() {
    let mut chain = FakeChain::new(5, 5);
    chain.push_tx(5, Some(CONTRACT), &TRANSFER, true);
    let broken = chain.push_tx(5, Some(CONTRACT), &TRANSFER, true);
    chain.push_tx(5, Some(CONTRACT), &TRANSFER, true);
    chain.failing_receipts.insert(broken);

    let request = ScanRequest::new(CONTRACT, 5, 5, 10).unwrap();
    let outcome = run_scan(chain, request).await;

    assert_eq!(keys_of(&outcome), vec![(5, 0), (5, 2)]);
    assert_eq!(outcome.summary.receipts_skipped, 1);
}

#[tokio::test]
async fn retried_receipt_is_recovered() {
    let mut chain = FakeChain::new(7, 7);
    let flaky = chain.push_tx(7, Some(CONTRACT), &TRANSFER, true);
    chain.flaky_receipts.insert(flaky);

    let request = ScanRequest::new(CONTRACT, 7, 7, 1).unwrap();
    let policy = RetryPolicy {
        max_retries: 1,
        ..quick_policy()
    };
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let outcome = run_scan_with(chain, request, policy, shutdown_rx).await;

    assert_eq!(keys_of(&outcome), vec![(7, 0)]);
    assert_eq!(outcome.summary.receipts_skipped, 0);
}

#[tokio::test]
async fn filters_are_conjunctive() {
    let mut chain = FakeChain::new(1, 2);
    // matches everything
    chain.push_tx(1, Some(CONTRACT), &TRANSFER, true);
    // wrong recipient
    chain.push_tx(1, Some(OTHER), &TRANSFER, true);
    // wrong selector
    chain.push_tx(1, Some(CONTRACT), &APPROVE, true);
    // failed execution
    chain.push_tx(2, Some(CONTRACT), &TRANSFER, false);
    // contract creation carrying the same calldata
    chain.push_tx(2, None, &TRANSFER, true);
    chain.push_tx(2, Some(CONTRACT), &TRANSFER, true);

    let request = ScanRequest::new(CONTRACT, 1, 2, 1)
        .unwrap()
        .with_calldata_prefix(CalldataPrefix::parse("0xA9059CBB").unwrap())
        .with_status_filter(StatusFilter::SuccessOnly);
    let outcome = run_scan(chain, request).await;

    assert_eq!(keys_of(&outcome), vec![(1, 0), (2, 2)]);
}

#[tokio::test]
async fn failure_filter_keeps_only_reverted() {
    let mut chain = FakeChain::new(1, 1);
    chain.push_tx(1, Some(CONTRACT), &TRANSFER, true);
    chain.push_tx(1, Some(CONTRACT), &TRANSFER, false);

    let request = ScanRequest::new(CONTRACT, 1, 1, 1)
        .unwrap()
        .with_status_filter(StatusFilter::FailureOnly);
    let outcome = run_scan(chain, request).await;

    assert_eq!(keys_of(&outcome), vec![(1, 1)]);
    assert_eq!(outcome.records[0].receipt_fields["Status"], "0");
}

#[tokio::test]
async fn short_calldata_gets_empty_selector() {
    let mut chain = FakeChain::new(1, 1);
    chain.push_tx(1, Some(CONTRACT), &[], true);
    chain.push_tx(1, Some(CONTRACT), &[0xa9, 0x05], true);

    let request = ScanRequest::new(CONTRACT, 1, 1, 1).unwrap();
    let outcome = run_scan(chain, request).await;

    assert_eq!(outcome.records.len(), 2);
    for record in &outcome.records {
        assert_eq!(record.tx_fields["4byte"], "0x");
        assert_eq!(record.tx_fields["func"], "");
    }
}

#[tokio::test]
async fn no_matches_gives_empty_report() {
    let mut chain = FakeChain::new(1, 4);
    chain.push_tx(3, Some(OTHER), &TRANSFER, true);

    let request = ScanRequest::new(CONTRACT, 1, 4, 2)
        .unwrap()
        .with_query_keys(query(&["Hash"]));
    let keys = request.query_keys.clone();
    let outcome = run_scan(chain, request).await;

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.summary.blocks_scanned, 4);

    let mut out = Vec::new();
    write_report(&mut out, &outcome.records, &keys).unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn inverted_range_scans_nothing() {
    let chain = FakeChain::new(1, 10);
    let request = ScanRequest::new(CONTRACT, 10, 1, 2).unwrap();
    let outcome = run_scan(chain, request).await;

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.summary.batches_launched, 0);
}

#[tokio::test]
async fn report_lists_queried_fields_in_order() {
    let mut chain = FakeChain::new(100, 100);
    let hash = chain.push_tx(100, Some(CONTRACT), &TRANSFER, true);

    let request = ScanRequest::new(CONTRACT, 100, 100, 1)
        .unwrap()
        .with_query_keys(query(&["BlockNumber", "Hash", "GasUsed", "Foo", "func"]));
    let keys = request.query_keys.clone();
    let outcome = run_scan(chain, request).await;

    let mut out = Vec::new();
    write_report(&mut out, &outcome.records, &keys).unwrap();
    let expected = format!(
        "\n===> Queried Fields:\nReceipt BlockNumber: 100\nTransaction Hash: {:?}\nReceipt GasUsed: 21100\nUnknown query key: Foo\nTransaction func: transfer\n",
        hash
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[tokio::test]
async fn shutdown_before_launch_returns_partial_outcome() {
    let mut chain = FakeChain::new(1, 50);
    chain.push_tx(1, Some(CONTRACT), &TRANSFER, true);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    shutdown_tx.send(()).unwrap();

    let request = ScanRequest::new(CONTRACT, 1, 50, 5).unwrap();
    let outcome = run_scan_with(chain, request, quick_policy(), shutdown_rx).await;

    assert!(outcome.summary.interrupted);
    assert_eq!(outcome.summary.batches_launched, 0);
    assert!(outcome.records.is_empty());
}

#[tokio::test]
async fn shutdown_during_scan_aborts_stuck_worker_and_keeps_collected_records() {
    let mut chain = FakeChain::new(1, 6);
    for block in 1..=6 {
        chain.push_tx(block, Some(CONTRACT), &TRANSFER, true);
    }
    // the third batch never gets past block 5
    chain.hanging_blocks.insert(5);

    let request = ScanRequest::new(CONTRACT, 1, 6, 2).unwrap();
    let no_deadline = RetryPolicy {
        attempt_timeout: None,
        ..quick_policy()
    };
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let signaller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(()).unwrap();
        shutdown_tx
    });

    let outcome = run_scan_with(chain, request, no_deadline, shutdown_rx).await;
    drop(signaller.await.unwrap());

    assert!(outcome.summary.interrupted);
    assert_eq!(keys_of(&outcome), vec![(1, 0), (2, 0), (3, 0), (4, 0)]);
    assert_eq!(outcome.summary.batches_launched, 3);
    assert_eq!(outcome.summary.batches_completed, 2);
    assert!(outcome.summary.batches_completed < outcome.summary.batches_launched);
    assert_eq!(outcome.summary.records, 4);
}

#[tokio::test]
async fn dropped_shutdown_sender_does_not_stop_the_scan() {
    let mut chain = FakeChain::new(1, 6);
    for block in 1..=6 {
        chain.push_tx(block, Some(CONTRACT), &TRANSFER, true);
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    drop(shutdown_tx);

    let request = ScanRequest::new(CONTRACT, 1, 6, 2).unwrap();
    let outcome = run_scan_with(chain, request, quick_policy(), shutdown_rx).await;

    assert!(!outcome.summary.interrupted);
    assert_eq!(outcome.records.len(), 6);
}
