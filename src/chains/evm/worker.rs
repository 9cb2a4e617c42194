use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, warn};

use crate::{
    chains::evm::{
        context::EvmScannerContext,
        extract::{receipt_fields, transaction_fields},
    },
    core::{
        client::{ChainReceipt, ChainTx},
        types::{Batch, EMPTY_SELECTOR, ScanRequest, TxRecord, WorkerStats, function_selector},
    },
    utils::metrics::FetchFailureReason,
};

/// The aggregator is gone, nothing more can be delivered
#[derive(Debug)]
struct OutputClosed;

/// Scans one batch of blocks in ascending order and streams matches to the aggregator
pub struct BlockWorker {
    context: EvmScannerContext,
    batch: Batch,
    output: mpsc::Sender<TxRecord>,
}

impl BlockWorker {
    pub fn new(context: EvmScannerContext, batch: Batch, output: mpsc::Sender<TxRecord>) -> Self {
        Self {
            context,
            batch,
            output,
        }
    }

    pub async fn run(self) -> WorkerStats {
        let started = Instant::now();
        let mut stats = WorkerStats::default();
        debug!(
            batch = self.batch.index,
            start = self.batch.start,
            end = self.batch.end,
            "Worker started"
        );

        for block_number in self.batch.blocks() {
            if self.scan_block(block_number, &mut stats).await.is_err() {
                warn!(
                    batch = self.batch.index,
                    block = block_number,
                    "Result channel closed, stopping batch early"
                );
                break;
            }
        }

        self.context
            .metrics
            .record_batch_finished(started.elapsed(), self.batch.block_count());
        debug!(
            batch = self.batch.index,
            blocks = stats.blocks_scanned,
            "Worker finished"
        );
        stats
    }

    async fn scan_block(&self, block_number: u64, stats: &mut WorkerStats) -> Result<(), OutputClosed> {
        debug!(block = block_number, "====> checking block");

        let block = match self
            .context
            .rpc_call("eth_getBlockByNumber", move |client| async move {
                client.get_block(block_number).await
            })
            .await
        {
            Ok(block) => block,
            Err(e) => {
                let reason = FetchFailureReason::classify(&e);
                warn!(
                    block = block_number,
                    reason = reason.as_str(),
                    error = %e,
                    "⚠️ Failed to get block, skipping"
                );
                self.context.metrics.record_block_fetch_failure(reason);
                stats.blocks_skipped += 1;
                return Ok(());
            }
        };

        stats.blocks_scanned += 1;
        self.context
            .metrics
            .record_block_scanned(block_number, block.transactions.len());

        for (position, tx) in block.transactions.iter().enumerate() {
            if !matches_target(&self.context.request, tx) {
                continue;
            }

            let tx_hash = tx.hash;
            let receipt = match self
                .context
                .rpc_call("eth_getTransactionReceipt", move |client| async move {
                    client.get_receipt(tx_hash).await
                })
                .await
            {
                Ok(receipt) => receipt,
                Err(e) => {
                    let reason = FetchFailureReason::classify(&e);
                    warn!(
                        block = block_number,
                        tx = ?tx_hash,
                        reason = reason.as_str(),
                        error = %e,
                        "⚠️ Failed to get receipt, skipping transaction"
                    );
                    self.context.metrics.record_receipt_fetch_failure(reason);
                    stats.receipts_skipped += 1;
                    continue;
                }
            };

            if !self.context.request.status_filter.matches(receipt.success) {
                continue;
            }

            let record = self.build_record(block_number, position, tx, &receipt).await;
            self.output.send(record).await.map_err(|_| OutputClosed)?;
            self.context.metrics.record_tx_matched();
        }

        Ok(())
    }

    async fn build_record(
        &self,
        block_number: u64,
        position: usize,
        tx: &ChainTx,
        receipt: &ChainReceipt,
    ) -> TxRecord {
        let selector = function_selector(&tx.input);
        let function_name = if selector == EMPTY_SELECTOR {
            String::new()
        } else {
            self.context
                .resolver
                .resolve(&selector)
                .await
                .unwrap_or_default()
        };

        TxRecord {
            block_number: receipt.block_number.unwrap_or(block_number),
            transaction_index: receipt
                .transaction_index
                .or(tx.transaction_index)
                .unwrap_or(position as u64),
            tx_fields: transaction_fields(tx, &selector, &function_name),
            receipt_fields: receipt_fields(receipt),
        }
    }
}

/// Recipient and calldata checks; both must hold before a receipt is fetched
pub fn matches_target(request: &ScanRequest, tx: &ChainTx) -> bool {
    if tx.to != Some(request.contract) {
        return false;
    }
    request
        .calldata_prefix
        .as_ref()
        .is_none_or(|prefix| prefix.matches(&tx.input))
}
