use tokio::sync::mpsc;
use tracing::debug;

use crate::core::types::TxRecord;

/// Drain the shared channel until every sender is gone.
///
/// Must run concurrently with the workers: with a bounded channel the
/// producers block on a full buffer until this makes room.
pub async fn collect_records(mut results: mpsc::Receiver<TxRecord>) -> Vec<TxRecord> {
    let mut records = Vec::new();
    while let Some(record) = results.recv().await {
        debug!(
            block = record.block_number,
            index = record.transaction_index,
            "Collected record"
        );
        records.push(record);
    }
    records
}

/// Stable sort by (block number, transaction index)
pub fn sort_records(records: &mut [TxRecord]) {
    records.sort_by_key(TxRecord::ordering_key);
}
