use std::time::Duration;

use crate::{core::client::MissingData, utils::retry::CallTimedOut};

/// Categorizes fetch failures for metrics reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureReason {
    NotFound,
    Rpc,
    Timeout,
}

impl FetchFailureReason {
    pub fn classify(error: &anyhow::Error) -> Self {
        if error.downcast_ref::<CallTimedOut>().is_some() {
            FetchFailureReason::Timeout
        } else if error.downcast_ref::<MissingData>().is_some() {
            FetchFailureReason::NotFound
        } else {
            FetchFailureReason::Rpc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFailureReason::NotFound => "not_found",
            FetchFailureReason::Rpc => "rpc_error",
            FetchFailureReason::Timeout => "timeout",
        }
    }
}

/// Abstraction over scanner runtime metrics, allowing a no-op implementation when disabled.
pub trait ScannerMetrics: Send + Sync {
    fn record_block_scanned(&self, block_number: u64, tx_count: usize);
    fn record_block_fetch_failure(&self, reason: FetchFailureReason);
    fn record_receipt_fetch_failure(&self, reason: FetchFailureReason);
    fn record_tx_matched(&self);
    fn record_batch_finished(&self, duration: Duration, block_count: u64);
}

#[derive(Default)]
pub struct NoopScannerMetrics;

impl NoopScannerMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl ScannerMetrics for NoopScannerMetrics {
    fn record_block_scanned(&self, _block_number: u64, _tx_count: usize) {}

    fn record_block_fetch_failure(&self, _reason: FetchFailureReason) {}

    fn record_receipt_fetch_failure(&self, _reason: FetchFailureReason) {}

    fn record_tx_matched(&self) {}

    fn record_batch_finished(&self, _duration: Duration, _block_count: u64) {}
}

/// Emits through the `metrics` facade, labelled with the scanned contract
pub struct PrometheusScannerMetrics {
    contract: String,
}

impl PrometheusScannerMetrics {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
        }
    }
}

impl ScannerMetrics for PrometheusScannerMetrics {
    fn record_block_scanned(&self, block_number: u64, tx_count: usize) {
        let contract = self.contract.clone();
        metrics::counter!(
            "scanner_blocks_scanned_total",
            1,
            "contract" => contract.clone()
        );
        metrics::counter!(
            "scanner_block_transactions_total",
            tx_count as u64,
            "contract" => contract.clone()
        );
        metrics::gauge!(
            "scanner_last_scanned_block",
            block_number as f64,
            "contract" => contract
        );
    }

    fn record_block_fetch_failure(&self, reason: FetchFailureReason) {
        let contract = self.contract.clone();
        metrics::counter!(
            "scanner_block_fetch_failure_total",
            1,
            "contract" => contract,
            "reason" => reason.as_str()
        );
    }

    fn record_receipt_fetch_failure(&self, reason: FetchFailureReason) {
        let contract = self.contract.clone();
        metrics::counter!(
            "scanner_receipt_fetch_failure_total",
            1,
            "contract" => contract,
            "reason" => reason.as_str()
        );
    }

    fn record_tx_matched(&self) {
        let contract = self.contract.clone();
        metrics::counter!(
            "scanner_matched_transactions_total",
            1,
            "contract" => contract
        );
    }

    fn record_batch_finished(&self, duration: Duration, block_count: u64) {
        let contract = self.contract.clone();
        metrics::histogram!(
            "scanner_batch_seconds",
            duration.as_secs_f64(),
            "contract" => contract.clone()
        );
        metrics::counter!(
            "scanner_batches_finished_total",
            1,
            "contract" => contract.clone()
        );
        metrics::gauge!(
            "scanner_last_batch_blocks",
            block_count as f64,
            "contract" => contract
        );
    }
}
