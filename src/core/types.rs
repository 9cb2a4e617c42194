use std::{collections::BTreeMap, ops::RangeInclusive, time::Duration};

use alloy::{hex, primitives::Address};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Selector reported when calldata is shorter than four bytes
pub const EMPTY_SELECTOR: &str = "0x";

/// Extracted field name -> rendered value
pub type FieldMap = BTreeMap<String, String>;

/// Receipt status filter, configured through the numeric flag of the CLI
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// Keep every transaction
    #[default]
    Any,
    /// Keep only successful executions (status 1)
    SuccessOnly,
    /// Keep only failed executions (status 0)
    FailureOnly,
}

impl StatusFilter {
    /// Parse the tri-state flag: 0 failure only, 1 success only, 2 no filter
    pub fn from_flag(flag: u64) -> Result<Self> {
        match flag {
            0 => Ok(StatusFilter::FailureOnly),
            1 => Ok(StatusFilter::SuccessOnly),
            2 => Ok(StatusFilter::Any),
            other => anyhow::bail!(
                "Invalid status filter {} (expected 0 = failed, 1 = success, 2 = no filter)",
                other
            ),
        }
    }

    pub fn matches(&self, success: bool) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::SuccessOnly => success,
            StatusFilter::FailureOnly => !success,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Any => "any",
            StatusFilter::SuccessOnly => "success_only",
            StatusFilter::FailureOnly => "failure_only",
        }
    }
}

/// Hex prefix that a transaction's calldata must start with.
///
/// Stored lowercase without `0x`, so `0xA9059CBB` and `a9059cbb` are the same filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalldataPrefix(String);

impl CalldataPrefix {
    /// Returns `Ok(None)` for an empty prefix (filter disabled)
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Ok(None);
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Calldata prefix is not hex: {:?}", raw);
        }

        Ok(Some(Self(digits.to_ascii_lowercase())))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Compare against hex-encoded calldata, encoding only the bytes the prefix covers
    pub fn matches(&self, calldata: &[u8]) -> bool {
        let needed_bytes = self.0.len().div_ceil(2);
        if calldata.len() < needed_bytes {
            return false;
        }
        hex::encode(&calldata[..needed_bytes]).starts_with(&self.0)
    }
}

/// First four calldata bytes as `0x`-prefixed hex, or `0x` when there are fewer than four
pub fn function_selector(calldata: &[u8]) -> String {
    if calldata.len() < 4 {
        return EMPTY_SELECTOR.to_string();
    }
    format!("0x{}", hex::encode(&calldata[..4]))
}

/// Split a comma separated key list, dropping blanks
pub fn parse_query_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Immutable description of one scan
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub contract: Address,
    pub start_block: u64,
    pub end_block: u64,
    pub calldata_prefix: Option<CalldataPrefix>,
    pub status_filter: StatusFilter,
    /// Worker batch size
    pub concurrency: u64,
    pub query_keys: Vec<String>,
}

impl ScanRequest {
    pub fn new(
        contract: Address,
        start_block: u64,
        end_block: u64,
        concurrency: u64,
    ) -> Result<Self> {
        if concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        Ok(Self {
            contract,
            start_block,
            end_block,
            calldata_prefix: None,
            status_filter: StatusFilter::Any,
            concurrency,
            query_keys: Vec::new(),
        })
    }

    pub fn with_calldata_prefix(mut self, prefix: Option<CalldataPrefix>) -> Self {
        self.calldata_prefix = prefix;
        self
    }

    pub fn with_status_filter(mut self, status_filter: StatusFilter) -> Self {
        self.status_filter = status_filter;
        self
    }

    pub fn with_query_keys(mut self, query_keys: Vec<String>) -> Self {
        self.query_keys = query_keys;
        self
    }

    /// `start > end` is a no-op scan rather than an error
    pub fn is_empty_range(&self) -> bool {
        self.start_block > self.end_block
    }

    pub fn block_count(&self) -> u64 {
        if self.is_empty_range() {
            0
        } else {
            (self.end_block - self.start_block).saturating_add(1)
        }
    }
}

/// Contiguous block sub-range owned by exactly one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Launch position, ascending with the block numbers
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl Batch {
    pub fn blocks(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }

    pub fn block_count(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }
}

/// One matching transaction with its extracted fields
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub block_number: u64,
    pub transaction_index: u64,
    pub tx_fields: FieldMap,
    pub receipt_fields: FieldMap,
}

impl TxRecord {
    pub fn ordering_key(&self) -> (u64, u64) {
        (self.block_number, self.transaction_index)
    }
}

/// Counters a single worker reports back when its batch is done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub blocks_scanned: u64,
    pub blocks_skipped: u64,
    pub receipts_skipped: u64,
}

/// Aggregate statistics of a finished (or interrupted) scan
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanSummary {
    pub contract: String,
    pub start_block: u64,
    pub end_block: u64,
    pub batches_launched: usize,
    pub batches_completed: usize,
    pub blocks_scanned: u64,
    pub blocks_skipped: u64,
    pub receipts_skipped: u64,
    pub records: usize,
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl ScanSummary {
    pub fn new(request: &ScanRequest) -> Self {
        Self {
            contract: request.contract.to_string(),
            start_block: request.start_block,
            end_block: request.end_block,
            batches_launched: 0,
            batches_completed: 0,
            blocks_scanned: 0,
            blocks_skipped: 0,
            receipts_skipped: 0,
            records: 0,
            interrupted: false,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn absorb(&mut self, stats: WorkerStats) {
        self.batches_completed += 1;
        self.blocks_scanned += stats.blocks_scanned;
        self.blocks_skipped += stats.blocks_skipped;
        self.receipts_skipped += stats.receipts_skipped;
    }
}

/// Result of a scan: records in final order plus the summary
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub records: Vec<TxRecord>,
    pub summary: ScanSummary,
}
