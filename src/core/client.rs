use std::fmt;

use alloy::primitives::{Address, B256, Bloom, Bytes, U256};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Header fields the scanner cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHeader {
    pub number: u64,
    pub excess_blob_gas: Option<u64>,
    pub blob_gas_used: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ChainBlock {
    /// In block order
    pub transactions: Vec<ChainTx>,
}

#[derive(Debug, Clone)]
pub struct ChainTx {
    pub hash: B256,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Legacy gas price, or the fee cap for dynamic-fee transactions
    pub gas_price: u128,
    pub value: U256,
    pub input: Bytes,
    pub transaction_index: Option<u64>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct ChainReceipt {
    pub transaction_hash: B256,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub transaction_index: Option<u64>,
    pub success: bool,
    /// Pre-Byzantium state root
    pub post_state: Option<B256>,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    pub logs_bloom: Bloom,
    pub logs: Vec<ChainLog>,
    pub contract_address: Option<Address>,
}

/// The node answered, but the requested object does not exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingData {
    Header,
    Block(u64),
    Receipt(B256),
}

impl fmt::Display for MissingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingData::Header => write!(f, "Latest header not found"),
            MissingData::Block(number) => write!(f, "Block {} not found", number),
            MissingData::Receipt(hash) => write!(f, "Receipt for tx {} not found", hash),
        }
    }
}

impl std::error::Error for MissingData {}

/// Read-only chain access shared by every worker.
///
/// Implementations must be safe for concurrent use; every call may fail with
/// a transport error, which the scanner treats as a skippable per-item failure.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `None` reads the current head
    async fn get_header(&self, block_number: Option<u64>) -> Result<ChainHeader>;

    async fn get_block(&self, block_number: u64) -> Result<ChainBlock>;

    async fn get_receipt(&self, tx_hash: B256) -> Result<ChainReceipt>;
}
