use alloy::{
    consensus::{Eip658Value, Transaction as ConsensusTransaction, TxReceipt},
    eips::BlockNumberOrTag,
    network::Ethereum,
    primitives::B256,
    providers::{Provider, RootProvider},
    rpc::types::{Transaction, TransactionReceipt},
    transports::http::reqwest::Url,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::core::client::{ChainBlock, ChainClient, ChainHeader, ChainLog, ChainReceipt, ChainTx, MissingData};

/// `ChainClient` over an alloy HTTP provider
pub struct EvmClient {
    provider: RootProvider<Ethereum>,
}

impl EvmClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: Url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
        })
    }
}

fn convert_transaction(tx: Transaction) -> ChainTx {
    let inner = &tx.inner;
    ChainTx {
        hash: *inner.hash(),
        to: inner.to(),
        nonce: inner.nonce(),
        gas_limit: inner.gas_limit(),
        gas_price: inner.gas_price().unwrap_or_else(|| inner.max_fee_per_gas()),
        value: inner.value(),
        input: inner.input().clone(),
        transaction_index: tx.transaction_index,
    }
}

fn convert_receipt(receipt: TransactionReceipt) -> ChainReceipt {
    let post_state = match receipt.inner.status_or_post_state() {
        Eip658Value::PostState(root) => Some(root),
        Eip658Value::Eip658(_) => None,
    };
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| ChainLog {
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
        })
        .collect();

    ChainReceipt {
        transaction_hash: receipt.transaction_hash,
        block_hash: receipt.block_hash,
        block_number: receipt.block_number,
        transaction_index: receipt.transaction_index,
        success: receipt.inner.status(),
        post_state,
        cumulative_gas_used: receipt.inner.cumulative_gas_used(),
        gas_used: receipt.gas_used,
        logs_bloom: *receipt.inner.logs_bloom(),
        logs,
        contract_address: receipt.contract_address,
    }
}

#[async_trait]
impl ChainClient for EvmClient {
    async fn get_header(&self, block_number: Option<u64>) -> Result<ChainHeader> {
        let tag = block_number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number);
        let block = self
            .provider
            .get_block_by_number(tag)
            .await?
            .ok_or_else(|| match block_number {
                Some(number) => MissingData::Block(number),
                None => MissingData::Header,
            })?;

        Ok(ChainHeader {
            number: block.header.number,
            excess_blob_gas: block.header.excess_blob_gas,
            blob_gas_used: block.header.blob_gas_used,
        })
    }

    async fn get_block(&self, block_number: u64) -> Result<ChainBlock> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .full()
            .await?
            .ok_or(MissingData::Block(block_number))?;

        let transactions: Vec<ChainTx> = block
            .transactions
            .into_transactions()
            .into_iter()
            .map(convert_transaction)
            .collect();
        debug!(
            block = block_number,
            tx_count = transactions.len(),
            "🖨️ Fetched block"
        );

        Ok(ChainBlock { transactions })
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<ChainReceipt> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await?
            .ok_or(MissingData::Receipt(tx_hash))?;
        Ok(convert_receipt(receipt))
    }
}
