//! Field extraction: chain transaction/receipt -> named, rendered values.
//!
//! Key names are the ones users pass in the query list.

use alloy::{hex, primitives::Address};

use crate::core::{
    client::{ChainReceipt, ChainTx},
    types::FieldMap,
};

pub fn transaction_fields(tx: &ChainTx, selector: &str, function_name: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("Hash".to_string(), format!("{:?}", tx.hash));
    fields.insert("Nonce".to_string(), tx.nonce.to_string());
    fields.insert("GasPrice".to_string(), tx.gas_price.to_string());
    fields.insert("Gas".to_string(), tx.gas_limit.to_string());
    fields.insert("Value".to_string(), tx.value.to_string());
    fields.insert(
        "To".to_string(),
        tx.to.map(|to| to.to_checksum(None)).unwrap_or_default(),
    );
    fields.insert("Data".to_string(), hex::encode(&tx.input));
    fields.insert("4byte".to_string(), selector.to_string());
    fields.insert("func".to_string(), function_name.to_string());
    fields
}

pub fn receipt_fields(receipt: &ChainReceipt) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert(
        "PostState".to_string(),
        receipt.post_state.map(hex::encode).unwrap_or_default(),
    );
    fields.insert(
        "Status".to_string(),
        if receipt.success { "1" } else { "0" }.to_string(),
    );
    fields.insert(
        "CumulativeGasUsed".to_string(),
        receipt.cumulative_gas_used.to_string(),
    );
    fields.insert(
        "Bloom".to_string(),
        hex::encode(receipt.logs_bloom.as_slice()),
    );
    fields.insert(
        "Logs".to_string(),
        serde_json::to_string(&receipt.logs).unwrap_or_else(|_| "[]".to_string()),
    );
    fields.insert(
        "TxHash".to_string(),
        format!("{:?}", receipt.transaction_hash),
    );
    fields.insert(
        "ContractAddress".to_string(),
        receipt
            .contract_address
            .unwrap_or(Address::ZERO)
            .to_checksum(None),
    );
    fields.insert("GasUsed".to_string(), receipt.gas_used.to_string());
    fields.insert(
        "BlockHash".to_string(),
        receipt
            .block_hash
            .map(|hash| format!("{:?}", hash))
            .unwrap_or_default(),
    );
    fields.insert(
        "BlockNumber".to_string(),
        receipt
            .block_number
            .map(|number| number.to_string())
            .unwrap_or_default(),
    );
    fields.insert(
        "TransactionIndex".to_string(),
        receipt
            .transaction_index
            .map(|index| index.to_string())
            .unwrap_or_default(),
    );
    fields
}
