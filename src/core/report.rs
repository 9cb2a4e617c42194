use std::{fmt, io::Write};

use crate::core::types::TxRecord;

/// One rendered report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine<'a> {
    Transaction { key: &'a str, value: &'a str },
    Receipt { key: &'a str, value: &'a str },
    Unknown { key: &'a str },
}

impl fmt::Display for ReportLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLine::Transaction { key, value } => write!(f, "Transaction {}: {}", key, value),
            ReportLine::Receipt { key, value } => write!(f, "Receipt {}: {}", key, value),
            ReportLine::Unknown { key } => write!(f, "Unknown query key: {}", key),
        }
    }
}

/// Transaction fields shadow receipt fields of the same name
pub fn render_record<'a>(record: &'a TxRecord, keys: &'a [String]) -> Vec<ReportLine<'a>> {
    keys.iter()
        .map(|key| {
            if let Some(value) = record.tx_fields.get(key) {
                ReportLine::Transaction { key, value }
            } else if let Some(value) = record.receipt_fields.get(key) {
                ReportLine::Receipt { key, value }
            } else {
                ReportLine::Unknown { key }
            }
        })
        .collect()
}

pub fn write_report<W: Write>(out: &mut W, records: &[TxRecord], keys: &[String]) -> std::io::Result<()> {
    for record in records {
        writeln!(out)?;
        writeln!(out, "===> Queried Fields:")?;
        for line in render_record(record, keys) {
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()
}
