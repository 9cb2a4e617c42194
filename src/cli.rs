use clap::Parser;
use std::path::PathBuf;

/// Default config file, silently skipped when absent
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "contract-tx-scanner",
    version,
    about = "Scan a block range for transactions sent to a contract and print selected fields"
)]
pub struct Cli {
    /// Config file path (default: ./config.yaml if it exists)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Ethereum RPC URL
    #[arg(long = "rpc-url", alias = "rpcURL")]
    pub rpc_url: Option<String>,

    /// Contract address the transactions must be sent to
    #[arg(long = "ca", alias = "contract")]
    pub contract: Option<String>,

    /// First block to scan
    #[arg(long)]
    pub start: Option<u64>,

    /// Last block to scan; -1 scans up to the chain head
    #[arg(long, allow_negative_numbers = true)]
    pub end: Option<i64>,

    /// Hex prefix the calldata must start with, e.g. a9059cbb
    #[arg(long)]
    pub calldata: Option<String>,

    /// Comma separated fields to print, e.g. BlockNumber,Hash,GasUsed,4byte,func
    #[arg(long)]
    pub query: Option<String>,

    /// Receipt status filter: 0 failed only, 1 successful only, 2 no filter
    #[arg(long = "status-filter", alias = "statusFilter")]
    pub status_filter: Option<u64>,

    /// Blocks per worker batch
    #[arg(long)]
    pub concurrency: Option<u64>,

    /// Signature table file
    #[arg(long)]
    pub signatures: Option<String>,

    /// Deadline per RPC call in seconds (0 disables)
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    /// Retries per failed RPC call
    #[arg(long = "max-retries")]
    pub max_retries: Option<u32>,

    /// Log filter, e.g. info or contract_tx_scanner=debug
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Config path and whether it must exist
    pub fn config_source(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }
}
