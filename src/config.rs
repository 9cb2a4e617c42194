use alloy::primitives::Address;
use anyhow::{Context, Result};
use config as config_loader;
use dotenvy::dotenv;
use serde::Deserialize;
use std::{path::Path, time::Duration};

use crate::{
    cli::Cli,
    core::types::{CalldataPrefix, ScanRequest, StatusFilter, parse_query_keys},
    utils::retry::RetryPolicy,
};

/// Global config structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub signatures: SignaturesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// RPC related config
#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    #[serde(default = "RpcConfig::default_url")]
    pub url: String,
    /// Deadline per call attempt; 0 disables it
    #[serde(default = "RpcConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "RpcConfig::default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Upper bound on simultaneous RPC calls across all workers
    #[serde(default = "RpcConfig::default_max_in_flight")]
    pub max_in_flight: usize,
}

impl RpcConfig {
    fn default_url() -> String {
        "http://127.0.0.1:9545".to_string()
    }
    fn default_timeout_secs() -> u64 {
        15
    }
    fn default_retry_base_delay_ms() -> u64 {
        500
    }
    fn default_max_in_flight() -> usize {
        64
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            exponential_backoff: true,
            attempt_timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            timeout_secs: Self::default_timeout_secs(),
            max_retries: 0,
            retry_base_delay_ms: Self::default_retry_base_delay_ms(),
            max_in_flight: Self::default_max_in_flight(),
        }
    }
}

/// Scan task config
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "ScannerConfig::default_contract_address")]
    pub contract_address: String,
    #[serde(default)]
    pub start_block: u64,
    /// Chain head when absent
    #[serde(default)]
    pub end_block: Option<u64>,
    #[serde(default)]
    pub calldata_prefix: String,
    #[serde(default = "ScannerConfig::default_query")]
    pub query: String,
    /// 0 failed only, 1 successful only, 2 no filter
    #[serde(default = "ScannerConfig::default_status_filter")]
    pub status_filter: u64,
    #[serde(default = "ScannerConfig::default_concurrency")]
    pub concurrency: u64,
    #[serde(default = "ScannerConfig::default_launch_stagger_micros")]
    pub launch_stagger_micros: u64,
    #[serde(default = "ScannerConfig::default_channel_capacity")]
    pub channel_capacity: usize,
}

impl ScannerConfig {
    fn default_contract_address() -> String {
        "0xcf7ed3acca5a467e9e704c703e8d87f634fb0fc9".to_string()
    }
    fn default_query() -> String {
        "BlockNumber,Hash,GasUsed,4byte,func".to_string()
    }
    fn default_status_filter() -> u64 {
        2
    }
    fn default_concurrency() -> u64 {
        10
    }
    fn default_launch_stagger_micros() -> u64 {
        500
    }
    fn default_channel_capacity() -> usize {
        100
    }

    pub fn launch_stagger(&self) -> Duration {
        Duration::from_micros(self.launch_stagger_micros)
    }

    /// Validate the scan parameters. `end_block` is the resolved range end.
    pub fn to_request(&self, end_block: u64) -> Result<ScanRequest> {
        let contract = self
            .contract_address
            .trim()
            .parse::<Address>()
            .with_context(|| format!("Invalid contract address: {:?}", self.contract_address))?;

        Ok(
            ScanRequest::new(contract, self.start_block, end_block, self.concurrency)?
                .with_calldata_prefix(CalldataPrefix::parse(&self.calldata_prefix)?)
                .with_status_filter(StatusFilter::from_flag(self.status_filter)?)
                .with_query_keys(parse_query_keys(&self.query)),
        )
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            contract_address: Self::default_contract_address(),
            start_block: 0,
            end_block: None,
            calldata_prefix: String::new(),
            query: Self::default_query(),
            status_filter: Self::default_status_filter(),
            concurrency: Self::default_concurrency(),
            launch_stagger_micros: Self::default_launch_stagger_micros(),
            channel_capacity: Self::default_channel_capacity(),
        }
    }
}

/// Function signature resolution config
#[derive(Debug, Deserialize, Clone)]
pub struct SignaturesConfig {
    #[serde(default = "SignaturesConfig::default_path")]
    pub path: String,
    #[serde(default = "SignaturesConfig::default_external_lookup")]
    pub external_lookup: bool,
    #[serde(default = "SignaturesConfig::default_program")]
    pub program: String,
    #[serde(default = "SignaturesConfig::default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

impl SignaturesConfig {
    fn default_path() -> String {
        "signaturesS.json".to_string()
    }
    fn default_external_lookup() -> bool {
        true
    }
    fn default_program() -> String {
        "cast".to_string()
    }
    fn default_lookup_timeout_secs() -> u64 {
        5
    }
}

impl Default for SignaturesConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            external_lookup: Self::default_external_lookup(),
            program: Self::default_program(),
            lookup_timeout_secs: Self::default_lookup_timeout_secs(),
        }
    }
}

/// Logging config
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub to_file: bool,
    #[serde(default = "LoggingConfig::default_file_path")]
    pub file_path: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
    fn default_file_path() -> String {
        "./logs/scanner.log".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            to_file: false,
            file_path: Self::default_file_path(),
        }
    }
}

/// Metrics config
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enable: bool,
}

impl AppConfig {
    /// Load `.env`, the YAML file and `SCANNER__*` environment overrides.
    ///
    /// A missing file is only an error when `required` is set.
    pub fn load<P: AsRef<Path>>(path: P, required: bool) -> Result<Self> {
        dotenv().ok(); // Load the .env file

        if required && !path.as_ref().exists() {
            anyhow::bail!("Config file not found: {:?}", path.as_ref());
        }

        let builder = config_loader::Config::builder()
            .add_source(config_loader::File::from(path.as_ref().to_path_buf()).required(false))
            .add_source(config_loader::Environment::with_prefix("SCANNER").separator("__"))
            .build()?;

        Ok(builder.try_deserialize::<AppConfig>()?)
    }

    /// Command line flags win over file and environment values
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.rpc_url {
            self.rpc.url = url.clone();
        }
        if let Some(timeout_secs) = cli.timeout_secs {
            self.rpc.timeout_secs = timeout_secs;
        }
        if let Some(max_retries) = cli.max_retries {
            self.rpc.max_retries = max_retries;
        }
        if let Some(contract) = &cli.contract {
            self.scanner.contract_address = contract.clone();
        }
        if let Some(start) = cli.start {
            self.scanner.start_block = start;
        }
        if let Some(end) = cli.end {
            // negative means "up to the chain head"
            self.scanner.end_block = u64::try_from(end).ok();
        }
        if let Some(prefix) = &cli.calldata {
            self.scanner.calldata_prefix = prefix.clone();
        }
        if let Some(query) = &cli.query {
            self.scanner.query = query.clone();
        }
        if let Some(status_filter) = cli.status_filter {
            self.scanner.status_filter = status_filter;
        }
        if let Some(concurrency) = cli.concurrency {
            self.scanner.concurrency = concurrency;
        }
        if let Some(path) = &cli.signatures {
            self.signatures.path = path.clone();
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
    }
}
