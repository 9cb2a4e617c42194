use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::Semaphore;

use crate::{
    config::{RpcConfig, ScannerConfig},
    core::{client::ChainClient, resolver::SignatureResolver, types::ScanRequest},
    utils::{
        metrics::ScannerMetrics,
        retry::{RetryPolicy, retry_async},
    },
};

/// Tuning knobs of a scan that are not part of the request itself
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub retry_policy: RetryPolicy,
    /// Pause between two worker launches
    pub launch_stagger: Duration,
    pub channel_capacity: usize,
    pub max_in_flight: usize,
}

impl ScanSettings {
    pub fn from_config(rpc: &RpcConfig, scanner: &ScannerConfig) -> Self {
        Self {
            retry_policy: rpc.retry_policy(),
            launch_stagger: scanner.launch_stagger(),
            channel_capacity: scanner.channel_capacity,
            max_in_flight: rpc.max_in_flight,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&RpcConfig::default(), &ScannerConfig::default())
    }
}

/// Everything a worker shares with the others. All of it is read-only
/// except the RPC semaphore.
#[derive(Clone)]
pub struct EvmScannerContext {
    pub request: Arc<ScanRequest>,
    pub settings: Arc<ScanSettings>,
    pub client: Arc<dyn ChainClient>,
    pub resolver: Arc<dyn SignatureResolver>,
    pub metrics: Arc<dyn ScannerMetrics>,
    pub rpc_semaphore: Arc<Semaphore>,
}

impl EvmScannerContext {
    pub fn new(
        request: Arc<ScanRequest>,
        settings: ScanSettings,
        client: Arc<dyn ChainClient>,
        resolver: Arc<dyn SignatureResolver>,
        metrics: Arc<dyn ScannerMetrics>,
    ) -> Self {
        let rpc_semaphore = Arc::new(Semaphore::new(settings.max_in_flight.max(1)));
        Self {
            request,
            settings: Arc::new(settings),
            client,
            resolver,
            metrics,
            rpc_semaphore,
        }
    }

    /// Run one chain call under the in-flight cap, the per-attempt deadline and the retry policy
    pub async fn rpc_call<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut(Arc<dyn ChainClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self.rpc_semaphore.acquire().await?;
        retry_async(operation, &self.settings.retry_policy, || {
            call(Arc::clone(&self.client))
        })
        .await
    }
}
