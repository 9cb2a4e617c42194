use crate::core::types::ScanOutcome;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan the whole requested range and return the records in final order.
    ///
    /// A shutdown signal stops the scan early; whatever was collected is still returned.
    async fn scan(&self, shutdown: broadcast::Receiver<()>) -> Result<ScanOutcome>;
}
