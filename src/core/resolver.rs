use async_trait::async_trait;

/// Maps a `0x`-prefixed 4-byte selector to a function name
#[async_trait]
pub trait SignatureResolver: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// `None` when the selector is unknown; a miss is never an error
    async fn resolve(&self, selector: &str) -> Option<String>;
}
