//! Trait definitions for the extractor module.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::ExtractError;
use super::types::ExtractInfo;

/// Discovers the downloadable renditions behind a URL.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the name of this extractor implementation.
    fn name(&self) -> &str;

    /// Extracts source information for `url`.
    ///
    /// Cancelling `cancel` stops the extraction and returns
    /// [`ExtractError::Cancelled`].
    async fn extract(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<ExtractInfo, ExtractError>;
}
