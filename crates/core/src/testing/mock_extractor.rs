//! Mock extractor for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::extractor::{ExtractError, ExtractInfo, Extractor};

/// Mock implementation of the Extractor trait.
///
/// Provides controllable behavior for testing:
/// - Return a configured [`ExtractInfo`] for every URL
/// - Fail the next extraction with a configured error
/// - Record the URLs that were extracted
///
/// # Example
///
/// ```rust,ignore
/// use mediabroker_core::testing::MockExtractor;
///
/// let extractor = MockExtractor::new();
/// extractor.set_info(ExtractInfo { title: "Clip".into(), formats, ..Default::default() }).await;
///
/// let info = extractor.extract(&cancel, "https://example.com/v").await?;
/// assert_eq!(extractor.extracted_urls().await, vec!["https://example.com/v"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    /// Info returned for every URL.
    info: Arc<RwLock<ExtractInfo>>,
    /// If set, the next extraction will fail with this error.
    next_error: Arc<RwLock<Option<ExtractError>>>,
    /// URLs passed to `extract`, in call order.
    urls: Arc<RwLock<Vec<String>>>,
}

impl MockExtractor {
    /// Create a new mock extractor reporting no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the info reported for every URL.
    pub async fn set_info(&self, info: ExtractInfo) {
        *self.info.write().await = info;
    }

    /// Configure the next extraction to fail with the given error.
    pub async fn set_error(&self, error: ExtractError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get all URLs extracted so far.
    pub async fn extracted_urls(&self) -> Vec<String> {
        self.urls.read().await.clone()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<ExtractInfo, ExtractError> {
        self.urls.write().await.push(url.to_string());

        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        Ok(self.info.read().await.clone())
    }
}
