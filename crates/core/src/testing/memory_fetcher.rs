//! In-memory source fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::download::{FetchError, SourceFetcher};
use crate::engine::InputReader;
use crate::extractor::SourceStreamDescriptor;

/// Serves source bytes from memory, keyed by format id.
///
/// Sources marked as stalled open successfully but never produce data nor
/// reach EOF, which lets tests exercise cancellation with a blocked input.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    sources: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    stalled: Arc<RwLock<Vec<String>>>,
    /// Writer halves keeping stalled readers open.
    held: Arc<RwLock<Vec<DuplexStream>>>,
    opened: Arc<RwLock<Vec<String>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for the source with `format_id`.
    pub async fn insert(&self, format_id: impl Into<String>, bytes: Vec<u8>) {
        self.sources.write().await.insert(format_id.into(), bytes);
    }

    /// Make the source with `format_id` stall forever once opened.
    pub async fn stall(&self, format_id: impl Into<String>) {
        self.stalled.write().await.push(format_id.into());
    }

    /// Format ids opened so far, in call order.
    pub async fn opened(&self) -> Vec<String> {
        self.opened.read().await.clone()
    }
}

#[async_trait]
impl SourceFetcher for MemoryFetcher {
    async fn open(
        &self,
        cancel: &CancellationToken,
        source: &SourceStreamDescriptor,
    ) -> Result<InputReader, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        self.opened.write().await.push(source.format_id.clone());

        if self.stalled.read().await.contains(&source.format_id) {
            let (writer, reader) = tokio::io::duplex(64);
            self.held.write().await.push(writer);
            return Ok(Box::new(reader));
        }

        match self.sources.read().await.get(&source.format_id) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(FetchError::NotAvailable(source.format_id.clone())),
        }
    }
}
