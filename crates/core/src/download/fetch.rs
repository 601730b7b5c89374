//! Opening byte streams for extracted sources.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use std::io;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::FetchConfig;
use crate::engine::InputReader;
use crate::extractor::SourceStreamDescriptor;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Source {0} has no URL")]
    MissingUrl(String),

    #[error("Source {0} is not available")]
    NotAvailable(String),

    #[error("Reading source failed: {0}")]
    Read(#[source] io::Error),

    #[error("Fetch cancelled")]
    Cancelled,
}

/// Opens readable byte streams for source renditions.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Opens `source` for reading. The stream is closed by dropping it.
    async fn open(
        &self,
        cancel: &CancellationToken,
        source: &SourceStreamDescriptor,
    ) -> Result<InputReader, FetchError>;
}

/// Fetches sources over HTTP, streaming the response body.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout())
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn open(
        &self,
        cancel: &CancellationToken,
        source: &SourceStreamDescriptor,
    ) -> Result<InputReader, FetchError> {
        if source.url.is_empty() {
            return Err(FetchError::MissingUrl(source.format_id.clone()));
        }

        let mut request = self.client.get(&source.url);
        for (name, value) in &source.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = request.send() => response.map_err(|e| FetchError::Request {
                url: source.url.clone(),
                source: e,
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: source.url.clone(),
                status: status.as_u16(),
            });
        }
        debug!(
            format_id = %source.format_id,
            length = ?response.content_length(),
            "Source opened"
        );

        let body = response.bytes_stream().map_err(io::Error::other);
        let reader = StreamReader::new(Box::pin(body));

        Ok(match self.config.max_source_bytes {
            Some(limit) => Box::new(reader.take(limit)),
            None => Box::new(reader),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned response; the task yields the request head it got.
    async fn serve_once(status: &'static str, body: &'static [u8]) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&head).to_lowercase()
        });
        (format!("http://{}/media", addr), handle)
    }

    fn source(url: &str) -> SourceStreamDescriptor {
        SourceStreamDescriptor::audio("251", url, "opus", "webm", 160.0)
    }

    #[tokio::test]
    async fn test_streams_body_with_source_headers() {
        let (url, server) = serve_once("200 OK", b"source bytes").await;
        let mut descriptor = source(&url);
        descriptor
            .http_headers
            .insert("X-Test".to_string(), "1".to_string());

        let fetcher = HttpFetcher::new(FetchConfig::default());
        let mut reader = fetcher
            .open(&CancellationToken::new(), &descriptor)
            .await
            .unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"source bytes");

        let head = server.await.unwrap();
        assert!(head.contains("x-test: 1"));
        assert!(head.contains("user-agent: mediabroker/"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let (url, _server) = serve_once("404 Not Found", b"").await;
        let fetcher = HttpFetcher::new(FetchConfig::default());

        let err = fetcher
            .open(&CancellationToken::new(), &source(&url))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_max_source_bytes_caps_reader() {
        let (url, _server) = serve_once("200 OK", b"0123456789").await;
        let fetcher = HttpFetcher::new(FetchConfig {
            max_source_bytes: Some(4),
            ..Default::default()
        });

        let mut reader = fetcher
            .open(&CancellationToken::new(), &source(&url))
            .await
            .unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"0123");
    }

    #[tokio::test]
    async fn test_missing_url_and_cancelled() {
        let fetcher = HttpFetcher::new(FetchConfig::default());

        let err = fetcher
            .open(&CancellationToken::new(), &source(""))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FetchError::MissingUrl(ref id) if id == "251"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fetcher
            .open(&cancel, &source("http://127.0.0.1:9/media"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FetchError::Cancelled));
    }
}
