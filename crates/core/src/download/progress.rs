use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::types::DownloadProgress;
use crate::metrics;

/// Bytes between two [`DownloadProgress::Bytes`] events.
const REPORT_INTERVAL: u64 = 256 * 1024;

/// How a watched stream stopped being read.
#[derive(Debug)]
pub(crate) enum StreamEnd {
    Eof,
    Failed(io::Error),
    /// Dropped before EOF.
    Dropped,
}

/// Counts the bytes read through it and reports them as progress.
pub(crate) struct ProgressReader<R> {
    inner: R,
    total: u64,
    reported: u64,
    progress: Option<mpsc::Sender<DownloadProgress>>,
    finished: bool,
    done: Option<oneshot::Sender<StreamEnd>>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
}

impl<R> ProgressReader<R> {
    pub(crate) fn new(inner: R, progress: Option<mpsc::Sender<DownloadProgress>>) -> Self {
        Self {
            inner,
            total: 0,
            reported: 0,
            progress,
            finished: false,
            done: None,
            cancelled: None,
        }
    }

    /// Ends the stream at EOF once `cancel` fires.
    pub(crate) fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancelled = Some(Box::pin(cancel.cancelled_owned()));
        self
    }

    /// Reports how the stream ended on the returned receiver.
    pub(crate) fn watch(&mut self) -> oneshot::Receiver<StreamEnd> {
        let (tx, rx) = oneshot::channel();
        self.done = Some(tx);
        rx
    }

    fn end(&mut self, end: StreamEnd) {
        if let Some(done) = self.done.take() {
            let _ = done.send(end);
        }
    }

    fn report(&mut self) {
        if let Some(tx) = &self.progress {
            // A full channel only drops this event; the next one carries the total.
            let _ = tx.try_send(DownloadProgress::Bytes(self.total));
        }
        self.reported = self.total;
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        if let Some(cancelled) = this.cancelled.as_mut() {
            if cancelled.as_mut().poll(cx).is_ready() {
                this.finished = true;
                this.end(StreamEnd::Dropped);
                return Poll::Ready(Ok(()));
            }
        }

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let n = (buf.filled().len() - before) as u64;
                if n == 0 {
                    if !this.finished {
                        this.finished = true;
                        this.report();
                        this.end(StreamEnd::Eof);
                    }
                } else {
                    this.total += n;
                    metrics::BYTES_STREAMED.inc_by(n);
                    if this.total - this.reported >= REPORT_INTERVAL {
                        this.report();
                    }
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => {
                this.end(StreamEnd::Failed(io::Error::new(e.kind(), e.to_string())));
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for ProgressReader<R> {
    fn drop(&mut self) {
        self.end(StreamEnd::Dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_reports_total_at_eof() {
        let (tx, mut rx) = mpsc::channel(16);
        let data = vec![7u8; 600 * 1024];
        let mut reader = ProgressReader::new(&data[..], Some(tx));

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), data.len());
        drop(reader);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(events.len() >= 2);
        assert!(matches!(
            events.last(),
            Some(DownloadProgress::Bytes(n)) if *n == data.len() as u64
        ));
    }

    #[tokio::test]
    async fn test_watch_reports_eof_and_drop() {
        let mut reader = ProgressReader::new(&b"abc"[..], None);
        let done = reader.watch();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert!(matches!(done.await, Ok(StreamEnd::Eof)));

        let mut reader = ProgressReader::new(&b"abc"[..], None);
        let done = reader.watch();
        let mut first = [0u8; 1];
        reader.read_exact(&mut first).await.unwrap();
        drop(reader);
        assert!(matches!(done.await, Ok(StreamEnd::Dropped)));
    }

    #[tokio::test]
    async fn test_cancel_ends_pending_read_at_eof() {
        let (_writer, pipe) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let mut reader = ProgressReader::new(pipe, None).with_cancel(cancel.clone());
        let done = reader.watch();

        let read = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            reader.read(&mut buf).await
        });
        cancel.cancel();

        assert_eq!(read.await.unwrap().unwrap(), 0);
        assert!(matches!(done.await, Ok(StreamEnd::Dropped)));
    }

    #[tokio::test]
    async fn test_source_error_is_reported() {
        let source = tokio_test::io::Builder::new()
            .read(b"abc")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = ProgressReader::new(source, None);
        let done = reader.watch();

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(out, b"abc");
        assert!(matches!(
            done.await,
            Ok(StreamEnd::Failed(e)) if e.kind() == io::ErrorKind::ConnectionReset
        ));
    }

    #[tokio::test]
    async fn test_without_channel() {
        let mut reader = ProgressReader::new(&b"abc"[..], None);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abc");
    }
}
