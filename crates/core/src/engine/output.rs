//! Read side of the engine's stdout.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::ChildStdout;
use tokio_util::sync::CancellationToken;

/// Engine output stream.
///
/// Dropping it before EOF tears the run down: the engine is terminated and
/// the completion resolves to `Cancelled`.
#[derive(Debug)]
pub struct EngineOutput {
    stdout: ChildStdout,
    teardown: CancellationToken,
    closed_early: Arc<AtomicBool>,
    eof: bool,
}

impl EngineOutput {
    pub(crate) fn new(
        stdout: ChildStdout,
        teardown: CancellationToken,
        closed_early: Arc<AtomicBool>,
    ) -> Self {
        Self {
            stdout,
            teardown,
            closed_early,
            eof: false,
        }
    }

    /// Whether the engine has closed its output.
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl AsyncRead for EngineOutput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let wants = buf.remaining() > 0;
        let poll = Pin::new(&mut self.stdout).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            if wants && buf.filled().len() == before {
                self.eof = true;
            }
        }
        poll
    }
}

impl Drop for EngineOutput {
    fn drop(&mut self) {
        if !self.eof {
            self.closed_early.store(true, Ordering::SeqCst);
            self.teardown.cancel();
        }
    }
}
