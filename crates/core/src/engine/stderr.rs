//! Engine stderr capture and `-progress` parsing.

use regex_lite::Regex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::types::EngineProgress;

/// Keeps the last `capacity` bytes written to it.
#[derive(Debug)]
pub(crate) struct TailBuffer {
    buf: String,
    capacity: usize,
    truncated: bool,
}

impl TailBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: String::new(),
            capacity,
            truncated: false,
        }
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.buf.push_str(text);
        if self.buf.len() > self.capacity {
            let mut cut = self.buf.len() - self.capacity;
            while !self.buf.is_char_boundary(cut) {
                cut += 1;
            }
            self.buf.drain(..cut);
            self.truncated = true;
        }
    }

    pub(crate) fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub(crate) fn into_string(self) -> String {
        self.buf
    }
}

/// Accumulates `key=value` progress lines into [`EngineProgress`] reports.
pub(crate) struct ProgressParser {
    line: Option<Regex>,
    current: EngineProgress,
}

impl ProgressParser {
    pub(crate) fn new() -> Self {
        Self {
            line: Regex::new(r"^([a-z0-9_]+)=(\S*)$").ok(),
            current: EngineProgress::default(),
        }
    }

    /// Feeds one stderr line. Returns `None` when the line is not part of a
    /// progress block, `Some(None)` for a progress key, and `Some(Some(_))`
    /// when a block is complete.
    pub(crate) fn feed(&mut self, line: &str) -> Option<Option<EngineProgress>> {
        let caps = self.line.as_ref()?.captures(line)?;
        let value = caps.get(2).map_or("", |m| m.as_str());

        match caps.get(1).map_or("", |m| m.as_str()) {
            // out_time_ms is reported in microseconds as well
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<u64>() {
                    self.current.out_time = Duration::from_micros(us);
                }
            }
            "total_size" => self.current.total_size = value.parse().ok(),
            "speed" => {
                self.current.speed = Some(value.to_string()).filter(|s| s != "N/A");
            }
            "progress" => {
                self.current.finished = value == "end";
                return Some(Some(self.current.clone()));
            }
            _ => {}
        }

        Some(None)
    }
}

/// Reads engine stderr to EOF. Diagnostics go to the returned tail, progress
/// blocks to `progress`.
pub(crate) async fn capture<R>(
    stderr: R,
    capacity: usize,
    label: String,
    progress: Option<mpsc::Sender<EngineProgress>>,
) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut tail = TailBuffer::new(capacity);
    let mut parser = ProgressParser::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                match parser.feed(text.trim_end()) {
                    Some(Some(update)) => {
                        if let Some(ref tx) = progress {
                            // Non-blocking send
                            let _ = tx.try_send(update);
                        }
                    }
                    Some(None) => {}
                    None => {
                        trace!(engine = %label, "{}", text.trim_end());
                        tail.push(&text);
                    }
                }
            }
            Err(e) => {
                debug!(engine = %label, error = %e, "stderr read failed");
                break;
            }
        }
    }

    if tail.is_truncated() {
        debug!(engine = %label, capacity, "stderr tail truncated");
    }
    tail.into_string()
}
