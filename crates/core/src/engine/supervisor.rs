//! Engine process supervision.
//!
//! One supervisor task per run owns the child process, the input feeders and
//! the stderr reader. Every way a run can end (success, failure, caller
//! cancellation, output dropped early) goes through the same teardown: the
//! process is reaped, the feeders and the stderr reader are joined, and only
//! then does [`Completion::wait`] resolve.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::output::EngineOutput;
use super::pipes::ExtraPipes;
use super::stderr;
use super::types::{EngineInvocation, EngineProgress, InputReader};
use crate::metrics;
use crate::pipeline::PipelineSpec;

const FEED_BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on waiting for stderr EOF once the engine has been reaped.
/// Only reached when a grandchild process still holds the pipe open.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

type InputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Starts and supervises engine processes.
#[derive(Debug, Clone)]
pub struct Supervisor {
    config: Arc<EngineConfig>,
}

impl Supervisor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lowers `spec` to an ffmpeg invocation and starts it.
    pub fn start_pipeline(
        &self,
        cancel: &CancellationToken,
        spec: PipelineSpec,
        progress: Option<mpsc::Sender<EngineProgress>>,
    ) -> Result<EngineHandle, EngineError> {
        let mut invocation = spec.into_invocation(&self.config)?;
        invocation.progress = progress;
        self.start(cancel, invocation)
    }

    /// Spawns the engine and returns once it is running.
    ///
    /// The returned handle's output must be read (or dropped) by the caller;
    /// the run's outcome is reported by [`Completion::wait`].
    pub fn start(
        &self,
        cancel: &CancellationToken,
        invocation: EngineInvocation,
    ) -> Result<EngineHandle, EngineError> {
        let EngineInvocation {
            program,
            args,
            inputs,
            label,
            progress,
        } = invocation;

        if program.as_os_str().is_empty() {
            return Err(EngineError::invalid_spec("engine program is empty"));
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        #[cfg(not(unix))]
        if inputs.len() > 1 {
            return Err(EngineError::Unsupported {
                reason: format!("{} inputs need descriptor inheritance", inputs.len()),
            });
        }

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(if inputs.is_empty() {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let spawn_error = |e: io::Error| {
            if e.kind() == io::ErrorKind::NotFound {
                EngineError::EngineNotFound {
                    path: program.clone(),
                }
            } else {
                EngineError::Spawn {
                    program: program.display().to_string(),
                    source: e,
                }
            }
        };

        let extra = ExtraPipes::attach(&mut command, inputs.len().saturating_sub(1))
            .map_err(spawn_error)?;
        let mut child = command.spawn().map_err(spawn_error)?;
        let pipe_writers = extra.into_writers();
        let pid = child.id();
        debug!(engine = %label, pid, ?args, "Engine started");

        let missing =
            |name: &str| EngineError::Io(io::Error::other(format!("engine {} not captured", name)));
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let mut sinks: Vec<InputSink> = Vec::with_capacity(inputs.len());
        if let Some(stdin) = child.stdin.take() {
            sinks.push(Box::new(stdin));
        }
        sinks.extend(pipe_writers.into_iter().map(|w| Box::new(w) as InputSink));

        let teardown = cancel.child_token();
        let closed_early = Arc::new(AtomicBool::new(false));

        let feeders = inputs
            .into_iter()
            .zip(sinks)
            .enumerate()
            .map(|(index, (reader, sink))| {
                tokio::spawn(feed_input(
                    index,
                    reader,
                    sink,
                    teardown.clone(),
                    label.clone(),
                ))
            })
            .collect();

        let stderr_task = tokio::spawn(stderr::capture(
            stderr,
            self.config.stderr_capture_bytes,
            label.clone(),
            progress,
        ));

        metrics::ENGINE_PROCESSES_ACTIVE.inc();

        let run = Run {
            child,
            label,
            cancel: cancel.clone(),
            teardown: teardown.clone(),
            closed_early: closed_early.clone(),
            grace: self.config.terminate_grace(),
            feeders,
            stderr_task,
        };

        Ok(EngineHandle {
            output: EngineOutput::new(stdout, teardown, closed_early),
            completion: Completion {
                task: tokio::spawn(run.supervise()),
                pid,
            },
        })
    }
}

/// A running engine: its output stream and its completion.
#[derive(Debug)]
pub struct EngineHandle {
    output: EngineOutput,
    completion: Completion,
}

impl EngineHandle {
    pub fn pid(&self) -> Option<u32> {
        self.completion.pid
    }

    pub fn output_mut(&mut self) -> &mut EngineOutput {
        &mut self.output
    }

    pub fn into_parts(self) -> (EngineOutput, Completion) {
        (self.output, self.completion)
    }

    /// Drops the output and waits for the run to end.
    pub async fn wait(self) -> Result<(), EngineError> {
        let (output, completion) = self.into_parts();
        drop(output);
        completion.wait().await
    }
}

/// Resolves once the engine has been reaped and every helper task joined.
#[derive(Debug)]
pub struct Completion {
    task: JoinHandle<Result<(), EngineError>>,
    pid: Option<u32>,
}

impl Completion {
    /// OS process id of the engine, while it was running.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub async fn wait(self) -> Result<(), EngineError> {
        self.task.await.map_err(|e| {
            EngineError::Io(io::Error::other(format!("supervisor task failed: {}", e)))
        })?
    }
}

struct Run {
    child: Child,
    label: String,
    cancel: CancellationToken,
    teardown: CancellationToken,
    closed_early: Arc<AtomicBool>,
    grace: Duration,
    feeders: Vec<JoinHandle<io::Result<u64>>>,
    stderr_task: JoinHandle<String>,
}

impl Run {
    async fn supervise(mut self) -> Result<(), EngineError> {
        let (status, terminated) = tokio::select! {
            status = self.child.wait() => (status, false),
            _ = self.teardown.cancelled() => {
                (terminate(&mut self.child, self.grace, &self.label).await, true)
            }
        };

        // Stops any feeder still blocked on a source or on the engine.
        self.teardown.cancel();

        let mut input_error = None;
        for (index, feeder) in self.feeders.drain(..).enumerate() {
            match feeder.await {
                Ok(Ok(bytes)) => debug!(engine = %self.label, index, bytes, "Input fed"),
                Ok(Err(source)) => {
                    warn!(engine = %self.label, index, error = %source, "Input failed");
                    if input_error.is_none() {
                        input_error = Some(EngineError::Input { index, source });
                    }
                }
                Err(e) => warn!(engine = %self.label, index, error = %e, "Feeder task failed"),
            }
        }

        let stderr = match timeout(STDERR_DRAIN_TIMEOUT, &mut self.stderr_task).await {
            Ok(Ok(tail)) => tail,
            Ok(Err(e)) => {
                warn!(engine = %self.label, error = %e, "Stderr task failed");
                String::new()
            }
            Err(_) => {
                warn!(engine = %self.label, "Stderr still open after exit");
                self.stderr_task.abort();
                String::new()
            }
        };

        metrics::ENGINE_PROCESSES_ACTIVE.dec();

        let result = match status {
            Err(e) => Err(EngineError::Io(e)),
            Ok(_) if terminated => Err(EngineError::Cancelled),
            Ok(status) if status.success() => input_error.map_or(Ok(()), Err),
            Ok(_) if self.cancel.is_cancelled() || self.closed_early.load(Ordering::SeqCst) => {
                Err(EngineError::Cancelled)
            }
            Ok(status) => Err(EngineError::Failed {
                status: status.code(),
                stderr,
            }),
        };

        let outcome = match &result {
            Ok(()) => "success",
            Err(EngineError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        metrics::ENGINE_EXITS.with_label_values(&[outcome]).inc();
        debug!(engine = %self.label, outcome, "Engine reaped");

        result
    }
}

/// Sends SIGTERM, then kills the engine if it is still alive after `grace`.
#[cfg_attr(not(unix), allow(unused_variables))]
async fn terminate(child: &mut Child, grace: Duration, label: &str) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: the pid belongs to our child, which has not been reaped yet.
        let sent = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } == 0;
        if sent {
            debug!(engine = %label, pid, "Sent SIGTERM");
            match timeout(grace, child.wait()).await {
                Ok(status) => return status,
                Err(_) => warn!(engine = %label, pid, "Engine ignored SIGTERM, killing"),
            }
        }
    }

    child.kill().await?;
    child.wait().await
}

/// Copies one source into one engine input until EOF or teardown.
///
/// Only read errors are reported; the engine closing its input early is how
/// it signals it needs no more data.
async fn feed_input(
    index: usize,
    mut reader: InputReader,
    mut sink: InputSink,
    teardown: CancellationToken,
    label: String,
) -> io::Result<u64> {
    let mut buf = vec![0u8; FEED_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = tokio::select! {
            _ = teardown.cancelled() => return Ok(total),
            read = reader.read(&mut buf) => read?,
        };
        if n == 0 {
            break;
        }

        let written = tokio::select! {
            _ = teardown.cancelled() => return Ok(total),
            written = sink.write_all(&buf[..n]) => written,
        };
        if let Err(e) = written {
            debug!(engine = %label, index, error = %e, "Engine closed input");
            return Ok(total);
        }
        total += n as u64;
    }

    if let Err(e) = sink.shutdown().await {
        debug!(engine = %label, index, error = %e, "Closing input failed");
    }
    Ok(total)
}
