//! Types describing one engine run.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

/// Byte source fed to the engine.
pub type InputReader = Box<dyn AsyncRead + Send + Unpin>;

/// A fully lowered engine command: program, arguments and the readers that
/// feed its inputs. Input 0 is fed on stdin, input `n` on descriptor `2 + n`.
pub struct EngineInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub inputs: Vec<InputReader>,
    /// Short description used in log lines.
    pub label: String,
    /// Receives parsed `-progress` updates, if set.
    pub progress: Option<mpsc::Sender<EngineProgress>>,
}

impl EngineInvocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            label: program.display().to_string(),
            program,
            args,
            inputs: Vec::new(),
            progress: None,
        }
    }

    pub fn with_input(mut self, reader: InputReader) -> Self {
        self.inputs.push(reader);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EngineProgress>) -> Self {
        self.progress = Some(tx);
        self
    }
}

impl fmt::Debug for EngineInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInvocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("inputs", &self.inputs.len())
            .field("label", &self.label)
            .finish()
    }
}

/// Engine URL for input `index`.
pub fn input_url(index: usize) -> String {
    if index == 0 {
        "pipe:0".to_string()
    } else {
        format!("pipe:{}", index + 2)
    }
}

/// Progress reported by the engine while it runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineProgress {
    /// Output timestamp reached so far.
    pub out_time: Duration,
    /// Bytes written to the output so far.
    pub total_size: Option<u64>,
    /// Processing speed, e.g. "1.5x".
    pub speed: Option<String>,
    /// Whether this is the final report.
    pub finished: bool,
}
