//! Transcode engine supervision.
//!
//! This module runs ffmpeg (and ffprobe for inspection) as child processes fed
//! from async readers. A [`Supervisor`] owns each run end to end: it spawns
//! the process with its inputs on stdin and inherited pipes, exposes stdout as
//! an [`EngineOutput`], and reaps the process and every helper task before the
//! run's [`Completion`] resolves.
//!
//! # Example
//!
//! ```ignore
//! use mediabroker_core::engine::{EngineConfig, EngineInvocation, Supervisor};
//! use tokio_util::sync::CancellationToken;
//!
//! let supervisor = Supervisor::new(EngineConfig::default());
//! let cancel = CancellationToken::new();
//!
//! let invocation = EngineInvocation::new("ffmpeg", args).with_input(Box::new(source));
//! let (mut output, completion) = supervisor.start(&cancel, invocation)?.into_parts();
//!
//! tokio::io::copy(&mut output, &mut sink).await?;
//! drop(output);
//! completion.wait().await?;
//! ```

mod config;
mod error;
mod output;
mod pipes;
mod probe;
mod stderr;
mod supervisor;
mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use output::EngineOutput;
pub use probe::{parse_probe_output, probe, ProbeHints, ProbeResult, ProbeStream};
pub use supervisor::{Completion, EngineHandle, Supervisor};
pub use types::{input_url, EngineInvocation, EngineProgress, InputReader};
