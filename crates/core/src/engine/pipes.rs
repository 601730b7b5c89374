//! Extra input pipes handed to the engine on descriptors 3 and up.

use std::io;
use tokio::process::Command;

#[cfg(unix)]
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
#[cfg(unix)]
use tokio::net::unix::pipe;

/// First descriptor used for inputs after stdin.
#[cfg(unix)]
const FIRST_EXTRA_FD: RawFd = 3;

/// Write ends of the extra input pipes, plus the read ends until the child
/// has been spawned.
#[cfg(unix)]
pub(crate) struct ExtraPipes {
    child_ends: Vec<std::io::PipeReader>,
    writers: Vec<pipe::Sender>,
}

#[cfg(unix)]
impl ExtraPipes {
    /// Creates `count` pipes and arranges for their read ends to appear as
    /// descriptors `3..3 + count` in the child.
    pub(crate) fn attach(command: &mut Command, count: usize) -> io::Result<Self> {
        let mut child_ends = Vec::with_capacity(count);
        let mut writers = Vec::with_capacity(count);

        for _ in 0..count {
            let (reader, writer) = std::io::pipe()?;
            writers.push(pipe::Sender::from_owned_fd(OwnedFd::from(writer))?);
            child_ends.push(reader);
        }

        if count > 0 {
            let sources: Vec<RawFd> = child_ends.iter().map(|r| r.as_raw_fd()).collect();
            let floor = FIRST_EXTRA_FD + count as RawFd;
            let mut staged: Vec<RawFd> = vec![-1; count];

            // Descriptors are first moved above the target range so a source
            // that already sits on a target number is not clobbered by dup2.
            // Only async-signal-safe calls run between fork and exec.
            unsafe {
                command.pre_exec(move || {
                    for (slot, fd) in staged.iter_mut().zip(&sources) {
                        let moved = libc::fcntl(*fd, libc::F_DUPFD_CLOEXEC, floor);
                        if moved < 0 {
                            return Err(io::Error::last_os_error());
                        }
                        *slot = moved;
                    }
                    for (i, fd) in staged.iter().enumerate() {
                        if libc::dup2(*fd, FIRST_EXTRA_FD + i as RawFd) < 0 {
                            return Err(io::Error::last_os_error());
                        }
                    }
                    Ok(())
                });
            }
        }

        Ok(Self {
            child_ends,
            writers,
        })
    }

    /// Closes the parent's copies of the read ends and returns the writers.
    /// Call after the child has been spawned.
    pub(crate) fn into_writers(self) -> Vec<pipe::Sender> {
        drop(self.child_ends);
        self.writers
    }
}

/// Multi-input runs need descriptor inheritance, which is unix only.
#[cfg(not(unix))]
pub(crate) struct ExtraPipes;

#[cfg(not(unix))]
impl ExtraPipes {
    pub(crate) fn attach(_command: &mut Command, count: usize) -> io::Result<Self> {
        if count > 0 {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "multiple engine inputs require unix descriptor inheritance",
            ));
        }
        Ok(Self)
    }

    pub(crate) fn into_writers(self) -> Vec<tokio::process::ChildStdin> {
        Vec::new()
    }
}
