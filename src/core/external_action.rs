//! Invocation of the external automation tool.
//!
//! The tool runs as a child process with stdout and stderr joined into one
//! pipe, so the captured text interleaves exactly as it would on a terminal.
//! A run that outlives its timeout is killed, together with every worker it
//! forked, and reported as [`DeckError::TimedOut`].

use crate::core::error::DeckError;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Captured result of one playbook execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Combined stdout/stderr, lossily decoded as UTF-8
    pub output: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Seam between the playbook service and the process that executes playbooks.
pub trait PlaybookExecutor: Send + Sync {
    /// Run `playbook`, passing `inventory` as `-i` when given.
    fn run(&self, playbook: &Path, inventory: Option<&Path>) -> Result<RunOutcome, DeckError>;
}

#[derive(Debug, Clone)]
pub struct AnsibleExecutor {
    program: String,
    timeout: Duration,
}

impl AnsibleExecutor {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, playbook: &Path, inventory: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(inventory) = inventory {
            cmd.arg("-i").arg(inventory);
        }
        cmd.arg(playbook);
        isolate(&mut cmd);
        cmd
    }

    fn describe(&self, playbook: &Path) -> String {
        format!("{} {}", self.program, playbook.display())
    }
}

impl PlaybookExecutor for AnsibleExecutor {
    fn run(&self, playbook: &Path, inventory: Option<&Path>) -> Result<RunOutcome, DeckError> {
        let (mut reader, writer) = io::pipe()?;
        let mut child = {
            let mut cmd = self.command(playbook, inventory);
            cmd.stdin(Stdio::null())
                .stdout(writer.try_clone()?)
                .stderr(writer);
            cmd.spawn()?
            // `cmd` drops here, closing the parent's copies of the write end.
        };

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let read = reader.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(read);
        });

        let captured = match rx.recv_timeout(self.timeout) {
            Ok(read) => read?,
            Err(RecvTimeoutError::Timeout) => {
                kill_group(&mut child);
                let _ = child.wait();
                tracing::warn!(
                    command = %self.describe(playbook),
                    timeout_secs = self.timeout.as_secs(),
                    "Playbook run timed out; process group killed"
                );
                return Err(DeckError::TimedOut {
                    command: self.describe(playbook),
                    after: self.timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                kill_group(&mut child);
                let _ = child.wait();
                return Err(DeckError::IoError(io::Error::other(
                    "output reader stopped before the run finished",
                )));
            }
        };

        let status = child.wait()?;
        Ok(RunOutcome {
            output: String::from_utf8_lossy(&captured).into_owned(),
            exit_code: status.code(),
            success: status.success(),
        })
    }
}

/// Start the child as the leader of a new process group, so the workers it
/// forks can be stopped with it.
#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    // SAFETY: plain syscall; a negative pid addresses the group led by the child.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}
