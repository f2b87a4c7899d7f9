//! Supervised child process, parent side

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// Flag that puts the re-executed binary in supervised child mode
pub const CHILD_FLAG: &str = "--child";

/// Child command line: [`CHILD_FLAG`] followed by the watchdog's own arguments
///
/// The flag goes first so a `--` separator in `args` cannot turn it into a
/// positional argument.
pub fn child_arguments<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    std::iter::once(OsString::from(CHILD_FLAG)).chain(args).collect()
}

/// How to launch the supervised child
#[derive(Debug, Clone)]
pub struct ChildCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ChildCommand {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-execute the running binary with `args`
    pub fn current_exe<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let program = std::env::current_exe()
            .map_err(|e| Error::Supervisor(format!("Cannot locate own executable: {}", e)))?;
        Ok(Self::new(program, args))
    }

    /// Spawn the child with its stdout as the heartbeat pipe
    ///
    /// stdin is closed and stderr is shared with the watchdog so the child's
    /// log lines end up in the same place.
    pub fn spawn(&self) -> Result<ChildProcessHandle> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                Error::Supervisor(format!("Failed to spawn {}: {}", self.program.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Supervisor("Child stdout was not piped".to_string()))?;

        Ok(ChildProcessHandle {
            pid: child.id(),
            child,
            heartbeats: BufReader::new(stdout).lines(),
            kills: 0,
        })
    }
}

/// A running child and the read end of its heartbeat pipe
///
/// Dropping the handle closes the pipe. The process itself is left alone;
/// tokio reaps it in the background once it exits.
pub struct ChildProcessHandle {
    pid: Option<u32>,
    child: Child,
    heartbeats: Lines<BufReader<ChildStdout>>,
    kills: u32,
}

impl ChildProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next heartbeat line; `None` once the child closed the pipe
    ///
    /// Cancel safe.
    pub async fn next_heartbeat(&mut self) -> io::Result<Option<String>> {
        self.heartbeats.next_line().await
    }

    /// Send SIGKILL
    pub fn kill(&mut self) -> io::Result<()> {
        self.kills += 1;
        self.child.start_kill()
    }

    /// Number of kill requests sent to this child
    pub fn kill_count(&self) -> u32 {
        self.kills
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Collect the exit status if the child has already exited
    pub fn try_reap(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }
}
