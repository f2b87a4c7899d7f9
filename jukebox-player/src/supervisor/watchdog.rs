//! Watchdog: keeps the player child alive
//!
//! ```text
//! run() ──► spawn child ──► supervise(child)
//!               ▲              │
//!               │              ├─ heartbeat within timeout ─► keep waiting
//!               │              ├─ no heartbeat             ─► SIGKILL, Hung
//!               │              ├─ pipe closed              ─► wait for exit status
//!               │              └─ SIGTERM / SIGINT         ─► Shutdown (child left alone)
//!               │              ▼
//!               │          try_reap, close pipe
//!               └── restart_delay ◄── Hung or unsuccessful exit
//! ```
//!
//! A clean exit (status 0) is final, like a graceful shutdown: the child only
//! exits successfully after it was asked to stop. So is [`CONFIG_EXIT_CODE`]:
//! a child that rejects its configuration would fail the same way again.

use crate::control::signals::{signal_name, skip_signal, termination_signals, toggle_signal};
use crate::control::SignalRouter;
use crate::error::Result;
use crate::supervisor::child::{ChildCommand, ChildProcessHandle};
use jukebox_common::TomlConfig;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Exit status of a child that cannot start with its configuration
/// (`EX_CONFIG` from sysexits.h)
pub const CONFIG_EXIT_CODE: i32 = 78;

/// Timing for the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Longest accepted silence between two heartbeats
    pub heartbeat_timeout: Duration,

    /// Pause before a failed child is replaced
    pub restart_delay: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_millis(2500),
            restart_delay: Duration::from_secs(1),
        }
    }
}

impl From<&TomlConfig> for WatchdogConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            heartbeat_timeout: config.heartbeat_timeout(),
            restart_delay: config.restart_delay(),
        }
    }
}

/// How one supervised child run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// The watchdog itself was asked to stop
    Shutdown,

    /// No heartbeat within the timeout; the child was killed
    Hung,

    /// The child exited on its own
    Exited(ExitStatus),
}

impl SupervisionOutcome {
    pub fn restart_requested(&self) -> bool {
        match self {
            SupervisionOutcome::Shutdown => false,
            SupervisionOutcome::Hung => true,
            SupervisionOutcome::Exited(status) => {
                !status.success() && status.code() != Some(CONFIG_EXIT_CODE)
            }
        }
    }

    /// The child exited because its configuration is unusable
    pub fn is_configuration_failure(&self) -> bool {
        matches!(self, SupervisionOutcome::Exited(status) if status.code() == Some(CONFIG_EXIT_CODE))
    }
}

pub struct Watchdog {
    config: WatchdogConfig,
    command: ChildCommand,
    shutdown: CancellationToken,
    router: SignalRouter<()>,
    restarts: u64,
}

impl Watchdog {
    /// Watchdog without signal handling; see [`install_watchdog_signals`]
    pub fn new(config: WatchdogConfig, command: ChildCommand, shutdown: CancellationToken) -> Self {
        Self {
            config,
            command,
            shutdown,
            router: SignalRouter::new(),
            restarts: 0,
        }
    }

    pub fn with_router(mut self, router: SignalRouter<()>) -> Self {
        self.router = router;
        self
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Number of times a child has been replaced
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Spawn and supervise children until a run ends without requesting a
    /// restart
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            let mut child = self.command.spawn()?;
            info!("Started player (pid {})", describe_pid(&child));

            let outcome = self.supervise(&mut child).await;
            drop(child);

            if outcome.is_configuration_failure() {
                error!("Player rejected its configuration, not restarting");
                return Ok(());
            }
            if !outcome.restart_requested() {
                info!("Watchdog done: {:?}", outcome);
                return Ok(());
            }

            warn!("Player {:?}, restarting", outcome);
            if !self.pause(self.config.restart_delay).await {
                return Ok(());
            }
            self.restarts += 1;
        }
    }

    /// Wait on `child`'s heartbeats until it hangs, exits or the watchdog is
    /// asked to stop
    ///
    /// The child is reaped without blocking before returning; a child that is
    /// still running is left for the caller.
    pub async fn supervise(&mut self, child: &mut ChildProcessHandle) -> SupervisionOutcome {
        let timeout = self.config.heartbeat_timeout;
        let mut deadline = Instant::now() + timeout;

        let outcome = loop {
            if self.shutdown.is_cancelled() {
                info!("Watchdog stopping, player (pid {}) not restarted", describe_pid(child));
                break SupervisionOutcome::Shutdown;
            }

            tokio::select! {
                biased;
                kind = self.router.recv() => {
                    self.router.dispatch(kind, &mut ());
                }
                _ = self.shutdown.cancelled() => {}
                heartbeat = timeout_at(deadline, child.next_heartbeat()) => match heartbeat {
                    Ok(Ok(Some(_))) => {
                        deadline = Instant::now() + timeout;
                    }
                    Ok(Ok(None)) => {
                        debug!("Heartbeat pipe closed");
                        break await_exit(child, deadline).await;
                    }
                    Ok(Err(e)) => {
                        warn!("Heartbeat read failed: {}", e);
                        break await_exit(child, deadline).await;
                    }
                    Err(_) => {
                        warn!(
                            "No heartbeat from player (pid {}) for {:?}, killing it",
                            describe_pid(child),
                            timeout
                        );
                        kill(child);
                        break SupervisionOutcome::Hung;
                    }
                },
            }
        };

        match child.try_reap() {
            Ok(Some(status)) => debug!("Reaped player: {}", status),
            Ok(None) => {}
            Err(e) => debug!("Reap failed: {}", e),
        }
        outcome
    }

    /// Sleep for `delay` while still serving signals; false if shutdown was
    /// requested meanwhile
    async fn pause(&mut self, delay: Duration) -> bool {
        let until = Instant::now() + delay;
        loop {
            if self.shutdown.is_cancelled() {
                return false;
            }
            tokio::select! {
                biased;
                kind = self.router.recv() => {
                    self.router.dispatch(kind, &mut ());
                }
                _ = self.shutdown.cancelled() => {}
                _ = sleep_until(until) => return true,
            }
        }
    }
}

/// The pipe is closed: collect the exit status before `deadline`
async fn await_exit(child: &mut ChildProcessHandle, deadline: Instant) -> SupervisionOutcome {
    match timeout_at(deadline, child.wait()).await {
        Ok(Ok(status)) if status.success() => {
            info!("Player exited cleanly");
            SupervisionOutcome::Exited(status)
        }
        Ok(Ok(status)) => {
            warn!("Player exited with {}", status);
            SupervisionOutcome::Exited(status)
        }
        Ok(Err(e)) => {
            warn!("Cannot wait for player: {}, killing it", e);
            kill(child);
            SupervisionOutcome::Hung
        }
        Err(_) => {
            warn!("Player closed its heartbeat pipe but keeps running, killing it");
            kill(child);
            SupervisionOutcome::Hung
        }
    }
}

fn kill(child: &mut ChildProcessHandle) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill player (pid {}): {}", describe_pid(child), e);
    }
}

fn describe_pid(child: &ChildProcessHandle) -> String {
    child
        .pid()
        .map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
}

/// Watchdog signals: termination requests shutdown, toggle/skip are ignored
/// so that a signal sent to the whole process group only reaches the player
pub fn install_watchdog_signals(
    router: &mut SignalRouter<()>,
    shutdown: &CancellationToken,
) -> io::Result<()> {
    router.ignore(toggle_signal())?;
    router.ignore(skip_signal())?;
    for kind in termination_signals() {
        let shutdown = shutdown.clone();
        router.register(kind, move |_| {
            info!("Got {}, shutting down watchdog", signal_name(kind));
            shutdown.cancel();
        })?;
    }
    Ok(())
}
