//! Child process event loop
//!
//! One cooperative loop on a single thread. Each [`step`](EventLoop::step):
//!
//! ```text
//! ┌─► heartbeat line to the watchdog (flushed)
//! │   drain pending player events → controller
//! │   bounded wait (tick interval):
//! │     ├─ routed signal  → run its callbacks
//! │     ├─ hardware edge  → play / pause
//! │     └─ timeout        → nothing
//! └── until the shutdown token is cancelled
//! ```
//!
//! The bounded wait is the only suspension point, so shutdown latency is at
//! most one tick.

use crate::control::signals::{signal_name, skip_signal, termination_signals, toggle_signal};
use crate::control::{HardwareInputWatcher, InputLevel, SignalRouter};
use crate::playback::{PlaybackController, PlaybackState, Player};
use crate::supervisor::Heartbeat;
use std::io;
use std::time::Duration;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Upper bound on player events handled per tick
const MAX_EVENTS_PER_TICK: usize = 64;

enum Wake {
    Signal(SignalKind),
    Input(InputLevel),
    Tick,
}

pub struct EventLoop<P: Player> {
    controller: PlaybackController<P>,
    router: SignalRouter<PlaybackController<P>>,
    input: Option<HardwareInputWatcher>,
    heartbeat: Heartbeat,
    shutdown: CancellationToken,
    tick: Duration,
}

impl<P: Player> EventLoop<P> {
    /// Loop with no signals, no hardware input and no heartbeat
    pub fn new(controller: PlaybackController<P>, shutdown: CancellationToken, tick: Duration) -> Self {
        Self {
            controller,
            router: SignalRouter::new(),
            input: None,
            heartbeat: Heartbeat::disabled(),
            shutdown,
            tick,
        }
    }

    pub fn with_router(mut self, router: SignalRouter<PlaybackController<P>>) -> Self {
        self.router = router;
        self
    }

    pub fn with_input(mut self, input: Option<HardwareInputWatcher>) -> Self {
        self.input = input;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn controller(&self) -> &PlaybackController<P> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<P> {
        &mut self.controller
    }

    /// Run until shutdown is requested, then stop playback
    pub async fn run(&mut self) {
        info!(
            "Ready to dance ({} track(s), input {})",
            self.controller.playlist().len(),
            self.input
                .as_ref()
                .map_or_else(|| "disabled".to_string(), |i| i.path().display().to_string())
        );

        while !self.shutdown.is_cancelled() {
            self.step().await;
        }

        if self.controller.state() != PlaybackState::Stopped {
            self.controller.stop();
        }
        info!("Event loop stopped");
    }

    /// One loop iteration
    pub async fn step(&mut self) {
        self.heartbeat.beat();

        for _ in 0..MAX_EVENTS_PER_TICK {
            match self.controller.player_mut().poll_event() {
                Some(event) => self.controller.on_player_event(event),
                None => break,
            }
        }

        let wake = match self.input.as_mut() {
            Some(input) => tokio::select! {
                kind = self.router.recv() => Wake::Signal(kind),
                level = input.poll(self.tick) => level.map_or(Wake::Tick, Wake::Input),
            },
            None => tokio::select! {
                kind = self.router.recv() => Wake::Signal(kind),
                _ = tokio::time::sleep(self.tick) => Wake::Tick,
            },
        };

        match wake {
            Wake::Signal(kind) => {
                debug!("Got {}", signal_name(kind));
                self.router.dispatch(kind, &mut self.controller);
            }
            Wake::Input(level) => self.controller.apply_input(level),
            Wake::Tick => {}
        }
    }
}

/// Wire the player's signals: toggle, skip, and graceful shutdown
pub fn install_player_signals<P: Player + 'static>(
    router: &mut SignalRouter<PlaybackController<P>>,
    shutdown: &CancellationToken,
) -> io::Result<()> {
    router.register(toggle_signal(), |controller| controller.toggle())?;
    router.register(skip_signal(), |controller| controller.next())?;
    for kind in termination_signals() {
        let shutdown = shutdown.clone();
        router.register(kind, move |_| {
            info!("Got {}, shutting down player", signal_name(kind));
            shutdown.cancel();
        })?;
    }
    Ok(())
}
