//! Jukebox - Main entry point
//!
//! Without `--no-watchdog` the process becomes the watchdog and re-executes
//! itself with the hidden `--child` flag; the child runs the player and
//! reports heartbeats on its stdout. Logs always go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use jukebox_common::{ConfigOverrides, TomlConfig};
use jukebox_player::audio::AudioPlayer;
use jukebox_player::control::{HardwareInputWatcher, SignalRouter};
use jukebox_player::playback::{PlaybackController, Playlist, TrackRef};
use jukebox_player::supervisor::{
    child_arguments, install_watchdog_signals, ChildCommand, Heartbeat, Watchdog, WatchdogConfig,
    CONFIG_EXIT_CODE,
};
use jukebox_player::{install_player_signals, EventLoop};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

const NO_FILES_MESSAGE: &str = "You need to specify at least one music file";

/// Level used until the configuration is loaded
const DEFAULT_LOG_LEVEL: &str = "info";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Command-line arguments for jukebox
#[derive(Parser, Debug)]
#[command(name = "jukebox")]
#[command(about = "Headless music player controlled by signals and a hardware button")]
#[command(version)]
struct Args {
    /// Music files, played in order
    files: Vec<PathBuf>,

    /// Sysfs-style value file to watch (e.g. /sys/class/gpio/gpio17/value)
    #[arg(short, long, env = "JUKEBOX_POLL")]
    poll: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "JUKEBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Keep the playlist order when it wraps around
    #[arg(long)]
    no_shuffle: bool,

    /// Start playing immediately
    #[arg(long)]
    autoplay: bool,

    /// Run the player in this process, without supervision
    #[arg(long)]
    no_watchdog: bool,

    /// Supervised child mode (set by the watchdog)
    #[arg(long, hide = true)]
    child: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_filter = init_tracing();

    if args.files.is_empty() {
        println!("{}", NO_FILES_MESSAGE);
        std::process::exit(1);
    }

    let config = load_config(&args).unwrap_or_else(|e| exit_misconfigured(e));
    apply_log_level(&log_filter, &config.logging.level);
    debug!("Configuration: {:?}", config);

    if args.child || args.no_watchdog {
        run_player(&args, &config).await
    } else {
        run_watchdog(&config).await
    }
}

/// Logs go to stderr: in child mode stdout carries the heartbeats
fn init_tracing() -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(DEFAULT_LOG_LEVEL));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

/// Switch to the configured level unless RUST_LOG is set
fn apply_log_level(handle: &FilterHandle, level: &str) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Err(e) = handle.reload(level_filter(level)) {
        warn!("Cannot apply log level {}: {}", level, e);
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("jukebox={level},jukebox_player={level},jukebox_common={level}"))
}

fn load_config(args: &Args) -> Result<TomlConfig> {
    let mut config = TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(ConfigOverrides {
        input_path: args.poll.clone(),
        no_shuffle: args.no_shuffle,
        autoplay: args.autoplay,
    });
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Exit with [`CONFIG_EXIT_CODE`] so the watchdog does not restart the player
fn exit_misconfigured(error: anyhow::Error) -> ! {
    error!("{:#}", error);
    std::process::exit(CONFIG_EXIT_CODE)
}

fn open_input(path: &Path) -> Result<HardwareInputWatcher> {
    HardwareInputWatcher::open(path).with_context(|| format!("Failed to watch {}", path.display()))
}

async fn run_watchdog(config: &TomlConfig) -> Result<()> {
    // Every child would fail on the same input path
    if let Some(path) = &config.input_path {
        open_input(path).unwrap_or_else(|e| exit_misconfigured(e));
    }

    let child_args = child_arguments(std::env::args_os().skip(1));
    let command = ChildCommand::current_exe(child_args).context("Failed to prepare player command")?;

    let shutdown = CancellationToken::new();
    let mut router = SignalRouter::new();
    install_watchdog_signals(&mut router, &shutdown).context("Failed to install signal handlers")?;

    info!("Starting watchdog (pid {})", std::process::id());
    let mut watchdog = Watchdog::new(WatchdogConfig::from(config), command, shutdown).with_router(router);
    watchdog.run().await.context("Watchdog failed")?;

    info!("Watchdog shutdown complete ({} restart(s))", watchdog.restarts());
    Ok(())
}

async fn run_player(args: &Args, config: &TomlConfig) -> Result<()> {
    let tracks = args.files.iter().cloned().map(TrackRef::from).collect();
    let playlist = Playlist::new(tracks, config.shuffle)
        .context("Invalid playlist")
        .unwrap_or_else(|e| exit_misconfigured(e));

    let shutdown = CancellationToken::new();
    let mut router = SignalRouter::new();
    install_player_signals(&mut router, &shutdown).context("Failed to install signal handlers")?;

    let input = config
        .input_path
        .as_deref()
        .map(|path| open_input(path).unwrap_or_else(|e| exit_misconfigured(e)));

    let heartbeat = if args.child {
        Heartbeat::new(std::io::stdout())
    } else {
        Heartbeat::disabled()
    };

    let mut controller = PlaybackController::new(AudioPlayer::new(), playlist);
    if config.autoplay {
        controller.play();
    }

    let mut event_loop = EventLoop::new(controller, shutdown.clone(), config.tick_interval())
        .with_router(router)
        .with_input(input)
        .with_heartbeat(heartbeat);
    event_loop.run().await;

    info!("Player shutdown complete");
    Ok(())
}
