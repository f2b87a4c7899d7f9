//! Process supervision: watchdog parent, heartbeat protocol, child handle

pub mod child;
pub mod heartbeat;
pub mod watchdog;

pub use child::{child_arguments, ChildCommand, ChildProcessHandle, CHILD_FLAG};
pub use heartbeat::{Heartbeat, HEARTBEAT_LINE};
pub use watchdog::{
    install_watchdog_signals, SupervisionOutcome, Watchdog, WatchdogConfig, CONFIG_EXIT_CODE,
};
