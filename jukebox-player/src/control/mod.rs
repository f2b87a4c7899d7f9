//! External control sources: OS signals, hardware input

pub mod input;
pub mod signals;

pub use input::{HardwareInputWatcher, InputLevel};
pub use signals::SignalRouter;
