//! Heartbeat channel, child side
//!
//! The protocol is one line per loop iteration; the watchdog only looks at
//! when lines arrive, never at what they say.

use std::io::Write;
use tracing::warn;

/// Line written for every heartbeat
pub const HEARTBEAT_LINE: &str = "alive";

/// Writer end of the heartbeat channel
///
/// A write failure means the supervisor is gone. It is logged once and the
/// channel is dropped; playback carries on unsupervised.
pub struct Heartbeat {
    writer: Option<Box<dyn Write>>,
}

impl Heartbeat {
    pub fn new(writer: impl Write + 'static) -> Self {
        Self {
            writer: Some(Box::new(writer)),
        }
    }

    /// No supervisor: every beat is a no-op
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Emit one heartbeat line and flush it immediately
    pub fn beat(&mut self) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = writeln!(writer, "{}", HEARTBEAT_LINE).and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!("Heartbeat channel closed ({}), continuing unsupervised", e);
            self.writer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Sink(Rc<RefCell<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_one_line_per_beat() {
        let sink = Sink::default();
        let mut heartbeat = Heartbeat::new(sink.clone());
        heartbeat.beat();
        heartbeat.beat();
        assert_eq!(&*sink.0.borrow(), b"alive\nalive\n");
    }

    #[test]
    fn test_disabled_is_noop() {
        let mut heartbeat = Heartbeat::disabled();
        assert!(!heartbeat.is_enabled());
        heartbeat.beat();
    }

    #[test]
    fn test_broken_channel_disables() {
        let mut heartbeat = Heartbeat::new(Broken);
        assert!(heartbeat.is_enabled());
        heartbeat.beat();
        assert!(!heartbeat.is_enabled());
    }
}
