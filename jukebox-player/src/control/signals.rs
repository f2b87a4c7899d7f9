//! Signal routing
//!
//! A [`SignalRouter`] keeps, for every signal kind, an ordered list of
//! callbacks. Exactly one OS-level handler is installed per kind, on first
//! registration; tokio's signal driver records the delivery and the router
//! hands the kind back to the owning loop, which runs the callbacks on its
//! own thread via [`SignalRouter::dispatch`]. Callbacks therefore never run
//! in async-signal context, but they must still be short and non-blocking:
//! the loop does nothing else while they run.
//!
//! ## Signals
//! - **SIGUSR1**: toggle play/pause
//! - **SIGUSR2**: skip to the next track
//! - **SIGTERM**, **SIGINT**: graceful shutdown

use std::future::poll_fn;
use std::io;
use std::task::Poll;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

type Callback<T> = Box<dyn FnMut(&mut T)>;

/// Play/pause toggle
pub fn toggle_signal() -> SignalKind {
    SignalKind::user_defined1()
}

/// Skip to the next track
pub fn skip_signal() -> SignalKind {
    SignalKind::user_defined2()
}

/// Graceful shutdown
pub fn termination_signals() -> [SignalKind; 2] {
    [SignalKind::terminate(), SignalKind::interrupt()]
}

/// Human-readable name for log lines
pub fn signal_name(kind: SignalKind) -> &'static str {
    if kind == SignalKind::user_defined1() {
        "SIGUSR1"
    } else if kind == SignalKind::user_defined2() {
        "SIGUSR2"
    } else if kind == SignalKind::terminate() {
        "SIGTERM"
    } else if kind == SignalKind::interrupt() {
        "SIGINT"
    } else if kind == SignalKind::hangup() {
        "SIGHUP"
    } else {
        "signal"
    }
}

struct Binding<T> {
    kind: SignalKind,
    stream: Signal,
    callbacks: Vec<Callback<T>>,
}

/// Registry mapping signal kinds to callbacks over a target `T`
pub struct SignalRouter<T> {
    bindings: Vec<Binding<T>>,
}

impl<T> SignalRouter<T> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Append `callback` to the list for `kind`
    ///
    /// The OS handler for `kind` is installed on the first registration.
    /// Must be called from within a tokio runtime.
    pub fn register<F>(&mut self, kind: SignalKind, callback: F) -> io::Result<()>
    where
        F: FnMut(&mut T) + 'static,
    {
        let binding = self.binding_mut(kind)?;
        binding.callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Install the handler for `kind` without any callback
    ///
    /// Replaces the default disposition (which for SIGUSR1/SIGUSR2 would
    /// terminate the process) with a no-op.
    pub fn ignore(&mut self, kind: SignalKind) -> io::Result<()> {
        self.binding_mut(kind).map(|_| ())
    }

    /// Number of callbacks registered for `kind`
    pub fn callback_count(&self, kind: SignalKind) -> usize {
        self.bindings
            .iter()
            .find(|b| b.kind == kind)
            .map_or(0, |b| b.callbacks.len())
    }

    /// Wait for the next delivered signal among the installed kinds
    ///
    /// Never resolves when nothing is installed. Cancel safe.
    pub async fn recv(&mut self) -> SignalKind {
        poll_fn(|cx| {
            for binding in self.bindings.iter_mut() {
                if let Poll::Ready(Some(())) = binding.stream.poll_recv(cx) {
                    return Poll::Ready(binding.kind);
                }
            }
            Poll::Pending
        })
        .await
    }

    /// Run every callback registered for `kind`, in registration order
    ///
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&mut self, kind: SignalKind, target: &mut T) -> usize {
        let Some(binding) = self.bindings.iter_mut().find(|b| b.kind == kind) else {
            return 0;
        };
        debug!(
            "Dispatching {} to {} callback(s)",
            signal_name(kind),
            binding.callbacks.len()
        );
        for callback in binding.callbacks.iter_mut() {
            callback(target);
        }
        binding.callbacks.len()
    }

    fn binding_mut(&mut self, kind: SignalKind) -> io::Result<&mut Binding<T>> {
        let index = match self.bindings.iter().position(|b| b.kind == kind) {
            Some(index) => index,
            None => {
                let stream = signal(kind)?;
                debug!("Installed handler for {}", signal_name(kind));
                self.bindings.push(Binding {
                    kind,
                    stream,
                    callbacks: Vec::new(),
                });
                self.bindings.len() - 1
            }
        };
        Ok(&mut self.bindings[index])
    }
}

impl<T> Default for SignalRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let mut router: SignalRouter<Vec<&'static str>> = SignalRouter::new();
        router.register(SignalKind::hangup(), |log| log.push("first")).unwrap();
        router.register(SignalKind::hangup(), |log| log.push("second")).unwrap();
        router.register(SignalKind::hangup(), |log| log.push("third")).unwrap();

        let mut log = Vec::new();
        assert_eq!(router.dispatch(SignalKind::hangup(), &mut log), 3);
        assert_eq!(log, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_one_binding_per_kind() {
        let mut router: SignalRouter<u32> = SignalRouter::new();
        router.register(SignalKind::hangup(), |n| *n += 1).unwrap();
        router.register(SignalKind::hangup(), |n| *n += 10).unwrap();
        router.ignore(SignalKind::hangup()).unwrap();

        assert_eq!(router.bindings.len(), 1);
        assert_eq!(router.callback_count(SignalKind::hangup()), 2);

        let mut count = 0;
        router.dispatch(SignalKind::hangup(), &mut count);
        assert_eq!(count, 11);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_kind_is_noop() {
        let mut router: SignalRouter<u32> = SignalRouter::new();
        let mut count = 0;
        assert_eq!(router.dispatch(SignalKind::hangup(), &mut count), 0);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_empty_router_never_resolves() {
        let mut router: SignalRouter<()> = SignalRouter::new();
        let result = tokio::time::timeout(Duration::from_millis(50), router.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_recv_real_signal() {
        let mut router: SignalRouter<u32> = SignalRouter::new();
        router.register(SignalKind::hangup(), |n| *n += 1).unwrap();

        let status = std::process::Command::new("sh")
            .args(["-c", &format!("kill -HUP {}", std::process::id())])
            .status()
            .unwrap();
        assert!(status.success());

        let kind = tokio::time::timeout(Duration::from_secs(5), router.recv())
            .await
            .expect("signal should be delivered");
        assert_eq!(kind, SignalKind::hangup());

        let mut count = 0;
        router.dispatch(kind, &mut count);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name(toggle_signal()), "SIGUSR1");
        assert_eq!(signal_name(skip_signal()), "SIGUSR2");
        assert_eq!(signal_name(termination_signals()[0]), "SIGTERM");
        assert_eq!(signal_name(termination_signals()[1]), "SIGINT");
    }
}
