//! The audible side of a ringing alarm.
//!
//! Screens never own the signal; they get a [`SignalHandle`] and stop it when the
//! user has earned it.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub trait AlarmSignal: Send + Sync {
    fn start(&self);
    /// Stopping an already stopped signal does nothing
    fn stop(&self);
    fn is_active(&self) -> bool;
}

#[derive(Clone)]
pub struct SignalHandle(Arc<dyn AlarmSignal>);

impl SignalHandle {
    pub fn new<S: AlarmSignal + 'static>(signal: S) -> Self {
        Self(Arc::new(signal))
    }

    pub fn silent() -> Self {
        Self::new(SilentSignal::default())
    }

    pub fn start(&self) {
        self.0.start();
    }

    pub fn stop(&self) {
        self.0.stop();
    }

    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }
}

impl std::fmt::Debug for SignalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHandle").field("active", &self.is_active()).finish()
    }
}

struct BellState {
    active: AtomicBool,
    interval: Duration,
    safety_timeout: Option<Duration>,
}

const TICK: Duration = Duration::from_millis(50);

/// Rings the terminal bell from a background thread until stopped or timed out
pub struct TerminalBell {
    state: Arc<BellState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalBell {
    pub fn new(interval: Duration, safety_timeout: Option<Duration>) -> Self {
        Self {
            state: Arc::new(BellState {
                active: AtomicBool::new(false),
                interval,
                safety_timeout,
            }),
            worker: Mutex::new(None),
        }
    }
}

fn spawn_bell_thread(state: Arc<BellState>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let started = Instant::now();
        let mut last_ring: Option<Instant> = None;
        while state.active.load(Ordering::SeqCst) {
            if let Some(limit) = state.safety_timeout {
                if started.elapsed() >= limit {
                    tracing::info!(?limit, "alarm signal reached its safety timeout");
                    state.active.store(false, Ordering::SeqCst);
                    break;
                }
            }
            if last_ring.is_none_or(|at| at.elapsed() >= state.interval) {
                let mut err = std::io::stderr();
                if let Err(e) = err.write_all(b"\x07").and_then(|_| err.flush()) {
                    tracing::debug!(error = %e, "bell write failed");
                }
                last_ring = Some(Instant::now());
            }
            std::thread::sleep(TICK);
        }
    })
}

impl AlarmSignal for TerminalBell {
    fn start(&self) {
        if self.state.active.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = spawn_bell_thread(Arc::clone(&self.state));
        match self.worker.lock() {
            Ok(mut worker) => *worker = Some(handle),
            Err(e) => tracing::warn!(error = %e, "bell worker lock poisoned"),
        }
        tracing::debug!("alarm signal started");
    }

    fn stop(&self) {
        if !self.state.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(e) => {
                tracing::warn!(error = %e, "bell worker lock poisoned");
                None
            }
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("bell thread panicked during shutdown");
            }
        }
        tracing::debug!("alarm signal stopped");
    }

    fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }
}

impl Drop for TerminalBell {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Makes no sound; counts effective starts and stops
#[derive(Debug, Default)]
pub struct SilentSignal {
    active: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl SilentSignal {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AlarmSignal for SilentSignal {
    fn start(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl<S: AlarmSignal + ?Sized> AlarmSignal for Arc<S> {
    fn start(&self) {
        (**self).start();
    }

    fn stop(&self) {
        (**self).stop();
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_signal_stop_is_idempotent() {
        let signal = Arc::new(SilentSignal::default());
        let handle = SignalHandle::new(Arc::clone(&signal));
        handle.start();
        handle.start();
        assert!(handle.is_active());
        handle.stop();
        handle.clone().stop();
        assert!(!handle.is_active());
        assert_eq!((signal.starts(), signal.stops()), (1, 1));
    }

    #[test]
    fn bell_stops_on_request() {
        let bell = TerminalBell::new(Duration::from_secs(60), None);
        bell.start();
        assert!(bell.is_active());
        bell.stop();
        bell.stop();
        assert!(!bell.is_active());
    }

    #[test]
    fn bell_gives_up_after_safety_timeout() {
        let bell = TerminalBell::new(Duration::from_secs(60), Some(Duration::from_millis(100)));
        bell.start();
        let deadline = Instant::now() + Duration::from_secs(5);
        while bell.is_active() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!bell.is_active());
    }
}
