//! Inactivity monitor — the single cooperative timer driving idle lock.
//!
//! One periodic check per active principal: when idle time exceeds the
//! configured session timeout and the session is not already locked, the
//! monitor requests `LockedInactive` through the guarded state machine and
//! emits a one-shot "session locked" notification. The notification is
//! debounced — repeated ticks after the lock do not re-emit; the debounce
//! arms again once the session is active.
//!
//! Polling is a deliberate, auditable choice over event-driven wakeups:
//! one timer, one place where the transition happens. Ticks never overlap —
//! the interval exceeds worst-case tick duration by construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::session::{SessionManager, SessionState};

/// Sleep slice so `stop()` never waits a full interval.
const CANCEL_POLL_MS: u64 = 50;

/// Callback invoked exactly once per lock event.
pub type LockNotifier = Arc<dyn Fn() + Send + Sync>;

/// Periodic idle-time watchdog over a [`SessionManager`].
pub struct InactivityMonitor {
    manager: Arc<SessionManager>,
    notifier: LockNotifier,
    cancel: Arc<AtomicBool>,
    notified: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl InactivityMonitor {
    /// Create a monitor; call [`start`](Self::start) to begin ticking.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>, notifier: LockNotifier) -> Arc<Self> {
        Arc::new(Self {
            manager,
            notifier,
            cancel: Arc::new(AtomicBool::new(false)),
            notified: AtomicBool::new(false),
            handle: Mutex::new(None),
        })
    }

    /// Run one check. Public so deterministic tests can drive ticks
    /// directly with a manual clock; the background thread calls this on
    /// every interval.
    pub fn check(&self) {
        match self.manager.state() {
            SessionState::Authenticated => {
                let timeout = self.manager.params().session_timeout_ms;
                let idle = self.manager.idle_ms().unwrap_or(u64::MAX);
                if idle > timeout {
                    let committed = self.manager.set_state(SessionState::LockedInactive);
                    if committed == SessionState::LockedInactive
                        && !self.notified.swap(true, Ordering::SeqCst)
                    {
                        tracing::debug!(idle_ms = idle, "session locked after inactivity");
                        (self.notifier)();
                    }
                } else {
                    // Active again — re-arm the one-shot notification.
                    self.notified.store(false, Ordering::SeqCst);
                }
            }
            SessionState::LockedInactive => {
                // Already locked; the debounce flag keeps ticks silent.
            }
            _ => {
                self.notified.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Spawn the background tick thread. Started on session init.
    pub fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        let cancel = Arc::clone(&self.cancel);
        let interval_ms = self.manager.params().monitor_interval_ms;

        let handle = std::thread::spawn(move || {
            let mut elapsed_ms: u64 = 0;
            while !cancel.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(CANCEL_POLL_MS));
                elapsed_ms = elapsed_ms.saturating_add(CANCEL_POLL_MS);
                if elapsed_ms >= interval_ms {
                    elapsed_ms = 0;
                    monitor.check();
                }
            }
        });

        if let Ok(mut guard) = self.handle.lock() {
            *guard = Some(handle);
        }
    }

    /// Signal the tick thread to stop and wait for it. Called from
    /// `terminate()` paths; safe to call when never started.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.handle.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
