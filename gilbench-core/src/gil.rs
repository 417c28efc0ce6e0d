//! Simulated Global Interpreter Lock
//!
//! Rust threads run truly in parallel, so the serialization a managed runtime
//! imposes on its threads is rebuilt here on purpose: one mutex per process
//! stands for the interpreter lock, work units report progress through
//! [`Gil::tick`], and blocking calls go through [`Gil::allow_threads`].
//!
//! Semantics follow CPython's "new GIL":
//! - a thread that has held the lock for `switch_interval` while another
//!   thread is waiting drops it and does not take it back until someone else
//!   has acquired it (forced switch with hand-off);
//! - blocking I/O releases the lock for its whole duration.
//!
//! With the simulation disabled every operation is a no-op and threads run
//! natively.

use gilbench_ipc::GilSettings;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Ticks between clock reads in [`Gil::tick`]
const TICKS_PER_CHECK: u32 = 128;

/// The per-process interpreter lock shared by every thread of one run.
#[derive(Debug)]
pub struct Interpreter {
    lock: Mutex<()>,
    settings: GilSettings,
    switch_interval: Duration,
    waiting: AtomicUsize,
    acquisitions: AtomicU64,
    forced_switches: AtomicU64,
}

impl Interpreter {
    /// Build an interpreter lock with the given settings
    pub fn new(settings: GilSettings) -> Self {
        Self {
            lock: Mutex::new(()),
            settings,
            switch_interval: Duration::from_nanos(settings.switch_interval_ns),
            waiting: AtomicUsize::new(0),
            acquisitions: AtomicU64::new(0),
            forced_switches: AtomicU64::new(0),
        }
    }

    /// An interpreter that never serializes anything
    pub fn disabled() -> Self {
        Self::new(GilSettings::disabled())
    }

    /// Settings this interpreter was built with
    pub fn settings(&self) -> GilSettings {
        self.settings
    }

    /// Whether the lock is simulated at all
    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Number of forced switches performed so far
    pub fn forced_switches(&self) -> u64 {
        self.forced_switches.load(Ordering::Relaxed)
    }

    /// Take the lock for the calling thread. Blocks while another thread holds it.
    pub fn acquire(&self) -> Gil<'_> {
        let guard = if self.settings.enabled {
            Some(self.lock_raw())
        } else {
            None
        };
        Gil {
            interpreter: self,
            guard,
            held_since: Instant::now(),
            ticks: 0,
        }
    }

    fn lock_raw(&self) -> MutexGuard<'_, ()> {
        self.waiting.fetch_add(1, Ordering::AcqRel);
        // A unit that panicked while holding the lock leaves no state behind
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.waiting.fetch_sub(1, Ordering::AcqRel);
        self.acquisitions.fetch_add(1, Ordering::AcqRel);
        guard
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(GilSettings::default())
    }
}

/// Proof that the calling thread may run "interpreted" work.
pub struct Gil<'a> {
    interpreter: &'a Interpreter,
    guard: Option<MutexGuard<'a, ()>>,
    held_since: Instant,
    ticks: u32,
}

impl Gil<'_> {
    /// Record one unit of interpreted work; may hand the lock to a waiting thread.
    #[inline]
    pub fn tick(&mut self) {
        if self.guard.is_none() {
            return;
        }
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % TICKS_PER_CHECK != 0 {
            return;
        }
        if self.interpreter.waiting.load(Ordering::Acquire) > 0
            && self.held_since.elapsed() >= self.interpreter.switch_interval
        {
            self.force_switch();
        }
    }

    /// Run a blocking call with the lock released.
    ///
    /// The lock is taken back when `f` returns or unwinds.
    pub fn allow_threads<R>(&mut self, f: impl FnOnce() -> R) -> R {
        if self.guard.take().is_none() {
            return f();
        }
        let _reacquire = Reacquire { gil: self };
        f()
    }

    /// Whether this guard currently holds the (enabled) lock
    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }

    fn force_switch(&mut self) {
        let epoch = self.interpreter.acquisitions.load(Ordering::Acquire);
        self.guard = None;

        // Hand-off: wait until a waiter has actually taken the lock
        while self.interpreter.acquisitions.load(Ordering::Acquire) == epoch
            && self.interpreter.waiting.load(Ordering::Acquire) > 0
        {
            std::thread::yield_now();
        }

        self.guard = Some(self.interpreter.lock_raw());
        self.held_since = Instant::now();
        self.interpreter
            .forced_switches
            .fetch_add(1, Ordering::Relaxed);
    }
}

/// Re-takes the lock for a [`Gil`] released by [`Gil::allow_threads`]
struct Reacquire<'g, 'a> {
    gil: &'g mut Gil<'a>,
}

impl Drop for Reacquire<'_, '_> {
    fn drop(&mut self) {
        self.gil.guard = Some(self.gil.interpreter.lock_raw());
        self.gil.held_since = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    fn fast_switching() -> GilSettings {
        GilSettings {
            enabled: true,
            switch_interval_ns: 100_000, // 100us
        }
    }

    #[test]
    fn test_disabled_is_noop() {
        let interp = Interpreter::disabled();
        let mut gil = interp.acquire();
        assert!(!gil.is_held());
        for _ in 0..1_000 {
            gil.tick();
        }
        assert_eq!(gil.allow_threads(|| 7), 7);
        assert!(!gil.is_held());
        assert_eq!(interp.forced_switches(), 0);
    }

    #[test]
    fn test_allow_threads_releases_and_reacquires() {
        let interp = Interpreter::new(fast_switching());
        let mut gil = interp.acquire();
        assert!(gil.is_held());

        let acquired_inside = gil.allow_threads(|| {
            // Another thread can take the lock while we are "blocked"
            thread::scope(|s| s.spawn(|| interp.acquire().is_held()).join().unwrap())
        });
        assert!(acquired_inside);
        assert!(gil.is_held());
    }

    #[test]
    fn test_allow_threads_reacquires_after_panic() {
        let interp = Interpreter::new(fast_switching());
        let mut gil = interp.acquire();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            gil.allow_threads(|| -> u64 { panic!("io failed") })
        }));
        assert!(result.is_err());
        assert!(gil.is_held());

        // The lock is really ours again: another thread must wait for it
        let taken = thread::scope(|s| s.spawn(|| interp.lock.try_lock().is_ok()).join().unwrap());
        assert!(!taken);
    }

    #[test]
    fn test_only_one_holder_at_a_time() {
        let interp = Interpreter::new(fast_switching());
        let inside = AtomicBool::new(false);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut gil = interp.acquire();
                    for _ in 0..20_000 {
                        // While we hold the lock nobody else may be inside
                        assert!(!inside.swap(true, Ordering::SeqCst));
                        inside.store(false, Ordering::SeqCst);
                        gil.tick();
                    }
                });
            }
        });
    }

    #[test]
    fn test_forced_switch_hands_lock_over() {
        let interp = Interpreter::new(fast_switching());
        let started = AtomicBool::new(false);
        let waiter_ran = AtomicBool::new(false);

        thread::scope(|s| {
            s.spawn(|| {
                let mut gil = interp.acquire();
                started.store(true, Ordering::SeqCst);
                // Spin until the waiter got its turn through a forced switch
                let deadline = Instant::now() + Duration::from_secs(10);
                while !waiter_ran.load(Ordering::SeqCst) && Instant::now() < deadline {
                    gil.tick();
                }
            });
            s.spawn(|| {
                while !started.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
                let _gil = interp.acquire();
                waiter_ran.store(true, Ordering::SeqCst);
            });
        });

        assert!(waiter_ran.load(Ordering::SeqCst));
        assert!(interp.forced_switches() >= 1);
    }
}
