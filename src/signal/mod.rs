//! The SignalLatch family (spec §4.2) and [`UninterruptibleScope`] (spec
//! §4.8).
//!
//! Grounded on `diminuto_alarm.c`, `diminuto_hangup.c`,
//! `diminuto_interrupter.c`, `diminuto_terminator.c`, and
//! `diminuto_reaper.c`: five structurally identical files, each one
//! `static volatile int signaled`, one mutex, one handler that saturates,
//! and `install`/`check`/`send`. Rather than duplicate that file five (or
//! six, with `SIGPIPE`) times, [`Signal`] parameterizes a single
//! [`SignalLatch`] implementation over per-signal static storage.

mod scope;

pub use scope::UninterruptibleScope;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::ffi::syscall;

/// The six signals spec §4.2 names. `BrokenPipe` (`SIGPIPE`) has no
/// dedicated latch in the source library (only `diminuto_pipe.c`, which
/// merely ignores it); it is modeled here by analogy with the other five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Term,
    Hangup,
    Interrupt,
    Alarm,
    Child,
    BrokenPipe,
}

const COUNT: usize = 6;

impl Signal {
    fn index(self) -> usize {
        match self {
            Signal::Term => 0,
            Signal::Hangup => 1,
            Signal::Interrupt => 2,
            Signal::Alarm => 3,
            Signal::Child => 4,
            Signal::BrokenPipe => 5,
        }
    }

    pub fn raw(self) -> libc::c_int {
        match self {
            Signal::Term => libc::SIGTERM,
            Signal::Hangup => libc::SIGHUP,
            Signal::Interrupt => libc::SIGINT,
            Signal::Alarm => libc::SIGALRM,
            Signal::Child => libc::SIGCHLD,
            Signal::BrokenPipe => libc::SIGPIPE,
        }
    }
}

/// Saturates at `i32::MAX`, not `u32::MAX`: the source's
/// `diminuto_alarm.c` (and its siblings) define `MAXIMUM` as `INT_MAX`,
/// and spec §3/§8 state the bound as `min(N, INT_MAX)`.
static COUNTERS: [AtomicU32; COUNT] = [
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
    AtomicU32::new(0),
];

/// Serializes `check()` per signal the way each of `diminuto_alarm_check`,
/// `diminuto_hangup_check`, etc. does with their own private mutex; the
/// read-and-reset itself is also wrapped in an [`UninterruptibleScope`] so
/// delivery during the critical section can't be lost.
static CHECK_MUTEXES: [Mutex<()>; COUNT] = [
    Mutex::new(()),
    Mutex::new(()),
    Mutex::new(()),
    Mutex::new(()),
    Mutex::new(()),
    Mutex::new(()),
];

extern "C" fn handler(signum: libc::c_int) {
    for (i, counter) in COUNTERS.iter().enumerate() {
        let matches = [
            Signal::Term,
            Signal::Hangup,
            Signal::Interrupt,
            Signal::Alarm,
            Signal::Child,
            Signal::BrokenPipe,
        ][i]
            .raw()
            == signum;
        if matches {
            let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n >= i32::MAX as u32 {
                    None
                } else {
                    Some(n + 1)
                }
            });
            return;
        }
    }
}

/// A one-shot saturating counter per named signal, per spec §4.2.
///
/// Lifecycle: `install` once at process start; state after that is
/// process-global, shared by every `SignalLatch` constructed for the same
/// [`Signal`].
#[derive(Debug, Clone, Copy)]
pub struct SignalLatch {
    signal: Signal,
}

impl SignalLatch {
    pub fn new(signal: Signal) -> Self {
        SignalLatch { signal }
    }

    /// Registers the handler for this signal. If `restart_syscalls` is
    /// true, slow syscalls interrupted by delivery are restarted
    /// (`SA_RESTART`); otherwise they fail with `EINTR`.
    ///
    /// # Safety
    /// The installed handler only performs a saturating atomic increment,
    /// which is async-signal-safe.
    pub fn install(&self, restart_syscalls: bool) -> std::io::Result<()> {
        COUNTERS[self.signal.index()].store(0, Ordering::SeqCst);
        unsafe { syscall::sigaction_install(self.signal.raw(), handler, restart_syscalls) }
    }

    /// Sends this signal to `pid`.
    pub fn send(&self, pid: libc::pid_t) -> std::io::Result<()> {
        syscall::kill(pid, self.signal.raw())
    }

    /// Atomically returns the current counter and resets it to zero.
    pub fn check(&self) -> u32 {
        let _guard = CHECK_MUTEXES[self.signal.index()]
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let _scope = UninterruptibleScope::block(&[self.signal.raw()]);
        COUNTERS[self.signal.index()].swap(0, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn install_check_send_round_trips() {
        let latch = SignalLatch::new(Signal::Alarm);
        latch.install(true).unwrap();
        assert_eq!(latch.check(), 0);
        latch.send(std::process::id() as libc::pid_t).unwrap();
        // Give the handler a chance to run; delivery to self is typically
        // synchronous but isn't guaranteed to have landed before kill(2)
        // returns.
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(latch.check(), 1);
        assert_eq!(latch.check(), 0);
    }

    #[test]
    fn saturates_at_int_max_instead_of_wrapping() {
        // Exercise the saturation path directly on the shared counter
        // rather than sending i32::MAX real signals. Caps at INT_MAX per
        // spec §3/§8, not u32::MAX.
        let idx = Signal::Hangup.index();
        COUNTERS[idx].store(i32::MAX as u32, Ordering::SeqCst);
        handler(Signal::Hangup.raw());
        assert_eq!(COUNTERS[idx].load(Ordering::SeqCst), i32::MAX as u32);
        COUNTERS[idx].store(0, Ordering::SeqCst);
    }
}
