//! Descriptor multiplexer, per spec §4.7.
//!
//! Grounded on `diminuto_mux.c`/`diminuto_mux.h`: five [`Set`]s (`read`,
//! `write`, `accept`, `urgent`, `interrupt`), each a `{min, max, cursor,
//! active, ready}` bitmap record, plus two incrementally-maintained union
//! bitmaps (`read_or_accept`, `urgent_or_interrupt`) that double as the
//! `pselect(2)` readfds/exceptfds arguments, and the atomic-unblock signal
//! mask built up by `register_signal`/`unregister_signal`. The round-robin
//! `ready_*` walk and the `bound`/`normalize` housekeeping on unregister are
//! ported field-for-field from `diminuto_mux_set_ready`/`_bound`/`_normalize`.

mod fdset;

use std::os::fd::RawFd;

use fdset::FdSet;

use crate::clock::Tick;
use crate::error::{Error, Result};
use crate::ffi::syscall;

/// Most positive/negative `int`, used as the sentinel bounds of an empty
/// [`Set`] exactly as `DIMINUTO_MUX_MOSTPOSITIVE`/`_MOSTNEGATIVE` do.
const MOST_POSITIVE: i32 = i32::MAX;
const MOST_NEGATIVE: i32 = i32::MIN;

/// A bitwise outcome of [`Multiplexer::wait`]: either some descriptors are
/// ready (with the count `pselect` returned), or the timeout elapsed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready(usize),
    TimedOut,
}

/// One of the multiplexer's five descriptor sets.
///
/// `cursor < 0` means "nothing queued to visit this round" (ported from the
/// original's `next == -1` sentinel).
struct Set {
    min: i32,
    max: i32,
    cursor: i32,
    active: FdSet,
    ready: FdSet,
}

fn in_range(fd: RawFd) -> bool {
    (0..libc::FD_SETSIZE as RawFd).contains(&fd)
}

impl Set {
    fn new() -> Self {
        Set {
            min: MOST_POSITIVE,
            max: MOST_NEGATIVE,
            cursor: -1,
            active: FdSet::empty(),
            ready: FdSet::empty(),
        }
    }

    /// Registers `fd`, updating `min`/`max`. Fails `Range` if out of the
    /// legal descriptor range, `Invalid` if already active.
    fn register(&mut self, fd: RawFd) -> Result<()> {
        if !in_range(fd) {
            return Err(Error::Range);
        }
        if self.active.is_set(fd) {
            return Err(Error::Invalid);
        }
        self.active.set(fd);
        self.ready.clear(fd);
        if fd < self.min {
            self.min = fd;
        }
        if fd > self.max {
            self.max = fd;
        }
        Ok(())
    }

    /// Unregisters `fd`. When `silent`, an absent `fd` returns `Ok(false)`
    /// instead of `Err(Invalid)` (used by [`Multiplexer::close`], which must
    /// tolerate a descriptor that was never registered in a given set).
    fn unregister(&mut self, fd: RawFd, silent: bool) -> Result<bool> {
        if !in_range(fd) {
            return Err(Error::Range);
        }
        if !self.active.is_set(fd) {
            return if silent { Ok(false) } else { Err(Error::Invalid) };
        }
        self.active.clear(fd);
        self.ready.clear(fd);
        self.bound();
        self.normalize();
        Ok(true)
    }

    /// Rescans `[min..=max]` for the new bounds after an unregister, ported
    /// from `diminuto_mux_set_bound`.
    fn bound(&mut self) {
        let mut min = MOST_POSITIVE;
        let mut max = MOST_NEGATIVE;
        if self.min <= self.max {
            for fd in self.min..=self.max {
                if self.active.is_set(fd) {
                    if fd < min {
                        min = fd;
                    }
                    if fd > max {
                        max = fd;
                    }
                }
            }
        }
        self.min = min;
        self.max = max;
    }

    /// Renormalizes `cursor` after `bound`, ported from
    /// `diminuto_mux_set_normalize`.
    fn normalize(&mut self) {
        if self.cursor < 0 {
        } else if self.max < 0 {
            self.cursor = -1;
        } else if self.cursor < self.min {
            self.cursor = self.min;
        } else if self.cursor > self.max {
            self.cursor = self.min;
        }
    }

    /// Primes `cursor` for a fresh round-robin walk after a successful
    /// `wait`, ported from `diminuto_mux_set_reset`.
    fn reset_cursor(&mut self) {
        if self.cursor >= 0 || self.max < 0 {
        } else {
            self.cursor = self.min;
        }
    }

    /// Round-robin walk: returns the next descriptor present in both
    /// `active` and `ready`, clearing its ready bit and advancing the
    /// cursor, or `-1` once a full lap finds nothing. Ported from
    /// `diminuto_mux_set_ready`.
    fn ready_next(&mut self) -> RawFd {
        let mut fd = -1;
        if self.cursor < 0 {
            return fd;
        }
        let wrapped = self.cursor;
        loop {
            if self.ready.is_set(self.cursor) {
                if self.active.is_set(self.cursor) {
                    fd = self.cursor;
                }
                self.ready.clear(self.cursor);
            }
            self.cursor = if self.cursor < self.max {
                self.cursor + 1
            } else {
                self.min
            };
            if fd >= 0 || self.cursor == wrapped {
                break;
            }
        }
        if fd < 0 {
            self.cursor = -1;
        }
        fd
    }
}

fn census(nfds: &mut i32, set: &Set) {
    if *nfds <= set.max {
        *nfds = set.max + 1;
    }
}

/// A descriptor multiplexer, per spec §4.7: five descriptor sets plus an
/// atomic-unblock signal mask, waited on together through `pselect(2)`.
pub struct Multiplexer {
    read: Set,
    write: Set,
    accept: Set,
    urgent: Set,
    interrupt: Set,
    read_or_accept: FdSet,
    urgent_or_interrupt: FdSet,
    mask: libc::sigset_t,
}

impl Multiplexer {
    /// Builds an empty multiplexer, seeding the signal mask with the
    /// calling thread's current mask (as `diminuto_mux_init` does via
    /// `pthread_sigmask(SIG_BLOCK, NULL, &mask)`, which only fetches).
    pub fn new() -> Self {
        let mask = syscall::pthread_sigmask_current()
            .unwrap_or_else(|err| panic!("pthread_sigmask(SIG_BLOCK, NULL, ..) failed: {err}"));
        Multiplexer {
            read: Set::new(),
            write: Set::new(),
            accept: Set::new(),
            urgent: Set::new(),
            interrupt: Set::new(),
            read_or_accept: FdSet::empty(),
            urgent_or_interrupt: FdSet::empty(),
            mask,
        }
    }

    pub fn register_read(&mut self, fd: RawFd) -> Result<()> {
        self.read.register(fd)?;
        self.read_or_accept.set(fd);
        Ok(())
    }

    pub fn register_write(&mut self, fd: RawFd) -> Result<()> {
        self.write.register(fd)
    }

    pub fn register_accept(&mut self, fd: RawFd) -> Result<()> {
        self.accept.register(fd)?;
        self.read_or_accept.set(fd);
        Ok(())
    }

    pub fn register_urgent(&mut self, fd: RawFd) -> Result<()> {
        self.urgent.register(fd)?;
        self.urgent_or_interrupt.set(fd);
        Ok(())
    }

    pub fn register_interrupt(&mut self, fd: RawFd) -> Result<()> {
        self.interrupt.register(fd)?;
        self.urgent_or_interrupt.set(fd);
        Ok(())
    }

    pub fn unregister_read(&mut self, fd: RawFd) -> Result<()> {
        self.read.unregister(fd, false)?;
        self.read_or_accept.clear(fd);
        Ok(())
    }

    pub fn unregister_write(&mut self, fd: RawFd) -> Result<()> {
        self.write.unregister(fd, false).map(|_| ())
    }

    pub fn unregister_accept(&mut self, fd: RawFd) -> Result<()> {
        self.accept.unregister(fd, false)?;
        self.read_or_accept.clear(fd);
        Ok(())
    }

    pub fn unregister_urgent(&mut self, fd: RawFd) -> Result<()> {
        self.urgent.unregister(fd, false)?;
        self.urgent_or_interrupt.clear(fd);
        Ok(())
    }

    pub fn unregister_interrupt(&mut self, fd: RawFd) -> Result<()> {
        self.interrupt.unregister(fd, false)?;
        self.urgent_or_interrupt.clear(fd);
        Ok(())
    }

    /// Adds `signum` to the set of signals unblocked atomically during
    /// [`Self::wait`]. Fails `Invalid` if already registered.
    pub fn register_signal(&mut self, signum: libc::c_int) -> Result<()> {
        if syscall::sigismember(&self.mask, signum)? {
            return Err(Error::Invalid);
        }
        syscall::sigaddset(&mut self.mask, signum)?;
        Ok(())
    }

    /// Removes `signum` from the unblock mask. Fails `Invalid` if it was
    /// not registered.
    pub fn unregister_signal(&mut self, signum: libc::c_int) -> Result<()> {
        if !syscall::sigismember(&self.mask, signum)? {
            return Err(Error::Invalid);
        }
        syscall::sigdelset(&mut self.mask, signum)?;
        Ok(())
    }

    /// Waits for a descriptor to become ready, a registered signal to be
    /// delivered, or `timeout` ticks to elapse. `timeout < 0` blocks
    /// indefinitely; `timeout == 0` polls.
    ///
    /// Ports `diminuto_mux_wait_generic`: the read and accept sets share
    /// one `pselect` readfds bitmap (`read_or_accept`), urgent and
    /// interrupt share one exceptfds bitmap, and `nfds` is the bound across
    /// all five sets. The short-circuit "nothing registered and timeout
    /// zero" case returns `TimedOut` without a syscall.
    pub fn wait(&mut self, timeout: Tick) -> Result<WaitOutcome> {
        let mut nfds: i32 = 0;
        census(&mut nfds, &self.read);
        census(&mut nfds, &self.write);
        census(&mut nfds, &self.accept);
        census(&mut nfds, &self.urgent);
        census(&mut nfds, &self.interrupt);

        if !(nfds > 0 || timeout.0 != 0) {
            return Ok(WaitOutcome::TimedOut);
        }

        let mut read_or_accept = self.read_or_accept;
        let mut write_ready = self.write.active;
        let mut urgent_or_interrupt = self.urgent_or_interrupt;

        let timespec = if timeout.0 >= 0 {
            Some(libc::timespec {
                tv_sec: timeout.whole_seconds(),
                tv_nsec: timeout.fractional_units(1_000_000_000),
            })
        } else {
            None
        };

        let outcome = syscall::pselect(
            nfds,
            read_or_accept.as_raw_mut(),
            write_ready.as_raw_mut(),
            urgent_or_interrupt.as_raw_mut(),
            timespec.as_ref(),
            Some(&self.mask),
        );

        match outcome {
            Ok(n) if n > 0 => {
                self.read.ready = read_or_accept;
                self.accept.ready = read_or_accept;
                self.urgent.ready = urgent_or_interrupt;
                self.interrupt.ready = urgent_or_interrupt;
                self.write.ready = write_ready;
                self.read.reset_cursor();
                self.write.reset_cursor();
                self.accept.reset_cursor();
                self.urgent.reset_cursor();
                self.interrupt.reset_cursor();
                Ok(WaitOutcome::Ready(n))
            }
            Ok(_) => Ok(WaitOutcome::TimedOut),
            Err(err) if err.raw_os_error() == Some(libc::EINTR) => Err(Error::Interrupted),
            Err(err) => Err(Error::Io(err)),
        }
    }

    pub fn ready_read(&mut self) -> RawFd {
        self.read.ready_next()
    }

    pub fn ready_write(&mut self) -> RawFd {
        self.write.ready_next()
    }

    pub fn ready_accept(&mut self) -> RawFd {
        self.accept.ready_next()
    }

    pub fn ready_urgent(&mut self) -> RawFd {
        self.urgent.ready_next()
    }

    pub fn ready_interrupt(&mut self) -> RawFd {
        self.interrupt.ready_next()
    }

    /// Unregisters `fd` from every set (silently, per spec), then closes
    /// it. Returns `Invalid` if no set held it, even though the close
    /// itself succeeded, ported from `diminuto_mux_close`.
    pub fn close(&mut self, fd: RawFd) -> Result<()> {
        let mut held = false;
        if self.accept.unregister(fd, true)? {
            held = true;
            self.read_or_accept.clear(fd);
        }
        if self.read.unregister(fd, true)? {
            held = true;
            self.read_or_accept.clear(fd);
        }
        if self.write.unregister(fd, true)? {
            held = true;
        }
        if self.urgent.unregister(fd, true)? {
            held = true;
            self.urgent_or_interrupt.clear(fd);
        }
        if self.interrupt.unregister(fd, true)? {
            held = true;
            self.urgent_or_interrupt.clear(fd);
        }

        syscall::close(fd).map_err(Error::Io)?;

        if !held {
            return Err(Error::Invalid);
        }
        Ok(())
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_rejects_duplicates_and_out_of_range() {
        let mut mux = Multiplexer::new();
        mux.register_read(3).unwrap();
        assert!(matches!(mux.register_read(3), Err(Error::Invalid)));
        assert!(matches!(mux.register_read(-1), Err(Error::Range)));
    }

    #[test]
    fn unregister_absent_fails_invalid() {
        let mut mux = Multiplexer::new();
        assert!(matches!(mux.unregister_read(9), Err(Error::Invalid)));
    }

    #[test]
    fn signal_registration_rejects_duplicates() {
        let mut mux = Multiplexer::new();
        mux.register_signal(libc::SIGALRM).unwrap();
        assert!(matches!(
            mux.register_signal(libc::SIGALRM),
            Err(Error::Invalid)
        ));
        mux.unregister_signal(libc::SIGALRM).unwrap();
        assert!(matches!(
            mux.unregister_signal(libc::SIGALRM),
            Err(Error::Invalid)
        ));
    }

    #[test]
    fn empty_mux_polls_without_blocking() {
        let mut mux = Multiplexer::new();
        assert_eq!(mux.wait(Tick::ZERO).unwrap(), WaitOutcome::TimedOut);
    }

    #[test]
    fn round_robin_visits_each_ready_descriptor_once() {
        // spec §8 scenario 6: fds {3,5,7} registered; ready = {3,5,7}.
        let mut set = Set::new();
        for fd in [3, 5, 7] {
            set.register(fd).unwrap();
        }
        for fd in [3, 5, 7] {
            set.ready.set(fd);
        }
        set.reset_cursor();
        assert_eq!(set.ready_next(), 3);
        assert_eq!(set.ready_next(), 5);
        assert_eq!(set.ready_next(), 7);
        assert_eq!(set.ready_next(), -1);

        // Next wait cycle: only {5,7} ready, cursor resumes from successor.
        set.ready.set(5);
        set.ready.set(7);
        set.reset_cursor();
        assert_eq!(set.ready_next(), 5);
        assert_eq!(set.ready_next(), 7);
        assert_eq!(set.ready_next(), -1);
    }

    #[test]
    fn close_without_any_registration_is_invalid() {
        // /dev/null is always openable and safe to close for this test.
        use std::os::fd::AsRawFd;
        let file = std::fs::File::open("/dev/null").unwrap();
        let fd = file.as_raw_fd();
        std::mem::forget(file); // avoid a double-close when the test ends
        let mut mux = Multiplexer::new();
        assert!(matches!(mux.close(fd), Err(Error::Invalid)));
    }
}
