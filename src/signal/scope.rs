//! Scoped signal-mask block, per spec §4.8.
//!
//! Grounded on `diminuto_uninterruptiblesection.c`'s `_block`/`_cleanup`
//! pair: entering ORs the given signals into the thread's block mask and
//! returns the prior mask; leaving restores it. The C version needs a
//! cleanup macro because C has no destructors; here that's just `Drop`.

use crate::ffi::syscall;

/// Blocks a set of signals for the lifetime of the guard, restoring the
/// prior per-thread mask on drop (including on an unwinding drop, so a
/// panic inside the scope still restores the mask).
pub struct UninterruptibleScope {
    prior: libc::sigset_t,
}

impl UninterruptibleScope {
    /// Blocks `signals` (by raw signal number) for the calling thread.
    ///
    /// Mirrors the panics-are-exceptional stance the rest of the crate
    /// takes toward syscalls that should not fail: if the kernel rejects a
    /// well-formed `sigprocmask` request, thread-local signal state is in
    /// an unknown condition and there's nothing sane left to return.
    pub fn block(signals: &[libc::c_int]) -> Self {
        let mut set = match syscall::sigemptyset() {
            Ok(set) => set,
            Err(err) => panic!("sigemptyset failed: {err}"),
        };
        for &signum in signals {
            if let Err(err) = syscall::sigaddset(&mut set, signum) {
                panic!("sigaddset({signum}) failed: {err}");
            }
        }
        let prior = match syscall::pthread_sigmask_block(&set) {
            Ok(prior) => prior,
            Err(err) => panic!("pthread_sigmask(SIG_BLOCK) failed: {err}"),
        };
        UninterruptibleScope { prior }
    }
}

impl Drop for UninterruptibleScope {
    fn drop(&mut self) {
        let _ = syscall::pthread_sigmask_restore(&self.prior);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nests_and_restores() {
        {
            let _outer = UninterruptibleScope::block(&[libc::SIGALRM]);
            {
                let _inner = UninterruptibleScope::block(&[libc::SIGHUP]);
            }
        }
    }
}
