use std::io::{Error, Result};
use std::mem::MaybeUninit;
use std::os::fd::RawFd;

/// Wraps `clock_gettime(CLOCK_MONOTONIC, ..)`, returning whole nanoseconds.
pub fn clock_gettime_monotonic() -> Result<i64> {
    let mut ts = MaybeUninit::<libc::timespec>::uninit();
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, ts.as_mut_ptr()) };
    if rc == 0 {
        let ts = unsafe { ts.assume_init() };
        Ok(ts.tv_sec as i64 * 1_000_000_000 + ts.tv_nsec as i64)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn sigemptyset() -> Result<libc::sigset_t> {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    let rc = unsafe { libc::sigemptyset(set.as_mut_ptr()) };
    if rc == 0 {
        Ok(unsafe { set.assume_init() })
    } else {
        Err(Error::last_os_error())
    }
}

pub fn sigaddset(set: &mut libc::sigset_t, signum: libc::c_int) -> Result<()> {
    let rc = unsafe { libc::sigaddset(set, signum) };
    if rc == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn sigdelset(set: &mut libc::sigset_t, signum: libc::c_int) -> Result<()> {
    let rc = unsafe { libc::sigdelset(set, signum) };
    if rc == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn sigismember(set: &libc::sigset_t, signum: libc::c_int) -> Result<bool> {
    let rc = unsafe { libc::sigismember(set, signum) };
    if rc < 0 {
        Err(Error::last_os_error())
    } else {
        Ok(rc != 0)
    }
}

/// Blocks `signum` for the calling thread, returning the prior mask, exactly
/// the way `pthread_sigmask(SIG_BLOCK, ..)` does when called with a singleton
/// set.
pub fn pthread_sigmask_block(set: &libc::sigset_t) -> Result<libc::sigset_t> {
    let mut was = MaybeUninit::<libc::sigset_t>::uninit();
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, set, was.as_mut_ptr()) };
    if rc == 0 {
        Ok(unsafe { was.assume_init() })
    } else {
        Err(Error::from_raw_os_error(rc))
    }
}

/// Fetches the calling thread's current signal mask without changing it, as
/// `pthread_sigmask(SIG_BLOCK, NULL, ..)` does when the `set` argument is
/// null (the `how` argument is then ignored by POSIX).
pub fn pthread_sigmask_current() -> Result<libc::sigset_t> {
    let mut current = MaybeUninit::<libc::sigset_t>::uninit();
    let rc =
        unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), current.as_mut_ptr()) };
    if rc == 0 {
        Ok(unsafe { current.assume_init() })
    } else {
        Err(Error::from_raw_os_error(rc))
    }
}

/// Restores a previously saved mask, as `pthread_sigmask(SIG_SETMASK, ..)`.
pub fn pthread_sigmask_restore(set: &libc::sigset_t) -> Result<()> {
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, set, std::ptr::null_mut()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(Error::from_raw_os_error(rc))
    }
}

/// Installs `handler` for `signum`. `restart` maps to `SA_RESTART`.
///
/// # Safety
/// `handler` must be async-signal-safe: no allocation, no locking beyond
/// what POSIX guarantees is safe inside a handler.
pub unsafe fn sigaction_install(
    signum: libc::c_int,
    handler: extern "C" fn(libc::c_int),
    restart: bool,
) -> Result<()> {
    let mut action: libc::sigaction = std::mem::zeroed();
    action.sa_sigaction = handler as usize;
    action.sa_flags = if restart { libc::SA_RESTART } else { 0 };
    libc::sigemptyset(&mut action.sa_mask);
    let rc = libc::sigaction(signum, &action, std::ptr::null_mut());
    if rc == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn kill(pid: libc::pid_t, signum: libc::c_int) -> Result<()> {
    let rc = unsafe { libc::kill(pid, signum) };
    if rc == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

pub fn read(fd: RawFd, buf: &mut [u8]) -> Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut _, buf.len()) };
    if n >= 0 {
        Ok(n as usize)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn write(fd: RawFd, buf: &[u8]) -> Result<usize> {
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const _, buf.len()) };
    if n >= 0 {
        Ok(n as usize)
    } else {
        Err(Error::last_os_error())
    }
}

pub fn close(fd: RawFd) -> Result<()> {
    let rc = unsafe { libc::close(fd) };
    if rc == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}

/// Raw `pselect(2)`: three `fd_set` pointers, the descriptor bound, an
/// optional timeout, and the signal mask to install atomically for the
/// duration of the wait.
pub fn pselect(
    nfds: libc::c_int,
    read_fds: *mut libc::fd_set,
    write_fds: *mut libc::fd_set,
    except_fds: *mut libc::fd_set,
    timeout: Option<&libc::timespec>,
    sigmask: Option<&libc::sigset_t>,
) -> Result<usize> {
    let timeout_ptr = timeout.map_or(std::ptr::null(), |t| t as *const _);
    let sigmask_ptr = sigmask.map_or(std::ptr::null(), |s| s as *const _);
    let rc = unsafe { libc::pselect(nfds, read_fds, write_fds, except_fds, timeout_ptr, sigmask_ptr) };
    if rc >= 0 {
        Ok(rc as usize)
    } else {
        Err(Error::last_os_error())
    }
}
