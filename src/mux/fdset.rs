//! Thin wrapper over `libc::fd_set`, per spec §9: implementations "should
//! use a typed bitmap ... without exposing a C type to callers." [`FdSet`]
//! is `pub(crate)` precisely so `libc::fd_set` never crosses the `mux`
//! module boundary; [`crate::mux::Multiplexer`] is the only public surface.

use std::os::fd::RawFd;

#[derive(Clone, Copy)]
pub(crate) struct FdSet(libc::fd_set);

impl FdSet {
    pub(crate) fn empty() -> Self {
        let mut set = std::mem::MaybeUninit::<libc::fd_set>::uninit();
        unsafe {
            libc::FD_ZERO(set.as_mut_ptr());
            FdSet(set.assume_init())
        }
    }

    pub(crate) fn set(&mut self, fd: RawFd) {
        unsafe { libc::FD_SET(fd, &mut self.0) }
    }

    pub(crate) fn clear(&mut self, fd: RawFd) {
        unsafe { libc::FD_CLR(fd, &mut self.0) }
    }

    pub(crate) fn is_set(&self, fd: RawFd) -> bool {
        unsafe { libc::FD_ISSET(fd, &self.0) }
    }

    pub(crate) fn as_raw_mut(&mut self) -> *mut libc::fd_set {
        &mut self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_clear_and_query_round_trip() {
        let mut set = FdSet::empty();
        assert!(!set.is_set(5));
        set.set(5);
        assert!(set.is_set(5));
        set.clear(5);
        assert!(!set.is_set(5));
    }
}
