//! Thin wrappers over the raw POSIX primitives the rest of the crate is
//! built on: the monotonic clock, `pselect`, `sigaction`/`pthread_sigmask`,
//! and unbuffered descriptor `read`/`write`/`close`.
//!
//! Every function here follows the same shape: call the libc entry point,
//! and turn a `-1` return into `Err(io::Error::last_os_error())`.

pub mod syscall;
