//! POSIX event core: descriptor multiplexing, signal latches, rate shaping,
//! a byte-oriented framer, and a debouncer, built directly on `libc`.
//!
//! ## Example
//!
//! Wait on a pipe's read end, drain it with a [`framer::Framer`], and track
//! `SIGTERM` on the side with a [`signal::SignalLatch`].
//!
//! ```no_run
//! use posix_eventcore::clock::Tick;
//! use posix_eventcore::framer::Framer;
//! use posix_eventcore::mux::{Multiplexer, WaitOutcome};
//! use posix_eventcore::signal::{Signal, SignalLatch};
//! use std::os::fd::RawFd;
//!
//! let fd: RawFd = 0;
//! let mut mux = Multiplexer::new();
//! mux.register_read(fd).unwrap();
//!
//! let latch = SignalLatch::new(Signal::Term);
//! latch.install(true).unwrap();
//! mux.register_signal(Signal::Term.raw()).unwrap();
//!
//! let mut framer = Framer::new(64 * 1024);
//! loop {
//!     let outcome = mux.wait(Tick(-1)).unwrap();
//!     if latch.check() > 0 {
//!         break;
//!     }
//!     if let WaitOutcome::Ready(_) = outcome {
//!         if mux.ready_read() == fd {
//!             let _ = framer.reader(&mut std::io::BufReader::new(std::io::stdin()));
//!         }
//!     }
//! }
//! ```
//!
//! ## Portability
//!
//! Every syscall in [`ffi::syscall`] is a direct, unbuffered wrapper around
//! the POSIX function it names: `pselect(2)`, `pthread_sigmask(3)`,
//! `sigaction(2)`, `clock_gettime(2)`. No feature flags gate platform
//! support; this crate targets POSIX-conformant systems, Linux foremost.

pub mod clock;
pub mod debounce;
pub mod error;
mod ffi;
pub mod framer;
pub mod mux;
pub mod shaper;
pub mod signal;
pub mod throttle;

pub use error::{Error, Result};
