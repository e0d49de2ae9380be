use thiserror::Error;

/// The error taxonomy of spec §7: programming errors and I/O errors are
/// surfaced, the rest are local to the caller's event loop.
#[derive(Debug, Error)]
pub enum Error {
    /// Descriptor out of the legal range for the underlying bitmap primitive.
    #[error("descriptor out of range")]
    Range,
    /// Double-register, unregister-of-absent, or unknown-signal misuse.
    #[error("invalid multiplexer operation")]
    Invalid,
    /// `Multiplexer::wait` observed a delivered, unblocked signal.
    #[error("wait interrupted by a signal")]
    Interrupted,
    /// `Multiplexer::wait` exceeded its timeout with nothing ready.
    #[error("wait timed out")]
    TimedOut,
    /// The underlying stream reached end of file.
    #[error("end of file")]
    Eof,
    /// A write was attempted with a payload larger than `MAX_PAYLOAD`.
    #[error("payload exceeds maximum frame size")]
    TooBig,
    /// A received frame's length exceeds the receive buffer's capacity.
    #[error("frame exceeds buffer capacity")]
    Overflow,
    /// A received frame's checksum or CRC did not match.
    #[error("frame checksum or CRC mismatch")]
    Failed,
    /// A received frame contained an illegal octet in its current state.
    #[error("illegal octet for framer state")]
    InvalidFrame,
    /// The sender emitted an explicit ESCAPE+FLAG abort sequence.
    #[error("frame aborted by sender")]
    Aborted,
    /// Any other I/O error from the underlying descriptor.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
