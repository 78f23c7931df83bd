//! Error kinds the transport core distinguishes (spec §7).
//!
//! `mio` itself gets by on plain `std::io::Error`; this crate needs a few
//! more distinguished kinds (a wedged ingress buffer is not the same failure
//! as a dropped socket), so it follows the same low-dependency approach —
//! a small hand-rolled enum implementing `std::error::Error` rather than
//! pulling in a derive-macro error crate.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum TransportError {
    /// A kernel-level I/O failure reading or writing a registered stream.
    Io(io::Error),
    /// A blocked `FifoBuffer::write`/`read` observed its [`Interrupt`]
    /// token set (spec §7 kind 8).
    ///
    /// [`Interrupt`]: crate::buffer::Interrupt
    Interrupted,
    /// A single command packet does not fit in the ingress buffer's
    /// capacity, or the parser is wedged: `writable() == 0 && readable() >
    /// 0` (spec §7 kind 3).
    Overflow(String),
    /// The single-lane executor's shared pool rejected a submission because
    /// it is shutting down (spec §7 kind 5).
    ExecutionRejected,
    /// The transport has been aborted; this is the terminal error delivered
    /// to a receiver's `terminate` hook and returned by any further
    /// operation attempted on the transport (spec §7, "all aborts are
    /// idempotent").
    Aborted(String),
    /// The hub's selector thread has died; every subsequent attempt to
    /// create a transport fails fast with the recorded cause (spec §7 kind
    /// 7).
    SelectorDied(String),
}

impl TransportError {
    pub fn aborted(reason: impl Into<String>) -> TransportError {
        TransportError::Aborted(reason.into())
    }

    pub fn overflow(reason: impl Into<String>) -> TransportError {
        TransportError::Overflow(reason.into())
    }

    pub fn selector_died(reason: impl Into<String>) -> TransportError {
        TransportError::SelectorDied(reason.into())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "io failure: {e}"),
            TransportError::Interrupted => write!(f, "interrupted"),
            TransportError::Overflow(reason) => write!(f, "buffer overflow: {reason}"),
            TransportError::ExecutionRejected => {
                write!(f, "single-lane submission rejected, pool is shutting down")
            }
            TransportError::Aborted(reason) => write!(f, "transport aborted: {reason}"),
            TransportError::SelectorDied(reason) => {
                write!(f, "selector thread died: {reason}")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> TransportError {
        TransportError::Io(e)
    }
}

/// `FifoBuffer`'s stream wrappers implement `std::io::{Read, Write}`, which
/// can only report `io::Error` — this is the reverse of the `From<io::Error>`
/// conversion above, mapping an interrupted/aborted fifo operation back into
/// an `io::Error` of kind `Interrupted` (matching spec §4.2's
/// "interrupted-IO" terminology) or `Other`.
impl From<TransportError> for io::Error {
    fn from(e: TransportError) -> io::Error {
        let msg = e.to_string();
        match e {
            TransportError::Io(e) => e,
            TransportError::Interrupted => io::Error::new(io::ErrorKind::Interrupted, msg),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
