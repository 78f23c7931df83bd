//! The Page/Pointer substrate and the `FifoBuffer` built on it (spec §3,
//! §4.1, §4.2).

mod page;
mod fifo;

pub use fifo::{FifoBuffer, FifoReader, FifoWriter, Interrupt};
