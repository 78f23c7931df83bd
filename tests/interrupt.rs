//! A writer blocked on a full buffer must unblock and fail as soon as its
//! `Interrupt` token is set, rather than waiting out the full bounded-wait
//! tick or blocking forever.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nio_mux::buffer::{FifoBuffer, Interrupt};
use nio_mux::error::TransportError;

#[test]
fn unblocks_a_full_buffer_write_on_interrupt() {
    let buf = Arc::new(FifoBuffer::new(16, 16));
    // Fill it completely so the next write has to block.
    assert_eq!(buf.write_non_block(&[0u8; 16]), 16);
    assert_eq!(buf.writable(), 0);

    let interrupt = Interrupt::new();
    let writer_interrupt = interrupt.clone();
    let writer_buf = Arc::clone(&buf);
    let writer = thread::spawn(move || writer_buf.write(&[1u8; 4], &writer_interrupt));

    // Give the writer a moment to actually block on the condvar before
    // interrupting it, so this isn't just racing a fast path.
    thread::sleep(Duration::from_millis(50));
    interrupt.set();

    let result = writer.join().expect("writer thread");
    assert!(matches!(result, Err(TransportError::Interrupted)));
}
