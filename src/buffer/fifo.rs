//! `FifoBuffer` — the bounded-capacity, unbounded-growth byte queue shared
//! between the selector thread and command-processing workers (spec §3,
//! §4.2).

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::buffer::page::{Page, Pointer};
use crate::error::TransportError;

/// Bounded wait interval for blocked writers/readers (spec §4.2: "poll the
/// condition with a bounded wait (≈100 ms) so that close-requested
/// transitions are observed promptly").
const WAIT_QUANTUM: Duration = Duration::from_millis(100);

/// Cooperative cancellation token standing in for Java's
/// `Thread.interrupt()`: Rust threads can't be interrupted from the
/// outside, so a blocked [`FifoBuffer::write`]/[`FifoBuffer::read`] call
/// instead polls a shared flag on every bounded-wait tick.
#[derive(Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Interrupt {
        Interrupt(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `Open -> CloseRequested -> Closed`, monotonic (spec §3). `close()` moves
/// a buffer with bytes still queued into `CloseRequested`, where writes are
/// already refused but a reader may keep draining; `consume()` promotes it
/// to `Closed` the moment the last byte is taken out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    CloseRequested,
    Closed,
}

struct Inner {
    pages: VecDeque<Page>,
    read: Pointer,
    write: Pointer,
    sz: usize,
    limit: usize,
    page_size: usize,
    state: State,
    close_cause: Option<String>,
}

impl Inner {
    fn readable(&self) -> i64 {
        if self.sz > 0 {
            self.sz as i64
        } else if self.state == State::Closed {
            -1
        } else {
            0
        }
    }

    fn writable(&self) -> usize {
        if self.state != State::Open {
            0
        } else {
            self.limit.saturating_sub(self.sz)
        }
    }

    /// Appends up to `buf.len()` bytes, bounded by `writable()`. Returns the
    /// number of bytes actually copied.
    fn write_some(&mut self, buf: &[u8]) -> usize {
        let cap = self.writable().min(buf.len());
        let mut copied = 0;
        while copied < cap {
            if self.pages.is_empty() {
                self.pages.push_back(Page::new(self.page_size));
            }
            let page_size = self.page_size;
            let off = self.write.offset();
            let n = (cap - copied).min(self.write.chunk(page_size));
            {
                let page = self.pages.back_mut().expect("tail page allocated above");
                page.as_mut_slice()[off..off + n].copy_from_slice(&buf[copied..copied + n]);
                let new_filled = off + n;
                if new_filled > page.filled() {
                    page.set_filled(new_filled);
                }
            }
            copied += n;
            self.sz += n;
            if self.write.advance(n, page_size) {
                // Landed exactly on a boundary: allocate the next page now
                // so `pages.back()` is always valid at the top of the loop.
                self.pages.push_back(Page::new(page_size));
            }
        }
        copied
    }

    /// Copies up to `buf.len()` readable bytes starting `skip` bytes past
    /// the read pointer, without consuming anything. Used by both `peek`
    /// and the actual draining reads (which peek then advance).
    fn peek_some(&self, skip: usize, buf: &mut [u8]) -> usize {
        if skip >= self.sz {
            return 0;
        }
        let page_size = self.page_size;
        let want = buf.len().min(self.sz - skip);
        let mut done = 0;
        // Walk from the read pointer, skipping `skip` bytes first.
        let mut page_idx = 0usize;
        let mut offset = self.read.offset();
        let mut to_skip = skip;
        while to_skip > 0 {
            let avail_in_page = page_size - offset;
            if avail_in_page == 0 {
                page_idx += 1;
                offset = 0;
                continue;
            }
            let skip_here = avail_in_page.min(to_skip);
            offset += skip_here;
            to_skip -= skip_here;
            if offset == page_size {
                page_idx += 1;
                offset = 0;
            }
        }
        while done < want {
            let page = self
                .pages
                .get(page_idx)
                .expect("page index within readable range");
            let avail_in_page = page.filled().saturating_sub(offset);
            if avail_in_page == 0 {
                page_idx += 1;
                offset = 0;
                continue;
            }
            let n = avail_in_page.min(want - done);
            buf[done..done + n].copy_from_slice(&page.as_slice()[offset..offset + n]);
            done += n;
            offset += n;
            if offset == page_size {
                page_idx += 1;
                offset = 0;
            }
        }
        done
    }

    /// Consumes `n` already-readable bytes by advancing the read pointer
    /// and releasing any page it walks entirely off of.
    fn consume(&mut self, mut n: usize) {
        debug_assert!(n <= self.sz);
        let page_size = self.page_size;
        while n > 0 {
            let avail = {
                let page = self.pages.front().expect("readable bytes imply a page");
                page.filled() - self.read.offset()
            };
            let take = avail.min(n);
            let crossed = self.read.advance(take, page_size);
            n -= take;
            self.sz -= take;
            if crossed {
                self.pages.pop_front();
            }
        }
        if self.sz == 0 && self.state == State::CloseRequested {
            self.state = State::Closed;
        }
        if self.readable() < 0 {
            self.pages.clear();
        }
    }
}

/// The shared FIFO byte buffer (spec §3, §4.2).
pub struct FifoBuffer {
    inner: Mutex<Inner>,
    cond: Condvar,
    close_requested: AtomicBool,
}

impl FifoBuffer {
    pub fn new(page_size: usize, limit: usize) -> FifoBuffer {
        assert!(page_size > 0, "page size must be positive");
        FifoBuffer {
            inner: Mutex::new(Inner {
                pages: VecDeque::new(),
                read: Pointer::new(),
                write: Pointer::new(),
                sz: 0,
                limit,
                page_size,
                state: State::Open,
                close_cause: None,
            }),
            cond: Condvar::new(),
            close_requested: AtomicBool::new(false),
        }
    }

    /// `sz` if positive, `-1` once closed and drained, `0` otherwise.
    pub fn readable(&self) -> i64 {
        self.inner.lock().unwrap().readable()
    }

    /// `max(0, limit - sz)` while open, `0` once closed.
    pub fn writable(&self) -> usize {
        self.inner.lock().unwrap().writable()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().state == State::Closed
    }

    /// Observable without the lock, per spec: writers/readers blocked in the
    /// bounded wait can check this every tick instead of fighting for the
    /// mutex just to notice an impending close.
    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }

    /// Raises `limit`, waking all waiters so a previously blocked writer can
    /// re-check `writable()`.
    pub fn set_limit(&self, limit: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.limit = limit;
        self.cond.notify_all();
    }

    pub fn close(&self) {
        self.close_with_cause_opt(None);
    }

    pub fn close_with_cause(&self, cause: impl Into<String>) {
        self.close_with_cause_opt(Some(cause.into()));
    }

    fn close_with_cause_opt(&self, cause: Option<String>) {
        self.close_requested.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        if inner.state == State::Closed {
            return;
        }
        if inner.state == State::Open {
            inner.state = State::CloseRequested;
        }
        if inner.close_cause.is_none() {
            inner.close_cause = cause;
        }
        if inner.sz == 0 {
            inner.state = State::Closed;
        }
        if inner.readable() < 0 {
            inner.pages.clear();
        }
        self.cond.notify_all();
    }

    pub fn close_cause(&self) -> Option<String> {
        self.inner.lock().unwrap().close_cause.clone()
    }

    /// Writes at most `writable()` bytes without blocking.
    pub fn write_non_block(&self, buf: &[u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != State::Open {
            return 0;
        }
        let n = inner.write_some(buf);
        if n > 0 {
            self.cond.notify_all();
        }
        n
    }

    /// Blocks until all of `buf` has been appended, or the buffer closes
    /// mid-write. `interrupt` is polled every bounded-wait tick.
    pub fn write(&self, buf: &[u8], interrupt: &Interrupt) -> Result<(), TransportError> {
        let mut pos = 0;
        let mut inner = self.inner.lock().unwrap();
        while pos < buf.len() {
            if inner.state != State::Open {
                return Err(TransportError::aborted("fifo buffer closed mid-write"));
            }
            let n = inner.write_some(&buf[pos..]);
            if n > 0 {
                pos += n;
                self.cond.notify_all();
                continue;
            }
            if interrupt.is_set() {
                return Err(TransportError::Interrupted);
            }
            let (guard, _timeout) = self
                .cond
                .wait_timeout(inner, WAIT_QUANTUM)
                .unwrap();
            inner = guard;
        }
        Ok(())
    }

    /// Pulls from `stream` into the write pointer until the stream reports
    /// 0 (drained), EOF, or `writable() == 0`. Never loops past the point
    /// where the kernel itself reports "nothing more right now".
    pub fn receive<R: Read>(&self, stream: &mut R) -> io::Result<i64> {
        let mut total: i64 = 0;
        loop {
            let (page_size, room) = {
                let inner = self.inner.lock().unwrap();
                (inner.page_size, inner.writable())
            };
            if room == 0 {
                break;
            }
            let mut scratch = vec![0u8; room.min(page_size)];
            match stream.read(&mut scratch) {
                Ok(0) => {
                    self.close();
                    return Ok(if total == 0 { -1 } else { total });
                }
                Ok(n) => {
                    let mut inner = self.inner.lock().unwrap();
                    let copied = inner.write_some(&scratch[..n]);
                    debug_assert_eq!(copied, n);
                    self.cond.notify_all();
                    total += n as i64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Pushes from the read pointer into `stream` until `readable() <= 0` or
    /// the stream accepts 0 bytes.
    pub fn send<W: Write>(&self, stream: &mut W) -> io::Result<i64> {
        let mut total: i64 = 0;
        loop {
            let readable = self.readable();
            if readable <= 0 {
                if readable < 0 {
                    return Ok(-1);
                }
                break;
            }
            let (page_size, chunk_len) = {
                let inner = self.inner.lock().unwrap();
                let avail_in_page = inner
                    .pages
                    .front()
                    .map(|p| p.filled() - inner.read.offset())
                    .unwrap_or(0);
                (inner.page_size, avail_in_page)
            };
            if chunk_len == 0 {
                break;
            }
            let mut scratch = vec![0u8; chunk_len];
            let copied = self.peek(0, &mut scratch);
            debug_assert_eq!(copied, chunk_len);
            match stream.write(&scratch) {
                Ok(0) => {
                    self.close();
                    return Ok(-1);
                }
                Ok(n) => {
                    self.consume(n);
                    total += n as i64;
                    let _ = page_size;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Blocks until at least one byte is available, or the buffer is
    /// closed-and-empty (returns `Ok(0)`, the idiomatic Rust EOF marker).
    /// `len == 0` always returns `Ok(0)` immediately without blocking.
    pub fn read(&self, buf: &mut [u8], interrupt: &Interrupt) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock().unwrap();
        loop {
            let readable = inner.readable();
            if readable > 0 {
                let n = (readable as usize).min(buf.len());
                let copied = inner.peek_some(0, &mut buf[..n]);
                inner.consume(copied);
                self.cond.notify_all();
                return Ok(copied);
            }
            if readable < 0 {
                return Ok(0);
            }
            if interrupt.is_set() {
                return Err(TransportError::Interrupted);
            }
            let (guard, _timeout) = self.cond.wait_timeout(inner, WAIT_QUANTUM).unwrap();
            inner = guard;
        }
    }

    /// Drains as many bytes as are currently available without blocking.
    pub fn read_non_blocking(&self, buf: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let readable = inner.readable().max(0) as usize;
        let n = readable.min(buf.len());
        if n == 0 {
            return 0;
        }
        let copied = inner.peek_some(0, &mut buf[..n]);
        inner.consume(copied);
        self.cond.notify_all();
        copied
    }

    /// Copies up to `buf.len()` bytes starting `offset` bytes past the read
    /// pointer, without advancing it.
    pub fn peek(&self, offset: usize, buf: &mut [u8]) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.peek_some(offset, buf)
    }

    fn consume(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.consume(n);
        self.cond.notify_all();
    }

    /// Wraps `self` as the producer byte stream (spec §4.2, "Wrapping as
    /// byte streams").
    pub fn producer(self: &Arc<Self>) -> FifoWriter {
        FifoWriter {
            buf: Arc::clone(self),
            interrupt: Interrupt::new(),
        }
    }

    /// Wraps `self` as the consumer byte stream.
    pub fn consumer(self: &Arc<Self>) -> FifoReader {
        FifoReader {
            buf: Arc::clone(self),
            interrupt: Interrupt::new(),
        }
    }
}

/// Producer-side `Write` view over a [`FifoBuffer`] (spec §4.2).
pub struct FifoWriter {
    buf: Arc<FifoBuffer>,
    interrupt: Interrupt,
}

impl FifoWriter {
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }
}

impl Write for FifoWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf
            .write(buf, &self.interrupt)
            .map(|()| buf.len())
            .map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Consumer-side `Read` view over a [`FifoBuffer`] (spec §4.2).
pub struct FifoReader {
    buf: Arc<FifoBuffer>,
    interrupt: Interrupt,
}

impl FifoReader {
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }
}

impl Read for FifoReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buf.read(buf, &self.interrupt).map_err(io::Error::from)
    }
}
