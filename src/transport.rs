//! `NioTransport` — framing, half-close and dispatch for one connection
//! (spec §4.4).
//!
//! Everything here that mutates selector-key state (`initial_register`,
//! `reregister`, `on_readable`, `on_writable`, `close_read_now`,
//! `deregister_all`) is `pub(crate)` and only ever called by
//! [`crate::hub::ChannelHub`] from its own selector thread. The public API
//! (`write_block`, `close_write`, `close_read`, `setup`) is safe to call
//! from any thread; it either mutates thread-safe state directly
//! (`FifoBuffer`) or defers to the selector thread via [`HubHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::buffer::{FifoBuffer, Interrupt};
use crate::capability::CapabilitySet;
use crate::chunk::{ChunkHeader, HEADER_LEN};
use crate::config::TransportConfig;
use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::executor::{Job, Lane};
use crate::hub::HubHandle;
use crate::interest::Interest;
use crate::poll::Registry;
use crate::source::Source;
use crate::token::Token;

/// Delivers inbound packets and the end-of-life notification for one
/// transport (spec §4.4 "inbound dispatch", §6 "Produced/consumed
/// contracts").
pub trait PacketReceiver: Send + Sync {
    /// Called at most once per inbound packet, from the transport's
    /// single-lane executor — never reentrantly, always in arrival order.
    fn handle(&self, packet: Vec<u8>);

    /// Called exactly once, when the transport terminates (orderly
    /// half-close observed from the peer, or an abort). No further calls to
    /// `handle` follow.
    fn terminate(&self, cause: TransportError);
}

/// One multiplexed connection: a pair of [`FifoBuffer`]s straddling a
/// selectable [`Endpoint`], framed with [`ChunkHeader`] and drained through a
/// per-connection [`Lane`] (spec §3 "NioTransport").
pub struct NioTransport {
    id: usize,
    hub: HubHandle,
    endpoint: Mutex<Endpoint>,
    rb: Arc<FifoBuffer>,
    wb: Arc<FifoBuffer>,
    write_interrupt: Interrupt,
    lane: Arc<Lane>,
    frame_size: u16,
    ropen: AtomicBool,
    wopen: AtomicBool,
    read_registered: AtomicBool,
    write_registered: AtomicBool,
    receiver: Mutex<Option<Arc<dyn PacketReceiver>>>,
    remote_capability: CapabilitySet,
    aborted: AtomicBool,
    terminal_sent: AtomicBool,
    ingress_close_initiated_locally: AtomicBool,
}

impl NioTransport {
    pub(crate) fn new(
        id: usize,
        endpoint: Endpoint,
        cfg: TransportConfig,
        hub: HubHandle,
    ) -> Arc<NioTransport> {
        let rb = Arc::new(FifoBuffer::new(cfg.ingress_page_size, cfg.ingress_capacity));
        let wb = Arc::new(FifoBuffer::new(cfg.egress_page_size, cfg.egress_capacity));
        let lane = Lane::new(hub.pool());
        let transport = Arc::new(NioTransport {
            id,
            hub,
            endpoint: Mutex::new(endpoint),
            rb,
            wb,
            write_interrupt: Interrupt::new(),
            lane,
            frame_size: cfg.frame_size,
            ropen: AtomicBool::new(true),
            wopen: AtomicBool::new(true),
            read_registered: AtomicBool::new(false),
            write_registered: AtomicBool::new(false),
            receiver: Mutex::new(None),
            remote_capability: CapabilitySet::chunking(),
            aborted: AtomicBool::new(false),
            terminal_sent: AtomicBool::new(false),
            ingress_close_initiated_locally: AtomicBool::new(false),
        });
        if !transport.hub.uses_nio() {
            spawn_thread_per_stream(Arc::clone(&transport));
        }
        transport
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn remote_capability(&self) -> CapabilitySet {
        self.remote_capability
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Installs the packet receiver. Until this is called the transport
    /// never expresses read interest, so no bytes are pulled off the wire
    /// (spec §4.4 "`setup(receiver)` gates `wantsToRead`").
    pub fn setup(&self, receiver: Arc<dyn PacketReceiver>) {
        *self.receiver.lock().unwrap() = Some(receiver);
        self.request_reregister();
    }

    /// Frames `packet` into one or more chunks of at most `frame_size`
    /// bytes and appends them to the egress buffer, blocking if it is full
    /// (spec §4.4 "Outbound framing").
    pub fn write_block(&self, packet: &[u8]) -> Result<(), TransportError> {
        if self.aborted.load(Ordering::SeqCst) || !self.wopen.load(Ordering::SeqCst) {
            return Err(TransportError::aborted("transport write side is closed"));
        }
        let frame_size = self.frame_size as usize;
        let mut pos = 0usize;
        loop {
            let frame = frame_size.min(packet.len() - pos);
            let has_more = pos + frame < packet.len();
            let header = ChunkHeader::new(frame as u16, !has_more);
            self.wb.write(&header.pack(), &self.write_interrupt)?;
            self.wb.write(&packet[pos..pos + frame], &self.write_interrupt)?;
            self.request_reregister();
            pos += frame;
            if !has_more {
                break;
            }
        }
        Ok(())
    }

    /// Closes the egress buffer; already-queued bytes still drain. Safe
    /// from any thread (spec §4.4 "Half-close policy").
    pub fn close_write(&self) {
        self.wb.close();
        self.request_reregister();
    }

    /// Requests that the read side close. Deferred to the selector thread
    /// since it mutates the selection key (spec §4.4 "`closeRead()` is
    /// deferred to the selector thread") — except under `use_nio: false`,
    /// where there is no selector thread to defer to and the reader thread
    /// picks the new `ropen` state up on its next poll.
    pub fn close_read(&self) {
        if self.hub.uses_nio() {
            self.hub.request_close_read(self.id);
        } else {
            self.close_read_local();
        }
    }

    fn request_reregister(&self) {
        self.hub.request_reregister(self.id);
    }

    fn notify_terminate(&self, reason: TransportError) {
        if self.terminal_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        let receiver = self.receiver.lock().unwrap().clone();
        if let Some(receiver) = receiver {
            let _ = self.lane.submit(Box::new(move || receiver.terminate(reason)));
        }
    }

    // ---- selector-thread-exclusive below this line ----

    pub(crate) fn initial_register(&self, registry: &Registry) {
        self.reregister(registry);
    }

    /// Recomputes `wantsToRead`/`wantsToWrite` from current buffer state and
    /// applies it to the selection key(s) (spec §4.4 "Register intents").
    pub(crate) fn reregister(&self, registry: &Registry) {
        let has_receiver = self.receiver.lock().unwrap().is_some();
        let want_read = has_receiver && self.rb.writable() > 0;
        // `wb.is_closed()` (closed-and-drained) still needs one more writable
        // tick to actually shut the socket's write half down in `on_writable`
        // — dropping interest the moment the buffer empties would leave
        // `close_write_now` never called.
        let want_write = self.wb.readable() > 0 || self.wb.is_closed();
        let ropen = self.ropen.load(Ordering::SeqCst);
        let wopen = self.wopen.load(Ordering::SeqCst);
        let mut endpoint = self.endpoint.lock().unwrap();
        match &mut *endpoint {
            Endpoint::Mono(stream) => {
                let interest = if !ropen && !wopen {
                    None
                } else {
                    Interest::from_flags(ropen && want_read, wopen && want_write)
                };
                apply_interest(
                    registry,
                    stream,
                    Token(self.id * 2),
                    &self.read_registered,
                    interest,
                );
            }
            Endpoint::Dual { read, write } => {
                let r_interest = if ropen {
                    Interest::from_flags(want_read, false)
                } else {
                    None
                };
                apply_interest(
                    registry,
                    read,
                    Token(self.id * 2),
                    &self.read_registered,
                    r_interest,
                );
                let w_interest = if wopen {
                    Interest::from_flags(false, want_write)
                } else {
                    None
                };
                apply_interest(
                    registry,
                    write,
                    Token(self.id * 2 + 1),
                    &self.write_registered,
                    w_interest,
                );
            }
        }
    }

    pub(crate) fn on_readable(&self, registry: &Registry) -> Result<(), TransportError> {
        if self.aborted.load(Ordering::SeqCst) {
            return Ok(());
        }
        let received = {
            let mut endpoint = self.endpoint.lock().unwrap();
            match &mut *endpoint {
                Endpoint::Mono(stream) => self.rb.receive(stream),
                Endpoint::Dual { read, .. } => self.rb.receive(read),
            }
        };
        received.map_err(TransportError::from)?;
        self.parse_and_dispatch()?;
        if self.rb.is_closed() {
            self.handle_peer_eof();
        }
        if self.rb.writable() == 0 && self.rb.readable() > 0 {
            return Err(TransportError::overflow(
                "ingress buffer full with no complete command parsed",
            ));
        }
        self.reregister(registry);
        Ok(())
    }

    pub(crate) fn on_writable(&self, registry: &Registry) -> Result<(), TransportError> {
        if self.aborted.load(Ordering::SeqCst) {
            return Ok(());
        }
        let sent = {
            let mut endpoint = self.endpoint.lock().unwrap();
            match &mut *endpoint {
                Endpoint::Mono(stream) => self.wb.send(stream),
                Endpoint::Dual { write, .. } => self.wb.send(write),
            }
        };
        match sent {
            Ok(n) if n < 0 => self.close_write_now(registry),
            Ok(_) => {}
            Err(e) => return Err(TransportError::from(e)),
        }
        self.reregister(registry);
        Ok(())
    }

    fn handle_peer_eof(&self) {
        if self.ingress_close_initiated_locally.load(Ordering::SeqCst) {
            return;
        }
        self.ropen.store(false, Ordering::SeqCst);
        self.notify_terminate(TransportError::aborted("peer closed connection"));
    }

    /// Same effect as [`Self::close_write_now`] but for the
    /// `use_nio: false` fallback, which never registered these fds with a
    /// selector in the first place.
    fn close_write_local(&self) {
        if !self.wopen.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut endpoint = self.endpoint.lock().unwrap();
        match &mut *endpoint {
            Endpoint::Mono(stream) => stream.shutdown_write(),
            Endpoint::Dual { write, .. } => write.shutdown_write(),
        }
    }

    /// Same effect as [`Self::close_read_now`] but for the `use_nio: false`
    /// fallback: no selection key to deregister, so the reader thread just
    /// observes `ropen` go false on its next poll and exits.
    fn close_read_local(&self) {
        self.ingress_close_initiated_locally.store(true, Ordering::SeqCst);
        if !self.ropen.swap(false, Ordering::SeqCst) {
            return;
        }
        self.rb.close();
        let mut endpoint = self.endpoint.lock().unwrap();
        match &mut *endpoint {
            Endpoint::Mono(stream) => stream.shutdown_read(),
            Endpoint::Dual { read, .. } => read.shutdown_read(),
        }
    }

    fn close_write_now(&self, registry: &Registry) {
        if !self.wopen.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut endpoint = self.endpoint.lock().unwrap();
        match &mut *endpoint {
            Endpoint::Mono(stream) => stream.shutdown_write(),
            Endpoint::Dual { write, .. } => {
                if self.write_registered.swap(false, Ordering::SeqCst) {
                    let _ = registry.deregister(write);
                }
                write.shutdown_write();
            }
        }
    }

    pub(crate) fn close_read_now(&self, registry: &Registry) {
        self.ingress_close_initiated_locally.store(true, Ordering::SeqCst);
        if !self.ropen.swap(false, Ordering::SeqCst) {
            return;
        }
        self.rb.close();
        let mut endpoint = self.endpoint.lock().unwrap();
        match &mut *endpoint {
            Endpoint::Mono(stream) => stream.shutdown_read(),
            Endpoint::Dual { read, .. } => {
                if self.read_registered.swap(false, Ordering::SeqCst) {
                    let _ = registry.deregister(read);
                }
                read.shutdown_read();
            }
        }
        drop(endpoint);
        self.reregister(registry);
    }

    pub(crate) fn is_fully_closed(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
            || (!self.ropen.load(Ordering::SeqCst) && !self.wopen.load(Ordering::SeqCst))
    }

    pub(crate) fn deregister_all(&self, registry: &Registry) {
        let mut endpoint = self.endpoint.lock().unwrap();
        match &mut *endpoint {
            Endpoint::Mono(stream) => {
                if self.read_registered.swap(false, Ordering::SeqCst) {
                    let _ = registry.deregister(stream);
                }
            }
            Endpoint::Dual { read, write } => {
                if self.read_registered.swap(false, Ordering::SeqCst) {
                    let _ = registry.deregister(read);
                }
                if self.write_registered.swap(false, Ordering::SeqCst) {
                    let _ = registry.deregister(write);
                }
            }
        }
    }

    /// Idempotently tears a transport down: both buffers closed, any queued
    /// single-lane jobs discarded, one terminal notification delivered
    /// (spec §4.4 "Aborting a transport is terminal").
    pub(crate) fn abort(&self, reason: TransportError) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.ropen.store(false, Ordering::SeqCst);
        self.wopen.store(false, Ordering::SeqCst);
        self.rb.close();
        self.wb.close();
        {
            let mut endpoint = self.endpoint.lock().unwrap();
            match &mut *endpoint {
                Endpoint::Mono(stream) => {
                    stream.shutdown_read();
                    stream.shutdown_write();
                }
                Endpoint::Dual { read, write } => {
                    read.shutdown_read();
                    write.shutdown_write();
                }
            }
        }
        self.lane.discard_pending();
        self.notify_terminate(reason);
    }

    /// Walks the ingress buffer without consuming it, looking for one full
    /// run of chunks ending in a last-chunk header (spec §4.4 "Inbound
    /// parsing"). Returns the total wire length (headers + bodies) of the
    /// first complete packet, if any.
    fn scan_complete_packet(&self) -> Option<usize> {
        let readable = self.rb.readable();
        if readable <= 0 {
            return None;
        }
        let readable = readable as usize;
        let mut offset = 0usize;
        loop {
            if offset + HEADER_LEN > readable {
                return None;
            }
            let mut hdr = [0u8; HEADER_LEN];
            if self.rb.peek(offset, &mut hdr) < HEADER_LEN {
                return None;
            }
            let header = ChunkHeader::parse(hdr);
            let end = offset + HEADER_LEN + header.length() as usize;
            if end > readable {
                return None;
            }
            offset = end;
            if header.is_last() {
                return Some(offset);
            }
        }
    }

    /// Consumes exactly `total_wire_len` bytes already confirmed present by
    /// [`Self::scan_complete_packet`], stripping headers as it goes.
    /// Returns `None` for a packet whose concatenated chunk bodies are
    /// empty — spec.md says those are silently discarded.
    fn drain_packet(&self, total_wire_len: usize) -> Option<Vec<u8>> {
        let mut body = Vec::new();
        let mut consumed = 0usize;
        while consumed < total_wire_len {
            let mut hdr = [0u8; HEADER_LEN];
            let n = self.rb.read_non_blocking(&mut hdr);
            debug_assert_eq!(n, HEADER_LEN);
            consumed += n;
            let header = ChunkHeader::parse(hdr);
            let len = header.length() as usize;
            if len > 0 {
                let mut chunk = vec![0u8; len];
                let mut got = 0;
                while got < len {
                    let n = self.rb.read_non_blocking(&mut chunk[got..]);
                    if n == 0 {
                        break;
                    }
                    got += n;
                }
                body.extend_from_slice(&chunk[..got]);
                consumed += got;
            }
            if header.is_last() {
                break;
            }
        }
        if body.is_empty() {
            None
        } else {
            Some(body)
        }
    }

    fn parse_and_dispatch(&self) -> Result<(), TransportError> {
        loop {
            let total = match self.scan_complete_packet() {
                Some(total) => total,
                None => break,
            };
            if let Some(packet) = self.drain_packet(total) {
                self.dispatch(packet)?;
            }
        }
        Ok(())
    }

    fn dispatch(&self, packet: Vec<u8>) -> Result<(), TransportError> {
        let receiver = self.receiver.lock().unwrap().clone();
        if let Some(receiver) = receiver {
            let job: Job = Box::new(move || receiver.handle(packet));
            self.lane.submit(job)?;
        }
        Ok(())
    }
}

fn apply_interest<S: Source>(
    registry: &Registry,
    source: &mut S,
    token: Token,
    already_registered: &AtomicBool,
    interest: Option<Interest>,
) {
    match interest {
        Some(interest) => {
            if already_registered.swap(true, Ordering::SeqCst) {
                let _ = registry.reregister(source, token, interest);
            } else {
                let _ = registry.register(source, token, interest);
            }
        }
        None => {
            if already_registered.swap(false, Ordering::SeqCst) {
                let _ = registry.deregister(source);
            }
        }
    }
}

/// `HubConfig { use_nio: false }` fallback (spec §6 "a boolean to disable
/// NIO entirely"): one reader thread and one writer thread per transport,
/// moving bytes between the endpoint and the same [`FifoBuffer`] pair the
/// NIO path uses, so `NioTransport`'s public surface is identical either
/// way.
fn spawn_thread_per_stream(transport: Arc<NioTransport>) {
    let reader = Arc::clone(&transport);
    thread::Builder::new()
        .name(format!("nio-mux-read-{}", transport.id))
        .spawn(move || thread_per_stream_read_loop(reader))
        .expect("spawn thread-per-stream reader");

    let writer = Arc::clone(&transport);
    thread::Builder::new()
        .name(format!("nio-mux-write-{}", transport.id))
        .spawn(move || thread_per_stream_write_loop(writer))
        .expect("spawn thread-per-stream writer");
}

/// Every [`Endpoint`] stream is always a non-blocking fd (`FdStream`
/// construction sets `O_NONBLOCK` unconditionally), so even in
/// thread-per-stream mode `rb.receive`/`wb.send` return quickly whether or
/// not data is ready — the lock below is held only for one syscall's worth
/// of time, never across a real block, so the reader and writer thread never
/// starve each other out of `endpoint`'s mutex.
const THREAD_PER_STREAM_IDLE_POLL: std::time::Duration = std::time::Duration::from_millis(10);

fn thread_per_stream_read_loop(transport: Arc<NioTransport>) {
    loop {
        if transport.is_aborted() || !transport.ropen.load(Ordering::SeqCst) {
            return;
        }
        let received = {
            let mut endpoint = transport.endpoint.lock().unwrap();
            match &mut *endpoint {
                Endpoint::Mono(stream) => transport.rb.receive(stream),
                Endpoint::Dual { read, .. } => transport.rb.receive(read),
            }
        };
        match received {
            Ok(_) => {}
            Err(e) => {
                transport.abort(TransportError::from(e));
                return;
            }
        }
        if let Err(e) = transport.parse_and_dispatch() {
            transport.abort(e);
            return;
        }
        if transport.rb.is_closed() {
            transport.handle_peer_eof();
            return;
        }
        if transport.rb.writable() == 0 && transport.rb.readable() > 0 {
            transport.abort(TransportError::overflow("ingress buffer wedged"));
            return;
        }
        thread::sleep(THREAD_PER_STREAM_IDLE_POLL);
    }
}

fn thread_per_stream_write_loop(transport: Arc<NioTransport>) {
    loop {
        if transport.is_aborted() {
            return;
        }
        let sent = {
            let mut endpoint = transport.endpoint.lock().unwrap();
            match &mut *endpoint {
                Endpoint::Mono(stream) => transport.wb.send(stream),
                Endpoint::Dual { write, .. } => transport.wb.send(write),
            }
        };
        match sent {
            Ok(n) if n < 0 => {
                transport.close_write_local();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                transport.abort(TransportError::from(e));
                return;
            }
        }
        thread::sleep(THREAD_PER_STREAM_IDLE_POLL);
    }
}
