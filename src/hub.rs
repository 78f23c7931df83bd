//! `ChannelHub` — the selector loop (spec §4.5, §9 "global selector state").
//!
//! One `ChannelHub` owns exactly one OS selector and exactly one thread
//! running [`ChannelHub::run`]. Every mutation of selector-key state (a
//! transport registering, reregistering, or being torn down) happens on that
//! thread: other threads that need one of those things done enqueue a
//! [`SelectorTask`] and wake the selector via its [`sys::Waker`], the same
//! "wake yourself up" pattern `mio`'s own waker exists to support.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{HubConfig, TransportConfig};
use crate::endpoint::Endpoint;
use crate::error::TransportError;
use crate::executor::Pool;
use crate::poll::{Poll, Registry};
use crate::sys::{self, Events};
use crate::token::Token;
use crate::transport::NioTransport;

pub(crate) type SelectorTask = Box<dyn FnOnce(&mut ChannelHub) + Send>;

const WAKER_TOKEN: Token = Token(usize::MAX);
const SELECT_TIMEOUT: Duration = Duration::from_millis(250);

struct Shared {
    task_tx: mpsc::Sender<SelectorTask>,
    waker: Arc<sys::Waker>,
    registry: Registry,
    next_id: AtomicUsize,
    started: Mutex<bool>,
    started_cond: Condvar,
    died: Mutex<Option<String>>,
    pool: Arc<Pool>,
    config: HubConfig,
}

/// Cheaply-cloneable handle every [`NioTransport`] and every external caller
/// uses to talk to the hub without holding `&mut ChannelHub` themselves.
#[derive(Clone)]
pub struct HubHandle {
    shared: Arc<Shared>,
}

impl HubHandle {
    fn enqueue(&self, task: SelectorTask) -> Result<(), TransportError> {
        if let Some(cause) = self.shared.died.lock().unwrap().clone() {
            return Err(TransportError::selector_died(cause));
        }
        self.shared
            .task_tx
            .send(task)
            .map_err(|_| TransportError::selector_died("selector task queue closed"))?;
        self.shared.waker.wake().map_err(TransportError::from)?;
        Ok(())
    }

    fn wait_until_started(&self) {
        let mut started = self.shared.started.lock().unwrap();
        while !*started {
            started = self.shared.started_cond.wait(started).unwrap();
        }
    }

    fn died_cause(&self) -> Option<String> {
        self.shared.died.lock().unwrap().clone()
    }

    pub(crate) fn pool(&self) -> Arc<Pool> {
        Arc::clone(&self.shared.pool)
    }

    pub(crate) fn registry(&self) -> Registry {
        self.shared.registry.clone()
    }

    pub(crate) fn uses_nio(&self) -> bool {
        self.shared.config.use_nio
    }

    /// Requests that the selector thread recompute and apply `id`'s
    /// interest set. Used by any thread that just changed something a
    /// transport's `reregister()` depends on (wrote to `wb`, installed a
    /// receiver, ...).
    pub(crate) fn request_reregister(&self, id: usize) {
        let _ = self.enqueue(Box::new(move |hub: &mut ChannelHub| {
            hub.reregister_transport(id);
        }));
    }

    pub(crate) fn request_close_read(&self, id: usize) {
        let _ = self.enqueue(Box::new(move |hub: &mut ChannelHub| {
            hub.close_read_transport(id);
        }));
    }

    pub(crate) fn request_abort(&self, id: usize, reason: TransportError) {
        let reason = TransportError::aborted(reason.to_string());
        let _ = self.enqueue(Box::new(move |hub: &mut ChannelHub| {
            hub.abort_transport(id, reason);
        }));
    }

    /// Creates a new transport and, once the hub's selector thread has
    /// picked it up, returns it ready for use. Fails fast (spec §7 kind 7)
    /// if the selector thread has already died.
    ///
    /// Under `HubConfig { use_nio: false }` the transport never touches the
    /// selector at all: [`NioTransport::new`] spawns its own reader/writer
    /// threads instead, so there is nothing here for the selector thread to
    /// track (it would otherwise service the same fd from two places).
    pub fn create_transport(
        &self,
        endpoint: Endpoint,
        cfg: TransportConfig,
    ) -> Result<Arc<NioTransport>, TransportError> {
        if let Some(cause) = self.died_cause() {
            return Err(TransportError::selector_died(cause));
        }
        self.wait_until_started();
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let transport = NioTransport::new(id, endpoint, cfg, self.clone());
        if self.uses_nio() {
            let inserted = Arc::clone(&transport);
            self.enqueue(Box::new(move |hub: &mut ChannelHub| {
                hub.insert_transport(id, inserted);
            }))?;
        }
        Ok(transport)
    }
}

/// The selector loop (spec §4.5).
pub struct ChannelHub {
    shared: Arc<Shared>,
    task_rx: mpsc::Receiver<SelectorTask>,
    poll: Poll,
    events: Events,
    transports: HashMap<usize, Arc<NioTransport>>,
}

/// Builds a hub and a handle to it, but does not start the selector thread —
/// call [`ChannelHub::spawn`] for that. Splitting construction from spawning
/// lets a caller hold the `HubHandle` before the thread exists, matching
/// spec.md's "other threads constructing new transports can wait until the
/// selector is running" design note.
pub fn channel_hub(config: HubConfig) -> io::Result<(ChannelHub, HubHandle)> {
    let poll = Poll::new()?;
    let registry = poll.registry().clone();
    let waker = Arc::new(sys::Waker::new(registry.selector(), WAKER_TOKEN)?);
    let (task_tx, task_rx) = mpsc::channel();
    let pool = Pool::new(config.worker_threads);
    let shared = Arc::new(Shared {
        task_tx,
        waker,
        registry,
        next_id: AtomicUsize::new(0),
        started: Mutex::new(false),
        started_cond: Condvar::new(),
        died: Mutex::new(None),
        pool,
        config,
    });
    let events = Events::with_capacity(config.events_capacity);
    let hub = ChannelHub {
        shared: Arc::clone(&shared),
        task_rx,
        poll,
        events,
        transports: HashMap::new(),
    };
    Ok((hub, HubHandle { shared }))
}

impl ChannelHub {
    pub(crate) fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Spawns the selector loop on a dedicated thread.
    pub fn spawn(mut self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("nio-mux-hub".to_string())
            .spawn(move || self.run())
            .expect("spawn selector thread")
    }

    /// Runs the select loop on the calling thread until [`ChannelHub::shutdown`]
    /// closes the selector, or an unrecoverable error kills it (spec §4.5
    /// "Shutdown", §7 kind 7).
    pub fn run(&mut self) {
        {
            let mut started = self.shared.started.lock().unwrap();
            *started = true;
            self.shared.started_cond.notify_all();
        }
        loop {
            if let Err(cause) = self.tick() {
                log::error!("nio-mux selector thread died: {cause}");
                *self.shared.died.lock().unwrap() = Some(cause.to_string());
                for transport in self.transports.values() {
                    transport.abort(TransportError::selector_died(cause.to_string()));
                }
                self.transports.clear();
                break;
            }
        }
    }

    fn tick(&mut self) -> Result<(), TransportError> {
        self.drain_tasks();
        if let Some(cause) = self.shared.died.lock().unwrap().clone() {
            return Err(TransportError::selector_died(cause));
        }
        self.poll
            .poll(&mut self.events, Some(SELECT_TIMEOUT))
            .map_err(TransportError::from)?;
        let mut to_abort = Vec::new();
        for event in self.events.iter() {
            let token = event.token();
            if token == WAKER_TOKEN {
                self.shared.waker.ack();
                continue;
            }
            let id = token.0 / 2;
            let Some(transport) = self.transports.get(&id) else {
                continue;
            };
            let transport = Arc::clone(transport);
            if event.is_error() || event.is_read_closed() && event.is_write_closed() {
                to_abort.push((id, TransportError::aborted("selection key reported error/hangup")));
                continue;
            }
            if event.is_readable() {
                if let Err(e) = transport.on_readable(self.registry()) {
                    to_abort.push((id, e));
                    continue;
                }
            }
            if event.is_writable() {
                if let Err(e) = transport.on_writable(self.registry()) {
                    to_abort.push((id, e));
                    continue;
                }
            }
            transport.reregister(self.registry());
        }
        for (id, reason) in to_abort {
            self.abort_transport(id, reason);
        }
        Ok(())
    }

    fn drain_tasks(&mut self) {
        while let Ok(task) = self.task_rx.try_recv() {
            task(self);
        }
    }

    fn insert_transport(&mut self, id: usize, transport: Arc<NioTransport>) {
        transport.initial_register(self.registry());
        self.transports.insert(id, transport);
    }

    fn reregister_transport(&mut self, id: usize) {
        if let Some(transport) = self.transports.get(&id) {
            transport.reregister(self.registry());
            if transport.is_fully_closed() {
                let transport = Arc::clone(transport);
                transport.deregister_all(self.registry());
                self.transports.remove(&id);
            }
        }
    }

    fn close_read_transport(&mut self, id: usize) {
        if let Some(transport) = self.transports.get(&id) {
            transport.close_read_now(self.registry());
            if transport.is_fully_closed() {
                let transport = Arc::clone(transport);
                transport.deregister_all(self.registry());
                self.transports.remove(&id);
            }
        }
    }

    fn abort_transport(&mut self, id: usize, reason: TransportError) {
        if let Some(transport) = self.transports.remove(&id) {
            log::warn!("aborting transport {id}: {reason}");
            transport.abort(reason);
            transport.deregister_all(self.registry());
        }
    }

    /// Stops the selector thread: every live transport is aborted, the
    /// shared pool is shut down, and the underlying selector is dropped.
    pub fn shutdown(handle: &HubHandle) {
        let _ = handle.enqueue(Box::new(|hub: &mut ChannelHub| {
            let ids: Vec<usize> = hub.transports.keys().copied().collect();
            for id in ids {
                hub.abort_transport(id, TransportError::aborted("hub shutting down"));
            }
            hub.shared.pool.shutdown();
            *hub.shared.died.lock().unwrap() = Some("hub shut down".to_string());
        }));
    }
}
