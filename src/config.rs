//! Configuration surface (spec §6).

use crate::chunk::MAX_CHUNK_LENGTH;

const DEFAULT_FRAME_SIZE: u16 = 8192;
const DEFAULT_INGRESS_PAGE_SIZE: usize = 16 * 1024;
const DEFAULT_EGRESS_PAGE_SIZE: usize = 16 * 1024;
const DEFAULT_EGRESS_CAPACITY: usize = 256 * 1024;

/// Per-transport framing and buffer sizing.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Caps the length field of any one wire frame; `(0, 0x7FFF]`.
    pub frame_size: u16,
    /// Page size for the ingress `FifoBuffer`.
    pub ingress_page_size: usize,
    /// Capacity cap for the ingress `FifoBuffer`. A single command packet
    /// must fit, so this is effectively "large enough for one command"
    /// rather than truly unbounded.
    pub ingress_capacity: usize,
    /// Page size for the egress `FifoBuffer`.
    pub egress_page_size: usize,
    /// Capacity cap for the egress `FifoBuffer`.
    pub egress_capacity: usize,
}

impl TransportConfig {
    /// Builds a config, clamping `frame_size` into `(0, 0x7FFF]` the same
    /// way [`crate::chunk::ChunkHeader`] clamps an oversized length.
    pub fn new(frame_size: u16) -> TransportConfig {
        TransportConfig {
            frame_size: frame_size.clamp(1, MAX_CHUNK_LENGTH),
            ..TransportConfig::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> TransportConfig {
        TransportConfig {
            frame_size: DEFAULT_FRAME_SIZE,
            ingress_page_size: DEFAULT_INGRESS_PAGE_SIZE,
            // "Effectively unbounded": large enough that no command a
            // well-behaved peer sends will wedge the parser, while still
            // bounding a misbehaving peer's single command.
            ingress_capacity: 64 * 1024 * 1024,
            egress_page_size: DEFAULT_EGRESS_PAGE_SIZE,
            egress_capacity: DEFAULT_EGRESS_CAPACITY,
        }
    }
}

/// Hub-wide configuration.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// When `false`, transports created through this hub never touch the
    /// selector: each gets a dedicated reader/writer thread pair instead
    /// (spec §6, "a boolean to disable NIO entirely and fall back to
    /// thread-per-stream").
    pub use_nio: bool,
    /// Size of the shared command-processor pool backing every transport's
    /// single-lane executor.
    pub worker_threads: usize,
    /// Capacity of the `Events` buffer passed to each `select()` call.
    pub events_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> HubConfig {
        HubConfig {
            use_nio: true,
            worker_threads: 4,
            events_capacity: 1024,
        }
    }
}
