//! `CapabilitySet` — remote-capability bits (spec §6, `getRemoteCapability()`).
//!
//! spec.md names the accessor but leaves the capability shape open; this
//! crate speaks exactly one wire protocol (chunked framing), so the set
//! carries a single bit today with room for the handshake layer above this
//! crate to set more as the protocol grows.

use std::fmt;

const SUPPORTS_CHUNKING: u32 = 0b1;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    pub fn none() -> CapabilitySet {
        CapabilitySet(0)
    }

    /// Every transport this crate creates speaks chunked framing.
    pub fn chunking() -> CapabilitySet {
        CapabilitySet(SUPPORTS_CHUNKING)
    }

    pub fn supports_chunking(self) -> bool {
        self.0 & SUPPORTS_CHUNKING != 0
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.supports_chunking() {
            set.entry(&"CHUNKING");
        }
        set.finish()
    }
}
