use std::num::NonZeroU8;
use std::{fmt, ops};

/// Readiness interest used when (re)registering a [`Source`](crate::source::Source).
///
/// Mirrors the two readiness classes spec'd for the hub's reregister step:
/// `wantsToRead` and `wantsToWrite`. Unlike a general-purpose selector crate
/// this core never needs priority/AIO/LIO interest, so the set only carries
/// the two bits the transport's framing and buffering logic can produce.
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Interest(NonZeroU8);

const READABLE: u8 = 0b01;
const WRITABLE: u8 = 0b10;

impl Interest {
    pub const READABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(READABLE) });
    pub const WRITABLE: Interest = Interest(unsafe { NonZeroU8::new_unchecked(WRITABLE) });

    /// Combine two interests, as a `const fn` twin of the `BitOr` impl.
    pub const fn add(self, other: Interest) -> Interest {
        Interest(unsafe { NonZeroU8::new_unchecked(self.0.get() | other.0.get()) })
    }

    pub const fn is_readable(self) -> bool {
        self.0.get() & READABLE != 0
    }

    pub const fn is_writable(self) -> bool {
        self.0.get() & WRITABLE != 0
    }

    /// Build an interest set from the two boolean intents the hub computes
    /// for a transport direction. Returns `None` when neither is wanted,
    /// which callers treat as "skip registration for this source".
    pub fn from_flags(readable: bool, writable: bool) -> Option<Interest> {
        match (readable, writable) {
            (true, true) => Some(Interest::READABLE.add(Interest::WRITABLE)),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

impl ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, other: Interest) -> Interest {
        self.add(other)
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if self.is_readable() {
            write!(f, "READABLE")?;
            wrote = true;
        }
        if self.is_writable() {
            if wrote {
                write!(f, " | ")?;
            }
            write!(f, "WRITABLE")?;
        }
        Ok(())
    }
}
