//! OS selector backend.
//!
//! Scoped to Linux/Android `epoll`, per [`SPEC_FULL.md`]'s crate-shape
//! decision: the spec's non-goals disclaim any fairness/portability
//! guarantee beyond round-robin servicing on one platform's selector, so
//! this crate does not carry the kqueue/IOCP backends the teacher repo
//! supports.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use epoll::{Event, Events, Selector};

mod waker;
pub use waker::Waker;
