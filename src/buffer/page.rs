//! Fixed-size pages and the offset cursor that walks them.
//!
//! [`FifoBuffer`](super::FifoBuffer) owns a `VecDeque<Page>` — the "linked
//! list with the head owned by the buffer" option from the design notes,
//! implemented with a deque instead of hand-rolled `next` links since both
//! give O(1) push-back/pop-front and the deque needs no unsafe code to stay
//! `Send`. [`Pointer`] is the offset-only cursor spec'd in §4.1: it never
//! owns a page, it just tracks how far into whichever page it currently
//! occupies a reader or writer has gotten.

/// One fixed-capacity byte page.
pub(crate) struct Page {
    data: Box<[u8]>,
    /// Bytes of `data` that have actually been written. Only the tail page
    /// of the chain may have `filled < data.len()`.
    filled: usize,
}

impl Page {
    pub(crate) fn new(page_size: usize) -> Page {
        Page {
            data: vec![0u8; page_size].into_boxed_slice(),
            filled: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn filled(&self) -> usize {
        self.filled
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn set_filled(&mut self, filled: usize) {
        debug_assert!(filled <= self.data.len());
        self.filled = filled;
    }
}

/// Logical cursor into a page chain: just a byte offset, `[0, page_size)`.
///
/// `FifoBuffer` holds one `Pointer` for the read side and one for the write
/// side. Neither pointer is ever shared across threads without the buffer's
/// lock already held.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Pointer {
    offset: usize,
}

impl Pointer {
    pub(crate) fn new() -> Pointer {
        Pointer { offset: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes this pointer may consume or produce in its current page before
    /// it must cross to the next one.
    pub(crate) fn chunk(&self, page_size: usize) -> usize {
        page_size - self.offset
    }

    /// Advances the cursor by `n` bytes (`n <= chunk(page_size)`). Returns
    /// `true` when the advance lands exactly on a page boundary, i.e. the
    /// caller must move on to the next/new page and reset this pointer.
    pub(crate) fn advance(&mut self, n: usize, page_size: usize) -> bool {
        debug_assert!(n <= self.chunk(page_size));
        self.offset += n;
        if self.offset == page_size {
            self.offset = 0;
            true
        } else {
            false
        }
    }
}
