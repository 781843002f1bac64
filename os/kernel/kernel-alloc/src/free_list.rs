use core::ptr::NonNull;

/// Header written into the first bytes of every **free** page.
///
/// ```text
/// +-----------------+--------------------------------------+
/// | Run (next link) |   junk (FREE_JUNK)                   |
/// +-----------------+--------------------------------------+
/// ^ page base                                  page base + PAGE_SIZE
/// ```
#[repr(C)]
struct Run {
    next: Option<NonNull<Run>>,
}

/// LIFO stack of free pages, linked through the pages themselves.
///
/// # Invariants
/// - Every linked page is page-aligned, writable and owned by this list.
/// - No page appears twice; `len` counts the linked pages.
pub(crate) struct FreeList {
    head: Option<NonNull<Run>>,
    len: usize,
}

// Safety: the list is only touched under its SpinLock; the pages it links are owned by it.
unsafe impl Send for FreeList {}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Links `page` in as the new head.
    ///
    /// # Safety
    /// - `page` must point to a whole, writable, page-aligned page that no one
    ///   else references.
    /// - `page` must not already be on any free list.
    pub(crate) unsafe fn push(&mut self, page: NonNull<u8>) {
        let run = page.cast::<Run>();
        unsafe {
            run.write(Run { next: self.head });
        }
        self.head = Some(run);
        self.len += 1;
    }

    /// Unlinks the most recently pushed page.
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let run = self.head?;
        // Safety: every linked run was written by `push` and is owned by the list.
        self.head = unsafe { run.as_ref().next };
        self.len -= 1;
        Some(run.cast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(4096))]
    struct Pages([[u8; 4096]; 3]);

    #[test]
    fn pages_come_back_lifo() {
        let mut mem = Pages([[0; 4096]; 3]);
        let mut list = FreeList::new();
        let ptrs: Vec<_> = mem
            .0
            .iter_mut()
            .map(|p| NonNull::new(p.as_mut_ptr()).unwrap())
            .collect();

        for &p in &ptrs {
            unsafe { list.push(p) };
        }
        assert_eq!(list.len(), 3);

        assert_eq!(list.pop(), Some(ptrs[2]));
        assert_eq!(list.pop(), Some(ptrs[1]));
        assert_eq!(list.pop(), Some(ptrs[0]));
        assert_eq!(list.pop(), None);
        assert_eq!(list.len(), 0);
    }
}
