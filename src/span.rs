//! Spans: descriptors of page runs, and their bucket-locked lists.

mod link;

use core::{
    cell::Cell,
    fmt,
    ptr::{self, NonNull},
};

use spin::{Mutex, MutexGuard};

pub use self::link::{Iter, Link, Linked, List};
use crate::{
    config::PAGE_SHIFT,
    error::{Error, violated},
    free_list::{ObjectChain, ObjectRef},
};

/// The page number of an address, i.e. `address >> PAGE_SHIFT`.
pub type PageId = usize;

/// The size of a page in bytes.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// A descriptor of a contiguous run of pages.
///
/// Spans are exchanged between the central tier, which issues the objects
/// carved from a span one by one, and the page tier, which splits and
/// coalesces idle spans.
///
/// # Exclusive access
///
/// Every mutating method is `unsafe` and requires the caller to have
/// exclusive access to the span: it either holds the lock of the
/// [`SpanList`] currently containing the span, or it is the single thread
/// holding the span after [`erase`](List::erase) (or before its first
/// insertion) and before it is inserted elsewhere. No other thread may touch
/// the span meanwhile, not even through the read-only accessors.
pub struct Span<'a> {
    link: Link<'a, Self>,

    page_id: Cell<PageId>,
    page_count: Cell<usize>,
    is_in_use: Cell<bool>,

    obj_size: Cell<usize>,
    free: Cell<Option<ObjectRef<'a>>>,
    free_count: Cell<usize>,
    use_count: Cell<usize>,
}

// SAFETY: Mutation is `unsafe` and requires exclusive access, see above.
// Every write to the cells is thus serialized by the bucket lock of the owning
// list, or happens on the sole owner thread.
unsafe impl<'a> Sync for Span<'a> {}

impl<'a> Linked<'a> for Span<'a> {
    fn link(&'a self) -> &'a Link<'a, Self> {
        &self.link
    }
}

impl PartialEq for Span<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for Span<'_> {}

impl fmt::Debug for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("page_id", &self.page_id.get())
            .field("page_count", &self.page_count.get())
            .field("is_in_use", &self.is_in_use.get())
            .field("obj_size", &self.obj_size.get())
            .field("free_count", &self.free_count.get())
            .field("use_count", &self.use_count.get())
            .field("link", &self.link)
            .finish()
    }
}

impl<'a> Span<'a> {
    pub const fn new(page_id: PageId, page_count: usize) -> Self {
        Span {
            link: Link::new(),
            page_id: Cell::new(page_id),
            page_count: Cell::new(page_count),
            is_in_use: Cell::new(false),
            obj_size: Cell::new(0),
            free: Cell::new(None),
            free_count: Cell::new(0),
            use_count: Cell::new(0),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.get()
    }

    /// # Safety
    ///
    /// The caller must have [exclusive access](Span#exclusive-access) to the
    /// span.
    pub unsafe fn set_page_id(&self, page_id: PageId) {
        self.page_id.set(page_id)
    }

    pub fn page_count(&self) -> usize {
        self.page_count.get()
    }

    /// # Safety
    ///
    /// The caller must have [exclusive access](Span#exclusive-access) to the
    /// span.
    pub unsafe fn set_page_count(&self, page_count: usize) {
        self.page_count.set(page_count)
    }

    /// The first page after this span.
    pub fn end_page(&self) -> PageId {
        self.page_id() + self.page_count()
    }

    pub fn start_addr(&self) -> usize {
        self.page_id() << PAGE_SHIFT
    }

    /// The size of the page run in bytes.
    pub fn size(&self) -> usize {
        self.page_count() << PAGE_SHIFT
    }

    /// Whether the span is handed to the central tier. The page tier only
    /// coalesces spans that are not in use.
    pub fn is_in_use(&self) -> bool {
        self.is_in_use.get()
    }

    /// # Safety
    ///
    /// The caller must have [exclusive access](Span#exclusive-access) to the
    /// span.
    pub unsafe fn set_in_use(&self, in_use: bool) {
        self.is_in_use.set(in_use)
    }

    pub fn obj_size(&self) -> usize {
        self.obj_size.get()
    }

    /// The number of objects currently checked out from this span.
    pub fn use_count(&self) -> usize {
        self.use_count.get()
    }

    pub fn free_count(&self) -> usize {
        self.free_count.get()
    }

    pub fn has_free(&self) -> bool {
        // SAFETY: We read the tag without moving out the inner `ObjectRef`.
        unsafe { (*self.free.as_ptr()).is_some() }
    }

    /// Whether every object has come back, i.e. the span may return to the
    /// page tier.
    pub fn is_idle(&self) -> bool {
        self.use_count() == 0
    }

    pub fn prev(&self) -> Option<&'a Span<'a>> {
        self.link.prev()
    }

    /// The next span in the owning list, or `None` for the end of it.
    pub fn next(&self) -> Option<&'a Span<'a>> {
        self.link.next()
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_linked()
    }

    /// Cuts the whole page run into objects of `obj_size`, replacing the free
    /// list of this span. The objects are linked in address order.
    ///
    /// # Safety
    ///
    /// - The caller must have [exclusive access](Span#exclusive-access) to the
    ///   span;
    /// - The page run must be valid for reads and writes for `'a`, and owned by
    ///   this span;
    /// - No object previously carved from this span may still be in use.
    pub unsafe fn carve(&self, obj_size: usize) {
        debug_assert!(obj_size >= size_of::<usize>());
        debug_assert!(obj_size % align_of::<usize>() == 0);

        let base = self.start_addr();
        let count = self.size() / obj_size;
        let iter = (0..count).map(|index| {
            let ptr = ptr::with_exposed_provenance_mut::<()>(base + index * obj_size);
            // SAFETY: the page run is owned by this span and never starts at address 0.
            unsafe { ObjectRef::new(NonNull::new_unchecked(ptr)) }
        });

        let mut last = None;
        iter.rev().for_each(|mut obj| {
            obj.set_next(last.take());
            last = Some(obj);
        });

        self.free.set(last);
        self.obj_size.set(obj_size);
        self.free_count.set(count);
        self.use_count.set(0);
    }

    /// # Safety
    ///
    /// The caller must have [exclusive access](Span#exclusive-access) to the
    /// span.
    pub unsafe fn pop_object(&self) -> Option<ObjectRef<'a>> {
        let mut obj = self.free.take()?;
        self.free.set(obj.take_next());
        self.free_count.set(self.free_count.get() - 1);
        self.use_count.set(self.use_count.get() + 1);
        Some(obj)
    }

    /// Takes at most `count` objects for a batch transfer, keeping their
    /// order.
    ///
    /// # Safety
    ///
    /// The caller must have [exclusive access](Span#exclusive-access) to the
    /// span.
    pub unsafe fn pop_batch(&self, count: usize) -> ObjectChain<'a> {
        let mut chain = ObjectChain::new();
        // SAFETY: forwarded to the caller.
        while chain.len() < count
            && let Some(obj) = unsafe { self.pop_object() }
        {
            chain.push_back(obj);
        }
        chain
    }

    /// Gives back an object previously popped from this span.
    ///
    /// # Returns
    ///
    /// `true` if this span is idle after the deallocation.
    ///
    /// # Safety
    ///
    /// The caller must have [exclusive access](Span#exclusive-access) to the
    /// span.
    ///
    /// # Panics
    ///
    /// Panics if no object of this span is checked out.
    #[track_caller]
    pub unsafe fn push_object(&self, mut obj: ObjectRef<'a>) -> bool {
        if self.use_count() == 0 {
            violated(Error::SpanIdle)
        }
        obj.set_next(self.free.take());
        self.free.set(Some(obj));
        self.free_count.set(self.free_count.get() + 1);
        self.use_count.set(self.use_count.get() - 1);
        self.is_idle()
    }
}

/// The list of spans managed by a single bucket.
pub type SpanChain<'a> = List<'a, Span<'a>>;

/// A bucket of spans: an intrusive span list guarded by its own lock.
///
/// There is one per size class in the central tier and one per page count
/// in the page tier, and never a lock guarding more than one bucket. The lock
/// is public so that callers can run multi-step critical sections, e.g.
/// erasing a span from one bucket and inserting it into another while holding
/// both.
pub struct SpanList<'a> {
    spans: Mutex<SpanChain<'a>>,
}

impl<'a> SpanList<'a> {
    pub const fn new() -> Self {
        SpanList {
            spans: Mutex::new(List::new()),
        }
    }

    /// Acquires the bucket lock.
    pub fn lock(&self) -> MutexGuard<'_, SpanChain<'a>> {
        self.spans.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, SpanChain<'a>>> {
        self.spans.try_lock()
    }

    /// Locks the bucket to check whether it holds any span.
    ///
    /// The calling thread must not hold the lock already, or it spins forever.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the bucket to count its spans. See [`is_empty`](Self::is_empty).
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

impl<'a> Default for SpanList<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpanList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(spans) => f.debug_list().entries(spans.iter()).finish(),
            None => write!(f, "SpanList (locked)"),
        }
    }
}
