use core::{marker::PhantomData, mem, ptr::NonNull};

use crate::track;

/// A free object, not yet delivered to the user. That is to say, its first
/// word contains a valid `next` link.
///
/// The handle owns the underlying memory, although the corresponding size is
/// specified by the span the object was carved from.
#[repr(transparent)]
#[must_use = "objects must be used"]
pub struct ObjectRef<'a>(NonNull<()>, PhantomData<&'a ()>);

// SAFETY: The object owns its underlying memory.
unsafe impl<'a> Send for ObjectRef<'a> {}
unsafe impl<'a> Sync for ObjectRef<'a> {}

impl<'a> ObjectRef<'a> {
    const SLOT_SIZE: usize = mem::size_of::<Option<NonNull<()>>>();

    /// Hands the object out of the free lists. The link slot becomes ordinary
    /// (undefined) memory of the caller.
    #[must_use = "objects must be used"]
    pub fn into_raw(self) -> NonNull<()> {
        track::undefined(self.0.cast(), Self::SLOT_SIZE);
        self.0
    }

    pub fn as_ptr(&self) -> NonNull<()> {
        self.0
    }

    /// # Safety
    ///
    /// The pointer must contain a valid object, i.e. either freshly created
    /// with [`ObjectRef::new`] or previously linked by this type, and must not
    /// be owned by another handle.
    pub(crate) unsafe fn from_raw(ptr: NonNull<()>) -> Self {
        ObjectRef(ptr, PhantomData)
    }

    /// Takes the ownership of a block of memory as a free object.
    ///
    /// # Safety
    ///
    /// - `ptr` must be valid for reads and writes of a pointer and aligned to
    ///   it, for the whole lifetime `'a`;
    /// - The memory must not be owned by other objects or used elsewhere.
    pub unsafe fn new(ptr: NonNull<()>) -> Self {
        let mut obj = unsafe { Self::from_raw(ptr) };
        obj.set_next(None);
        obj
    }

    pub fn set_next(&mut self, next: Option<Self>) {
        track::undefined(self.0.cast(), Self::SLOT_SIZE);
        // SAFETY: this structure contains a valid `next` pointer.
        unsafe { self.0.cast().write(next.map(Self::into_link)) };
        track::no_access(self.0.cast(), Self::SLOT_SIZE);
    }

    pub fn take_next(&mut self) -> Option<Self> {
        let ptr = self.0.cast::<Option<NonNull<()>>>();
        track::defined(self.0.cast(), Self::SLOT_SIZE);
        // SAFETY: this structure contains a valid `next` pointer.
        let next = unsafe { ptr.read() };
        unsafe { ptr.write(None) };
        track::no_access(self.0.cast(), Self::SLOT_SIZE);
        next.map(|ptr| unsafe { Self::from_raw(ptr) })
    }

    /// Moves the object into a link slot, keeping its slot inaccessible.
    fn into_link(self) -> NonNull<()> {
        self.0
    }
}

/// An owned, singly linked chain of free objects with a known tail.
///
/// This is the unit of batch transfers between tiers: it can be spliced onto
/// the front of another chain in O(1).
#[derive(Debug)]
pub struct ObjectChain<'a> {
    head: Option<ObjectRef<'a>>,
    tail: Option<NonNull<()>>,
    len: usize,
}

// SAFETY: The chain owns all of its objects, `tail` included.
unsafe impl<'a> Send for ObjectChain<'a> {}
unsafe impl<'a> Sync for ObjectChain<'a> {}

impl core::fmt::Debug for ObjectRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ObjectRef({:p})", self.0)
    }
}

impl<'a> ObjectChain<'a> {
    pub const fn new() -> Self {
        ObjectChain { head: None, tail: None, len: 0 }
    }

    /// Adopts a chain `[head..tail]` already linked through the first word of
    /// each object.
    ///
    /// # Safety
    ///
    /// - Following the links from `head` must reach `tail` after exactly
    ///   `len - 1` steps, and the link of `tail` must be null;
    /// - Every object must satisfy the requirements of [`ObjectRef::new`].
    pub unsafe fn from_raw_parts(head: NonNull<()>, tail: NonNull<()>, len: usize) -> Self {
        debug_assert!(len > 0);
        ObjectChain {
            head: Some(unsafe { ObjectRef::from_raw(head) }),
            tail: Some(tail),
            len,
        }
    }

    /// Releases the chain as `(head, tail, len)`, or `None` if it is empty.
    pub fn into_raw_parts(mut self) -> Option<(NonNull<()>, NonNull<()>, usize)> {
        let head = self.head.take()?;
        Some((head.into_link(), self.tail?, self.len))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<NonNull<()>> {
        self.head.as_ref().map(ObjectRef::as_ptr)
    }

    pub fn tail(&self) -> Option<NonNull<()>> {
        self.tail
    }

    pub fn push_front(&mut self, mut obj: ObjectRef<'a>) {
        if self.tail.is_none() {
            self.tail = Some(obj.as_ptr());
        }
        obj.set_next(self.head.take());
        self.head = Some(obj);
        self.len += 1;
    }

    pub fn push_back(&mut self, mut obj: ObjectRef<'a>) {
        obj.set_next(None);
        let ptr = obj.as_ptr();
        match self.tail.replace(ptr) {
            // SAFETY: `tail` is owned by this chain; the alias is only used to rewrite its
            // link slot.
            Some(tail) => unsafe { ObjectRef::from_raw(tail) }.set_next(Some(obj)),
            None => self.head = Some(obj),
        }
        self.len += 1;
    }

    pub fn pop_front(&mut self) -> Option<ObjectRef<'a>> {
        let mut obj = self.head.take()?;
        self.head = obj.take_next();
        self.len -= 1;
        if self.head.is_none() {
            self.tail = None;
        }
        Some(obj)
    }

    /// Splices `front` onto the front of this chain in O(1).
    pub fn prepend(&mut self, mut front: ObjectChain<'a>) {
        let (Some(head), Some(tail)) = (front.head.take(), front.tail) else {
            return;
        };
        // SAFETY: `tail` is owned by `front`; the alias is only used to rewrite its link
        // slot.
        unsafe { ObjectRef::from_raw(tail) }.set_next(self.head.take());
        self.head = Some(head);
        if self.tail.is_none() {
            self.tail = Some(tail);
        }
        self.len += front.len;
    }

    /// Detaches at most `count` objects from the front, keeping their order.
    pub fn split_front(&mut self, count: usize) -> ObjectChain<'a> {
        let mut front = ObjectChain::new();
        while front.len < count
            && let Some(obj) = self.pop_front()
        {
            front.push_back(obj);
        }
        front
    }
}

impl<'a> Default for ObjectChain<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Iterator for ObjectChain<'a> {
    type Item = ObjectRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a> ExactSizeIterator for ObjectChain<'a> {}
