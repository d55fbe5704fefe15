use core::{
    cell::Cell,
    sync::atomic::{AtomicUsize, Ordering::Relaxed},
};

use crate::error::{Error, violated};

pub trait Linked<'a>: PartialEq {
    fn link(&'a self) -> &'a Link<'a, Self>;
}

/// The intrusive links of a list element.
pub struct Link<'a, T: 'a + ?Sized> {
    linked_to: Cell<usize>,
    prev: Cell<Option<&'a T>>,
    next: Cell<Option<&'a T>>,
}

impl<'a, T: 'a + ?Sized> core::fmt::Debug for Link<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let linked_to = self.linked_to.get();
        if linked_to == 0 {
            write!(f, "Link (unlinked)")
        } else {
            write!(f, "Link (list #{linked_to})")
        }
    }
}

impl<'a, T> Link<'a, T> {
    pub const fn new() -> Self {
        Link {
            linked_to: Cell::new(0),
            prev: Cell::new(None),
            next: Cell::new(None),
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked_to.get() != 0
    }

    /// The previous element, or `None` if this is the first one.
    pub fn prev(&self) -> Option<&'a T> {
        self.prev.get()
    }

    /// The next element, or `None` (the end of the list) if this is the last
    /// one.
    pub fn next(&self) -> Option<&'a T> {
        self.next.get()
    }
}

impl<'a, T> Default for Link<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An intrusive doubly linked list.
///
/// Positions in the list are expressed as `Option<&'a T>`, where `None` is the
/// sentinel [`end`](List::end): the position after the last element, and
/// before the first one.
///
/// Every list is identified by a unique id once something is linked into it,
/// so any element can tell which list holds it no matter where the list
/// itself is moved.
pub struct List<'a, T: 'a + ?Sized> {
    id: usize,
    head: Option<&'a T>,
    tail: Option<&'a T>,
    len: usize,
}

impl<'a, T: Linked<'a>> List<'a, T> {
    pub const fn new() -> Self {
        List {
            id: 0,
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn id(&mut self) -> usize {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
        if self.id == 0 {
            self.id = NEXT_ID.fetch_add(1, Relaxed);
        }
        self.id
    }

    /// The first element, or [`end`](List::end) if the list is empty.
    pub fn begin(&self) -> Option<&'a T> {
        self.head
    }

    /// The sentinel position past the last element. It never refers to a real
    /// element.
    pub const fn end(&self) -> Option<&'a T> {
        None
    }

    pub fn front(&self) -> Option<&'a T> {
        self.head
    }

    pub fn back(&self) -> Option<&'a T> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn contains(&self, value: &'a T) -> bool {
        self.id != 0 && value.link().linked_to.get() == self.id
    }

    /// Splices `value` right before `at` in O(1); `at == end()` appends it.
    ///
    /// # Panics
    ///
    /// Panics if `value` is already linked into a list, or if `at` is not an
    /// element of this list.
    #[track_caller]
    pub fn insert(&mut self, at: Option<&'a T>, value: &'a T) {
        if value.link().is_linked() {
            violated(Error::AlreadyLinked)
        }
        if let Some(at) = at
            && !self.contains(at)
        {
            violated(Error::NotLinked)
        }
        let id = self.id();
        value.link().linked_to.set(id);

        let prev = match at {
            Some(at) => at.link().prev.replace(Some(value)),
            None => self.tail.replace(value),
        };
        match prev {
            Some(prev) => prev.link().next.set(Some(value)),
            None => self.head = Some(value),
        }
        value.link().prev.set(prev);
        value.link().next.set(at);
        self.len += 1;
    }

    pub fn push_front(&mut self, value: &'a T) {
        self.insert(self.begin(), value)
    }

    pub fn push_back(&mut self, value: &'a T) {
        self.insert(self.end(), value)
    }

    /// Unlinks `value` in O(1) without touching anything else of it; the
    /// caller owns it afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not linked into this list.
    #[track_caller]
    pub fn erase(&mut self, value: &'a T) {
        if !self.contains(value) {
            violated(Error::NotLinked)
        }

        self.len -= 1;
        let prev = value.link().prev.take();
        let next = value.link().next.take();
        match prev {
            Some(prev) => prev.link().next.set(next),
            None => self.head = next,
        }
        match next {
            Some(next) => next.link().prev.set(prev),
            None => self.tail = prev,
        }
        value.link().linked_to.set(0);
    }

    pub fn pop_front(&mut self) -> Option<&'a T> {
        let value = self.head?;
        self.erase(value);
        Some(value)
    }

    pub fn iter(&self) -> Iter<'a, T> {
        Iter {
            front: self.head,
            back: self.tail,
            len: self.len,
        }
    }
}

impl<'a, T: Linked<'a>> Default for List<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Linked<'a>> IntoIterator for &List<'a, T> {
    type IntoIter = Iter<'a, T>;

    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Iter<'a, T> {
    front: Option<&'a T>,
    back: Option<&'a T>,
    len: usize,
}

impl<'a, T: Linked<'a>> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        self.front.take().inspect(|obj| self.front = obj.link().next.get())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T: Linked<'a>> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        self.back.take().inspect(|obj| self.back = obj.link().prev.get())
    }
}

impl<'a, T: Linked<'a>> ExactSizeIterator for Iter<'a, T> {}
