//! Fixed bucket arrays of the central, page and thread tiers.

use core::{
    ops::{Index, IndexMut},
    slice,
};

use array_macro::array;
use spin::MutexGuard;

use crate::{
    config::NPAGES,
    free_list::FreeList,
    size_class::{self, NFREELIST},
    span::{SpanChain, SpanList},
    stat::Stat,
};

/// The span lists of the central tier, one per size class.
pub struct SizeClassBuckets<'a> {
    lists: [SpanList<'a>; NFREELIST],
}

impl<'a> SizeClassBuckets<'a> {
    // Only used to initialize the array.
    #[allow(clippy::declare_interior_mutable_const)]
    const LIST_INIT: SpanList<'a> = SpanList::new();

    pub const fn new() -> Self {
        SizeClassBuckets {
            lists: [Self::LIST_INIT; NFREELIST],
        }
    }

    /// The bucket serving requests of `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or larger than
    /// [`MAX_BYTES`](size_class::MAX_BYTES).
    #[track_caller]
    pub fn for_size(&self, size: usize) -> &SpanList<'a> {
        &self.lists[size_class::index(size)]
    }

    pub fn iter(&self) -> slice::Iter<'_, SpanList<'a>> {
        self.lists.iter()
    }

    pub fn stat(&self) -> Stat {
        Stat::collect(&self.lists)
    }
}

impl<'a> Default for SizeClassBuckets<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Index<usize> for SizeClassBuckets<'a> {
    type Output = SpanList<'a>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.lists[index]
    }
}

/// The span lists of the page tier, indexed by page count.
///
/// Bucket 0 is never used by a valid span; spans longer than
/// `NPAGES - 1` pages are served outside these buckets.
pub struct PageBuckets<'a> {
    lists: [SpanList<'a>; NPAGES],
}

impl<'a> PageBuckets<'a> {
    #[allow(clippy::declare_interior_mutable_const)]
    const LIST_INIT: SpanList<'a> = SpanList::new();

    pub const fn new() -> Self {
        PageBuckets {
            lists: [Self::LIST_INIT; NPAGES],
        }
    }

    /// The bucket of spans of `page_count` pages, if it fits in the tier.
    pub fn get(&self, page_count: usize) -> Option<&SpanList<'a>> {
        self.lists.get(page_count)
    }

    /// Locks the first non-empty bucket holding spans of at least
    /// `page_count` pages, and returns it along with its page count.
    ///
    /// Buckets are locked one at a time, so the calling thread must not hold
    /// any page bucket lock already.
    pub fn find_from(&self, page_count: usize) -> Option<(usize, MutexGuard<'_, SpanChain<'a>>)> {
        let start = page_count.max(1);
        (start..NPAGES).find_map(|count| {
            let spans = self.lists[count].lock();
            (!spans.is_empty()).then_some((count, spans))
        })
    }

    pub fn iter(&self) -> slice::Iter<'_, SpanList<'a>> {
        self.lists.iter()
    }

    pub fn stat(&self) -> Stat {
        Stat::collect(&self.lists)
    }
}

impl<'a> Default for PageBuckets<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Index<usize> for PageBuckets<'a> {
    type Output = SpanList<'a>;

    fn index(&self, page_count: usize) -> &Self::Output {
        &self.lists[page_count]
    }
}

/// The free lists of one thread cache, one per size class.
pub struct FreeLists<'a> {
    lists: [FreeList<'a>; NFREELIST],
}

impl<'a> FreeLists<'a> {
    pub fn new() -> Self {
        FreeLists {
            lists: array![_ => FreeList::new(); NFREELIST],
        }
    }

    /// The free list serving requests of `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or larger than
    /// [`MAX_BYTES`](size_class::MAX_BYTES).
    #[track_caller]
    pub fn for_size(&mut self, size: usize) -> &mut FreeList<'a> {
        &mut self.lists[size_class::index(size)]
    }

    pub fn iter(&self) -> slice::Iter<'_, FreeList<'a>> {
        self.lists.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, FreeList<'a>> {
        self.lists.iter_mut()
    }

    /// The total number of cached objects.
    pub fn len(&self) -> usize {
        self.lists.iter().map(FreeList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(FreeList::is_empty)
    }
}

impl<'a> Default for FreeLists<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Index<usize> for FreeLists<'a> {
    type Output = FreeList<'a>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.lists[index]
    }
}

impl<'a> IndexMut<usize> for FreeLists<'a> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.lists[index]
    }
}

#[cfg(test)]
mod tests {
    use std::boxed::Box;

    use super::*;
    use crate::{
        free_list::{ObjectRef, objects},
        size_class::MAX_BYTES,
        span::Span,
    };

    #[test]
    fn for_size() {
        let buckets = SizeClassBuckets::new();
        assert!(core::ptr::eq(buckets.for_size(1), &buckets[0]));
        assert!(core::ptr::eq(buckets.for_size(129), &buckets[16]));
        assert!(core::ptr::eq(buckets.for_size(MAX_BYTES), &buckets[NFREELIST - 1]));
        assert_eq!(buckets.iter().count(), NFREELIST);

        let span = Span::new(3, 1);
        buckets.for_size(100).lock().push_back(&span);
        assert_eq!(buckets[size_class::index(100)].len(), 1);
        assert!(buckets.iter().filter(|list| !list.is_empty()).count() == 1);
        buckets.for_size(100).lock().erase(&span);
    }

    #[test]
    #[should_panic(expected = "exceeds the maximum")]
    fn for_size_oversized() {
        let buckets = SizeClassBuckets::new();
        let _ = buckets.for_size(MAX_BYTES + 1);
    }

    #[test]
    fn page_buckets() {
        let buckets = PageBuckets::new();
        assert!(buckets.get(NPAGES - 1).is_some());
        assert!(buckets.get(NPAGES).is_none());
        assert!(buckets.find_from(1).is_none());

        let (small, large) = (Span::new(0, 2), Span::new(2, 5));
        buckets[small.page_count()].lock().push_back(&small);
        buckets[large.page_count()].lock().push_back(&large);

        let (count, mut spans) = buckets.find_from(3).unwrap();
        assert_eq!(count, 5);
        assert_eq!(spans.pop_front(), Some(&large));
        drop(spans);

        // The bucket is still locked and non-empty when handed out.
        assert_eq!(buckets.find_from(0).map(|(count, spans)| (count, spans.len())), Some((2, 1)));
        assert!(buckets.find_from(3).is_none());
        assert!(buckets[5].is_empty());
    }

    #[test]
    fn free_lists() {
        let mut lists = Box::new(FreeLists::new());
        assert!(lists.is_empty());

        let ptrs = objects(3);
        for &ptr in &ptrs {
            lists.for_size(24).push(unsafe { ObjectRef::new(ptr) });
        }
        lists.for_size(1000).push(unsafe { ObjectRef::new(objects(1)[0]) });
        assert_eq!(lists.len(), 4);
        assert_eq!(lists[size_class::index(24)].len(), 3);
        assert_eq!(lists.for_size(17).len(), 3);

        let drained: usize = lists.iter_mut().map(|list| list.pop_range(usize::MAX).len()).sum();
        assert_eq!(drained, 4);
        assert!(lists.is_empty());
    }
}
