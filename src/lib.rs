//! The core data structures of a three-tier, thread-caching memory pool.
//!
//! A small request is served from the calling thread's [`FreeList`] of its
//! size class. An empty free list refills itself in a batch from the central
//! tier, which carves objects out of [`Span`]s kept in a [`SpanList`] per size
//! class. The central tier in turn draws spans from the page tier, whose
//! buckets are indexed by page count.
//!
//! This crate provides the pieces shared by all three tiers:
//!
//! - [`size_class`]: the mapping from request sizes to aligned sizes and
//!   bucket indices, and the sizes of batch transfers;
//! - [`FreeList`]: the lock-free, thread-owned LIFO of free objects;
//! - [`Span`] and [`SpanList`]: page-run descriptors and their intrusive,
//!   bucket-locked lists;
//! - [`bucket`]: the fixed bucket arrays of each tier.
//!
//! Operating-system mapping and the tier policies themselves live elsewhere.
//! Misuse of these structures, such as popping an empty free list, is a bug of
//! the calling tier and halts with a panic describing the [`Error`].
//!
//! # Features
//!
//! - `error-log`: report contract violations through [`log`] before halting.
//! - `track-valgrind`: annotate free-object link slots for Valgrind's
//!   memcheck.
//!
//! The page size and the number of page buckets are configured at build time
//! through the `CMP_PAGE_SHIFT` and `CMP_NPAGES` environment variables; see
//! [`config`].
//!
//! [`log`]: https://docs.rs/log
#![no_std]

#[cfg(test)]
extern crate std;

/// Build-time configuration.
pub mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub mod bucket;
mod error;
pub mod free_list;
pub mod size_class;
pub mod span;
pub mod stat;
mod track;

pub use self::{
    error::Error,
    free_list::{FreeList, ObjectChain, ObjectRef},
    span::{PageId, Span, SpanList},
    stat::Stat,
};

#[cfg(test)]
mod test {
    use core::sync::atomic::{AtomicUsize, Ordering::Relaxed};
    use std::{boxed::Box, thread, vec::Vec};

    use crate::{
        FreeList, ObjectRef, Span,
        bucket::{FreeLists, PageBuckets, SizeClassBuckets},
        config::PAGE_SHIFT,
        size_class::{self, num_move_pages, round_up},
        span::{SpanChain, tests::pages},
    };

    /// A simplified central tier: spans are taken from the page buckets or a
    /// fresh pool, handed out in batches, and retired to the page buckets once
    /// idle.
    struct Central<'a> {
        buckets: SizeClassBuckets<'a>,
        pages: PageBuckets<'a>,
        pool: &'a [Span<'a>],
        next: AtomicUsize,
    }

    impl<'a> Central<'a> {
        fn new(pool: &'a [Span<'a>]) -> Self {
            Central {
                buckets: SizeClassBuckets::new(),
                pages: PageBuckets::new(),
                pool,
                next: Default::default(),
            }
        }

        fn refill(&self, size: usize, list: &mut FreeList<'a>) {
            let obj_size = round_up(size);
            let batch = list.next_batch(obj_size);

            let mut spans = self.buckets.for_size(size).lock();
            let span = match spans.iter().find(|span| span.has_free()) {
                Some(span) => span,
                None => {
                    let span = self.fetch_span(num_move_pages(obj_size));
                    assert!(span.page_count() >= num_move_pages(obj_size));
                    // SAFETY: the span was just taken out of the page tier, and its pages are
                    // leaked test memory.
                    unsafe {
                        span.carve(obj_size);
                        span.set_in_use(true);
                    }
                    spans.push_front(span);
                    span
                }
            };
            // SAFETY: we hold the lock of the bucket containing `span`.
            let chain = unsafe { span.pop_batch(batch) };
            assert!(!chain.is_empty());
            list.push_range(chain);
        }

        fn fetch_span(&self, page_count: usize) -> &'a Span<'a> {
            let retired = self
                .pages
                .find_from(page_count)
                .and_then(|(_, mut spans)| spans.pop_front());
            let pool = self.pool;
            retired.unwrap_or_else(|| &pool[self.next.fetch_add(1, Relaxed)])
        }

        fn owner(spans: &SpanChain<'a>, obj: &ObjectRef<'a>) -> &'a Span<'a> {
            let page = obj.as_ptr().as_ptr() as usize >> PAGE_SHIFT;
            spans
                .iter()
                .find(|span| (span.page_id()..span.end_page()).contains(&page))
                .unwrap()
        }

        fn release(&self, size: usize, list: &mut FreeList<'a>, count: usize) {
            let chain = list.pop_range(count);
            let mut spans = self.buckets.for_size(size).lock();
            for obj in chain {
                let span = Self::owner(&spans, &obj);
                if unsafe { span.push_object(obj) } {
                    spans.erase(span);
                    unsafe { span.set_in_use(false) };
                    self.pages[span.page_count()].lock().push_back(span);
                }
            }
        }
    }

    #[test]
    fn refill_and_release() {
        const SIZES: [usize; 4] = [8, 100, 3000, 40000];

        let pool: Vec<_> = (0..16).map(|_| Span::new(pages(32), 32)).collect();
        let central = Central::new(&pool);
        let mut lists = Box::new(FreeLists::new());

        for &size in &SIZES {
            let mut held = Vec::new();
            for round in 0..60 {
                let list = lists.for_size(size);
                if list.is_empty() {
                    central.refill(size, list);
                }
                held.push(list.pop());
                if round % 3 == 2 {
                    list.push(held.pop().unwrap());
                }
            }
            assert!(*lists.for_size(size).max_batch() > 1);

            let list = lists.for_size(size);
            held.into_iter().for_each(|obj| list.push(obj));
            let count = list.len();
            central.release(size, list, count);
            assert!(list.is_empty());
        }

        let stat = central.buckets.stat();
        stat.assert_clean();
        assert_eq!(stat.spans, 0);
        assert_eq!(central.pages.stat().spans, central.next.load(Relaxed));
        assert!(lists.is_empty());
    }

    #[test]
    fn slow_start_refill() {
        let size = size_class::MAX_BYTES;
        let pool: Vec<_> = (0..4).map(|_| Span::new(pages(64), 64)).collect();
        let central = Central::new(&pool);
        let mut list = FreeList::new();

        central.refill(size, &mut list);
        assert_eq!(list.len(), 1);
        let first = list.pop();

        // The rest of the first span.
        central.refill(size, &mut list);
        assert_eq!(list.len(), 1);
        let second = list.pop();

        central.refill(size, &mut list);
        assert_eq!(list.len(), size_class::num_move_size(size));
        assert_eq!(central.next.load(Relaxed), 2);

        list.push(first);
        list.push(second);
        let count = list.len();
        central.release(size, &mut list, count);
        central.buckets.stat().assert_clean();
    }

    #[test]
    fn threads() {
        const THREADS: usize = 4;

        let pool: Vec<_> = (0..THREADS * 4).map(|_| Span::new(pages(4), 4)).collect();
        let central = Central::new(&pool);

        thread::scope(|s| {
            for tid in 0..THREADS {
                let central = &central;
                s.spawn(move || {
                    let mut rng = fastrand::Rng::with_seed(tid as u64);
                    let mut list = FreeList::new();
                    let mut held = Vec::new();
                    for _ in 0..2000 {
                        if held.is_empty() || rng.bool() {
                            if list.is_empty() {
                                central.refill(64, &mut list);
                            }
                            let obj = list.pop();
                            held.push(obj);
                        } else {
                            let index = rng.usize(..held.len());
                            list.push(held.swap_remove(index));
                        }
                        if list.len() > 32 {
                            central.release(64, &mut list, 16);
                        }
                    }
                    held.into_iter().for_each(|obj| list.push(obj));
                    let count = list.len();
                    central.release(64, &mut list, count);
                });
            }
        });

        central.buckets.stat().assert_clean();
        central.pages.stat().assert_clean();
    }
}
