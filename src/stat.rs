use core::ops::{Add, AddAssign};

use crate::span::SpanList;

/// A snapshot of the spans held by a group of buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stat {
    pub spans: usize,
    pub pages: usize,

    pub objects_in_use: usize,
    pub free_objects: usize,
}

impl Default for Stat {
    fn default() -> Self {
        Self::INIT
    }
}

impl Stat {
    pub const INIT: Stat = Stat {
        spans: 0,
        pages: 0,
        objects_in_use: 0,
        free_objects: 0,
    };

    /// Walks the buckets, holding one bucket lock at a time.
    ///
    /// The result is not an atomic snapshot across buckets.
    pub fn collect<'s, 'a: 's>(lists: impl IntoIterator<Item = &'s SpanList<'a>>) -> Self {
        lists.into_iter().fold(Self::INIT, |mut stat, list| {
            for span in list.lock().iter() {
                stat.spans += 1;
                stat.pages += span.page_count();
                stat.objects_in_use += span.use_count();
                stat.free_objects += span.free_count();
            }
            stat
        })
    }

    pub fn assert_clean(&self) {
        assert_eq!(
            self.objects_in_use, 0,
            "{} object(s) is(are) probably leaked",
            self.objects_in_use
        );
    }
}

impl Add for Stat {
    type Output = Stat;

    fn add(mut self, rhs: Stat) -> Stat {
        self += rhs;
        self
    }
}

impl AddAssign for Stat {
    fn add_assign(&mut self, rhs: Stat) {
        self.spans += rhs.spans;
        self.pages += rhs.pages;
        self.objects_in_use += rhs.objects_in_use;
        self.free_objects += rhs.free_objects;
    }
}
