//! Per-size-class free lists owned by a single thread.

mod object;

#[cfg(test)]
pub(crate) use self::object::tests::{chain_of, objects};
pub use self::object::{ObjectChain, ObjectRef};
use crate::{
    error::{Error, violated},
    size_class,
};

/// A LIFO list of free objects of the same size class.
///
/// The list is owned exclusively by one thread cache and carries no lock.
/// Besides the objects, it keeps the slow-start cap of batch transfers
/// towards the central tier: a freshly active size class pulls only a few
/// objects per refill, and the cap grows as the class proves busy.
#[derive(Debug)]
pub struct FreeList<'a> {
    objects: ObjectChain<'a>,
    max_batch: usize,
}

impl<'a> FreeList<'a> {
    pub const fn new() -> Self {
        FreeList {
            objects: ObjectChain::new(),
            max_batch: 1,
        }
    }

    pub fn push(&mut self, obj: ObjectRef<'a>) {
        self.objects.push_front(obj);
    }

    /// Links a whole batch onto the head in O(1).
    pub fn push_range(&mut self, chain: ObjectChain<'a>) {
        self.objects.prepend(chain);
    }

    /// Pops the most recently pushed object.
    ///
    /// # Panics
    ///
    /// Panics if the list is empty.
    #[track_caller]
    pub fn pop(&mut self) -> ObjectRef<'a> {
        match self.objects.pop_front() {
            Some(obj) => obj,
            None => violated(Error::EmptyFreeList),
        }
    }

    pub fn try_pop(&mut self) -> Option<ObjectRef<'a>> {
        self.objects.pop_front()
    }

    /// Detaches at most `count` objects from the head, e.g. to return them to
    /// the central tier.
    pub fn pop_range(&mut self, count: usize) -> ObjectChain<'a> {
        self.objects.split_front(count)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// The slow-start cap of the next batch transfer, starting at 1.
    pub fn max_batch(&mut self) -> &mut usize {
        &mut self.max_batch
    }

    /// Decides the size of the next refill of `obj_size` objects, growing the
    /// slow-start cap if the refill is limited by it.
    ///
    /// # Panics
    ///
    /// Panics if `obj_size` is not a valid size-class size.
    #[track_caller]
    pub fn next_batch(&mut self, obj_size: usize) -> usize {
        let batch = self.max_batch.min(size_class::num_move_size(obj_size));
        if batch == self.max_batch {
            self.max_batch += 1;
        }
        batch
    }
}

impl<'a> Default for FreeList<'a> {
    fn default() -> Self {
        Self::new()
    }
}
