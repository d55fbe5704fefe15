//! The size-class mapping.
//!
//! Requests are split into five alignment tiers, keeping the internal
//! fragmentation around 10% at most:
//!
//! | request range          | alignment | buckets     |
//! |------------------------|-----------|-------------|
//! | `[1, 128]`             | 8         | `[0, 16)`   |
//! | `[129, 1024]`          | 16        | `[16, 72)`  |
//! | `[1025, 8 KiB]`        | 128       | `[72, 128)` |
//! | `[8 KiB + 1, 64 KiB]`  | 1024      | `[128, 184)`|
//! | `[64 KiB + 1, 256 KiB]`| 8 KiB     | `[184, 208)`|
//!
//! Requests larger than [`MAX_BYTES`] never go through size classes.

use crate::{
    config::PAGE_SHIFT,
    error::{Error, violated},
};

/// The largest request served through size classes.
pub const MAX_BYTES: usize = 256 * 1024;
/// The number of size classes, i.e. the length of every per-class bucket
/// array.
pub const NFREELIST: usize = 208;

/// The lower bound of [`num_move_size`].
pub const MIN_MOVE: usize = 2;
/// The upper bound of [`num_move_size`].
pub const MAX_MOVE: usize = 512;

struct Tier {
    /// The inclusive upper bound of the requests in this tier.
    end: usize,
    shift: u32,
}

const TIER_COUNT: usize = 5;

const TIERS: [Tier; TIER_COUNT] = [
    Tier { end: 128, shift: 3 },
    Tier { end: 1024, shift: 4 },
    Tier { end: 8 * 1024, shift: 7 },
    Tier { end: 64 * 1024, shift: 10 },
    Tier { end: MAX_BYTES, shift: 13 },
];

const fn tier_start(tier: usize) -> usize {
    if tier == 0 { 0 } else { TIERS[tier - 1].end }
}

/// The number of buckets in each alignment tier.
pub const GROUP_COUNTS: [usize; TIER_COUNT] = {
    let mut counts = [0; TIER_COUNT];
    let mut tier = 0;
    while tier < TIER_COUNT {
        counts[tier] = (TIERS[tier].end - tier_start(tier)) >> TIERS[tier].shift;
        tier += 1;
    }
    counts
};

const GROUP_BASES: [usize; TIER_COUNT] = {
    let mut bases = [0; TIER_COUNT];
    let mut tier = 1;
    while tier < TIER_COUNT {
        bases[tier] = bases[tier - 1] + GROUP_COUNTS[tier - 1];
        tier += 1;
    }
    bases
};

const _: () = assert!(GROUP_BASES[TIER_COUNT - 1] + GROUP_COUNTS[TIER_COUNT - 1] == NFREELIST);

const fn tier_of(size: usize) -> Result<usize, Error> {
    if size == 0 {
        return Err(Error::ZeroSize);
    }
    let mut tier = 0;
    while tier < TIER_COUNT {
        if size <= TIERS[tier].end {
            return Ok(tier);
        }
        tier += 1;
    }
    Err(Error::Oversized(size))
}

const fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

/// Like [`alignment`], but returns the contract violation instead of halting.
pub const fn try_alignment(size: usize) -> Result<usize, Error> {
    match tier_of(size) {
        Ok(tier) => Ok(1 << TIERS[tier].shift),
        Err(err) => Err(err),
    }
}

/// Like [`round_up`], but returns the contract violation instead of halting.
///
/// # Errors
///
/// Returns [`Error::ZeroSize`] or [`Error::Oversized`] if `size` is out of
/// `[1, MAX_BYTES]`.
pub const fn try_round_up(size: usize) -> Result<usize, Error> {
    match tier_of(size) {
        Ok(tier) => Ok(align_up(size, 1 << TIERS[tier].shift)),
        Err(err) => Err(err),
    }
}

/// Like [`index`], but returns the contract violation instead of halting.
///
/// # Errors
///
/// Returns [`Error::ZeroSize`] or [`Error::Oversized`] if `size` is out of
/// `[1, MAX_BYTES]`.
pub const fn try_index(size: usize) -> Result<usize, Error> {
    match tier_of(size) {
        Ok(tier) => {
            let shift = TIERS[tier].shift;
            let offset = size - tier_start(tier);
            Ok(((offset + (1 << shift) - 1) >> shift) - 1 + GROUP_BASES[tier])
        }
        Err(err) => Err(err),
    }
}

/// The alignment of the tier `size` falls into.
///
/// # Panics
///
/// Panics if `size` is zero or greater than [`MAX_BYTES`].
#[inline]
#[track_caller]
pub fn alignment(size: usize) -> usize {
    try_alignment(size).unwrap_or_else(|err| violated(err))
}

/// Rounds `size` up to the object size of its size class.
///
/// # Panics
///
/// Panics if `size` is zero or greater than [`MAX_BYTES`]. Oversized requests
/// must be routed to the page tier before reaching here.
#[inline]
#[track_caller]
pub fn round_up(size: usize) -> usize {
    try_round_up(size).unwrap_or_else(|err| violated(err))
}

/// Maps `size` to its bucket index in `[0, NFREELIST)`.
///
/// The mapping is monotonic and dense: every aligned size owns exactly one
/// bucket, and adjacent buckets hold adjacent size classes.
///
/// # Panics
///
/// Panics if `size` is zero or greater than [`MAX_BYTES`].
#[inline]
#[track_caller]
pub fn index(size: usize) -> usize {
    try_index(size).unwrap_or_else(|err| violated(err))
}

/// The object size of the bucket `index`, i.e. the inverse of [`index`] on
/// aligned sizes.
///
/// # Panics
///
/// Panics if `index` is not less than [`NFREELIST`].
pub const fn class_size(index: usize) -> usize {
    assert!(index < NFREELIST, "size class index out of range");
    let mut tier = TIER_COUNT - 1;
    while GROUP_BASES[tier] > index {
        tier -= 1;
    }
    tier_start(tier) + ((index - GROUP_BASES[tier] + 1) << TIERS[tier].shift)
}

/// The number of objects moved between tiers in one batch, at most.
///
/// Small objects move in big batches to amortize the bucket lock, while big
/// ones stay bounded so that a single refill can't hoard too much memory.
///
/// # Panics
///
/// Panics if `obj_size` is zero or greater than [`MAX_BYTES`].
#[track_caller]
pub fn num_move_size(obj_size: usize) -> usize {
    if let Err(err) = tier_of(obj_size) {
        violated(err)
    }
    (MAX_BYTES / obj_size).clamp(MIN_MOVE, MAX_MOVE)
}

/// The number of pages a fresh span of `obj_size` objects should cover, so
/// that one span can serve a full batch of [`num_move_size`] objects.
///
/// # Panics
///
/// Panics if `obj_size` is zero or greater than [`MAX_BYTES`].
#[track_caller]
pub fn num_move_pages(obj_size: usize) -> usize {
    let bytes = num_move_size(obj_size) * obj_size;
    bytes.div_ceil(1 << PAGE_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenarios() {
        assert_eq!(round_up(7), 8);
        assert_eq!(alignment(7), 8);
        assert_eq!(index(7), 0);

        assert_eq!(round_up(129), 144);
        assert_eq!(alignment(129), 16);
        assert_eq!(index(129), 16);

        assert_eq!(num_move_size(512), 512);

        assert_eq!(round_up(260000), MAX_BYTES);
        assert_eq!(index(260000), NFREELIST - 1);
        assert_eq!(try_round_up(262145), Err(Error::Oversized(262145)));
        assert_eq!(try_index(300000), Err(Error::Oversized(300000)));
        assert_eq!(try_index(0), Err(Error::ZeroSize));
    }

    #[test]
    #[should_panic(expected = "exceeds the maximum")]
    fn oversized_round_up() {
        round_up(MAX_BYTES + 1);
    }

    #[test]
    #[should_panic(expected = "exceeds the maximum")]
    fn oversized_index() {
        index(MAX_BYTES + 1);
    }

    #[test]
    #[should_panic(expected = "exceeds the maximum")]
    fn oversized_move() {
        num_move_size(300000);
    }

    #[test]
    #[should_panic(expected = "zero-sized")]
    fn zero_size() {
        round_up(0);
    }

    #[test]
    fn group_counts() {
        assert_eq!(GROUP_COUNTS, [16, 56, 56, 56, 24]);
        assert_eq!(GROUP_COUNTS.iter().sum::<usize>(), NFREELIST);
    }

    #[test]
    fn tier_boundaries() {
        for (boundary, last) in [(128, 15), (1024, 71), (8192, 127), (65536, 183)] {
            assert_eq!(index(boundary), last);
            assert_eq!(round_up(boundary), boundary);
            assert_eq!(index(boundary + 1), last + 1);
            assert_eq!(class_size(last + 1), round_up(boundary + 1));
        }
        assert_eq!(index(1), 0);
        assert_eq!(index(MAX_BYTES), NFREELIST - 1);
        assert_eq!(class_size(NFREELIST - 1), MAX_BYTES);
    }

    #[test]
    fn all_sizes() {
        let mut last_index = 0;
        let mut last_aligned = 0;
        for size in 1..=MAX_BYTES {
            let aligned = round_up(size);
            let align = alignment(size);
            assert!(aligned >= size);
            assert!(aligned - size < align, "{size} wastes too much");
            assert_eq!(aligned % align, 0);

            let index = index(size);
            assert!(index < NFREELIST);
            assert!(index >= last_index, "{size} is not monotonic");
            if aligned == last_aligned {
                assert_eq!(index, last_index);
            } else if size > 1 {
                assert_eq!(index, last_index + 1, "{size} skips a bucket");
            }
            assert_eq!(class_size(index), aligned);

            last_index = index;
            last_aligned = aligned;
        }
        assert_eq!(last_index, NFREELIST - 1);
    }

    #[test]
    fn move_size() {
        let mut last = MAX_MOVE;
        for index in 0..NFREELIST {
            let size = class_size(index);
            let count = num_move_size(size);
            assert!((MIN_MOVE..=MAX_MOVE).contains(&count));
            assert!(count <= last);
            last = count;
        }
        assert_eq!(num_move_size(8), MAX_MOVE);
        assert_eq!(num_move_size(MAX_BYTES), MIN_MOVE);
        assert_eq!(num_move_size(1024), 256);
    }

    #[test]
    fn move_pages() {
        for index in 0..NFREELIST {
            let size = class_size(index);
            let pages = num_move_pages(size);
            let moves = num_move_size(size);
            let bytes = moves * size;
            assert!(pages >= 1);
            assert!(pages << PAGE_SHIFT >= bytes);
            assert!((pages - 1) << PAGE_SHIFT < bytes);
            assert!((pages << PAGE_SHIFT) / size >= moves, "{size} can't fill a batch");
        }
        // 227 objects of 1152 bytes need 32 pages, not 31.
        assert_eq!(num_move_size(1152), 227);
        assert_eq!(num_move_pages(1152), 32);
    }
}
