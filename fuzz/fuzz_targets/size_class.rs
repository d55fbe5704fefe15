#![no_main]

use cmpool::{
    Error,
    size_class::{self, MAX_BYTES, NFREELIST},
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|size: u32| {
    let size = size as usize;
    match (size_class::try_round_up(size), size_class::try_index(size)) {
        (Ok(rounded), Ok(index)) => {
            let align = size_class::alignment(size);
            assert!(rounded >= size);
            assert!(rounded - size < align);
            assert_eq!(rounded % align, 0);
            assert!(index < NFREELIST);
            assert_eq!(size_class::class_size(index), rounded);
            assert_eq!(size_class::try_index(rounded), Ok(index));

            let moves = size_class::num_move_size(rounded);
            assert!((size_class::MIN_MOVE..=size_class::MAX_MOVE).contains(&moves));
            assert!(size_class::num_move_pages(rounded) >= 1);
        }
        (Err(Error::ZeroSize), Err(Error::ZeroSize)) => assert_eq!(size, 0),
        (Err(Error::Oversized(a)), Err(Error::Oversized(b))) => {
            assert!(size > MAX_BYTES);
            assert_eq!((a, b), (size, size));
        }
        (round_up, index) => panic!("inconsistent mapping of {size}: {round_up:?}, {index:?}"),
    }
});
