#![no_main]

use std::ptr::NonNull;

use cmpool::{FreeList, ObjectChain, ObjectRef};
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};

const SLOTS: usize = 256;

#[derive(Debug, Arbitrary)]
enum Action {
    Push,
    PushRange { count: u8 },
    Pop,
    PopRange { count: u8 },
}

fuzz_target!(|actions: Vec<Action>| {
    let mut slots = vec![0usize; SLOTS].into_boxed_slice();
    let mut spare: Vec<NonNull<()>> =
        slots.iter_mut().map(|slot| NonNull::from(slot).cast()).collect();

    let mut list = FreeList::new();
    // The expected contents, top of the list last.
    let mut model: Vec<NonNull<()>> = Vec::new();

    for action in actions {
        match action {
            Action::Push => {
                if let Some(ptr) = spare.pop() {
                    list.push(unsafe { ObjectRef::new(ptr) });
                    model.push(ptr);
                }
            }
            Action::PushRange { count } => {
                let count = (count as usize).min(spare.len());
                let batch = spare.split_off(spare.len() - count);
                let mut chain = ObjectChain::new();
                for &ptr in &batch {
                    chain.push_back(unsafe { ObjectRef::new(ptr) });
                }
                list.push_range(chain);
                model.extend(batch.iter().rev());
            }
            Action::Pop => match list.try_pop() {
                Some(obj) => {
                    let ptr = obj.into_raw();
                    assert_eq!(Some(ptr), model.pop());
                    spare.push(ptr);
                }
                None => assert!(model.is_empty()),
            },
            Action::PopRange { count } => {
                let chain = list.pop_range(count as usize);
                assert_eq!(chain.len(), (count as usize).min(model.len()));
                for obj in chain {
                    let ptr = obj.into_raw();
                    assert_eq!(Some(ptr), model.pop());
                    spare.push(ptr);
                }
            }
        }
        assert_eq!(list.len(), model.len());
        assert_eq!(list.is_empty(), model.is_empty());
    }

    while let Some(obj) = list.try_pop() {
        assert_eq!(Some(obj.into_raw()), model.pop());
    }
    assert!(model.is_empty());
    drop(slots);
});
