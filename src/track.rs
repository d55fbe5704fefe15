//! Memory-checker annotations of the link slots inside free objects.
//!
//! A free object is only touched through its first word; the rest of it, and
//! the link slot itself between accesses, is reported as inaccessible.

#[cfg(feature = "track-valgrind")]
mod imp {
    use core::ptr::NonNull;

    use crabgrind::memcheck::*;

    pub fn undefined(ptr: NonNull<u8>, size: usize) {
        let _ = mark_mem(ptr.as_ptr().cast(), size, MemState::Undefined);
    }

    pub fn defined(ptr: NonNull<u8>, size: usize) {
        let _ = mark_mem(ptr.as_ptr().cast(), size, MemState::Defined);
    }

    pub fn no_access(ptr: NonNull<u8>, size: usize) {
        let _ = mark_mem(ptr.as_ptr().cast(), size, MemState::NoAccess);
    }
}
#[cfg(not(feature = "track-valgrind"))]
mod imp {
    use core::ptr::NonNull;

    pub fn undefined(ptr: NonNull<u8>, size: usize) {
        let _ = (ptr, size);
    }

    pub fn defined(ptr: NonNull<u8>, size: usize) {
        let _ = (ptr, size);
    }

    pub fn no_access(ptr: NonNull<u8>, size: usize) {
        let _ = (ptr, size);
    }
}
pub use self::imp::*;
