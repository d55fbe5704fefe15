use core::fmt;

use crate::size_class::MAX_BYTES;

/// The contract violations detectable by this crate.
///
/// Every one of them indicates a bug in a calling tier rather than a
/// recoverable condition. The checked functions (like
/// [`try_round_up`](crate::size_class::try_round_up)) hand them back to the
/// caller; everything else halts through [`violated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// A zero-sized request was classified.
    ZeroSize,
    /// The requested size exceeds [`MAX_BYTES`] and must be served by the page
    /// tier directly.
    Oversized(usize),
    /// An object was popped from an empty free list.
    EmptyFreeList,
    /// A span was erased from (or used as an insertion point of) a list it is
    /// not linked into.
    NotLinked,
    /// A span already linked into a list was inserted again.
    AlreadyLinked,
    /// An object was returned to a span with no object checked out.
    SpanIdle,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ZeroSize => write!(f, "zero-sized request has no size class"),
            Error::Oversized(size) => {
                write!(f, "requested size {size} exceeds the maximum of {MAX_BYTES} bytes")
            }
            Error::EmptyFreeList => write!(f, "popping from an empty free list"),
            Error::NotLinked => write!(f, "span is not linked into this list"),
            Error::AlreadyLinked => write!(f, "span is already linked into a list"),
            Error::SpanIdle => write!(f, "returning an object to an idle span"),
        }
    }
}

/// Halts on a contract violation, reporting it first if `error-log` is
/// enabled.
#[cold]
#[track_caller]
pub(crate) fn violated(err: Error) -> ! {
    #[cfg(feature = "error-log")]
    log::error!("contract violation: {err}");
    panic!("{err}")
}
