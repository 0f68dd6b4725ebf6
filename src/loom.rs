//! Re-exports either `loom`'s simulated atomics or the real `core` atomics,
//! depending on whether the crate is being built with `--cfg loom` for model
//! checking.
//!
//! The `cancelled` and `shutdown` flags are set from arbitrary caller
//! threads and read from the dispatch thread, so their orderings are the
//! part of this crate worth model checking.
#[allow(unused_imports)]
pub(crate) use self::inner::*;

#[cfg(loom)]
mod inner {
    #![allow(dead_code)]
    pub(crate) use loom::{model, sync};
    #[cfg(test)]
    pub(crate) use loom::thread;
}

#[cfg(not(loom))]
mod inner {
    #![allow(dead_code)]

    pub(crate) mod sync {
        pub(crate) use core::sync::atomic;
    }
}
