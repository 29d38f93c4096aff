#[cfg(feature = "parking-lot")]
pub use parking_lot::{Mutex, RwLock};
#[cfg(not(feature = "parking-lot"))]
pub use std::sync::{Mutex, PoisonError, RwLock};

/// Acquires a guard from `lock()`, `read()` or `write()`.
///
/// With a std lock the poisoned case is propagated through `?`, which relies on
/// the `From<PoisonError<_>>` conversion of the caller's error type. With
/// `parking-lot` the guard is returned as is.
macro_rules! acquire {
    ($guard:expr) => {{
        #[cfg(feature = "parking-lot")]
        {
            $guard
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            $guard?
        }
    }};
}

pub(crate) use acquire;
