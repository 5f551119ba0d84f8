//! Crate-private helper macros.

// A poisoned lock only means a callback panicked while holding it; the
// guarded state is still consistent, so keep going with it.
macro_rules! lock {
    ($x: expr) => {
        $x.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}
