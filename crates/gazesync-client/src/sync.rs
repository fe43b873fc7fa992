use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock that shrugs off poisoning: a panicked callback must not take the
/// whole monitor down with it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
