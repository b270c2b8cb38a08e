//! Scoped acquisition guards for multi-step startup.
//!
//! Each resource acquired while starting is wrapped in an [`Armed`] guard
//! that releases it when dropped. Guards declared later are dropped first,
//! so an early return anywhere in the sequence releases everything acquired
//! so far in reverse order. Once the whole sequence succeeds the guards are
//! disarmed and their values move into the running state.

use std::ops::{Deref, DerefMut};

/// Owns a resource and releases it on drop unless disarmed.
pub struct Armed<T, F>
where
    F: FnOnce(T),
{
    inner: Option<(T, F)>,
    label: &'static str,
}

impl<T, F> Armed<T, F>
where
    F: FnOnce(T),
{
    /// Guard `value`; `release` runs if the guard is dropped while armed.
    pub fn new(label: &'static str, value: T, release: F) -> Self {
        Self {
            inner: Some((value, release)),
            label,
        }
    }

    /// Keep the resource and drop the release action.
    pub fn disarm(mut self) -> T {
        match self.inner.take() {
            Some((value, _release)) => value,
            // `inner` is only taken here and in `drop`, both consume the guard.
            None => unreachable!("rollback guard disarmed twice"),
        }
    }
}

impl<T, F> Deref for Armed<T, F>
where
    F: FnOnce(T),
{
    type Target = T;

    fn deref(&self) -> &T {
        match &self.inner {
            Some((value, _)) => value,
            None => unreachable!("rollback guard used after release"),
        }
    }
}

impl<T, F> DerefMut for Armed<T, F>
where
    F: FnOnce(T),
{
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.inner {
            Some((value, _)) => value,
            None => unreachable!("rollback guard used after release"),
        }
    }
}

impl<T, F> Drop for Armed<T, F>
where
    F: FnOnce(T),
{
    fn drop(&mut self) {
        if let Some((value, release)) = self.inner.take() {
            tracing::debug!(resource = self.label, "Rolling back partially acquired resource");
            release(value);
        }
    }
}
