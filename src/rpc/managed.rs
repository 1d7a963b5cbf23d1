//! Scoped handles to objects owned by a host runtime.
//!
//! A request may keep objects of the embedding runtime alive (for example
//! global references held on behalf of a managed caller). [`ManagedRef`]
//! wraps the hook that gives such an object back and runs it exactly once:
//! on explicit [`release`](ManagedRef::release) or when dropped.

use std::fmt;

/// Release-once guard around a host-runtime reference.
pub struct ManagedRef {
    release: Option<Box<dyn FnOnce()>>,
}

impl ManagedRef {
    /// Wrap `release`, which runs when the reference is given back.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Give the reference back now. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Whether the reference has been given back.
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl fmt::Debug for ManagedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedRef")
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for ManagedRef {
    fn drop(&mut self) {
        self.release();
    }
}
