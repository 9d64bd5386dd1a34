#[cfg(feature = "std")]
use std::sync as impl_;

#[cfg(not(feature = "std"))]
use spin as impl_;

/// A process-global slot holding an optional, replaceable hook.
///
/// Readers clone the hook out and release the lock before calling it, so a
/// hook is free to register a replacement for itself.
pub(crate) struct HookLock<T: 'static + Clone + Send + Sync>(impl_::RwLock<Option<T>>);

impl<T: 'static + Clone + Send + Sync> HookLock<T> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(impl_::RwLock::new(None))
    }

    /// Returns a clone of the installed hook.
    #[inline]
    pub(crate) fn get(&'static self) -> Option<T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.read();

        // Writers replace the slot whole, so a poisoned lock still holds a valid hook.
        #[cfg(feature = "std")]
        let guard = self.0.read().unwrap_or_else(std::sync::PoisonError::into_inner);

        guard.clone()
    }

    /// Installs `hook`, returning the one it replaced.
    #[inline]
    pub(crate) fn replace(&'static self, hook: Option<T>) -> Option<T> {
        #[cfg(not(feature = "std"))]
        let mut guard = self.0.write();

        #[cfg(feature = "std")]
        let mut guard = self
            .0
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        core::mem::replace(&mut *guard, hook)
    }
}
