use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::{Factory, Pool, ReleaseError};

/// A resource allocated from a [`Pool`] that is released back to it when dropped.
///
/// Obtained from [`Pool::get()`]. Derefs to the resource.
///
/// Dropping the guard cannot report release errors, so any error (the factory failing to close a
/// surplus resource) is logged and discarded. Use [`release()`][Self::release] to observe it.
///
/// # Example
///
/// ```rust
/// use std::convert::Infallible;
///
/// use factory_pool::{Factory, Pool};
///
/// struct Scratch;
///
/// impl Factory for Scratch {
///     type Resource = String;
///     type Error = Infallible;
///
///     fn create(&self) -> Result<String, Infallible> {
///         Ok(String::new())
///     }
///
///     fn close(&self, _scratch: String) -> Result<(), Infallible> {
///         Ok(())
///     }
///
///     fn check(&self, _scratch: &String) -> bool {
///         true
///     }
/// }
///
/// let pool = Pool::new(1, Scratch);
///
/// {
///     let mut scratch = pool.get().unwrap();
///     scratch.push_str("temporary");
///     assert_eq!(pool.outstanding(), 1);
/// }
///
/// assert_eq!(pool.outstanding(), 0);
/// assert_eq!(pool.idle_len(), 1);
/// ```
pub struct Pooled<'a, F: Factory> {
    pool: &'a Pool<F>,

    // Only ever taken out by `release()`, `detach()` or `drop()`, all of which consume the guard.
    resource: ManuallyDrop<F::Resource>,
}

impl<'a, F: Factory> Pooled<'a, F> {
    pub(crate) fn new(pool: &'a Pool<F>, resource: F::Resource) -> Self {
        Self {
            pool,
            resource: ManuallyDrop::new(resource),
        }
    }

    /// Releases the resource back to the pool, reporting any error.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Close`] if the idle queue was full and the factory failed to
    /// close the resource.
    ///
    /// Returns [`ReleaseError::Unbalanced`] only if the allocation behind this guard was already
    /// matched by a manual [`Pool::release()`] of some other resource.
    pub fn release(self) -> Result<(), ReleaseError<F::Resource, F::Error>> {
        let (pool, resource) = self.into_parts();
        pool.release(resource)
    }

    /// Takes the resource out of the guard without releasing it.
    ///
    /// The allocation stays outstanding. The caller becomes responsible for handing the resource
    /// back via [`Pool::release()`].
    #[must_use]
    pub fn detach(self) -> F::Resource {
        self.into_parts().1
    }

    fn into_parts(self) -> (&'a Pool<F>, F::Resource) {
        let mut this = ManuallyDrop::new(self);

        // SAFETY: `this` is never dropped, so the resource is taken exactly once.
        let resource = unsafe { ManuallyDrop::take(&mut this.resource) };

        (this.pool, resource)
    }
}

impl<F: Factory> Deref for Pooled<'_, F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl<F: Factory> DerefMut for Pooled<'_, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.resource
    }
}

impl<F> fmt::Debug for Pooled<'_, F>
where
    F: Factory,
    F::Resource: fmt::Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("resource", &*self.resource)
            .finish_non_exhaustive()
    }
}

impl<F: Factory> Drop for Pooled<'_, F> {
    fn drop(&mut self) {
        // SAFETY: This is the last use of the resource, the guard is going away.
        let resource = unsafe { ManuallyDrop::take(&mut self.resource) };

        if let Err(error) = self.pool.release(resource) {
            warn!(%error, "failed to release pooled resource on drop");
        }
    }
}
