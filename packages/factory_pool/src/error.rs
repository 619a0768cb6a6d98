use thiserror::Error;

/// Errors that can occur when returning a resource to a [`Pool`][crate::Pool].
///
/// Failures to create a resource are not represented here. Those are returned from
/// [`Pool::allocate()`][crate::Pool::allocate] as the factory's own error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError<R, E> {
    /// The pool has no outstanding allocation that this release could match.
    ///
    /// This is a caller bug. The pool state is unchanged and the resource was neither stored nor
    /// closed. It is handed back here so the caller decides what happens to it.
    #[error("cannot release resource: no allocation from this pool is outstanding")]
    Unbalanced {
        /// The resource that the caller attempted to release.
        resource: R,
    },

    /// The idle queue was full and the factory failed to close the surplus resource.
    ///
    /// The release itself was still counted and the resource is gone.
    #[error("failed to close surplus resource")]
    Close {
        /// The error returned by [`Factory::close()`][crate::Factory::close], unmodified.
        #[source]
        source: E,
    },
}

impl<R, E> ReleaseError<R, E> {
    /// Recovers the resource from an unbalanced release.
    ///
    /// Returns `None` for errors where the resource is already gone.
    #[must_use]
    pub fn into_resource(self) -> Option<R> {
        match self {
            Self::Unbalanced { resource } => Some(resource),
            Self::Close { .. } => None,
        }
    }
}
