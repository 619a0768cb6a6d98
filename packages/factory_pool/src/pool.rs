//! The pool and its allocate/release state machine.

use std::any::type_name;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::num::NonZero;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::semaphore::Semaphore;
use crate::{Factory, PoolBuilder, Pooled, ReleaseError};

/// State guarded by the pool lock.
struct PoolState<R> {
    /// Oldest at the front, most recently released at the back.
    idle: VecDeque<R>,

    /// Resources handed out and not yet released.
    outstanding: usize,
}

/// A thread-safe pool of resources produced by a [`Factory`].
///
/// Callers [`allocate()`][Self::allocate] a resource, use it and hand it back with
/// [`release()`][Self::release]. Released resources are kept for reuse, up to a limit on the
/// number of idle resources. Resources beyond that limit are closed through the factory.
///
/// Optionally, the pool can also limit how many resources are allocated at the same time. When
/// that limit is reached, [`allocate()`][Self::allocate] blocks until another caller releases a
/// resource.
///
/// Instead of pairing allocate and release by hand, you can use [`get()`][Self::get], which returns
/// a guard that releases the resource when dropped.
///
/// # Reuse order
///
/// Idle resources are reused oldest first. Before an idle resource is handed out, it is
/// [checked][Factory::check] and silently discarded if the factory reports it as unusable. If no
/// usable idle resource remains, a new one is [created][Factory::create].
///
/// # Locking
///
/// All factory calls are made while the pool lock is held. A slow factory therefore stalls every
/// other caller of the same pool, including callers that only want to release a resource.
///
/// # Lifetime
///
/// When the pool is dropped, all idle resources are closed through the factory. Resources that
/// are still allocated belong to their callers and are not affected.
///
/// # Example
///
/// ```rust
/// use std::convert::Infallible;
///
/// use factory_pool::{Factory, Pool};
///
/// struct Buffers;
///
/// impl Factory for Buffers {
///     type Resource = Vec<u8>;
///     type Error = Infallible;
///
///     fn create(&self) -> Result<Vec<u8>, Infallible> {
///         Ok(Vec::with_capacity(4096))
///     }
///
///     fn close(&self, _buffer: Vec<u8>) -> Result<(), Infallible> {
///         Ok(())
///     }
///
///     fn check(&self, _buffer: &Vec<u8>) -> bool {
///         true
///     }
/// }
///
/// let pool = Pool::new(4, Buffers);
///
/// let mut buffer = pool.allocate().unwrap();
/// buffer.extend_from_slice(b"hello");
/// buffer.clear();
/// pool.release(buffer).unwrap();
///
/// assert_eq!(pool.idle_len(), 1);
/// ```
pub struct Pool<F: Factory> {
    factory: F,
    state: Mutex<PoolState<F::Resource>>,
    max_idle: usize,
    max_running: Option<NonZero<usize>>,

    /// Present only if the number of outstanding resources is bounded.
    admission: Option<Semaphore>,
}

impl<F: Factory> Pool<F> {
    /// Creates a pool that keeps up to `max_idle` idle resources and does not limit how many
    /// resources can be allocated at the same time.
    ///
    /// Use [`Pool::builder()`] to also limit the number of outstanding resources.
    #[must_use]
    pub fn new(max_idle: usize, factory: F) -> Self {
        Self::builder(factory).max_idle(max_idle).build()
    }

    /// Creates a builder for configuring a pool that uses the given factory.
    pub fn builder(factory: F) -> PoolBuilder<F> {
        PoolBuilder::new(factory)
    }

    pub(crate) fn from_parts(
        factory: F,
        max_idle: usize,
        max_running: Option<NonZero<usize>>,
    ) -> Self {
        Self {
            factory,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                outstanding: 0,
            }),
            max_idle,
            max_running,
            admission: max_running.map(|permits| Semaphore::new(permits.get())),
        }
    }

    /// Allocates a resource for the exclusive use of the caller.
    ///
    /// The oldest usable idle resource is returned if there is one, otherwise a new resource is
    /// created. The caller must hand the resource back via [`release()`][Self::release] when done
    /// with it.
    ///
    /// If the pool limits the number of outstanding resources and that limit has been reached,
    /// this blocks until another caller releases a resource. There is no timeout.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if a new resource had to be created and creation failed. No
    /// allocation is recorded in that case, so there is nothing to release.
    pub fn allocate(&self) -> Result<F::Resource, F::Error> {
        if let Some(admission) = &self.admission {
            trace!("waiting for admission");
            admission.acquire();
        }

        let mut state = self.state.lock();

        match self.reuse_or_create(&mut state) {
            Ok(resource) => {
                state.outstanding = state.outstanding.wrapping_add(1);
                Ok(resource)
            }
            Err(error) => {
                // The caller gets no resource to release later, so the permit goes back now.
                if let Some(admission) = &self.admission {
                    admission.release();
                }

                Err(error)
            }
        }
    }

    /// Allocates a resource wrapped in a guard that releases it when dropped.
    ///
    /// This behaves like [`allocate()`][Self::allocate], including blocking when the limit on
    /// outstanding resources has been reached.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if a new resource had to be created and creation failed.
    pub fn get(&self) -> Result<Pooled<'_, F>, F::Error> {
        self.allocate().map(|resource| Pooled::new(self, resource))
    }

    fn reuse_or_create(
        &self,
        state: &mut PoolState<F::Resource>,
    ) -> Result<F::Resource, F::Error> {
        while let Some(resource) = state.idle.pop_front() {
            if self.factory.check(&resource) {
                trace!(idle = state.idle.len(), "reusing idle resource");
                return Ok(resource);
            }

            // Unusable resources are not closed, the factory has already given up on them.
            debug!(idle = state.idle.len(), "discarding idle resource that failed check");
            drop(resource);
        }

        let resource = self.factory.create()?;
        debug!("created new resource");

        Ok(resource)
    }

    /// Returns a resource to the pool.
    ///
    /// If there is room in the idle queue, the resource is kept for reuse. Otherwise it is closed
    /// through the factory.
    ///
    /// The pool does not track individual resources, only how many are outstanding. Releasing the
    /// same resource twice while other allocations are outstanding is not detected.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::Unbalanced`] if there are no outstanding allocations. The resource
    /// is returned inside the error and the pool is unchanged.
    ///
    /// Returns [`ReleaseError::Close`] if the resource had to be closed and closing failed. The
    /// release still counts and the resource is gone.
    pub fn release(
        &self,
        resource: F::Resource,
    ) -> Result<(), ReleaseError<F::Resource, F::Error>> {
        let mut state = self.state.lock();

        let Some(outstanding) = state.outstanding.checked_sub(1) else {
            return Err(ReleaseError::Unbalanced { resource });
        };

        state.outstanding = outstanding;

        if let Some(admission) = &self.admission {
            admission.release();
        }

        if state.idle.len() < self.max_idle {
            state.idle.push_back(resource);
            trace!(idle = state.idle.len(), "resource returned to idle queue");
            return Ok(());
        }

        debug!(max_idle = self.max_idle, "idle queue full, closing resource");
        self.factory
            .close(resource)
            .map_err(|source| ReleaseError::Close { source })
    }

    /// Returns the number of idle resources currently held by the pool.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Returns the number of resources that have been allocated and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Returns the maximum number of idle resources the pool keeps.
    #[must_use]
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Returns the maximum number of resources that can be outstanding at the same time, or
    /// `None` if there is no limit.
    #[must_use]
    pub fn max_running(&self) -> Option<NonZero<usize>> {
        self.max_running
    }
}

impl<F: Factory> fmt::Debug for Pool<F> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();

        f.debug_struct(type_name::<Self>())
            .field("max_idle", &self.max_idle)
            .field("max_running", &self.max_running)
            .field("idle", &state.idle.len())
            .field("outstanding", &state.outstanding)
            .finish_non_exhaustive()
    }
}

impl<F: Factory> Drop for Pool<F> {
    fn drop(&mut self) {
        let idle = mem::take(&mut self.state.get_mut().idle);

        if !idle.is_empty() {
            debug!(count = idle.len(), "closing idle resources of dropped pool");
        }

        for resource in idle {
            if let Err(error) = self.factory.close(resource) {
                warn!(%error, "failed to close idle resource of dropped pool");
            }
        }
    }
}
