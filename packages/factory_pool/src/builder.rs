use std::any::type_name;
use std::fmt;
use std::num::NonZero;

use crate::{Factory, Pool};

/// Number of idle resources a pool keeps unless configured otherwise.
pub const DEFAULT_MAX_IDLE: usize = 8;

/// Builder for configuring a [`Pool`].
///
/// # Example
///
/// ```rust
/// use std::convert::Infallible;
/// use std::num::NonZero;
///
/// use factory_pool::{Factory, Pool};
///
/// struct Tickets;
///
/// impl Factory for Tickets {
///     type Resource = u64;
///     type Error = Infallible;
///
///     fn create(&self) -> Result<u64, Infallible> {
///         Ok(0)
///     }
///
///     fn close(&self, _ticket: u64) -> Result<(), Infallible> {
///         Ok(())
///     }
///
///     fn check(&self, _ticket: &u64) -> bool {
///         true
///     }
/// }
///
/// let pool = Pool::builder(Tickets)
///     .max_idle(2)
///     .max_running(NonZero::new(10).unwrap())
///     .build();
///
/// assert_eq!(pool.max_idle(), 2);
/// ```
#[must_use]
pub struct PoolBuilder<F> {
    factory: F,
    max_idle: usize,
    max_running: Option<NonZero<usize>>,
}

impl<F: Factory> PoolBuilder<F> {
    pub(crate) fn new(factory: F) -> Self {
        Self {
            factory,
            max_idle: DEFAULT_MAX_IDLE,
            max_running: None,
        }
    }

    /// Sets the maximum number of idle resources the pool keeps for reuse.
    ///
    /// Resources released while this many are already idle are closed through the factory.
    /// Zero is allowed and means every released resource is closed.
    ///
    /// Default is [`DEFAULT_MAX_IDLE`].
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets the maximum number of resources that can be allocated at the same time.
    ///
    /// Once this many resources are outstanding, further allocations block until a resource is
    /// released.
    ///
    /// By default there is no limit.
    pub fn max_running(mut self, max_running: NonZero<usize>) -> Self {
        self.max_running = Some(max_running);
        self
    }

    /// Builds the pool with the configured settings.
    #[must_use]
    pub fn build(self) -> Pool<F> {
        Pool::from_parts(self.factory, self.max_idle, self.max_running)
    }
}

impl<F> fmt::Debug for PoolBuilder<F> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("max_idle", &self.max_idle)
            .field("max_running", &self.max_running)
            .finish_non_exhaustive()
    }
}
