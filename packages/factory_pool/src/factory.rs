use std::error::Error as StdError;
use std::sync::Arc;

/// Creates, checks and disposes of the resources held by a [`Pool`][crate::Pool].
///
/// The pool never looks inside a resource. Everything it needs to know about one is answered by
/// the factory, which is why a factory is the only thing you need to supply to build a pool.
///
/// # Thread safety
///
/// All three methods are called while the pool holds its internal lock, so at most one of them
/// runs at any given time for a given pool. They still take `&self` because the pool itself may be
/// shared between threads, which requires the factory to be `Send + Sync` for the pool to be.
///
/// # Example
///
/// ```rust
/// use std::io;
/// use std::net::TcpStream;
///
/// use factory_pool::Factory;
///
/// struct Connector {
///     address: String,
/// }
///
/// impl Factory for Connector {
///     type Resource = TcpStream;
///     type Error = io::Error;
///
///     fn create(&self) -> io::Result<TcpStream> {
///         TcpStream::connect(&self.address)
///     }
///
///     fn close(&self, stream: TcpStream) -> io::Result<()> {
///         stream.shutdown(std::net::Shutdown::Both)
///     }
///
///     fn check(&self, stream: &TcpStream) -> bool {
///         // There is no cheap way to probe a socket, so we just look for a latched error.
///         matches!(stream.take_error(), Ok(None))
///     }
/// }
/// ```
pub trait Factory {
    /// The type of resource produced by this factory.
    type Resource;

    /// The error returned when creating or closing a resource fails.
    ///
    /// The pool passes this error through to its caller unchanged.
    type Error: StdError + Send + Sync + 'static;

    /// Creates a new resource that is ready to be handed out.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be created. The pool returns this error as-is from
    /// [`Pool::allocate()`][crate::Pool::allocate] and does not retry.
    fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Disposes of a resource the pool has no room to keep.
    ///
    /// This is called at most once per resource. It is never called for a resource that failed
    /// [`check()`][Self::check].
    ///
    /// # Errors
    ///
    /// Returns an error if disposal fails. The resource is considered gone either way.
    fn close(&self, resource: Self::Resource) -> Result<(), Self::Error>;

    /// Reports whether an idle resource is still usable.
    ///
    /// This runs while the pool lock is held, so it must be fast and must not block on I/O.
    /// A resource that fails this check is dropped without being passed to
    /// [`close()`][Self::close].
    fn check(&self, resource: &Self::Resource) -> bool;
}

impl<T> Factory for &T
where
    T: Factory + ?Sized,
{
    type Resource = T::Resource;
    type Error = T::Error;

    fn create(&self) -> Result<Self::Resource, Self::Error> {
        (**self).create()
    }

    fn close(&self, resource: Self::Resource) -> Result<(), Self::Error> {
        (**self).close(resource)
    }

    fn check(&self, resource: &Self::Resource) -> bool {
        (**self).check(resource)
    }
}

impl<T> Factory for Arc<T>
where
    T: Factory + ?Sized,
{
    type Resource = T::Resource;
    type Error = T::Error;

    fn create(&self) -> Result<Self::Resource, Self::Error> {
        (**self).create()
    }

    fn close(&self, resource: Self::Resource) -> Result<(), Self::Error> {
        (**self).close(resource)
    }

    fn check(&self, resource: &Self::Resource) -> bool {
        (**self).check(resource)
    }
}

impl<T> Factory for Box<T>
where
    T: Factory + ?Sized,
{
    type Resource = T::Resource;
    type Error = T::Error;

    fn create(&self) -> Result<Self::Resource, Self::Error> {
        (**self).create()
    }

    fn close(&self, resource: Self::Resource) -> Result<(), Self::Error> {
        (**self).close(resource)
    }

    fn check(&self, resource: &Self::Resource) -> bool {
        (**self).check(resource)
    }
}
