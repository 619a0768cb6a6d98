#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A thread-safe pool of expensive-to-create resources, such as network connections.
//!
//! Callers allocate a resource from the [`Pool`], use it and release it back. Released resources
//! are kept for reuse instead of being recreated. How resources are created, health-checked and
//! disposed of is decided by a [`Factory`] that you supply.
//!
//! # Quick start
//!
//! ```rust
//! use std::convert::Infallible;
//! use std::num::NonZero;
//!
//! use factory_pool::{Factory, Pool};
//!
//! struct Connections;
//!
//! impl Factory for Connections {
//!     type Resource = String;
//!     type Error = Infallible;
//!
//!     fn create(&self) -> Result<String, Infallible> {
//!         Ok("connected".to_string())
//!     }
//!
//!     fn close(&self, _connection: String) -> Result<(), Infallible> {
//!         Ok(())
//!     }
//!
//!     fn check(&self, connection: &String) -> bool {
//!         connection == "connected"
//!     }
//! }
//!
//! let pool = Pool::builder(Connections)
//!     .max_idle(3)
//!     .max_running(NonZero::new(10).unwrap())
//!     .build();
//!
//! // Manual pairing of allocate and release.
//! let connection = pool.allocate().unwrap();
//! pool.release(connection).unwrap();
//!
//! // Or let a guard release the resource when it goes out of scope.
//! let connection = pool.get().unwrap();
//! assert_eq!(*connection, "connected");
//! ```
//!
//! # Key features
//!
//! - **Bounded idle queue**: at most `max_idle` released resources are kept. Any surplus is closed
//!   through the factory.
//! - **Admission control**: with `max_running` set, allocations block once that many resources
//!   are outstanding and resume when one is released.
//! - **Oldest first reuse**: the longest idle resource is handed out first and is health-checked
//!   before it is reused.
//! - **Over-release protection**: releasing more resources than were allocated is reported as an
//!   error instead of corrupting the pool state.
//!
//! # Logging
//!
//! The pool emits `tracing` events for resource creation, reuse and disposal. It does not install
//! a subscriber.

mod builder;
mod error;
mod factory;
mod pool;
mod pooled;
mod semaphore;

pub use builder::*;
pub use error::*;
pub use factory::*;
pub use pool::*;
pub use pooled::*;
