//! Basic usage of the `factory_pool` crate:
//!
//! * Implementing a factory.
//! * Allocating and releasing resources by hand.
//! * Observing idle reuse and health-check replacement.
//!
//! Run with `RUST_LOG=trace` to see what the pool does internally.

use std::io;
use std::num::NonZero;
use std::sync::atomic::{AtomicU32, Ordering};

use factory_pool::{Factory, Pool, ReleaseError};
use tracing_subscriber::EnvFilter;

/// Stand-in for a network connection.
#[derive(Debug)]
struct Connection {
    id: u32,
    closed: bool,
}

#[derive(Debug, Default)]
struct ConnectionFactory {
    next_id: AtomicU32,
}

impl Factory for ConnectionFactory {
    type Resource = Connection;
    type Error = io::Error;

    fn create(&self) -> io::Result<Connection> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        println!("opening connection #{id}");

        Ok(Connection { id, closed: false })
    }

    fn close(&self, mut connection: Connection) -> io::Result<()> {
        println!("closing connection #{}", connection.id);
        connection.closed = true;
        Ok(())
    }

    fn check(&self, connection: &Connection) -> bool {
        !connection.closed
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let pool = Pool::builder(ConnectionFactory::default())
        .max_idle(2)
        .max_running(NonZero::new(3).unwrap())
        .build();

    // Three allocations with nothing idle means three new connections.
    let first = pool.allocate().unwrap();
    let second = pool.allocate().unwrap();
    let third = pool.allocate().unwrap();

    // Only two fit in the idle queue, the third one is closed on release.
    pool.release(first).unwrap();
    pool.release(second).unwrap();
    pool.release(third).unwrap();
    println!("idle connections after releasing all: {}", pool.idle_len());

    // The longest idle connection comes back first.
    let mut reused = pool.allocate().unwrap();
    println!("reused connection #{}", reused.id);

    let other = pool.allocate().unwrap();

    // A connection that broke while in use is skipped, and dropped, on the next allocation.
    reused.closed = true;
    pool.release(reused).unwrap();
    pool.release(other).unwrap();

    let next = pool.allocate().unwrap();
    println!("next allocation skipped the broken one and got connection #{}", next.id);
    pool.release(next).unwrap();

    // Releasing something the pool never handed out is reported, and we get it back.
    let stray = Connection {
        id: 999,
        closed: false,
    };

    match pool.release(stray) {
        Err(ReleaseError::Unbalanced { resource }) => {
            println!("pool refused connection #{}", resource.id);
        }
        other => println!("unexpected release result: {other:?}"),
    }
}
