//! Sharing one pool between worker threads that each handle a stream of requests.
//!
//! Every request borrows a connection through a guard, which returns it to the pool at the end of
//! the request. The pool allows at most four connections to be in use at once, so the eight
//! workers take turns.

use std::io;
use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use factory_pool::{Factory, Pool};
use tracing_subscriber::EnvFilter;

const WORKERS: u32 = 8;
const REQUESTS_PER_WORKER: u32 = 5;

#[derive(Debug)]
struct Connection {
    id: u32,
    served: u32,
}

#[derive(Debug, Default)]
struct Backend {
    opened: AtomicU32,
}

impl Factory for Backend {
    type Resource = Connection;
    type Error = io::Error;

    fn create(&self) -> io::Result<Connection> {
        let id = self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Connection { id, served: 0 })
    }

    fn close(&self, _connection: Connection) -> io::Result<()> {
        Ok(())
    }

    fn check(&self, _connection: &Connection) -> bool {
        true
    }
}

fn handle_request(pool: &Pool<Arc<Backend>>, worker: u32, request: u32) -> io::Result<()> {
    let mut connection = pool.get()?;
    connection.served = connection.served.wrapping_add(1);

    println!(
        "worker {worker} request {request} on connection #{} (served {} requests)",
        connection.id, connection.served
    );

    thread::sleep(Duration::from_millis(5));
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let backend = Arc::new(Backend::default());

    let pool = Arc::new(
        Pool::builder(Arc::clone(&backend))
            .max_idle(2)
            .max_running(NonZero::new(4).unwrap())
            .build(),
    );

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let pool = Arc::clone(&pool);

            thread::spawn(move || {
                for request in 0..REQUESTS_PER_WORKER {
                    if let Err(error) = handle_request(&pool, worker, request) {
                        eprintln!("worker {worker} request {request} failed: {error}");
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    println!(
        "served {} requests with {} connections, {} left idle",
        WORKERS.wrapping_mul(REQUESTS_PER_WORKER),
        backend.opened.load(Ordering::Relaxed),
        pool.idle_len()
    );
}
