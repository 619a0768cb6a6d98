//! Integration tests for `factory_pool`.
//!
//! Multi-threaded tests are ignored under Miri because they rely on real sleeps to observe
//! blocking, which is impractically slow there.

use std::collections::HashSet;
use std::io;
use std::num::NonZero;
use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use factory_pool::{Factory, Pool, ReleaseError};
use parking_lot::Mutex;
use testing::{wait_until, with_watchdog};

#[derive(Debug)]
struct Connection {
    id: u32,
    healthy: Arc<AtomicBool>,
}

impl Connection {
    fn interrupt(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }
}

/// Hands out connections with ids 1, 2, 3... and remembers which ones it closed.
#[derive(Debug, Default)]
struct TrackingFactory {
    created: AtomicU32,
    closed: Mutex<Vec<u32>>,
    refuse_create: AtomicBool,
}

impl TrackingFactory {
    fn closed(&self) -> Vec<u32> {
        self.closed.lock().clone()
    }
}

impl Factory for TrackingFactory {
    type Resource = Connection;
    type Error = io::Error;

    fn create(&self) -> io::Result<Connection> {
        if self.refuse_create.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "backend unreachable",
            ));
        }

        let id = self.created.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

        Ok(Connection {
            id,
            healthy: Arc::new(AtomicBool::new(true)),
        })
    }

    fn close(&self, connection: Connection) -> io::Result<()> {
        connection.interrupt();
        self.closed.lock().push(connection.id);
        Ok(())
    }

    fn check(&self, connection: &Connection) -> bool {
        connection.healthy.load(Ordering::SeqCst)
    }
}

/// Hands out ids 1, 2, 3... and, once armed, parks every `create()` between two barrier waits.
#[derive(Debug)]
struct GatedFactory {
    created: AtomicU32,
    armed: AtomicBool,
    gate: Barrier,
}

impl GatedFactory {
    fn new() -> Self {
        Self {
            created: AtomicU32::new(0),
            armed: AtomicBool::new(false),
            gate: Barrier::new(2),
        }
    }
}

impl Factory for GatedFactory {
    type Resource = u32;
    type Error = io::Error;

    fn create(&self) -> io::Result<u32> {
        if self.armed.load(Ordering::SeqCst) {
            // First wait: the test knows we are inside create. Second wait: the test lets us go.
            self.gate.wait();
            self.gate.wait();
        }

        Ok(self.created.fetch_add(1, Ordering::SeqCst).wrapping_add(1))
    }

    fn close(&self, _id: u32) -> io::Result<()> {
        Ok(())
    }

    fn check(&self, _id: &u32) -> bool {
        true
    }
}

fn bounded_pool(
    max_idle: usize,
    max_running: usize,
) -> (Arc<TrackingFactory>, Pool<Arc<TrackingFactory>>) {
    let factory = Arc::new(TrackingFactory::default());

    let pool = Pool::builder(Arc::clone(&factory))
        .max_idle(max_idle)
        .max_running(NonZero::new(max_running).unwrap())
        .build();

    (factory, pool)
}

#[test]
fn allocations_without_release_are_distinct() {
    let pool = Pool::new(2, TrackingFactory::default());

    let connections: Vec<_> = (0..10).map(|_| pool.allocate().unwrap()).collect();

    let ids: HashSet<_> = connections.iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), 10);
    assert_eq!(pool.outstanding(), 10);
}

#[test]
fn released_connection_is_reallocated() {
    let pool = Pool::new(2, TrackingFactory::default());

    let connection = pool.allocate().unwrap();
    let id = connection.id;
    pool.release(connection).unwrap();

    assert_eq!(pool.allocate().unwrap().id, id);
}

#[test]
fn releasing_more_than_allocated_fails() {
    let (factory, pool) = bounded_pool(2, 3);

    let connections: Vec<_> = (0..3).map(|_| pool.allocate().unwrap()).collect();

    for connection in connections {
        pool.release(connection).unwrap();
    }

    let stray = factory.create().unwrap();
    let stray_id = stray.id;

    match pool.release(stray) {
        Err(ReleaseError::Unbalanced { resource }) => assert_eq!(resource.id, stray_id),
        other => panic!("expected unbalanced release, got {other:?}"),
    }

    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.idle_len(), 2);
}

#[test]
fn surplus_releases_are_closed() {
    let (factory, pool) = bounded_pool(2, 30);

    let connections: Vec<_> = (0..6).map(|_| pool.allocate().unwrap()).collect();
    let health: Vec<_> = connections
        .iter()
        .map(|c| Arc::clone(&c.healthy))
        .collect();

    for connection in connections {
        pool.release(connection).unwrap();
    }

    assert_eq!(pool.idle_len(), 2);
    assert_eq!(factory.closed(), vec![3, 4, 5, 6]);

    let still_open = health.iter().filter(|h| h.load(Ordering::SeqCst)).count();
    assert_eq!(still_open, 2);
}

#[test]
fn oldest_idle_reused_after_full_cycle() {
    let (factory, pool) = bounded_pool(2, 3);

    let first = pool.allocate().unwrap();
    let second = pool.allocate().unwrap();
    let third = pool.allocate().unwrap();
    assert_eq!([first.id, second.id, third.id], [1, 2, 3]);

    pool.release(first).unwrap();
    pool.release(second).unwrap();
    pool.release(third).unwrap();

    assert_eq!(pool.idle_len(), 2);
    assert_eq!(factory.closed(), vec![3]);

    assert_eq!(pool.allocate().unwrap().id, 1);
}

#[test]
fn interrupted_connection_is_replaced() {
    let (factory, pool) = bounded_pool(2, 3);

    let connection = pool.allocate().unwrap();
    let id = connection.id;
    connection.interrupt();
    pool.release(connection).unwrap();

    let replacement = pool.allocate().unwrap();

    assert_ne!(replacement.id, id);
    assert!(factory.check(&replacement));

    // Discarded on the health check, never handed to close.
    assert!(factory.closed().is_empty());
}

#[test]
fn create_failure_is_passed_through() {
    let (factory, pool) = bounded_pool(2, 1);
    factory.refuse_create.store(true, Ordering::SeqCst);

    let error = pool.allocate().unwrap_err();

    assert_eq!(error.kind(), io::ErrorKind::ConnectionRefused);
    assert_eq!(error.to_string(), "backend unreachable");
    assert_eq!(pool.outstanding(), 0);
}

#[cfg_attr(miri, ignore)]
#[test]
fn create_failure_does_not_consume_capacity() {
    with_watchdog(|| {
        let (factory, pool) = bounded_pool(2, 1);

        factory.refuse_create.store(true, Ordering::SeqCst);
        pool.allocate().unwrap_err();
        pool.allocate().unwrap_err();

        factory.refuse_create.store(false, Ordering::SeqCst);
        let connection = pool.allocate().unwrap();
        assert_eq!(connection.id, 1);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn allocation_blocks_at_max_running_until_release() {
    with_watchdog(|| {
        let (_factory, pool) = bounded_pool(2, 2);
        let pool = Arc::new(pool);

        let first = pool.allocate().unwrap();
        let second = pool.allocate().unwrap();

        let allocated = Arc::new(AtomicBool::new(false));

        let waiter = thread::spawn({
            let pool = Arc::clone(&pool);
            let allocated = Arc::clone(&allocated);

            move || {
                let connection = pool.allocate().unwrap();
                allocated.store(true, Ordering::SeqCst);
                connection
            }
        });

        // If the pool were letting the third allocation through, it would have happened by now.
        assert!(!wait_until(Duration::from_millis(100), || {
            allocated.load(Ordering::SeqCst)
        }));
        assert_eq!(pool.outstanding(), 2);

        pool.release(first).unwrap();

        let third = waiter.join().unwrap();
        assert!(allocated.load(Ordering::SeqCst));

        // The released connection was idle, so the waiter got it rather than a new one.
        assert_eq!(third.id, 1);

        pool.release(second).unwrap();
        pool.release(third).unwrap();
        assert_eq!(pool.outstanding(), 0);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn concurrent_users_never_exceed_max_running() {
    const MAX_RUNNING: usize = 3;
    const THREADS: usize = 8;
    const ITERATIONS: usize = 50;

    with_watchdog(|| {
        let (factory, pool) = bounded_pool(2, MAX_RUNNING);
        let pool = Arc::new(pool);

        let in_use = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let factory = Arc::clone(&factory);
                let pool = Arc::clone(&pool);
                let in_use = Arc::clone(&in_use);
                let peak = Arc::clone(&peak);

                thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        let connection = pool.get().unwrap();

                        let now = in_use.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
                        peak.fetch_max(now, Ordering::SeqCst);
                        assert!(factory.check(&connection));
                        thread::yield_now();
                        in_use.fetch_sub(1, Ordering::SeqCst);

                        drop(connection);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= MAX_RUNNING);
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.idle_len() <= 2);

        // Everything ever created is either idle or was closed.
        let created = factory.created.load(Ordering::SeqCst);
        let closed = factory.closed().len();
        assert_eq!(
            usize::try_from(created).unwrap(),
            closed.wrapping_add(pool.idle_len())
        );
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn slow_create_holds_up_concurrent_release() {
    with_watchdog(|| {
        let factory = Arc::new(GatedFactory::new());
        let pool = Arc::new(Pool::new(2, Arc::clone(&factory)));

        let held = pool.allocate().unwrap();
        factory.armed.store(true, Ordering::SeqCst);

        let allocator = thread::spawn({
            let pool = Arc::clone(&pool);
            move || pool.allocate().unwrap()
        });

        // The allocator is now inside create() and holds the pool lock.
        factory.gate.wait();

        let started = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));

        let releaser = thread::spawn({
            let pool = Arc::clone(&pool);
            let started = Arc::clone(&started);
            let released = Arc::clone(&released);

            move || {
                started.store(true, Ordering::SeqCst);
                pool.release(held).unwrap();
                released.store(true, Ordering::SeqCst);
            }
        });

        assert!(wait_until(Duration::from_secs(5), || {
            started.load(Ordering::SeqCst)
        }));
        assert!(!wait_until(Duration::from_millis(100), || {
            released.load(Ordering::SeqCst)
        }));

        factory.gate.wait();

        let created = allocator.join().unwrap();
        releaser.join().unwrap();

        assert!(released.load(Ordering::SeqCst));
        assert_eq!(created, 2);
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.idle_len(), 1);
    });
}

#[test]
fn guard_releases_on_scope_exit() {
    let (factory, pool) = bounded_pool(1, 1);

    {
        let connection = pool.get().unwrap();
        assert_eq!(connection.id, 1);
        assert_eq!(pool.outstanding(), 1);
    }

    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.idle_len(), 1);

    // Would block forever if the guard had not returned its admission permit.
    let again = pool.get().unwrap();
    assert_eq!(again.id, 1);
    drop(again);

    assert!(factory.closed().is_empty());
}

#[test]
fn dropping_pool_closes_idle_connections() {
    let (factory, pool) = bounded_pool(3, 5);

    let connections: Vec<_> = (0..4).map(|_| pool.allocate().unwrap()).collect();
    let mut connections = connections.into_iter();
    let kept = connections.next().unwrap();

    for connection in connections {
        pool.release(connection).unwrap();
    }

    assert!(factory.closed().is_empty());

    drop(pool);

    let mut closed = factory.closed();
    closed.sort_unstable();
    assert_eq!(closed, vec![2, 3, 4]);

    // Outstanding connections belong to the caller and are left alone.
    assert!(factory.check(&kept));
}
