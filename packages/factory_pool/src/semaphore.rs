use parking_lot::{Condvar, Mutex};

/// Blocking counting semaphore used for admission control.
///
/// Kept separate from the pool lock: waiting for a permit can take arbitrarily long, while the
/// pool lock is only ever held for the duration of one allocate or release.
///
/// Waiters are woken in whatever order the condition variable chooses. There is no FIFO guarantee.
#[derive(Debug)]
pub(crate) struct Semaphore {
    available: Mutex<usize>,
    returned: Condvar,
}

impl Semaphore {
    pub(crate) fn new(permits: usize) -> Self {
        Self {
            available: Mutex::new(permits),
            returned: Condvar::new(),
        }
    }

    /// Takes one permit, blocking the current thread until one is available.
    pub(crate) fn acquire(&self) {
        let mut available = self.available.lock();

        while *available == 0 {
            self.returned.wait(&mut available);
        }

        *available = available.wrapping_sub(1);
    }

    /// Returns one permit, waking up one waiter if there is any.
    pub(crate) fn release(&self) {
        let mut available = self.available.lock();
        *available = available.wrapping_add(1);

        self.returned.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        *self.available.lock()
    }
}
