//! Completion counter for background retirement work

use std::io;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

/// Counts in-flight background tasks so shutdown can wait for them
#[derive(Debug, Default)]
pub struct TaskTracker {
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl TaskTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `task` on a named thread, counted until it returns
    pub fn spawn<F>(self: &Arc<Self>, name: String, task: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        *self.in_flight.lock() += 1;

        let tracker = Arc::clone(self);
        let spawned = thread::Builder::new().name(name).spawn(move || {
            let _guard = Completion(tracker);
            task();
        });

        if let Err(e) = spawned {
            self.finish();
            return Err(e);
        }
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.lock()
    }

    /// Block until every spawned task has finished
    pub fn wait(&self) {
        let mut count = self.in_flight.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }

    fn finish(&self) {
        let mut count = self.in_flight.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Decrements on drop, so a panicking task still counts as finished
struct Completion(Arc<TaskTracker>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.finish();
    }
}
