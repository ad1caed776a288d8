//! Single-fire alarm scheduling on top of a tokio runtime
//!
//! Sessions drive their timed transitions through [`TimerService`]: each
//! schedule call spawns one task that sleeps and then runs a callback. The
//! returned [`TimerHandle`] cancels the alarm when dropped, so replacing a
//! stored handle supersedes the previous alarm automatically.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Spawns single-fire alarms on a tokio runtime
///
/// The service holds a runtime handle rather than relying on an ambient
/// runtime, so alarms can be scheduled from synchronous callers as well.
#[derive(Debug, Clone)]
pub struct TimerService {
    handle: tokio::runtime::Handle,
}

impl TimerService {
    /// Creates a service scheduling onto the given runtime
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates a service scheduling onto the current runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }

    /// Schedules `callback` to run once after `after` has elapsed
    ///
    /// The callback runs on the runtime this service was created with.
    /// Dropping the returned handle cancels the alarm if it has not fired
    /// yet; a callback that is already running is not interrupted.
    pub fn schedule<F>(&self, after: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            callback();
        });

        TimerHandle { task }
    }
}

/// Handle to a scheduled alarm, cancelling it on drop
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancels the alarm if it has not fired yet
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
