//! Debounced flush scheduler
//!
//! At most one timer is live per view. Scheduling aborts the previous task;
//! the generation passed to the callback lets a timer that already woke
//! recognize that it has been superseded.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Single-slot restartable timer
#[derive(Debug, Default)]
pub struct DebounceTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl DebounceTimer {
    /// Create idle timer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the timer
    ///
    /// Cancels any live timer, then runs `on_fire(generation)` after `delay`.
    /// Returns the new generation, or `None` when called outside a tokio
    /// runtime (nothing is scheduled).
    pub fn schedule<F>(&mut self, delay: Duration, on_fire: F) -> Option<u64>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("no tokio runtime; debounce timer not scheduled");
            return None;
        };

        self.generation += 1;
        let generation = self.generation;
        self.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation);
        }));
        Some(generation)
    }

    /// Claim a fire event
    ///
    /// Returns `true` and clears the slot if `generation` is still the live
    /// timer; `false` if it was cancelled or replaced meanwhile.
    pub fn fired(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.handle.is_none() {
            return false;
        }
        // The task is finishing on its own; dropping the handle detaches it
        self.handle = None;
        true
    }

    /// Abort the live timer, if any
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                self.generation += 1;
                true
            }
            None => false,
        }
    }

    /// Check if a timer is live
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn() -> Box<dyn FnOnce(u64) + Send>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let make = move || {
            let sink = sink.clone();
            Box::new(move |generation| sink.lock().push(generation)) as Box<dyn FnOnce(u64) + Send>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (fired, make) = recorder();
        let mut timer = DebounceTimer::new();
        let generation = timer.schedule(Duration::from_millis(100), make()).unwrap();

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*fired.lock(), vec![generation]);
        assert!(timer.fired(generation));
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_previous() {
        let (fired, make) = recorder();
        let mut timer = DebounceTimer::new();

        timer.schedule(Duration::from_millis(100), make());
        tokio::time::sleep(Duration::from_millis(60)).await;
        let second = timer.schedule(Duration::from_millis(100), make()).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*fired.lock(), vec![second]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let (fired, make) = recorder();
        let mut timer = DebounceTimer::new();

        timer.schedule(Duration::from_millis(100), make());
        assert!(timer.cancel());
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(fired.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_generation_is_not_claimed() {
        let mut timer = DebounceTimer::new();
        let first = timer.schedule(Duration::from_millis(100), |_| {}).unwrap();
        let second = timer.schedule(Duration::from_millis(100), |_| {}).unwrap();

        assert!(!timer.fired(first));
        assert!(timer.fired(second));
        assert!(!timer.fired(second));
    }

    #[test]
    fn schedule_without_runtime_is_noop() {
        let mut timer = DebounceTimer::new();
        assert!(timer.schedule(Duration::from_millis(10), |_| {}).is_none());
        assert!(!timer.is_pending());
    }
}
