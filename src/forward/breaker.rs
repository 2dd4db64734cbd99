use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Online/offline gate of one forwarding resolver.
///
/// The flag is read lock-free by the query path. Recording an error, checking
/// the window and flipping the flag to offline happen under one lock so that
/// concurrent failures produce at most one transition per outage.
#[derive(Debug)]
pub struct CircuitBreaker {
    online: AtomicBool,
    window: Option<Mutex<ErrorWindow>>,
}

impl CircuitBreaker {
    /// A breaker that never opens.
    pub fn disabled() -> Self {
        Self {
            online: AtomicBool::new(true),
            window: None,
        }
    }

    pub fn new(max_errors: usize, span: Duration) -> Self {
        Self {
            online: AtomicBool::new(true),
            window: Some(Mutex::new(ErrorWindow::new(max_errors, span))),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.window.is_some()
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_online(&self) {
        self.online.store(true, Ordering::Release);
    }

    /// Records a failure seen at `now`.
    ///
    /// Returns the span covered by the retained errors when this very call took
    /// the breaker from online to offline, `None` otherwise.
    pub fn record_error(&self, now: Instant) -> Option<Duration> {
        let mut window = self.window.as_ref()?.lock();

        let span = window.push(now)?;

        self.online
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| span)
    }

    #[cfg(test)]
    pub(crate) fn recorded(&self) -> usize {
        self.window.as_ref().map(|w| w.lock().len()).unwrap_or_default()
    }
}

/// Time-ordered failure instants, oldest first, at most `max_errors` kept.
#[derive(Debug)]
struct ErrorWindow {
    max_errors: usize,
    span: Duration,
    errors: VecDeque<Instant>,
}

impl ErrorWindow {
    fn new(max_errors: usize, span: Duration) -> Self {
        Self {
            max_errors,
            span,
            errors: VecDeque::new(),
        }
    }

    /// Appends `now`. Once the queue overflows the oldest entry is evicted and
    /// the window trips when the oldest surviving entry is younger than `span`.
    fn push(&mut self, now: Instant) -> Option<Duration> {
        self.errors.push_back(now);

        if self.errors.len() <= self.max_errors {
            return None;
        }

        self.errors.pop_front();

        let elapsed = now.duration_since(*self.errors.front()?);
        (elapsed < self.span).then_some(elapsed)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.errors.len()
    }
}
