//! Quiescence-window debouncing of free-text input
//!
//! [`Debounce`] is a clock-driven state machine: the caller feeds it input
//! with a timestamp and polls it, which keeps it deterministic and lets the
//! list controller own it directly. [`DebouncedInput`] wraps the same rule in
//! a spawned task for callers that want pushed updates instead.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Publishes a value only after it has stopped changing for a window
#[derive(Debug, Clone)]
pub struct Debounce<T> {
    window: Duration,
    settled: T,
    pending: Option<(T, Instant)>,
}

impl<T: Clone + PartialEq> Debounce<T> {
    /// Start settled on `initial`
    pub const fn new(initial: T, window: Duration) -> Self {
        Self {
            window,
            settled: initial,
            pending: None,
        }
    }

    /// Record new input at `now`, restarting the window
    pub fn input(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    /// Settle the pending value if its window has elapsed by `now`
    ///
    /// Returns whether the settled value changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending.take() {
            Some((value, deadline)) if deadline <= now => self.settle(value),
            still_waiting => {
                self.pending = still_waiting;
                false
            }
        }
    }

    /// Settle the pending value immediately
    ///
    /// Returns whether the settled value changed.
    pub fn flush(&mut self) -> bool {
        self.pending
            .take()
            .is_some_and(|(value, _)| self.settle(value))
    }

    /// Drop pending input; the settled value stays
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Last value that survived the window
    pub const fn settled(&self) -> &T {
        &self.settled
    }

    /// Latest input, settled or not
    pub fn latest(&self) -> &T {
        self.pending.as_ref().map_or(&self.settled, |(value, _)| value)
    }

    /// When the pending value will settle
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    fn settle(&mut self, value: T) -> bool {
        if self.settled == value {
            false
        } else {
            self.settled = value;
            true
        }
    }
}

/// A debounced value maintained by a background task
///
/// Dropping it cancels the task, so a settled value is never published after
/// its owner is gone.
#[derive(Debug)]
pub struct DebouncedInput<T> {
    input: watch::Sender<T>,
    output: watch::Receiver<T>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<T> DebouncedInput<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Spawn the debouncing task on the current runtime
    pub fn spawn(initial: T, window: Duration) -> Self {
        let (input, mut changes) = watch::channel(initial.clone());
        let (publish, output) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => return,
                    changed = changes.changed() => if changed.is_err() { return },
                }

                loop {
                    tokio::select! {
                        () = token.cancelled() => return,
                        changed = changes.changed() => if changed.is_err() { return },
                        () = tokio::time::sleep(window) => break,
                    }
                }

                let latest = changes.borrow_and_update().clone();
                publish.send_if_modified(|current| {
                    if *current == latest {
                        false
                    } else {
                        trace!("Debounced value settled");
                        *current = latest;
                        true
                    }
                });
            }
        });

        Self {
            input,
            output,
            cancel,
            task,
        }
    }

    /// Feed new input, restarting the window
    pub fn set(&self, value: T) {
        self.input.send_replace(value);
    }

    /// Last settled value
    pub fn current(&self) -> T {
        self.output.borrow().clone()
    }

    /// Receiver notified on every settled change
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.output.clone()
    }

    /// Stop debouncing; pending input is never published
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the background task has stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for DebouncedInput<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn test_rapid_input_settles_once() {
        let start = Instant::now();
        let mut debounce = Debounce::new(String::new(), WINDOW);

        let mut settled = 0;
        for (i, term) in ["a", "ab", "abc"].into_iter().enumerate() {
            let at = start + Duration::from_millis(100 * i as u64);
            debounce.input(term.to_string(), at);
            if debounce.poll(at) {
                settled += 1;
            }
        }

        let last_input = start + Duration::from_millis(200);
        assert!(!debounce.poll(last_input + Duration::from_millis(499)));
        assert_eq!(debounce.settled(), "");
        assert_eq!(debounce.latest(), "abc");

        if debounce.poll(last_input + WINDOW) {
            settled += 1;
        }
        assert_eq!(settled, 1);
        assert_eq!(debounce.settled(), "abc");
        assert!(debounce.deadline().is_none());
    }

    #[test]
    fn test_returning_to_settled_value_is_not_a_change() {
        let start = Instant::now();
        let mut debounce = Debounce::new("rust".to_string(), WINDOW);
        debounce.input("rus".to_string(), start);
        debounce.input("rust".to_string(), start + Duration::from_millis(50));
        assert!(!debounce.poll(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_cancel_drops_pending() {
        let start = Instant::now();
        let mut debounce = Debounce::new(String::new(), WINDOW);
        debounce.input("abc".to_string(), start);
        debounce.cancel();
        assert!(!debounce.poll(start + Duration::from_secs(5)));
        assert_eq!(debounce.settled(), "");
    }

    #[test]
    fn test_flush_settles_now() {
        let mut debounce = Debounce::new(String::new(), WINDOW);
        debounce.input("abc".to_string(), Instant::now());
        assert!(debounce.flush());
        assert_eq!(debounce.settled(), "abc");
        assert!(!debounce.flush());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_input_publishes_after_quiet_window() {
        let input = DebouncedInput::spawn(String::new(), WINDOW);
        let mut updates = input.subscribe();

        for term in ["a", "ab", "abc"] {
            input.set(term.to_string());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(input.current(), "");
        assert!(!updates.has_changed().unwrap());

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(input.current(), "abc");
        assert!(updates.has_changed().unwrap());
        updates.borrow_and_update();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_input_never_publishes() {
        let input = DebouncedInput::spawn(String::new(), WINDOW);
        input.set("abc".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;

        input.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(input.current(), "");
        assert!(input.is_finished());
    }
}
