use std::time::{Duration, Instant};

/// Handle returned by [`Scheduler::schedule`]; the only way to cancel a task.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Entry<T> {
    handle: TimerHandle,
    deadline: Instant,
    task: T,
}

/// Single-threaded list of one-shot timers owned by a surface.
///
/// Nothing fires on its own: the owner calls [`Scheduler::take_due`] from its
/// tick with the current instant and gets back every task whose deadline has
/// passed, earliest first. A cancelled handle never comes back out.
#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration, task: T) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.entries.push(Entry {
            handle,
            deadline: now + delay,
            task,
        });
        handle
    }

    /// Returns false when the handle already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.handle != handle);
        self.entries.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn take_due(&mut self, now: Instant) -> Vec<T> {
        let (mut due, pending): (Vec<Entry<T>>, Vec<Entry<T>>) = self
            .entries
            .drain(..)
            .partition(|e| e.deadline <= now);
        self.entries = pending;

        // Handles grow monotonically, so they break deadline ties in scheduling order.
        due.sort_by(|a, b| a.deadline.cmp(&b.deadline).then(a.handle.0.cmp(&b.handle.0)));
        due.into_iter().map(|e| e.task).collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_only_after_deadline() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule(t0, ms(1000), "seek");

        assert!(s.take_due(t0 + ms(999)).is_empty());
        assert_eq!(s.take_due(t0 + ms(1000)), vec!["seek"]);
        assert!(s.is_empty());
        assert!(s.take_due(t0 + ms(5000)).is_empty());
    }

    #[test]
    fn due_tasks_come_out_in_deadline_order() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule(t0, ms(3500), "reactivate");
        s.schedule(t0, ms(500), "navigate");
        s.schedule(t0, ms(3000), "reveal");
        s.schedule(t0, ms(500), "second-navigate");

        assert_eq!(
            s.take_due(t0 + ms(4000)),
            vec!["navigate", "second-navigate", "reveal", "reactivate"]
        );
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        let keep = s.schedule(t0, ms(100), 1);
        let gone = s.schedule(t0, ms(100), 2);

        assert!(s.cancel(gone));
        assert!(!s.cancel(gone));
        assert_eq!(s.take_due(t0 + ms(100)), vec![1]);
        assert!(!s.cancel(keep));
        assert!(s.is_empty());
    }

    #[test]
    fn cancel_all_clears_everything() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.schedule(t0, ms(10), 'a');
        s.schedule(t0, ms(20), 'b');
        assert!(!s.is_empty());

        s.cancel_all();
        assert!(s.is_empty());
        assert!(s.take_due(t0 + ms(100)).is_empty());
    }
}
