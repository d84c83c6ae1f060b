//! Cancellable timers driven by the simulation tick.
//!
//! The host never hands the core a wall clock; timers count down the `dt`
//! passed to [`Scheduler::update`] and return the payloads that fired.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct ScheduledTask<T> {
    id: TaskId,
    payload: T,
    remaining: f32,
    interval: Option<f32>,
}

/// Timer list yielding payloads of type `T` when tasks come due.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    tasks: Vec<ScheduledTask<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Scheduler<T> {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Runs `payload` once after `delay` seconds.
    pub fn schedule_once(&mut self, delay: f32, payload: T) -> TaskId {
        let id = self.allocate_id();
        self.tasks.push(ScheduledTask {
            id,
            payload,
            remaining: delay.max(0.0),
            interval: None,
        });
        id
    }

    /// Runs `payload` every `interval` seconds, first after one interval.
    ///
    /// Non-positive intervals are raised to a small minimum.
    pub fn schedule_repeating(&mut self, interval: f32, payload: T) -> TaskId {
        let interval = interval.max(f32::EPSILON);
        let id = self.allocate_id();
        self.tasks.push(ScheduledTask {
            id,
            payload,
            remaining: interval,
            interval: Some(interval),
        });
        debug!("Scheduled repeating task {} every {interval}s", id.raw());
        id
    }

    /// Cancels a task. Returns whether it was pending.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    /// Checks whether a task is pending.
    #[must_use]
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    /// Seconds until a task next fires.
    #[must_use]
    pub fn time_remaining(&self, id: TaskId) -> Option<f32> {
        self.tasks.iter().find(|t| t.id == id).map(|t| t.remaining)
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Checks if no task is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Counts down `dt` seconds and returns the payloads that came due,
    /// in scheduling order. A repeating task that missed several intervals
    /// fires once per missed interval.
    pub fn update(&mut self, dt: f32) -> Vec<T> {
        let dt = dt.max(0.0);
        let mut fired = Vec::new();
        for task in &mut self.tasks {
            task.remaining -= dt;
            match task.interval {
                Some(interval) => {
                    while task.remaining <= 0.0 {
                        fired.push(task.payload.clone());
                        task.remaining += interval;
                    }
                }
                None => {
                    if task.remaining <= 0.0 {
                        fired.push(task.payload.clone());
                    }
                }
            }
        }
        self.tasks
            .retain(|t| t.interval.is_some() || t.remaining > 0.0);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_once(1.0, "ping");
        assert!(scheduler.update(0.5).is_empty());
        assert!(scheduler.is_scheduled(id));
        assert_eq!(scheduler.update(0.5), vec!["ping"]);
        assert!(!scheduler.is_scheduled(id));
        assert!(scheduler.update(10.0).is_empty());
    }

    #[test]
    fn test_repeating() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_repeating(2.0, 7);
        assert!(scheduler.update(1.0).is_empty());
        assert_eq!(scheduler.update(1.0), vec![7]);
        assert_eq!(scheduler.update(4.0), vec![7, 7]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.schedule_repeating(1.0, 'a');
        scheduler.schedule_once(1.0, 'b');
        assert!(scheduler.cancel(a));
        assert!(!scheduler.cancel(a));
        assert_eq!(scheduler.update(1.0), vec!['b']);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_time_remaining() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_repeating(300.0, ());
        scheduler.update(100.0);
        let remaining = scheduler.time_remaining(id).expect("task pending");
        assert!((remaining - 200.0).abs() < 1e-3);
    }
}
