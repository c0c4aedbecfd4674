//! Deferred task queue driving write coalescing.
//!
//! Tasks deferred during a turn never run in that same turn; they wait for
//! the next `run_turn`. Property writes made before the turn ends are therefore
//! batched into whatever flush the first write deferred.

use crate::core::{GraphError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{Level, event};

pub type Task = Box<dyn FnOnce() -> Result<()> + Send>;

/// Receives errors raised by deferred tasks, which have no caller to return to.
pub type ErrorHook = Arc<dyn Fn(&GraphError) + Send + Sync>;

/// Upper bound on turns in `run_until_idle`, guarding against tasks that
/// keep rescheduling themselves.
const MAX_TURNS: usize = 1024;

#[derive(Default)]
pub struct Scheduler {
    queue: Mutex<VecDeque<Task>>,
    hook: RwLock<Option<ErrorHook>>,
    failures: AtomicU64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task for the next turn
    pub fn defer(&self, task: impl FnOnce() -> Result<()> + Send + 'static) -> Result<()> {
        self.queue.lock()?.push_back(Box::new(task));
        Ok(())
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Run every task queued before this call. Returns how many ran.
    pub fn run_turn(&self) -> Result<usize> {
        let batch: Vec<Task> = self.queue.lock()?.drain(..).collect();
        let count = batch.len();
        for task in batch {
            if let Err(err) = task() {
                self.report(&err);
            }
        }
        Ok(count)
    }

    /// Run turns until the queue is empty. Returns the total number of tasks run.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut total = 0;
        for _ in 0..MAX_TURNS {
            let ran = self.run_turn()?;
            if ran == 0 {
                return Ok(total);
            }
            total += ran;
        }
        event!(Level::WARN, pending = self.pending(), "scheduler still busy after turn limit");
        Ok(total)
    }

    pub fn set_error_hook(&self, hook: ErrorHook) -> Result<()> {
        *self.hook.write()? = Some(hook);
        Ok(())
    }

    /// Number of deferred tasks that returned an error
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    fn report(&self, err: &GraphError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        let hook = self.hook.read().ok().and_then(|hook| hook.clone());
        match hook {
            Some(hook) => hook(err),
            None => event!(Level::ERROR, error = %err, "deferred task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_tasks_deferred_during_turn_wait_for_next_turn() {
        let scheduler = Arc::new(Scheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = Arc::clone(&scheduler);
        let inner_runs = Arc::clone(&runs);
        scheduler
            .defer(move || {
                inner_runs.fetch_add(1, Ordering::SeqCst);
                let nested_runs = Arc::clone(&inner_runs);
                inner_scheduler.defer(move || {
                    nested_runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .unwrap();

        assert_eq!(scheduler.run_turn().unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.run_until_idle().unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_task_errors_reach_hook() {
        let scheduler = Scheduler::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scheduler
            .set_error_hook(Arc::new(move |err: &GraphError| {
                sink.lock().unwrap().push(err.to_string());
            }))
            .unwrap();

        scheduler.defer(|| Err(GraphError::Aborted)).unwrap();
        scheduler.defer(|| Ok(())).unwrap();
        scheduler.run_until_idle().unwrap();

        assert_eq!(scheduler.failures(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["Transaction aborted".to_string()]);
    }
}
