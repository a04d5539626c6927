//! Completion barrier for enumerator and worker tasks
//!
//! The run registers every task up front and hands each one a
//! [`TaskToken`]. A token signals completion when dropped, so a task that
//! returns early, fails, or panics still counts down. The run is finished
//! only when the count reaches zero.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Counts outstanding tasks and wakes waiters when none are left
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    outstanding: Mutex<usize>,
    cond: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `count` tasks, returning one token per task
    pub fn register(self: &Arc<Self>, count: usize) -> Vec<TaskToken> {
        *self.outstanding.lock() += count;
        (0..count)
            .map(|_| TaskToken {
                barrier: Arc::clone(self),
            })
            .collect()
    }

    /// Tasks that have not signalled yet
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock()
    }

    /// Block until every registered task has signalled
    pub fn wait(&self) {
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            self.cond.wait(&mut outstanding);
        }
    }

    /// Block for at most `timeout`; returns true if the barrier is open
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut outstanding = self.outstanding.lock();
        if *outstanding > 0 {
            self.cond.wait_for(&mut outstanding, timeout);
        }
        *outstanding == 0
    }

    fn done(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.cond.notify_all();
        }
    }
}

/// Proof of registration for one task; signals done on drop
#[derive(Debug)]
pub struct TaskToken {
    barrier: Arc<CompletionBarrier>,
}

impl TaskToken {
    /// Signal completion explicitly
    pub fn done(self) {
        drop(self);
    }
}

impl Drop for TaskToken {
    fn drop(&mut self) {
        self.barrier.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_barrier_is_open() {
        let barrier = CompletionBarrier::new();
        assert!(barrier.wait_timeout(Duration::from_millis(1)));
        barrier.wait();
    }

    #[test]
    fn test_opens_only_after_all_tokens() {
        let barrier = CompletionBarrier::new();
        let mut tokens = barrier.register(3);
        assert_eq!(barrier.outstanding(), 3);

        tokens.pop().unwrap().done();
        tokens.pop().unwrap().done();
        assert!(!barrier.wait_timeout(Duration::from_millis(10)));

        tokens.pop().unwrap().done();
        assert!(barrier.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_across_threads() {
        let barrier = CompletionBarrier::new();
        let handles: Vec<_> = barrier
            .register(8)
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5 * i as u64));
                    token.done();
                })
            })
            .collect();

        barrier.wait();
        assert_eq!(barrier.outstanding(), 0);
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_panicking_task_still_signals() {
        let barrier = CompletionBarrier::new();
        let token = barrier.register(1).pop().unwrap();
        let handle = thread::spawn(move || {
            let _token = token;
            panic!("task failed");
        });
        assert!(handle.join().is_err());
        assert!(barrier.wait_timeout(Duration::from_millis(10)));
    }
}
