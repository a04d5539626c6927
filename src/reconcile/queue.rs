//! Bounded descriptor queue with backpressure
//!
//! Each pipeline owns one queue with exactly one producer (its
//! enumerator) and many consumers (its workers). The sender is not
//! `Clone`: dropping or closing it is the one-time end-of-stream signal,
//! and only the producer can do it. Once the sender is gone, receivers
//! drain whatever is left and then report [`Recv::Closed`].

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a blocked send or receive waits before rechecking cancellation
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Statistics for a queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total items enqueued
    pub enqueued: AtomicU64,

    /// Total items dequeued
    pub dequeued: AtomicU64,

    /// Number of times the producer found the queue full
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    /// Items taken by consumers so far
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Create a bounded queue, returning its single producer and a cloneable consumer
pub fn work_queue<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (sender, receiver) = bounded(capacity);
    let stats = Arc::new(QueueStats::default());

    (
        QueueSender {
            sender,
            stats: Arc::clone(&stats),
        },
        QueueReceiver { receiver, stats },
    )
}

/// Producer half; closing it ends the stream
pub struct QueueSender<T> {
    sender: Sender<T>,
    stats: Arc<QueueStats>,
}

/// Why a send did not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The run was cancelled while waiting for space
    Cancelled,
    /// Every consumer is gone
    Disconnected,
}

impl<T> QueueSender<T> {
    /// Send an item, waiting for space while the run is not cancelled
    pub fn send(&self, item: T, cancel: &AtomicBool) -> Result<(), SendError> {
        let mut item = item;
        let mut waited = false;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(SendError::Cancelled);
            }
            match self.sender.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => {
                    self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(SendTimeoutError::Timeout(back)) => {
                    if !waited {
                        self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);
                        waited = true;
                    }
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(SendError::Disconnected),
            }
        }
    }

    /// Close the queue; consumers drain the remainder and then stop
    pub fn close(self) {
        drop(self);
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Result of waiting for the next item
#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    /// An item to process
    Item(T),
    /// Nothing arrived within the poll interval; the queue is still open
    Empty,
    /// The producer closed the queue and it is drained
    Closed,
}

/// Consumer half; clone one per worker
pub struct QueueReceiver<T> {
    receiver: Receiver<T>,
    stats: Arc<QueueStats>,
}

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> QueueReceiver<T> {
    /// Wait up to `timeout` for the next item
    pub fn recv_timeout(&self, timeout: Duration) -> Recv<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Recv::Item(item)
            }
            Err(RecvTimeoutError::Timeout) => Recv::Empty,
            Err(RecvTimeoutError::Disconnected) => Recv::Closed,
        }
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_queue_basic() {
        let (tx, rx) = work_queue::<u32>(10);
        let cancel = AtomicBool::new(false);

        tx.send(7, &cancel).unwrap();
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.recv_timeout(POLL_INTERVAL), Recv::Item(7));
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Recv::Empty);
    }

    #[test]
    fn test_close_drains_then_reports_closed() {
        let (tx, rx) = work_queue::<u32>(10);
        let cancel = AtomicBool::new(false);

        tx.send(1, &cancel).unwrap();
        tx.send(2, &cancel).unwrap();
        tx.close();

        assert_eq!(rx.recv_timeout(POLL_INTERVAL), Recv::Item(1));
        assert_eq!(rx.recv_timeout(POLL_INTERVAL), Recv::Item(2));
        assert_eq!(rx.recv_timeout(POLL_INTERVAL), Recv::Closed);
    }

    #[test]
    fn test_cancel_unblocks_full_queue() {
        let (tx, _rx) = work_queue::<u32>(1);
        let cancel = AtomicBool::new(false);

        tx.send(1, &cancel).unwrap();
        cancel.store(true, Ordering::SeqCst);
        assert_eq!(tx.send(2, &cancel), Err(SendError::Cancelled));
    }

    #[test]
    fn test_backpressure_counted() {
        let (tx, rx) = work_queue::<u32>(1);
        let cancel = Arc::new(AtomicBool::new(false));

        tx.send(1, &cancel).unwrap();
        let consumer = {
            let rx = rx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(250));
                let mut got = Vec::new();
                while let Recv::Item(v) = rx.recv_timeout(POLL_INTERVAL * 5) {
                    got.push(v);
                }
                got
            })
        };

        tx.send(2, &cancel).unwrap();
        let stats = tx.stats();
        tx.close();

        assert_eq!(consumer.join().unwrap(), vec![1, 2]);
        assert_eq!(stats.backpressure_count(), 1);
        assert_eq!(stats.enqueued.load(Ordering::Relaxed), 2);
        assert_eq!(rx.stats().throughput(), 2);
    }

    #[test]
    fn test_send_after_consumers_gone() {
        let (tx, rx) = work_queue::<u32>(1);
        drop(rx);
        let cancel = AtomicBool::new(false);
        assert_eq!(tx.send(1, &cancel), Err(SendError::Disconnected));
    }
}
