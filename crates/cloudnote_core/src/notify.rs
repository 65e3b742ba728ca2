//! Notification contexts for observable model state.
//!
//! # Responsibility
//! - Move store completions onto the single context that owns model state.
//! - Deliver observer callbacks in dispatch order.
//!
//! # Invariants
//! - Work dispatched to one context runs in FIFO order.
//! - `QueueContext` runs work only on the thread that drains it.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Unit of work scheduled onto a notification context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Single designated execution context for model mutation and callbacks.
pub trait NotificationContext: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// Runs dispatched work immediately on the dispatching thread.
///
/// Suitable for hosts whose store completes on the caller thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineContext;

impl NotificationContext for InlineContext {
    fn dispatch(&self, task: Task) {
        task();
    }
}

/// FIFO work queue drained by its owning thread, like a UI main loop.
pub struct QueueContext {
    sender: Mutex<Sender<Task>>,
    receiver: Mutex<Receiver<Task>>,
}

impl QueueContext {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender: Mutex::new(sender),
            receiver: Mutex::new(receiver),
        }
    }

    /// Runs queued work until the queue is empty, including work queued by
    /// the tasks themselves. Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.try_next() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for one task and runs it.
    ///
    /// Returns `false` when nothing arrived in time.
    pub fn run_next_timeout(&self, timeout: Duration) -> bool {
        let next = {
            let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv_timeout(timeout)
        };
        match next {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn try_next(&self) -> Option<Task> {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        receiver.try_recv().ok()
    }
}

impl Default for QueueContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationContext for QueueContext {
    fn dispatch(&self, task: Task) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        // The receiver lives as long as `self`, so send cannot fail here.
        let _ = sender.send(task);
    }
}
