//! Observer contract for download queues

use crate::core::error::Error;

/// Listener for one queue run.
///
/// Callbacks are invoked on the context that drives delivery: the task awaiting
/// [`crate::DownloadQueue::run`], or the task draining [`crate::QueueEvents`].
/// They never run concurrently with each other.
pub trait QueueObserver {
    /// Request `index` was fetched and decoded
    fn step_succeeded(&mut self, data: String, index: usize);

    /// Request `index` failed; the queue moves on regardless
    fn step_failed(&mut self, index: usize);

    /// Every request has been reported. Fires exactly once, last.
    fn all_completed(&mut self);

    /// Failure hook that also sees the cause. Defaults to [`Self::step_failed`].
    fn step_failed_with(&mut self, index: usize, error: &Error) {
        let _ = error;
        self.step_failed(index);
    }
}

/// A notification as seen by an observer, with the failure cause stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Succeeded { index: usize, data: String },
    Failed { index: usize },
    AllCompleted,
}

/// Observer that records every notification in arrival order
#[derive(Debug, Default, Clone)]
pub struct NotificationLog {
    notifications: Vec<Notification>,
}

impl NotificationLog {
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn into_notifications(self) -> Vec<Notification> {
        self.notifications
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.notifications.last(), Some(Notification::AllCompleted))
    }
}

impl QueueObserver for NotificationLog {
    fn step_succeeded(&mut self, data: String, index: usize) {
        self.notifications.push(Notification::Succeeded { index, data });
    }

    fn step_failed(&mut self, index: usize) {
        self.notifications.push(Notification::Failed { index });
    }

    fn all_completed(&mut self) {
        self.notifications.push(Notification::AllCompleted);
    }
}
