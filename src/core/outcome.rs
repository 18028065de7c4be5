//! Outcome and event types passed between the downloader, the queue and its observer

use serde::Serialize;

use crate::core::error::{Error, Result};
use crate::core::observer::QueueObserver;

/// Terminal result of a single fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// Full response body decoded as text
    Success { data: String },
    /// Any fetch failure, carrying the underlying cause
    Failure { error: Error },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// Convert back into a plain `Result`
    pub fn into_result(self) -> Result<String> {
        match self {
            FetchOutcome::Success { data } => Ok(data),
            FetchOutcome::Failure { error } => Err(error),
        }
    }
}

impl From<Result<String>> for FetchOutcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(data) => FetchOutcome::Success { data },
            Err(error) => FetchOutcome::Failure { error },
        }
    }
}

/// Counters describing a finished queue run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    /// Requests added before the queue was started
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Requests never dispatched because the run was cancelled
    pub skipped: usize,
    pub cancelled: bool,
}

/// Queue-level notification, tagged with the request's sequence index
#[derive(Debug)]
pub enum QueueEvent {
    StepSucceeded { index: usize, data: String },
    StepFailed { index: usize, error: Error },
    AllCompleted(QueueSummary),
}

impl QueueEvent {
    /// Hand this event to the matching observer callback
    pub fn deliver_to<O: QueueObserver + ?Sized>(self, observer: &mut O) {
        match self {
            QueueEvent::StepSucceeded { index, data } => observer.step_succeeded(data, index),
            QueueEvent::StepFailed { index, error } => observer.step_failed_with(index, &error),
            QueueEvent::AllCompleted(_) => observer.all_completed(),
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            QueueEvent::StepSucceeded { index, .. } | QueueEvent::StepFailed { index, .. } => {
                Some(*index)
            }
            QueueEvent::AllCompleted(_) => None,
        }
    }
}
