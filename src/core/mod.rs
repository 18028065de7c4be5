//! Core library modules for warming-dl
//!
//! This module contains the sequential download coordinator: the single-use
//! downloader, the queue that drives downloaders one at a time, and the
//! observer contract through which results are delivered.

pub mod error;
pub mod source;
pub mod outcome;
pub mod observer;
pub mod downloader;
pub mod queue;

// Re-export main types for internal use
pub use downloader::{Downloader, FetchHandle, Fetcher, HttpFetcher};
pub use observer::{Notification, NotificationLog, QueueObserver};
pub use outcome::{FetchOutcome, QueueEvent, QueueSummary};
pub use queue::{DownloadQueue, QueueEvents};
pub use source::{FetchConfig, FetchRequest};
