//! CLI-specific utilities for warming-dl
//!
//! This module contains the consumer side of the download queue: the dataset
//! catalog, CSV series extraction, observers and output, kept apart from the
//! core library.

pub mod catalog;
pub mod observer;
pub mod progress;
pub mod report;
pub mod series;

pub use catalog::{Catalog, DatasetSource};
pub use observer::{CatalogObserver, FollowUpObserver};
pub use progress::ProgressManager;
pub use report::{Reporter, StepReport};
