//! Queue observers wiring catalog datasets to CLI reports
//!
//! The main queue fetches one URL per catalog entry. A follow-up entry's page
//! is scraped inside the step callback, and the extracted CSV is fetched by a
//! brand-new queue started right there; its events are drained afterwards.

use std::sync::Arc;

use log::{debug, error, warn};
use warming_dl::{DownloadQueue, Error, Fetcher, QueueEvents, QueueObserver};

use crate::cli::catalog::{Catalog, Dataset, DatasetSource};
use crate::cli::report::{Reporter, StepReport};

/// Report text for a failed step, whether or not its cause is known
fn failure_reason(error: Option<&Error>) -> String {
    error.map_or_else(|| "download failed".to_string(), Error::to_string)
}

/// Second-stage queue spawned for a follow-up dataset
pub struct PendingFollowUp<'a> {
    pub index: usize,
    pub dataset: &'a Dataset,
    pub events: QueueEvents,
}

/// Observer for the main catalog queue
pub struct CatalogObserver<'a> {
    catalog: &'a Catalog,
    fetcher: Arc<dyn Fetcher>,
    reporter: &'a Reporter,
    follow_ups: Vec<PendingFollowUp<'a>>,
    completed: bool,
}

impl<'a> CatalogObserver<'a> {
    pub fn new(catalog: &'a Catalog, fetcher: Arc<dyn Fetcher>, reporter: &'a Reporter) -> Self {
        Self {
            catalog,
            fetcher,
            reporter,
            follow_ups: Vec::new(),
            completed: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Follow-up queues started during the run, in dataset order
    pub fn into_follow_ups(self) -> Vec<PendingFollowUp<'a>> {
        self.follow_ups
    }

    fn report_failure(&self, index: usize, error: Option<&Error>) {
        let Some(dataset) = self.dataset(index) else {
            return;
        };
        self.reporter.failed(index, dataset, &failure_reason(error));
        self.reporter.progress().step(&dataset.title);
    }

    fn dataset(&self, index: usize) -> Option<&'a Dataset> {
        let dataset = self.catalog.get(index);
        if dataset.is_none() {
            warn!("No catalog entry for queue index {index}");
        }
        dataset
    }
}

impl QueueObserver for CatalogObserver<'_> {
    fn step_succeeded(&mut self, data: String, index: usize) {
        let Some(dataset) = self.dataset(index) else {
            return;
        };

        match &dataset.source {
            DatasetSource::Direct(_) => self.reporter.series(index, dataset, &data),
            DatasetSource::FollowUp(follow) => match follow.extract(&data) {
                Some(url) => {
                    self.reporter.emit(&StepReport::FollowUp {
                        index,
                        title: &dataset.title,
                        url: url.clone(),
                    });

                    let mut queue = DownloadQueue::with_fetcher(Arc::clone(&self.fetcher));
                    queue.add(url);
                    self.reporter.progress().pb.inc_length(1);
                    self.follow_ups.push(PendingFollowUp {
                        index,
                        dataset,
                        events: queue.start(),
                    });
                }
                None => {
                    error!("Cannot extract {} data link from {}", dataset.title, follow.page_url);
                    self.reporter.failed(index, dataset, "no data link found on page");
                }
            },
        }
        self.reporter.progress().step(&dataset.title);
    }

    fn step_failed(&mut self, index: usize) {
        self.report_failure(index, None);
    }

    fn step_failed_with(&mut self, index: usize, error: &Error) {
        self.report_failure(index, Some(error));
    }

    fn all_completed(&mut self) {
        debug!(
            "Main queue completed, {} follow-up queue(s) pending",
            self.follow_ups.len()
        );
        self.completed = true;
    }
}

/// Observer for a one-request follow-up queue, reporting under the parent's index
pub struct FollowUpObserver<'a> {
    index: usize,
    dataset: &'a Dataset,
    reporter: &'a Reporter,
}

impl<'a> FollowUpObserver<'a> {
    pub fn new(index: usize, dataset: &'a Dataset, reporter: &'a Reporter) -> Self {
        Self {
            index,
            dataset,
            reporter,
        }
    }
}

impl FollowUpObserver<'_> {
    fn report_failure(&self, error: Option<&Error>) {
        self.reporter.failed(self.index, self.dataset, &failure_reason(error));
        self.reporter.progress().step(&self.dataset.title);
    }
}

impl QueueObserver for FollowUpObserver<'_> {
    fn step_succeeded(&mut self, data: String, _index: usize) {
        self.reporter.series(self.index, self.dataset, &data);
        self.reporter.progress().step(&self.dataset.title);
    }

    fn step_failed(&mut self, _index: usize) {
        self.report_failure(None);
    }

    fn step_failed_with(&mut self, _index: usize, error: &Error) {
        self.report_failure(Some(error));
    }

    fn all_completed(&mut self) {}
}
