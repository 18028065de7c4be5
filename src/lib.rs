//! # Warming-dl
//!
//! Sequential downloader for small sets of remote text resources.
//!
//! Requests are fetched one at a time, in the order they were added. Each
//! result is reported exactly once, tagged with the request's sequence index,
//! and a final all-completed notification closes the run. A failed request is
//! reported and skipped; it never stops the requests behind it.
//!
//! ```no_run
//! use warming_dl::{DownloadQueue, NotificationLog};
//!
//! # async fn demo() {
//! let mut queue = DownloadQueue::new();
//! queue.add("https://gml.noaa.gov/webdata/ccgg/trends/co2/co2_annmean_gl.csv");
//!
//! let mut log = NotificationLog::default();
//! let summary = queue.run(&mut log).await;
//! println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//! # }
//! ```

pub mod core;

pub use crate::core::error::{Error, Result};
pub use crate::core::{
    DownloadQueue, Downloader, FetchConfig, FetchHandle, FetchOutcome, FetchRequest, Fetcher,
    HttpFetcher, Notification, NotificationLog, QueueEvent, QueueEvents, QueueObserver,
    QueueSummary,
};

/// Fetch a single URL as text with the default HTTP client
pub async fn get_text(url: &str) -> Result<String> {
    HttpFetcher::new().fetch(url).await
}

/// Fetch `urls` in order, reporting to `observer`
pub async fn get_all<I, S, O>(urls: I, observer: &mut O) -> QueueSummary
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    O: QueueObserver + ?Sized,
{
    let mut queue = DownloadQueue::new();
    for url in urls {
        queue.add(url);
    }
    queue.run(observer).await
}
