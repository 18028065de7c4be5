//! Sequential download queue
//!
//! Runs one [`Downloader`] at a time over the requests added before start,
//! reports each outcome tagged with its sequence index, and finishes with a
//! single all-completed notification. A failed request never stops the run.
//!
//! Each outcome is fully delivered before the queue waits out its delay and
//! dispatches the next request, whichever way the events are consumed.

use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::downloader::{Downloader, Fetcher, HttpFetcher};
use crate::core::error::Result;
use crate::core::observer::QueueObserver;
use crate::core::outcome::{FetchOutcome, QueueEvent, QueueSummary};
use crate::core::source::FetchRequest;

/// Ordered set of fetch requests, processed strictly one after another.
///
/// Starting a queue ([`run`](Self::run) or [`start`](Self::start)) consumes it,
/// so a queue can neither be started twice nor grow once started.
pub struct DownloadQueue {
    requests: Vec<FetchRequest>,
    delay: Duration,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadQueue {
    /// Empty queue fetching over HTTP with the default client
    pub fn new() -> Self {
        Self::with_fetcher(Arc::new(HttpFetcher::new()))
    }

    /// Empty queue using a custom fetcher
    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            requests: Vec::new(),
            delay: Duration::ZERO,
            fetcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Wait `delay` after each delivered outcome before advancing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Stop dispatching once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Append a request and return its sequence index
    pub fn add(&mut self, url: impl Into<String>) -> usize {
        let index = self.requests.len();
        self.requests.push(FetchRequest::new(url, index));
        index
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[FetchRequest] {
        &self.requests
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Process every request, invoking `observer` on the calling task.
    ///
    /// Only the network I/O leaves the caller's task; all callbacks run here,
    /// between awaits, in sequence-index order.
    pub async fn run<O: QueueObserver + ?Sized>(self, observer: &mut O) -> QueueSummary {
        self.drive(|event| {
            event.deliver_to(&mut *observer);
            future::ready(())
        })
        .await
    }

    /// Process the queue on a spawned task, delivering events over a channel.
    ///
    /// The caller decides where callbacks run by draining the returned
    /// [`QueueEvents`]. The queue does not advance past an event until the
    /// consumer has handled it. Must be called from within a tokio runtime.
    pub fn start(self) -> QueueEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.drive(move |event| {
            let (ack, handled) = oneshot::channel();
            // A dropped receiver only means nobody is listening any more
            let sent = tx.send((event, ack)).is_ok();
            async move {
                if sent {
                    // Also resolves when the consumer goes away
                    let _ = handled.await;
                }
            }
        }));
        QueueEvents {
            rx,
            task,
            handed_out: None,
        }
    }

    async fn drive<F, Fut>(self, mut deliver: F) -> QueueSummary
    where
        F: FnMut(QueueEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let DownloadQueue {
            requests,
            delay,
            fetcher,
            cancel,
        } = self;

        let mut summary = QueueSummary {
            total: requests.len(),
            ..QueueSummary::default()
        };
        info!("Starting download queue with {} request(s)", summary.total);

        let mut pending = requests.into_iter();
        while let Some(request) = pending.next() {
            if cancel.is_cancelled() {
                summary.skipped = pending.len() + 1;
                warn!("Queue cancelled, skipping {} request(s)", summary.skipped);
                break;
            }

            let index = request.index();
            let url = request.url().to_string();
            match Downloader::new(request, Arc::clone(&fetcher)).fetch().await {
                FetchOutcome::Success { data } => {
                    info!("Request #{index} completed ({} bytes): {url}", data.len());
                    summary.succeeded += 1;
                    deliver(QueueEvent::StepSucceeded { index, data }).await;
                }
                FetchOutcome::Failure { error } => {
                    warn!("Request #{index} failed: {error} ({url})");
                    summary.failed += 1;
                    deliver(QueueEvent::StepFailed { index, error }).await;
                }
            }

            if !delay.is_zero() {
                debug!("Waiting {}ms before advancing", delay.as_millis());
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        summary.cancelled = cancel.is_cancelled();
        info!(
            "Download queue finished: {} succeeded, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        );
        deliver(QueueEvent::AllCompleted(summary)).await;
        summary
    }
}

/// Receiving end of a queue started with [`DownloadQueue::start`].
///
/// Yields every [`QueueEvent`] in order; the last one is always
/// [`QueueEvent::AllCompleted`].
///
/// An event counts as handled once the consumer asks for the next one (or
/// drops this receiver). Until then the queue neither sleeps nor dispatches.
pub struct QueueEvents {
    rx: mpsc::UnboundedReceiver<(QueueEvent, oneshot::Sender<()>)>,
    task: JoinHandle<QueueSummary>,
    handed_out: Option<oneshot::Sender<()>>,
}

impl QueueEvents {
    /// Next event, or `None` once the queue has finished
    pub async fn recv(&mut self) -> Option<QueueEvent> {
        self.release();
        let (event, ack) = self.rx.recv().await?;
        self.handed_out = Some(ack);
        Some(event)
    }

    /// Drain all events into `observer` on the current task
    pub async fn dispatch_to<O: QueueObserver + ?Sized>(mut self, observer: &mut O) -> Result<QueueSummary> {
        self.release();
        while let Some((event, ack)) = self.rx.recv().await {
            event.deliver_to(observer);
            let _ = ack.send(());
        }
        Ok(self.task.await?)
    }

    /// Let the queue move past the last event handed out
    fn release(&mut self) {
        if let Some(ack) = self.handed_out.take() {
            let _ = ack.send(());
        }
    }
}

impl Stream for QueueEvents {
    type Item = QueueEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.release();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some((event, ack))) => {
                this.handed_out = Some(ack);
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::observer::{Notification, NotificationLog};
    use futures::future::BoxFuture;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Answers from a fixed table and flags any overlapping fetches
    #[derive(Default)]
    struct ScriptedFetcher {
        bodies: HashMap<String, String>,
        active: AtomicBool,
        overlapped: AtomicBool,
        calls: AtomicUsize,
        dispatched_at: Mutex<Vec<Instant>>,
    }

    impl ScriptedFetcher {
        fn with(bodies: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                bodies: bodies
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                ..Self::default()
            })
        }
    }

    impl Fetcher for Arc<ScriptedFetcher> {
        fn fetch(&self, url: &str) -> BoxFuture<'static, Result<String>> {
            let this = Arc::clone(self);
            let url = url.to_string();
            Box::pin(async move {
                this.dispatched_at.lock().unwrap().push(Instant::now());
                this.calls.fetch_add(1, Ordering::SeqCst);
                if this.active.swap(true, Ordering::SeqCst) {
                    this.overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
                this.active.store(false, Ordering::SeqCst);

                this.bodies
                    .get(&url)
                    .cloned()
                    .ok_or_else(|| Error::NetworkError(format!("connection refused: {url}")))
            })
        }
    }

    fn queue_for(fetcher: &Arc<ScriptedFetcher>, urls: &[&str]) -> DownloadQueue {
        let mut queue = DownloadQueue::with_fetcher(Arc::new(Arc::clone(fetcher)));
        for url in urls {
            queue.add(*url);
        }
        queue
    }

    #[test]
    fn test_add_assigns_sequential_indices() {
        let mut queue = queue_for(&ScriptedFetcher::with(&[]), &[]);
        assert!(queue.is_empty());
        assert_eq!(queue.add("mem://a"), 0);
        assert_eq!(queue.add("mem://b"), 1);
        assert_eq!(queue.add("mem://a"), 2);
        assert_eq!(queue.len(), 3);

        let indices: Vec<usize> = queue.requests().iter().map(|r| r.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(queue.delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_empty_queue_only_completes() {
        let fetcher = ScriptedFetcher::with(&[]);
        let mut log = NotificationLog::default();

        let summary = queue_for(&fetcher, &[]).run(&mut log).await;

        assert_eq!(log.notifications(), &[Notification::AllCompleted]);
        assert_eq!(summary, QueueSummary::default());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mixed_outcomes_in_order() {
        let fetcher = ScriptedFetcher::with(&[("mem://u0", "a\nb\nc"), ("mem://u2", "x\ny")]);
        let mut log = NotificationLog::default();

        let summary = queue_for(&fetcher, &["mem://u0", "mem://u1", "mem://u2"])
            .run(&mut log)
            .await;

        assert_eq!(
            log.notifications(),
            &[
                Notification::Succeeded { index: 0, data: "a\nb\nc".into() },
                Notification::Failed { index: 1 },
                Notification::Succeeded { index: 2, data: "x\ny".into() },
                Notification::AllCompleted,
            ]
        );
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_all_failures_still_complete() {
        let fetcher = ScriptedFetcher::with(&[]);
        let mut log = NotificationLog::default();

        let summary = queue_for(&fetcher, &["mem://a", "mem://b"]).run(&mut log).await;

        assert_eq!(
            log.into_notifications(),
            vec![
                Notification::Failed { index: 0 },
                Notification::Failed { index: 1 },
                Notification::AllCompleted,
            ]
        );
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn test_never_two_fetches_in_flight() {
        let urls: Vec<String> = (0..8).map(|i| format!("mem://{i}")).collect();
        let pairs: Vec<(&str, &str)> = urls.iter().map(|u| (u.as_str(), "ok")).collect();
        let fetcher = ScriptedFetcher::with(&pairs);
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();

        let mut log = NotificationLog::default();
        queue_for(&fetcher, &url_refs).run(&mut log).await;

        assert!(!fetcher.overlapped.load(Ordering::SeqCst), "two fetches overlapped");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 8);
        assert_eq!(log.notifications().len(), 9);
    }

    /// Blocks for `busy` in every step callback and records when it returns
    struct TimedObserver {
        busy: Duration,
        returned_at: Vec<Instant>,
    }

    impl TimedObserver {
        fn new(busy: Duration) -> Self {
            Self { busy, returned_at: Vec::new() }
        }

        fn handled(&mut self) {
            std::thread::sleep(self.busy);
            self.returned_at.push(Instant::now());
        }
    }

    impl QueueObserver for TimedObserver {
        fn step_succeeded(&mut self, _data: String, _index: usize) {
            self.handled();
        }

        fn step_failed(&mut self, _index: usize) {
            self.handled();
        }

        fn all_completed(&mut self) {}
    }

    fn assert_dispatch_gaps(fetcher: &ScriptedFetcher, returned_at: &[Instant], delay: Duration) {
        let dispatched = fetcher.dispatched_at.lock().unwrap().clone();
        assert_eq!(dispatched.len(), returned_at.len());
        for i in 0..dispatched.len() - 1 {
            let next = dispatched[i + 1];
            assert!(
                next >= returned_at[i] + delay,
                "request {} dispatched {:?} after step {i} returned, expected at least {delay:?}",
                i + 1,
                next.saturating_duration_since(returned_at[i]),
            );
        }
    }

    #[tokio::test]
    async fn test_delay_between_steps() {
        let delay = Duration::from_millis(50);
        let fetcher = ScriptedFetcher::with(&[("mem://a", "1"), ("mem://c", "3")]);
        let mut observer = TimedObserver::new(Duration::ZERO);

        queue_for(&fetcher, &["mem://a", "mem://b", "mem://c"])
            .with_delay(delay)
            .run(&mut observer)
            .await;

        assert_eq!(observer.returned_at.len(), 3);
        assert_dispatch_gaps(&fetcher, &observer.returned_at, delay);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_started_queue_waits_for_slow_observer() {
        let delay = Duration::from_millis(50);
        let fetcher = ScriptedFetcher::with(&[("mem://a", "1"), ("mem://c", "3")]);
        let mut observer = TimedObserver::new(Duration::from_millis(200));

        let summary = queue_for(&fetcher, &["mem://a", "mem://b", "mem://c"])
            .with_delay(delay)
            .start()
            .dispatch_to(&mut observer)
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(observer.returned_at.len(), 3);
        assert_dispatch_gaps(&fetcher, &observer.returned_at, delay);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stream_advances_only_when_polled_again() {
        let fetcher = ScriptedFetcher::with(&[("mem://a", "1"), ("mem://b", "2")]);
        let mut events = queue_for(&fetcher, &["mem://a", "mem://b"]).start();

        let mut handled_at = Vec::new();
        while let Some(event) = events.next().await {
            if event.index().is_some() {
                tokio::time::sleep(Duration::from_millis(100)).await;
                handled_at.push(Instant::now());
            }
        }

        assert_eq!(handled_at.len(), 2);
        assert_dispatch_gaps(&fetcher, &handled_at, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_recv_holds_queue_until_next_call() {
        let fetcher = ScriptedFetcher::with(&[("mem://a", "1"), ("mem://b", "2")]);
        let mut events = queue_for(&fetcher, &["mem://a", "mem://b"]).start();

        let first = events.recv().await.unwrap();
        assert_eq!(first.index(), Some(0));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1, "advanced before the event was handled");

        let second = events.recv().await.unwrap();
        assert_eq!(second.index(), Some(1));
        assert!(matches!(events.recv().await, Some(QueueEvent::AllCompleted(_))));
        assert!(events.recv().await.is_none());
    }

    struct CancelAfterFirst {
        token: CancellationToken,
        log: NotificationLog,
    }

    impl QueueObserver for CancelAfterFirst {
        fn step_succeeded(&mut self, data: String, index: usize) {
            self.token.cancel();
            self.log.step_succeeded(data, index);
        }

        fn step_failed(&mut self, index: usize) {
            self.log.step_failed(index);
        }

        fn all_completed(&mut self) {
            self.log.all_completed();
        }
    }

    #[tokio::test]
    async fn test_cancellation_skips_rest_and_completes_once() {
        let fetcher = ScriptedFetcher::with(&[("mem://a", "1"), ("mem://b", "2"), ("mem://c", "3")]);
        let token = CancellationToken::new();
        let mut observer = CancelAfterFirst {
            token: token.clone(),
            log: NotificationLog::default(),
        };

        // The long delay must be cut short by the cancellation
        let run = queue_for(&fetcher, &["mem://a", "mem://b", "mem://c"])
            .with_delay(Duration::from_secs(30))
            .with_cancellation(token)
            .run(&mut observer);
        let summary = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("cancelled queue should not wait out its delay");

        assert_eq!(
            observer.log.notifications(),
            &[
                Notification::Succeeded { index: 0, data: "1".into() },
                Notification::AllCompleted,
            ]
        );
        assert_eq!(
            summary,
            QueueSummary { total: 3, succeeded: 1, failed: 0, skipped: 2, cancelled: true }
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    struct CancelOnLast {
        token: CancellationToken,
        last: usize,
    }

    impl QueueObserver for CancelOnLast {
        fn step_succeeded(&mut self, _data: String, index: usize) {
            if index == self.last {
                self.token.cancel();
            }
        }

        fn step_failed(&mut self, _index: usize) {}

        fn all_completed(&mut self) {}
    }

    #[tokio::test]
    async fn test_cancel_during_final_delay_is_reported() {
        let fetcher = ScriptedFetcher::with(&[("mem://a", "1"), ("mem://b", "2")]);
        let token = CancellationToken::new();
        let mut observer = CancelOnLast { token: token.clone(), last: 1 };

        let run = queue_for(&fetcher, &["mem://a", "mem://b"])
            .with_delay(Duration::from_secs(30))
            .with_cancellation(token)
            .run(&mut observer);
        let summary = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("final delay should be cut short");

        assert_eq!(
            summary,
            QueueSummary { total: 2, succeeded: 2, failed: 0, skipped: 0, cancelled: true }
        );
    }

    #[tokio::test]
    async fn test_start_streams_events() {
        let fetcher = ScriptedFetcher::with(&[("mem://a", "alpha")]);
        let events: Vec<QueueEvent> = queue_for(&fetcher, &["mem://a", "mem://missing"])
            .start()
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], QueueEvent::StepSucceeded { index: 0, data } if data == "alpha"));
        assert!(matches!(
            &events[1],
            QueueEvent::StepFailed { index: 1, error: Error::NetworkError(_) }
        ));
        assert!(matches!(
            &events[2],
            QueueEvent::AllCompleted(QueueSummary { total: 2, succeeded: 1, failed: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_to_returns_summary() {
        let fetcher = ScriptedFetcher::with(&[("mem://a", "alpha")]);
        let mut log = NotificationLog::default();

        let summary = queue_for(&fetcher, &["mem://a"])
            .start()
            .dispatch_to(&mut log)
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert!(log.is_completed());
    }
}
