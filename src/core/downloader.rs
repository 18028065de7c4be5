//! Single-resource download for warming-dl
//!
//! A [`Downloader`] performs exactly one GET on a background tokio task and
//! resolves to exactly one [`FetchOutcome`]. The network step itself sits behind
//! the [`Fetcher`] trait so the queue can be driven without a network.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use tokio::task::JoinHandle;

use crate::core::error::{Error, Result};
use crate::core::outcome::FetchOutcome;
use crate::core::source::{FetchConfig, FetchRequest};

/// Global HTTP client built from the default configuration
static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(|| {
    build_client(&FetchConfig::default()).expect("Failed to create HTTP client")
});

fn build_client(config: &FetchConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| Error::InvalidInput(format!("cannot build HTTP client: {e}")))
}

/// Fetches the full body of a URL as text
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<String>>;
}

/// reqwest-backed [`Fetcher`]
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Fetcher sharing the global client
    pub fn new() -> Self {
        Self {
            client: GLOBAL_CLIENT.clone(),
        }
    }

    /// Fetcher with its own client built from `config`
    pub fn with_config(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, Result<String>> {
        let client = self.client.clone();
        let url = url.to_string();
        async move { get_text(&client, &url).await }.boxed()
    }
}

/// GET `url` and decode the whole body as UTF-8
async fn get_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpError(format!("GET {url} returned {status}")));
    }

    let body = response.bytes().await?;
    Ok(String::from_utf8(body.to_vec())?)
}

/// Single-use download of one [`FetchRequest`]
pub struct Downloader {
    request: FetchRequest,
    fetcher: Arc<dyn Fetcher>,
}

impl Downloader {
    pub fn new(request: FetchRequest, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { request, fetcher }
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    /// Start the fetch on a background task.
    ///
    /// Consumes the downloader. Must be called from within a tokio runtime.
    pub fn fetch(self) -> FetchHandle {
        let Downloader { request, fetcher } = self;
        let index = request.index();
        debug!("Dispatching request #{index}: {}", request.url());

        let task = tokio::spawn(async move { fetcher.fetch(request.url()).await });
        FetchHandle { index, task }
    }
}

/// Future resolving to the outcome of one dispatched [`Downloader`].
///
/// A panicking or aborted fetch task still resolves, to a
/// [`FetchOutcome::Failure`] carrying [`Error::TaskFailed`].
pub struct FetchHandle {
    index: usize,
    task: JoinHandle<Result<String>>,
}

impl FetchHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Abort the fetch if it is still running.
    ///
    /// An aborted fetch resolves to [`Error::TaskFailed`]; one that had already
    /// finished resolves to its own outcome.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Future for FetchHandle {
    type Output = FetchOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(joined) => {
                let result = joined.map_err(Error::from).and_then(|fetched| fetched);
                Poll::Ready(FetchOutcome::from(result))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct EchoFetcher;

    impl Fetcher for EchoFetcher {
        fn fetch(&self, url: &str) -> BoxFuture<'static, Result<String>> {
            let url = url.to_string();
            Box::pin(async move {
                if url.contains("boom") {
                    panic!("fetcher exploded on {url}");
                }
                if url.contains("slow") {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, Error>(url)
            })
        }
    }

    // A fresh client per test, so pooled connections never outlive their runtime
    fn test_fetcher() -> HttpFetcher {
        HttpFetcher::with_config(&FetchConfig::default()).unwrap()
    }

    fn downloader(url: &str, index: usize) -> Downloader {
        Downloader::new(FetchRequest::new(url, index), Arc::new(EchoFetcher))
    }

    #[tokio::test]
    async fn test_fetch_resolves_success() {
        let handle = downloader("mem://a", 7).fetch();
        assert_eq!(handle.index(), 7);

        match handle.await {
            FetchOutcome::Success { data } => assert_eq!(data, "mem://a"),
            FetchOutcome::Failure { error } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_fetch_becomes_failure() {
        let outcome = downloader("mem://boom", 0).fetch().await;
        assert!(matches!(
            outcome,
            FetchOutcome::Failure { error: Error::TaskFailed(_) }
        ));
    }

    #[tokio::test]
    async fn test_aborted_fetch_becomes_failure() {
        let handle = downloader("mem://slow", 0).fetch();
        handle.abort();
        let outcome = handle.await;
        assert!(matches!(
            outcome,
            FetchOutcome::Failure { error: Error::TaskFailed(_) }
        ));
    }

    #[tokio::test]
    async fn test_abort_after_completion_keeps_outcome() {
        let handle = downloader("mem://done", 3).fetch();
        while !handle.task.is_finished() {
            tokio::task::yield_now().await;
        }
        handle.abort();

        match handle.await {
            FetchOutcome::Success { data } => assert_eq!(data, "mem://done"),
            FetchOutcome::Failure { error } => panic!("finished fetch lost its outcome: {error}"),
        }
    }

    #[tokio::test]
    async fn test_http_fetch_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/co2.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("year,ppm\n1980,338.91\n"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/co2.csv", mock_server.uri());
        let body = test_fetcher().fetch(&url).await.unwrap();
        assert_eq!(body, "year,ppm\n1980,338.91\n");
    }

    #[tokio::test]
    async fn test_http_fetch_rejects_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.csv"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/missing.csv", mock_server.uri());
        let error = test_fetcher().fetch(&url).await.unwrap_err();
        match error {
            Error::HttpError(msg) => assert!(msg.contains("404"), "unexpected message: {msg}"),
            other => panic!("Expected HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_fetch_rejects_non_utf8_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/binary"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xff, 0xfe, 0xfd], "text/csv"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/binary", mock_server.uri());
        let error = test_fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(error, Error::DecodeError(_)), "got {error:?}");
    }

    #[tokio::test]
    async fn test_http_fetch_connection_refused() {
        // Grab a free port, then close it so nothing is listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::with_config(&FetchConfig::with_timeout(Duration::from_secs(5))).unwrap();
        let error = fetcher.fetch(&format!("http://{addr}/data.csv")).await.unwrap_err();
        assert!(error.is_fetch_failure());
        assert!(matches!(error, Error::NetworkError(_)), "got {error:?}");
    }
}
