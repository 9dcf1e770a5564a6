//! Batch orchestration.
//!
//! Every item walks the same state machine:
//!
//! ```text
//! pending -> resolving -> fetching -> extracting -> summarizing -> done
//!                 \            \            \              \
//!                  +------------+------------+--------------+--> failed
//! ```
//!
//! A failure is recorded on the item together with the stage it happened in
//! and never stops the batch. Items run one at a time with a pause between
//! them (growing after consecutive failures), or, with a concurrency above
//! one, as an ordered bounded stream with a minimum interval per host.
//! Cancellation is checked before each item starts; items already in flight
//! are allowed to finish.

use crate::backoff::Backoff;
use crate::config::{Config, LengthProfile, PipelineConfig};
use crate::errors::{SetupError, StageFailure};
use crate::extractor::Extractor;
use crate::fetcher::{Fetcher, build_client};
use crate::models::{BatchReport, PipelineRecord, RecordError, SearchHit, SourceUrl, Stage};
use crate::resolver::{HttpNavigator, Navigator, Resolution, Resolver};
use crate::summarizer::Summarizer;
use crate::summarizer::backend::{Backend, SummarizationBackend};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::{self, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// One unit of work: a source URL and, when discovered, the search hit it
/// came from.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub source_url: SourceUrl,
    pub search_hit: Option<SearchHit>,
}

impl WorkItem {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source_url: SourceUrl::new(url),
            search_hit: None,
        }
    }
}

impl From<SearchHit> for WorkItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            source_url: SourceUrl::new(hit.link.clone()),
            search_hit: Some(hit),
        }
    }
}

/// Hands out start slots so requests to one host are at least `interval`
/// apart.
struct HostThrottle {
    interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    async fn wait(&self, host: &str) {
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(host).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(host.to_string(), slot + self.interval);
            slot
        };
        time::sleep_until(slot.into()).await;
    }
}

fn host_of(source: &SourceUrl) -> String {
    Url::parse(source.as_str())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

pub struct Pipeline<N, B> {
    resolver: Resolver<N>,
    fetcher: Fetcher,
    extractor: Extractor,
    summarizer: Summarizer<B>,
    length: LengthProfile,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline<HttpNavigator, Backend> {
    /// Build the production pipeline: one shared HTTP client, the HTTP
    /// navigator, the default extraction chain, and the configured backend.
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Result<Self, SetupError> {
        config.validate()?;
        let client = build_client(config.resolve.max_hops)?;
        let fetcher = Fetcher::new(client, config.fetch.timeout());
        let resolver = Resolver::new(HttpNavigator::new(fetcher.clone()), &config.resolve);
        let backend = Backend::from_config(&config.backend)?;

        let mut pipeline_config = config.pipeline.clone();
        pipeline_config.concurrency = config.concurrency();
        Ok(Self::new(
            resolver,
            fetcher,
            Extractor::new(config.extract.min_length),
            Summarizer::new(backend, config.summarize.clone()),
            config.summarize.length,
            pipeline_config,
            cancel,
        ))
    }
}

impl<N: Navigator, B: SummarizationBackend> Pipeline<N, B> {
    pub fn new(
        resolver: Resolver<N>,
        fetcher: Fetcher,
        extractor: Extractor,
        summarizer: Summarizer<B>,
        length: LengthProfile,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            extractor,
            summarizer,
            length,
            config,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn pacing(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.config.delay_ms),
            Duration::from_millis(self.config.max_delay_ms.max(self.config.delay_ms)),
            Duration::from_millis(self.config.jitter_ms),
        )
    }

    /// Process `items` and seal the results into a report.
    ///
    /// The report lists only items that were attempted; a cancelled run sets
    /// `aborted` and omits the rest.
    #[instrument(level = "info", skip(self, items), fields(items = items.len()))]
    pub async fn run(&self, search_query: &str, items: Vec<WorkItem>) -> BatchReport {
        let total = items.len();
        let t0 = Instant::now();

        let concurrency = self.config.concurrency.max(1);
        let records = if concurrency > 1 {
            self.run_pooled(items, concurrency).await
        } else {
            self.run_sequential(items).await
        };

        let aborted = records.len() < total;
        let report = BatchReport::finalize(search_query, records, aborted);
        info!(
            total = report.total_items,
            succeeded = report.succeeded_count,
            failed = report.failed_count(),
            aborted,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Batch finished"
        );
        report
    }

    async fn run_sequential(&self, items: Vec<WorkItem>) -> Vec<PipelineRecord> {
        let pacing = self.pacing();
        let mut records = Vec::with_capacity(items.len());
        let mut consecutive_failures = 0u32;

        for (i, item) in items.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining_from = i + 1, "Cancelled; skipping remaining items");
                break;
            }
            if i > 0 {
                let delay = pacing.jittered_delay_for(consecutive_failures);
                debug!(?delay, consecutive_failures, "Pausing before next item");
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        warn!(remaining_from = i + 1, "Cancelled; skipping remaining items");
                        break;
                    }
                    _ = sleep(delay) => {}
                }
            }

            let record = self.process_item(i + 1, item).await;
            if record.success {
                consecutive_failures = 0;
            } else {
                consecutive_failures = consecutive_failures.saturating_add(1);
            }
            records.push(record);
        }
        records
    }

    async fn run_pooled(&self, items: Vec<WorkItem>, concurrency: usize) -> Vec<PipelineRecord> {
        let throttle = HostThrottle::new(Duration::from_millis(self.config.delay_ms));
        let throttle = &throttle;
        info!(concurrency, "Processing items concurrently");

        stream::iter(items.into_iter().enumerate())
            .take_while(|_| {
                let go = !self.cancel.is_cancelled();
                if !go {
                    warn!("Cancelled; skipping remaining items");
                }
                std::future::ready(go)
            })
            .map(|(i, item)| async move {
                throttle.wait(&host_of(&item.source_url)).await;
                self.process_item(i + 1, item).await
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    /// Run one item to `done` or `failed`. Never returns an error: the
    /// outcome, and any partial results, are written onto the record.
    #[instrument(level = "info", skip(self, item), fields(url = %item.source_url))]
    pub async fn process_item(&self, index: usize, item: WorkItem) -> PipelineRecord {
        let t0 = Instant::now();
        debug!(stage = %Stage::Pending, index);
        let mut record = PipelineRecord {
            index,
            source_url: item.source_url,
            search_hit: item.search_hit,
            resolved_url: None,
            unresolved: false,
            metadata: None,
            summary_result: None,
            success: false,
            error: None,
        };

        match self.advance(&mut record).await {
            Ok(()) => {
                record.success = true;
                let preview = record
                    .summary_result
                    .as_ref()
                    .map(|s| truncate_for_log(&s.summary, 80))
                    .unwrap_or_default();
                info!(
                    stage = %Stage::Done,
                    %preview,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Item done"
                );
            }
            Err(failure) => {
                warn!(
                    state = %Stage::Failed,
                    stage = %failure.stage,
                    error = %failure.error,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Item failed"
                );
                record.error = Some(RecordError {
                    stage: failure.stage,
                    message: failure.error.to_string(),
                });
            }
        }
        record
    }

    async fn advance(&self, record: &mut PipelineRecord) -> Result<(), StageFailure> {
        debug!(stage = %Stage::Resolving);
        let Resolution { url: resolved, page } = self
            .resolver
            .resolve_with_page(&record.source_url)
            .await
            .map_err(|e| StageFailure::new(Stage::Resolving, e))?;
        record.resolved_url = Some(resolved.as_str().to_string());
        record.unresolved = resolved.is_unresolved();

        debug!(stage = %Stage::Fetching, url = %resolved.as_str(), reused = page.is_some());
        let page = match page.filter(|p| &p.final_url == resolved.url()) {
            Some(page) => page,
            None => self
                .fetcher
                .get(resolved.as_str())
                .await
                .map_err(|e| StageFailure::new(Stage::Fetching, e))?,
        };
        debug!(
            status = page.status,
            content_type = ?page.content_type,
            requested = %page.requested_url,
            landed = %page.final_url,
            "Fetched article page"
        );

        debug!(stage = %Stage::Extracting);
        let (content, metadata) = self
            .extractor
            .extract(&page.body, &page.final_url)
            .map_err(|e| StageFailure::new(Stage::Extracting, e))?;
        record.metadata = Some(metadata);

        debug!(
            stage = %Stage::Summarizing,
            strategy = %content.strategy,
            url = %content.url,
            chars = content.text.chars().count()
        );
        let summary = self
            .summarizer
            .summarize(&content.text, self.length)
            .await
            .map_err(|e| StageFailure::new(Stage::Summarizing, e))?;
        record.summary_result = Some(summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResolveConfig, SummarizeConfig};
    use crate::errors::FetchError;
    use crate::models::SummaryStatus;
    use crate::resolver::Navigation;
    use crate::summarizer::backend::ExtractiveBackend;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Lands exactly where it was pointed.
    struct Direct;

    impl Navigator for Direct {
        async fn navigate(&self, url: &Url) -> Result<Navigation, FetchError> {
            Ok(Navigation {
                final_url: url.clone(),
                client_redirect: None,
                page: None,
            })
        }
    }

    /// Always has one more client-side hop pending.
    struct NeverSettles;

    impl Navigator for NeverSettles {
        async fn navigate(&self, url: &Url) -> Result<Navigation, FetchError> {
            let mut next = url.clone();
            next.set_path(&format!("{}x", url.path()));
            Ok(Navigation {
                final_url: url.clone(),
                client_redirect: Some(next),
                page: None,
            })
        }
    }

    fn article(words: usize) -> String {
        let body = (0..words)
            .map(|i| if i % 10 == 9 { "results." } else { "quarterly" })
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "<html><head><title>Quarterly results</title></head><body>\
             <nav>Home World</nav><article><p>{body}</p></article></body></html>"
        )
    }

    fn pipeline<N: Navigator>(navigator: N, concurrency: usize, fetch_timeout: Duration) -> Pipeline<N, ExtractiveBackend> {
        let resolve = ResolveConfig {
            timeout_ms: 200,
            poll_interval_ms: 5,
            max_hops: 100,
        };
        let config = PipelineConfig {
            delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
            concurrency,
        };
        Pipeline::new(
            Resolver::new(navigator, &resolve),
            Fetcher::new(build_client(10).unwrap(), fetch_timeout),
            Extractor::new(50),
            Summarizer::new(ExtractiveBackend::default(), SummarizeConfig::default()),
            LengthProfile::Short,
            config,
            CancellationToken::new(),
        )
    }

    async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn html(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/html")
    }

    #[tokio::test]
    async fn test_middle_item_timeout_does_not_stop_batch() {
        let server = MockServer::start().await;
        serve(&server, "/a", html(article(120))).await;
        serve(&server, "/b", html(article(120)).set_delay(Duration::from_secs(2))).await;
        serve(&server, "/c", html(article(120))).await;

        let items = ["/a", "/b", "/c"]
            .iter()
            .map(|p| WorkItem::from_url(format!("{}{p}", server.uri())))
            .collect();
        let report = pipeline(Direct, 1, Duration::from_millis(300))
            .run("acme", items)
            .await;

        assert_eq!(report.total_items, 3);
        assert_eq!(report.succeeded_count, 2);
        assert!(!report.aborted);
        assert_eq!(
            report.items.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let failed = &report.items[1];
        assert!(!failed.success);
        let error = failed.error.as_ref().unwrap();
        assert_eq!(error.stage, Stage::Fetching);
        assert!(error.message.contains("timed out"));
        assert!(failed.resolved_url.is_some());
        assert!(failed.summary_result.is_none());

        let ok = &report.items[2];
        assert!(ok.success);
        assert_eq!(ok.metadata.as_ref().unwrap().title.as_deref(), Some("Quarterly results"));
        assert_eq!(
            ok.summary_result.as_ref().unwrap().status,
            SummaryStatus::Summarized
        );
    }

    #[tokio::test]
    async fn test_unsettled_redirect_still_extracts_from_source() {
        let server = MockServer::start().await;
        serve(&server, "/news/rss/articles/abc", html(article(80))).await;

        let source = format!("{}/news/rss/articles/abc", server.uri());
        let record = pipeline(NeverSettles, 1, Duration::from_secs(5))
            .process_item(1, WorkItem::from_url(source.clone()))
            .await;

        assert!(record.success, "{:?}", record.error);
        assert!(record.unresolved);
        assert_eq!(record.resolved_url.as_deref(), Some(source.as_str()));
        assert!(record.metadata.is_some());
    }

    #[tokio::test]
    async fn test_settled_page_is_downloaded_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(html(article(80)))
            .expect(1)
            .mount(&server)
            .await;

        let navigator = HttpNavigator::new(Fetcher::new(build_client(10).unwrap(), Duration::from_secs(5)));
        let record = pipeline(navigator, 1, Duration::from_secs(5))
            .process_item(1, WorkItem::from_url(format!("{}/story", server.uri())))
            .await;

        assert!(record.success, "{:?}", record.error);
        assert!(!record.unresolved);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_invalid_source_fails_at_resolving() {
        let record = pipeline(Direct, 1, Duration::from_secs(1))
            .process_item(1, WorkItem::from_url("not a url"))
            .await;
        assert!(!record.success);
        assert_eq!(record.error.unwrap().stage, Stage::Resolving);
        assert!(record.resolved_url.is_none());
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_resolved_url() {
        let server = MockServer::start().await;
        serve(&server, "/empty", html("<html><body><nav>Menu</nav></body></html>".into())).await;

        let url = format!("{}/empty", server.uri());
        let record = pipeline(Direct, 1, Duration::from_secs(5))
            .process_item(4, WorkItem::from_url(url.clone()))
            .await;
        assert_eq!(record.index, 4);
        assert_eq!(record.error.as_ref().unwrap().stage, Stage::Extracting);
        assert_eq!(record.resolved_url.as_deref(), Some(url.as_str()));
        assert!(!record.unresolved);
    }

    #[tokio::test]
    async fn test_pooled_run_keeps_input_order() {
        let server = MockServer::start().await;
        serve(&server, "/slow", html(article(60)).set_delay(Duration::from_millis(200))).await;
        serve(&server, "/fast", html(article(60))).await;
        serve(&server, "/missing", ResponseTemplate::new(404)).await;

        let items = ["/slow", "/fast", "/missing", "/fast"]
            .iter()
            .map(|p| WorkItem::from_url(format!("{}{p}", server.uri())))
            .collect();
        let report = pipeline(Direct, 3, Duration::from_secs(5)).run("", items).await;

        assert_eq!(report.total_items, 4);
        assert_eq!(report.succeeded_count, 3);
        assert_eq!(
            report.items.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(report.items[0].source_url.as_str().ends_with("/slow"));
        assert_eq!(report.items[2].error.as_ref().unwrap().stage, Stage::Fetching);
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_nothing_attempted() {
        let p = pipeline(Direct, 1, Duration::from_secs(1));
        p.cancel_token().cancel();
        let items = vec![
            WorkItem::from_url("https://example.com/a"),
            WorkItem::from_url("https://example.com/b"),
        ];
        let report = p.run("acme", items).await;
        assert!(report.aborted);
        assert_eq!(report.total_items, 0);
        assert!(report.items.is_empty());
    }

    #[tokio::test]
    async fn test_host_throttle_spaces_same_host() {
        let throttle = HostThrottle::new(Duration::from_millis(60));
        let t0 = Instant::now();
        throttle.wait("a.example").await;
        throttle.wait("b.example").await;
        assert!(t0.elapsed() < Duration::from_millis(60));
        throttle.wait("a.example").await;
        assert!(t0.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_work_item_from_hit() {
        let hit = SearchHit {
            title: "Acme".into(),
            link: " https://news.example/a ".into(),
            source_name: None,
            source_url: None,
            published: None,
        };
        let item = WorkItem::from(hit);
        assert_eq!(item.source_url.as_str(), "https://news.example/a");
        assert!(item.search_hit.is_some());
    }
}
