//! Redirect resolution for indirection links.
//!
//! Search feeds hand out tracking links whose destination is only reached
//! after one or more hops, some of them performed by page scripts rather
//! than HTTP headers. The [`Resolver`] asks a [`Navigator`] where a URL
//! lands, follows any pending client-side hop after a short poll interval,
//! and stops once the address is stable. The whole walk is bounded by a
//! timeout; if it does not settle in time the original URL is returned with
//! `unresolved` set, so the item can still be attempted.

use crate::config::ResolveConfig;
use crate::errors::{FetchError, ResolveError};
use crate::fetcher::{Fetcher, RawResponse};
use crate::models::{ResolvedUrl, SourceUrl};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Where one navigation step ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Address after HTTP-level redirects.
    pub final_url: Url,
    /// A further hop the loaded page asks the client to make, if any.
    pub client_redirect: Option<Url>,
    /// The page loaded at `final_url`, when the navigator downloaded it.
    pub page: Option<RawResponse>,
}

/// A resolved address plus the page already loaded there, if any.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub url: ResolvedUrl,
    pub page: Option<RawResponse>,
}

/// The capability "navigate to a URL and report where you are".
pub trait Navigator {
    async fn navigate(&self, url: &Url) -> Result<Navigation, FetchError>;
}

/// A [`Navigator`] that follows HTTP redirects with a plain client and
/// reads client-side redirects out of the returned markup.
#[derive(Debug, Clone)]
pub struct HttpNavigator {
    fetcher: Fetcher,
}

impl HttpNavigator {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

impl Navigator for HttpNavigator {
    async fn navigate(&self, url: &Url) -> Result<Navigation, FetchError> {
        let page = self.fetcher.get(url.as_str()).await?;
        let client_redirect = detect_client_redirect(&page.body, &page.final_url)
            .filter(|next| *next != page.final_url);
        Ok(Navigation {
            final_url: page.final_url.clone(),
            client_redirect,
            page: Some(page),
        })
    }
}

static META_REFRESH: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[http-equiv]").unwrap());
static DATA_N_AU: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-n-au]").unwrap());
static SCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());
static REFRESH_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\s*=\s*['"]?([^'";\s]+)"#).unwrap());
static LOCATION_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:window\.|document\.|top\.)?location(?:\.href)?\s*=\s*["']([^"']+)["']"#).unwrap()
});
static LOCATION_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"location\.(?:replace|assign)\(\s*["']([^"']+)["']\s*\)"#).unwrap());

/// Find a navigation the page would perform on load.
///
/// Checks, in order: `<meta http-equiv="refresh">`, a `data-n-au`
/// attribute (used by aggregator interstitials), and `location` changes in
/// inline scripts. Only http(s) targets are returned.
pub fn detect_client_redirect(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);

    let from_meta = document
        .select(&META_REFRESH)
        .filter(|m| {
            m.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|m| m.value().attr("content"))
        .find_map(|content| REFRESH_URL.captures(content).map(|c| c[1].to_string()));

    let from_attr = || {
        document
            .select(&DATA_N_AU)
            .find_map(|el| el.value().attr("data-n-au").map(str::to_string))
    };

    let from_script = || {
        document.select(&SCRIPT).find_map(|script| {
            let code = script.text().collect::<String>();
            LOCATION_CALL
                .captures(&code)
                .or_else(|| LOCATION_ASSIGN.captures(&code))
                .map(|c| c[1].to_string())
        })
    };

    let target = from_meta.or_else(from_attr).or_else(from_script)?;
    let resolved = base.join(target.trim()).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

#[derive(Debug, Clone)]
pub struct Resolver<N> {
    navigator: N,
    timeout: Duration,
    poll_interval: Duration,
    max_hops: usize,
}

impl<N: Navigator> Resolver<N> {
    pub fn new(navigator: N, config: &ResolveConfig) -> Self {
        Self {
            navigator,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            max_hops: config.max_hops,
        }
    }

    /// Resolve `source` to its final destination.
    ///
    /// Fails only when `source` (or the settled address) is not an absolute
    /// URL. Timeouts, hop limits, and navigation errors fall back to the
    /// source URL with `unresolved` set.
    pub async fn resolve(&self, source: &SourceUrl) -> Result<ResolvedUrl, ResolveError> {
        Ok(self.resolve_with_page(source).await?.url)
    }

    /// Like [`Resolver::resolve`], but also hands back the page the
    /// navigator loaded at the settled address so it need not be fetched
    /// again. Fallbacks to the source URL carry no page.
    #[instrument(level = "info", skip(self), fields(url = %source))]
    pub async fn resolve_with_page(&self, source: &SourceUrl) -> Result<Resolution, ResolveError> {
        let original = Url::parse(source.as_str())
            .ok()
            .and_then(|u| ResolvedUrl::new(u, true))
            .ok_or_else(|| ResolveError::InvalidUrl(source.to_string()))?;
        let fallback = |url| Resolution { url, page: None };

        match timeout(self.timeout, self.follow(original.url())).await {
            Ok(Some((settled, page))) => {
                info!(%settled, "Resolved");
                let url = ResolvedUrl::new(settled.clone(), false)
                    .ok_or_else(|| ResolveError::InvalidUrl(settled.to_string()))?;
                Ok(Resolution { url, page })
            }
            Ok(None) => Ok(fallback(original)),
            Err(_) => {
                warn!(timeout = ?self.timeout, "Navigation did not settle; using source url");
                Ok(fallback(original))
            }
        }
    }

    /// Walk hops until the address is stable. `None` means give up.
    async fn follow(&self, start: &Url) -> Option<(Url, Option<RawResponse>)> {
        let mut current = start.clone();
        for hop in 0..=self.max_hops {
            let nav = match self.navigator.navigate(&current).await {
                Ok(nav) => nav,
                Err(e) => {
                    warn!(hop, error = %e, kind = e.kind(), "Navigation failed; using source url");
                    return None;
                }
            };
            match nav.client_redirect {
                Some(next) if next != nav.final_url => {
                    debug!(hop, from = %nav.final_url, to = %next, "Client-side redirect pending");
                    current = next;
                    sleep(self.poll_interval).await;
                }
                _ => return Some((nav.final_url, nav.page)),
            }
        }
        warn!(max_hops = self.max_hops, "Redirect hop limit reached; using source url");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::build_client;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(timeout_ms: u64, max_hops: usize) -> ResolveConfig {
        ResolveConfig {
            timeout_ms,
            poll_interval_ms: 10,
            max_hops,
        }
    }

    /// Always asks for one more hop, so navigation never settles.
    struct NeverSettles {
        calls: AtomicUsize,
    }

    impl Navigator for NeverSettles {
        async fn navigate(&self, url: &Url) -> Result<Navigation, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Navigation {
                final_url: url.clone(),
                client_redirect: Some(Url::parse(&format!("https://hop.example/{n}")).unwrap()),
                page: None,
            })
        }
    }

    struct Broken;

    impl Navigator for Broken {
        async fn navigate(&self, _url: &Url) -> Result<Navigation, FetchError> {
            Err(FetchError::Network("connection reset".into()))
        }
    }

    #[test]
    fn test_detects_meta_refresh() {
        let base = Url::parse("https://news.example/r/1").unwrap();
        let html = r#"<html><head><meta http-equiv="Refresh" content="0; URL='https://site.example/story'"></head></html>"#;
        assert_eq!(
            detect_client_redirect(html, &base).unwrap().as_str(),
            "https://site.example/story"
        );
    }

    #[test]
    fn test_detects_script_location() {
        let base = Url::parse("https://news.example/r/1").unwrap();
        let html = r#"<script>window.location.replace("/articles/42");</script>"#;
        assert_eq!(
            detect_client_redirect(html, &base).unwrap().as_str(),
            "https://news.example/articles/42"
        );

        let html = r#"<script>window.location.href = 'https://site.example/a';</script>"#;
        assert_eq!(
            detect_client_redirect(html, &base).unwrap().as_str(),
            "https://site.example/a"
        );
    }

    #[test]
    fn test_detects_data_attribute() {
        let base = Url::parse("https://news.example/r/1").unwrap();
        let html = r#"<c-wiz><div data-n-au="https://site.example/b"></div></c-wiz>"#;
        assert_eq!(
            detect_client_redirect(html, &base).unwrap().as_str(),
            "https://site.example/b"
        );
    }

    #[test]
    fn test_ignores_non_http_targets_and_plain_pages() {
        let base = Url::parse("https://news.example/").unwrap();
        assert!(detect_client_redirect(r#"<script>location.href = "javascript:void(0)";</script>"#, &base).is_none());
        assert!(detect_client_redirect("<p>Just an article.</p>", &base).is_none());
    }

    #[tokio::test]
    async fn test_never_settling_redirect_falls_back_to_source() {
        let resolver = Resolver::new(NeverSettles { calls: AtomicUsize::new(0) }, &config(150, 10_000));
        let source = SourceUrl::new("https://news.example/r/abc");
        let resolved = resolver.resolve(&source).await.unwrap();
        assert_eq!(resolved.as_str(), "https://news.example/r/abc");
        assert!(resolved.is_unresolved());
    }

    #[tokio::test]
    async fn test_hop_limit_falls_back_to_source() {
        let resolver = Resolver::new(NeverSettles { calls: AtomicUsize::new(0) }, &config(5_000, 3));
        let resolved = resolver.resolve(&SourceUrl::new("https://news.example/r/x")).await.unwrap();
        assert!(resolved.is_unresolved());
        assert_eq!(resolver.navigator.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_navigation_error_is_not_fatal() {
        let resolver = Resolver::new(Broken, &config(1_000, 5));
        let resolved = resolver.resolve(&SourceUrl::new("https://news.example/r/y")).await.unwrap();
        assert!(resolved.is_unresolved());
        assert_eq!(resolved.as_str(), "https://news.example/r/y");
    }

    #[tokio::test]
    async fn test_invalid_source_fails_closed() {
        let resolver = Resolver::new(Broken, &config(1_000, 5));
        let err = resolver.resolve(&SourceUrl::new("/relative/only")).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_follows_http_and_client_side_hops() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/1"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/interstitial"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/interstitial"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><meta http-equiv="refresh" content="0;url=/final"></head></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>The story.</p>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(build_client(10).unwrap(), Duration::from_secs(5));
        let resolver = Resolver::new(HttpNavigator::new(fetcher), &config(5_000, 5));
        let resolved = resolver
            .resolve(&SourceUrl::new(format!("{}/r/1", server.uri())))
            .await
            .unwrap();
        assert_eq!(resolved.as_str(), format!("{}/final", server.uri()));
        assert!(!resolved.is_unresolved());
    }

    #[tokio::test]
    async fn test_settled_resolution_carries_loaded_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>The story.</p>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(build_client(10).unwrap(), Duration::from_secs(5));
        let resolver = Resolver::new(HttpNavigator::new(fetcher), &config(5_000, 5));
        let resolution = resolver
            .resolve_with_page(&SourceUrl::new(format!("{}/story", server.uri())))
            .await
            .unwrap();
        let page = resolution.page.unwrap();
        assert_eq!(&page.final_url, resolution.url.url());
        assert!(page.body.contains("The story."));

        let fallback = Resolver::new(Broken, &config(1_000, 5))
            .resolve_with_page(&SourceUrl::new("https://news.example/r/z"))
            .await
            .unwrap();
        assert!(fallback.page.is_none());
        assert!(fallback.url.is_unresolved());
    }
}
