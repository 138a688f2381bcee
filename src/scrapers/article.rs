//! Article body extraction.
//!
//! Pages are retrieved through the [`PageFetcher`] trait so the analyzer can
//! be driven by an in-memory fake in tests. Extraction tries a fixed list of
//! container selectors and falls back to every paragraph on the page.

use crate::error::FetchError;
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Container selectors, highest priority first.
const CONTAINER_SELECTORS: [&str; 4] = ["article", ".article-body", "#main-content", "div.article"];

static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTAINER_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("container selector is valid"))
        .collect()
});

static PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("paragraph selector is valid"));

/// Retrieves raw HTML for a URL.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// [`PageFetcher`] backed by a `reqwest` client with a request timeout.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("news_signals/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.text().await.map_err(map_reqwest)
    }
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

fn paragraph_text<'a>(paragraphs: impl Iterator<Item = ElementRef<'a>>) -> String {
    paragraphs
        .map(|p| p.text().collect::<String>())
        .join(" ")
}

/// Extract the main body text from an HTML document.
///
/// The first selector in [`CONTAINER_SELECTORS`] that matches anything wins;
/// its first match's paragraphs are joined with single spaces. With no
/// matching container every paragraph in the document is used. A page with
/// no paragraphs yields an empty string.
pub fn extract_text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);

    for (name, selector) in CONTAINER_SELECTORS.iter().zip(CONTAINERS.iter()) {
        if let Some(container) = document.select(selector).next() {
            debug!(selector = %name, "Matched article container");
            return paragraph_text(container.select(&PARAGRAPH));
        }
    }

    debug!("No article container matched; using every paragraph");
    paragraph_text(document.select(&PARAGRAPH))
}

/// Fetch `url` and extract its article text.
///
/// Retrieval failures are logged and turned into `None`; callers treat that
/// as "skip this article".
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn extract_text<F: PageFetcher>(fetcher: &F, url: &str) -> Option<String> {
    match fetcher.fetch(url).await {
        Ok(html) => {
            let text = extract_text_from_html(&html);
            info!(chars = text.chars().count(), "Extracted article text");
            Some(text)
        }
        Err(e) => {
            warn!(error = %e, "Error extracting article text");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer the first request on a fresh local port with `status` and
    /// `body`, then close. Returns the base URL.
    pub(crate) async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    fn local_fetcher() -> HttpPageFetcher {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpPageFetcher { client }
    }

    /// In-memory [`PageFetcher`] keyed by URL; unknown URLs answer 404.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pages: HashMap<String, Result<String, u16>>,
        pub(crate) requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(html.to_string()));
            self
        }

        pub(crate) fn with_status(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(url.to_string(), Err(status));
            self
        }
    }

    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Ok(html)) => Ok(html.clone()),
                Some(Err(status)) => Err(FetchError::Status(*status)),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    #[test]
    fn test_article_element_wins_over_page_paragraphs() {
        let html = r#"
            <html><body>
              <p>Cookie banner</p>
              <article>
                <h1>Headline</h1>
                <p>First paragraph.</p>
                <div><p>Second <b>bold</b> paragraph.</p></div>
              </article>
              <footer><p>Footer text</p></footer>
            </body></html>"#;
        assert_eq!(
            extract_text_from_html(html),
            "First paragraph. Second bold paragraph."
        );
    }

    #[test]
    fn test_selector_priority_order() {
        let html = r#"
            <div id="main-content"><p>main content</p></div>
            <div class="article-body"><p>article body</p></div>"#;
        assert_eq!(extract_text_from_html(html), "article body");
    }

    #[test]
    fn test_first_match_of_winning_selector_is_used() {
        let html = r#"
            <article><p>one</p></article>
            <article><p>two</p></article>"#;
        assert_eq!(extract_text_from_html(html), "one");
    }

    #[test]
    fn test_div_article_selector() {
        let html = r#"<div class="article"><p>a</p><p>b</p></div><p>outside</p>"#;
        assert_eq!(extract_text_from_html(html), "a b");
    }

    #[test]
    fn test_fallback_joins_all_paragraphs() {
        let html = r#"<html><body><p>Alpha</p><section><p>Beta</p></section></body></html>"#;
        assert_eq!(extract_text_from_html(html), "Alpha Beta");
    }

    #[test]
    fn test_no_paragraphs_is_empty_string() {
        let html = "<html><body><div>Just a div</div></body></html>";
        assert_eq!(extract_text_from_html(html), "");
    }

    #[test]
    fn test_matched_container_without_paragraphs_is_empty() {
        let html = "<article><span>no paragraphs</span></article><p>outside</p>";
        assert_eq!(extract_text_from_html(html), "");
    }

    #[tokio::test]
    async fn test_extract_text_returns_none_on_failure() {
        let fetcher = FakeFetcher::default().with_status("https://down.example/a", 503);
        assert_eq!(extract_text(&fetcher, "https://down.example/a").await, None);
        assert_eq!(extract_text(&fetcher, "https://missing.example/").await, None);
    }

    #[tokio::test]
    async fn test_extract_text_success() {
        let fetcher =
            FakeFetcher::default().with_page("https://ok.example/a", "<article><p>Body</p></article>");
        assert_eq!(
            extract_text(&fetcher, "https://ok.example/a").await,
            Some("Body".to_string())
        );
        assert_eq!(fetcher.requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_http_fetcher_maps_error_status() {
        let base = serve_once("404 Not Found", "gone").await;
        let err = local_fetcher().fetch(&format!("{base}/story")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_http_not_found_page_is_skipped() {
        let base = serve_once("404 Not Found", "gone").await;
        assert_eq!(extract_text(&local_fetcher(), &format!("{base}/story")).await, None);
    }

    #[tokio::test]
    async fn test_http_page_is_extracted() {
        let base = serve_once("200 OK", "<article><p>Live body</p></article>").await;
        assert_eq!(
            extract_text(&local_fetcher(), &format!("{base}/story")).await,
            Some("Live body".to_string())
        );
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpPageFetcher::new(Duration::from_secs(10)).is_ok());
    }
}
