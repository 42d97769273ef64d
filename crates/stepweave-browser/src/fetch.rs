//! # HTTP-Fetch Session
//!
//! A [`BrowserSession`] without a rendering engine. Pages are fetched with
//! `reqwest` and kept as markup. `EXTRACT` and `OBSERVE` hand the
//! tag-stripped page text to the oracle; `ACT` and `SCREENSHOT` need a real
//! browser and fail as unsupported.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use stepweave_core::{FailureReason, Oracle, OracleRequest};
use url::Url;

use crate::session::{BrowserSession, SessionFactory};

const MAX_PAGE_TEXT_CHARS: usize = 20_000;
const MAX_LINKS: usize = 50;

// Patterns are literals; `None` only if the regex engine rejects them, in
// which case the markup is passed through unchanged.
static SCRIPT_OR_STYLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>").ok()
});
static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").ok());
static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());
static TITLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok());
static LINK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).ok()
});

fn replace_all(pattern: &Option<Regex>, text: &str, replacement: &str) -> String {
    match pattern {
        Some(re) => re.replace_all(text, replacement).into_owned(),
        None => text.to_string(),
    }
}

/// Visible text of an HTML document.
pub fn page_text(html: &str) -> String {
    let without_code = replace_all(&SCRIPT_OR_STYLE, html, " ");
    let without_tags = replace_all(&TAG, &without_code, " ");
    let decoded = decode_entities(&without_tags);
    replace_all(&WHITESPACE, &decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn page_title(html: &str) -> Option<String> {
    TITLE
        .as_ref()?
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| page_text(m.as_str()))
        .filter(|t| !t.is_empty())
}

fn page_links(html: &str, base: &Url) -> Vec<Value> {
    let Some(link) = LINK.as_ref() else {
        return Vec::new();
    };
    link.captures_iter(html)
        .filter_map(|c| {
            let href = c.get(1)?.as_str();
            let url = base.join(href).ok()?;
            let text = c.get(2).map(|m| page_text(m.as_str())).unwrap_or_default();
            Some(json!({ "text": text, "url": url.as_str() }))
        })
        .take(MAX_LINKS)
        .collect()
}

fn unsupported(method: &str) -> FailureReason {
    FailureReason::Custom {
        category: "unsupported".to_string(),
        message: format!("{method} requires an interactive browser; the fetch session only reads pages"),
    }
}

#[derive(Debug, Clone)]
struct Page {
    url: Url,
    html: String,
}

/// Page-fetching browser session.
pub struct FetchSession {
    client: Client,
    oracle: Arc<dyn Oracle>,
    model: Option<String>,
    current: Option<Page>,
    history: Vec<Page>,
}

impl FetchSession {
    pub fn new(client: Client, oracle: Arc<dyn Oracle>, model: Option<String>) -> Self {
        Self {
            client,
            oracle,
            model,
            current: None,
            history: Vec::new(),
        }
    }

    fn page(&self) -> Result<&Page, FailureReason> {
        self.current
            .as_ref()
            .ok_or_else(|| FailureReason::invalid_input("no page loaded; use GOTO first"))
    }

    fn resolve(&self, target: &str) -> Result<Url, FailureReason> {
        let parsed = match &self.current {
            Some(page) => page.url.join(target),
            None => Url::parse(target),
        };
        parsed.map_err(|e| FailureReason::invalid_input(format!("invalid URL '{target}': {e}")))
    }

    async fn ask(&self, task: &str, page: &Page) -> Result<String, FailureReason> {
        let text: String = page_text(&page.html).chars().take(MAX_PAGE_TEXT_CHARS).collect();
        let request = OracleRequest::new(format!(
            "{task}\n\nPage URL: {}\n\nPage text:\n{text}",
            page.url
        ))
        .with_model(self.model.as_deref());
        self.oracle
            .complete_text(request)
            .await
            .map_err(|e| FailureReason::Custom {
                category: "oracle".to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl BrowserSession for FetchSession {
    async fn goto(&mut self, target: &str) -> Result<Value, FailureReason> {
        let url = self.resolve(target)?;
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FailureReason::Timeout {
                    operation: format!("GOTO {url}"),
                }
            } else {
                FailureReason::NetworkError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FailureReason::NetworkError {
                message: format!("{url} returned {status}"),
            });
        }
        let final_url = response.url().clone();
        let html = response.text().await.map_err(|e| FailureReason::NetworkError {
            message: e.to_string(),
        })?;

        let title = page_title(&html);
        if let Some(previous) = self.current.take() {
            self.history.push(previous);
        }
        tracing::debug!(url = %final_url, bytes = html.len(), "Fetched page");
        self.current = Some(Page {
            url: final_url.clone(),
            html,
        });
        Ok(json!({
            "url": final_url.as_str(),
            "status": status.as_u16(),
            "title": title,
        }))
    }

    async fn act(&mut self, _instruction: &str) -> Result<Value, FailureReason> {
        Err(unsupported("ACT"))
    }

    async fn extract(&mut self, instruction: &str) -> Result<Value, FailureReason> {
        let page = self.page()?;
        let task = format!(
            "Extract the following from the web page below. Answer with the extracted data only.\n\
             What to extract: {instruction}"
        );
        let extraction = self.ask(&task, page).await?;
        Ok(json!({ "extraction": extraction }))
    }

    async fn observe(&mut self, instruction: Option<&str>) -> Result<Value, FailureReason> {
        let page = self.page()?;
        let focus = instruction.unwrap_or("the main content and the available navigation");
        let task = format!("Describe the web page below, focusing on: {focus}");
        let observation = self.ask(&task, page).await?;
        Ok(json!({
            "observation": observation,
            "title": page_title(&page.html),
            "links": page_links(&page.html, &page.url),
        }))
    }

    async fn html(&mut self) -> Result<Value, FailureReason> {
        Ok(Value::String(self.page()?.html.clone()))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, FailureReason> {
        Err(unsupported("SCREENSHOT"))
    }

    async fn nav_back(&mut self) -> Result<Value, FailureReason> {
        let previous = self
            .history
            .pop()
            .ok_or_else(|| FailureReason::invalid_input("no previous page"))?;
        let url = previous.url.to_string();
        self.current = Some(previous);
        Ok(json!({ "url": url }))
    }

    fn current_url(&self) -> Option<String> {
        self.current.as_ref().map(|p| p.url.to_string())
    }

    async fn close(&mut self) -> Result<(), FailureReason> {
        self.current = None;
        self.history.clear();
        Ok(())
    }
}

/// Creates [`FetchSession`]s sharing one HTTP client.
pub struct FetchSessionFactory {
    client: Client,
    oracle: Arc<dyn Oracle>,
    model: Option<String>,
}

impl FetchSessionFactory {
    pub fn new(oracle: Arc<dyn Oracle>, timeout: Duration) -> Result<Self, FailureReason> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stepweave/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FailureReason::InternalError {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            oracle,
            model: None,
        })
    }

    /// Model used for `EXTRACT` and `OBSERVE`.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl SessionFactory for FetchSessionFactory {
    async fn create(&self) -> Result<Box<dyn BrowserSession>, FailureReason> {
        Ok(Box::new(FetchSession::new(
            self.client.clone(),
            self.oracle.clone(),
            self.model.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Rust &amp; Tokio</title>
        <style>body { color: red }</style><script>var x = "<b>";</script></head>
        <body><h1>Hello</h1><p>Fast&nbsp;and   safe</p>
        <a href="/docs">Docs</a><a href='https://other.test/x'>Other</a></body></html>"#;

    #[test]
    fn strips_markup_and_code() {
        assert_eq!(page_text(PAGE), "Rust & Tokio Hello Fast and safe Docs Other");
    }

    #[test]
    fn finds_title() {
        assert_eq!(page_title(PAGE).as_deref(), Some("Rust & Tokio"));
        assert_eq!(page_title("<p>no title</p>"), None);
    }

    #[test]
    fn resolves_links_against_page() {
        let base = Url::parse("https://site.test/guide/").unwrap();
        let links = page_links(PAGE, &base);
        assert_eq!(
            links,
            vec![
                json!({"text": "Docs", "url": "https://site.test/docs"}),
                json!({"text": "Other", "url": "https://other.test/x"}),
            ]
        );
    }
}
