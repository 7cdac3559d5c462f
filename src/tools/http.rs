//! Static-document backend: fetches pages over HTTP and answers read-only
//! capabilities from the fetched HTML. Nothing is rendered and no script
//! runs, so interactive capabilities are not offered to the model.

use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

use super::executor::{ActionExecutor, ElementInfo, SessionFactory};
use super::{CapabilitySpec, GET_HTML, GET_TEXT, NAVIGATE, SCROLL, WAIT};
use crate::errors::{SessionError, ToolError};

pub const HTTP_CAPABILITIES: &[CapabilitySpec] = &[NAVIGATE, GET_TEXT, GET_HTML, SCROLL, WAIT];

/// Upper bound on a single `wait`, in seconds.
const MAX_WAIT_SECS: u64 = 30;

/// Snapshots longer than this are cut to keep the transcript bounded.
const SNAPSHOT_LIMIT: usize = 16_000;

static SCRIPT_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();
static SPACE_RE: OnceLock<Regex> = OnceLock::new();
static TAG_NAME_RE: OnceLock<Regex> = OnceLock::new();

struct Page {
    url: String,
    html: String,
}

pub struct HttpPageExecutor {
    client: Client,
    page: Option<Page>,
    scroll_offset: i64,
}

impl HttpPageExecutor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page: None,
            scroll_offset: 0,
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.page.as_ref().map(|p| p.url.as_str())
    }

    pub fn scroll_offset(&self) -> i64 {
        self.scroll_offset
    }

    fn load(&mut self, url: &str, html: String) {
        self.page = Some(Page {
            url: url.to_string(),
            html,
        });
        self.scroll_offset = 0;
    }

    fn page(&self) -> Result<&Page, ToolError> {
        self.page
            .as_ref()
            .ok_or_else(|| ToolError::Execution("No page loaded. Call navigate first.".to_string()))
    }

    /// Outer HTML of the first element matching `selector`.
    fn select(&self, selector: &str) -> Result<String, ToolError> {
        let html = &self.page()?.html;
        let selector = selector.trim();
        if matches!(selector, "*" | "html" | ":root") {
            return Ok(html.clone());
        }

        let tag_name = TAG_NAME_RE
            .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("tag name regex"));
        if !tag_name.is_match(selector) {
            return Err(ToolError::Execution(format!(
                "Selector not supported by the HTTP backend: {selector}"
            )));
        }

        let element = Regex::new(&format!(
            r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>",
            tag = regex::escape(selector)
        ))
        .map_err(|e| ToolError::Execution(e.to_string()))?;

        match element.find(html) {
            Some(m) => Ok(m.as_str().to_string()),
            // Documents without an explicit <body> are all body.
            None if selector.eq_ignore_ascii_case("body") => Ok(html.clone()),
            None => Err(ToolError::Execution(format!(
                "No element found for selector: {selector}"
            ))),
        }
    }

    fn unsupported(tool: &'static str) -> ToolError {
        ToolError::Unsupported { tool }
    }
}

/// Visible text of an HTML fragment with whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let script = SCRIPT_RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("script regex")
    });
    let tag = TAG_RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
    let space = SPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));

    let without_scripts = script.replace_all(html, " ");
    let without_tags = tag.replace_all(&without_scripts, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    space.replace_all(decoded.trim(), " ").into_owned()
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[truncated {} bytes]", &text[..end], text.len() - end)
}

#[async_trait::async_trait]
impl ActionExecutor for HttpPageExecutor {
    async fn navigate(&mut self, url: &str) -> Result<String, ToolError> {
        log::debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let html = response.text().await?;
        self.load(url, html);
        Ok(format!("Successfully navigated to {url}"))
    }

    async fn click(&mut self, _selector: &str) -> Result<String, ToolError> {
        Err(Self::unsupported("click"))
    }

    async fn type_text(&mut self, _selector: &str, _text: &str) -> Result<String, ToolError> {
        Err(Self::unsupported("type_text"))
    }

    async fn get_text(&mut self, selector: &str) -> Result<String, ToolError> {
        self.select(selector).map(|html| html_to_text(&html))
    }

    async fn get_html(&mut self, selector: &str) -> Result<String, ToolError> {
        self.select(selector)
    }

    async fn scroll(&mut self, direction: &str, pixels: i64) -> Result<String, ToolError> {
        let delta = match direction {
            "down" => pixels,
            "up" => pixels.checked_neg().ok_or_else(|| {
                ToolError::Execution(format!("Cannot scroll up by {pixels} pixels."))
            })?,
            other => {
                return Err(ToolError::Execution(format!(
                    "Invalid direction: {other}. Use 'up' or 'down'."
                )));
            }
        };
        self.scroll_offset = self.scroll_offset.saturating_add(delta).max(0);
        Ok(format!("Successfully scrolled {direction} by {pixels} pixels."))
    }

    async fn wait(&mut self, seconds: u64) -> Result<String, ToolError> {
        let waited = seconds.min(MAX_WAIT_SECS);
        tokio::time::sleep(Duration::from_secs(waited)).await;
        Ok(format!("Waited for {waited} seconds."))
    }

    async fn find_elements(&mut self, _selector: &str) -> Result<Vec<ElementInfo>, ToolError> {
        Err(Self::unsupported("find_elements"))
    }

    fn capabilities(&self) -> &'static [CapabilitySpec] {
        HTTP_CAPABILITIES
    }

    async fn snapshot(&mut self) -> Result<String, ToolError> {
        let Some(page) = &self.page else {
            return Ok("No page loaded yet.".to_string());
        };
        let body = self.select("body")?;
        Ok(format!("URL: {}\n{}", page.url, truncate(&body, SNAPSHOT_LIMIT)))
    }

    async fn close(&mut self) {
        self.page = None;
    }
}

/// Hands each run a fresh `HttpPageExecutor` over a shared connection pool.
#[derive(Clone)]
pub struct HttpSessionFactory {
    client: Client,
}

impl HttpSessionFactory {
    pub fn new(timeout_secs: u64) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("browsebench/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SessionError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn open(&self) -> Result<Box<dyn ActionExecutor>, SessionError> {
        Ok(Box::new(HttpPageExecutor::new(self.client.clone())))
    }
}
