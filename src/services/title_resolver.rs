//! Title resolution for BMarks.
//!
//! Layered on top of classification: fetches a page title for links through
//! a text-extraction proxy with a bounded timeout, and synthesizes fallback
//! titles for colors and hostnames. Resolution never blocks bookmark
//! creation; on failure or timeout the caller falls back to a synthesized
//! title or, for plain text, requires a manual one.

use std::time::Duration;

use tracing::warn;

use crate::services::content_classifier::{prettify_hostname, ClassifiedContent};

/// Text-extraction proxy prepended to the target URL.
const TITLE_PROXY_PREFIX: &str = "https://r.jina.ai/";

/// Resolves titles for freshly classified bookmark content.
pub struct TitleResolver {
    client: reqwest::Client,
    timeout: Duration,
}

impl TitleResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Resolves a title for the classified content.
    ///
    /// Links and images try a remote title fetch, then fall back to the
    /// prettified hostname, then the URL itself. Colors use the literal
    /// color code. Plain text resolves to `None`; the caller must require
    /// a manual title.
    pub async fn resolve_title(&self, content: &ClassifiedContent) -> Option<String> {
        match content {
            ClassifiedContent::Link { url, hostname }
            | ClassifiedContent::Image { url, hostname } => {
                if let Some(title) = self.fetch_page_title(url).await {
                    return Some(title);
                }
                let pretty = prettify_hostname(hostname);
                if !pretty.is_empty() {
                    Some(pretty)
                } else {
                    Some(url.clone())
                }
            }
            ClassifiedContent::Color { value } => Some(value.clone()),
            ClassifiedContent::Text { .. } => None,
        }
    }

    /// Synthesizes a title without touching the network. Used in offline
    /// mode and as the last-resort path.
    pub fn fallback_title(content: &ClassifiedContent) -> Option<String> {
        match content {
            ClassifiedContent::Link { url, hostname }
            | ClassifiedContent::Image { url, hostname } => {
                let pretty = prettify_hostname(hostname);
                if !pretty.is_empty() {
                    Some(pretty)
                } else {
                    Some(url.clone())
                }
            }
            ClassifiedContent::Color { value } => Some(value.clone()),
            ClassifiedContent::Text { .. } => None,
        }
    }

    async fn fetch_page_title(&self, url: &str) -> Option<String> {
        let proxied = format!("{}{}", TITLE_PROXY_PREFIX, url);
        let response = match self
            .client
            .get(&proxied)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Unable to fetch page title for {}: {}", url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            return None;
        }
        let body = response.text().await.ok()?;
        extract_title(&body)
    }
}

/// Pulls the contents of the first `<title>` element out of an HTML body.
/// Returns `None` when absent or empty after trimming.
pub fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = lower[open..].find('>').map(|i| open + i + 1)?;
    let end = lower[start..].find("</title>").map(|i| start + i)?;
    let title = decode_entities(html[start..end].trim());
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Decodes the handful of HTML entities that commonly appear in titles.
fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
}
