use serde::{Deserialize, Serialize};

/// Query parameters understood by the share-target / deep-link intake.
/// These are consumed once and must then be stripped from the visible URL.
pub const LAUNCH_PARAM_KEYS: [&str; 6] = ["content", "url", "text", "title", "group", "new"];

/// Intent carried by a share-target or URL launch.
///
/// `group` may be a group id or a (case-insensitive) group name; resolution
/// happens against the loaded group list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchParams {
    pub content: Option<String>,
    pub title: Option<String>,
    pub group: Option<String>,
    pub open_modal: bool,
}

impl LaunchParams {
    /// Parses launch params from a URL query string (with or without the
    /// leading `?`). The `content`, `url` and `text` keys are merged, first
    /// one present wins. Returns `None` when nothing actionable is present.
    pub fn from_query(query: &str) -> Option<Self> {
        let mut content = None;
        let mut url = None;
        let mut text = None;
        let mut title = None;
        let mut group = None;
        let mut open_modal = false;

        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        {
            let value = clean_param(&value);
            match key.as_ref() {
                "content" => content = content.or(value),
                "url" => url = url.or(value),
                "text" => text = text.or(value),
                "title" => title = title.or(value),
                "group" => group = group.or(value),
                "new" => open_modal = true,
                _ => {}
            }
        }

        let params = Self {
            content: content.or(url).or(text),
            title,
            group,
            open_modal,
        };
        if params.has_payload() {
            Some(params)
        } else {
            None
        }
    }

    /// Whether anything actionable was supplied.
    pub fn has_payload(&self) -> bool {
        self.content.is_some() || self.title.is_some() || self.group.is_some() || self.open_modal
    }
}

fn clean_param(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A launch intent persisted across the redirect-to-sign-in round trip.
///
/// Short-lived: entries older than the deep-link TTL are discarded on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBookmarkPayload {
    pub content: Option<String>,
    pub title: Option<String>,
    pub group: Option<String>,
    pub open_modal: bool,
    /// Milliseconds since the UNIX epoch at store time.
    pub stored_at: i64,
}

impl PendingBookmarkPayload {
    pub fn from_params(params: &LaunchParams, stored_at: i64) -> Self {
        Self {
            content: params.content.clone(),
            title: params.title.clone(),
            group: params.group.clone(),
            open_modal: params.open_modal,
            stored_at,
        }
    }

    pub fn is_expired(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.stored_at > ttl_ms
    }

    pub fn into_params(self) -> LaunchParams {
        LaunchParams {
            content: self.content,
            title: self.title,
            group: self.group,
            open_modal: self.open_modal,
        }
    }
}

/// Resolved launch intent handed back to the host for prefilling the
/// compose surface. `group_id` is a real group id, already resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposePrefill {
    pub content: Option<String>,
    pub title: Option<String>,
    pub group_id: Option<String>,
    pub open_modal: bool,
}
