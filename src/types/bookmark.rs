use serde::{Deserialize, Serialize};

/// Type-specific payload of a bookmark.
///
/// The variant fully determines which fields are populated; a link can never
/// carry color data and vice versa. Serialized with a `type` tag so stored
/// snapshots and wire rows stay self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BookmarkPayload {
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        favicon: Option<String>,
    },
    Text {
        content: String,
    },
    Color {
        hex: String,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        average_color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}

impl BookmarkPayload {
    /// Stable name of the variant, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            BookmarkPayload::Link { .. } => "link",
            BookmarkPayload::Text { .. } => "text",
            BookmarkPayload::Color { .. } => "color",
            BookmarkPayload::Image { .. } => "image",
        }
    }

    /// The searchable body of the payload: url for links/images, content
    /// for text, the color code for colors.
    pub fn content_text(&self) -> &str {
        match self {
            BookmarkPayload::Link { url, .. } => url,
            BookmarkPayload::Text { content } => content,
            BookmarkPayload::Color { hex } => hex,
            BookmarkPayload::Image { url, .. } => url,
        }
    }
}

/// Represents a saved bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub group_id: Option<String>,
    pub title: String,
    /// Creation time in milliseconds since the UNIX epoch.
    pub created_at: i64,
    #[serde(flatten)]
    pub payload: BookmarkPayload,
}

impl Bookmark {
    /// URL of the bookmark when the payload carries one.
    pub fn url(&self) -> Option<&str> {
        match &self.payload {
            BookmarkPayload::Link { url, .. } => Some(url),
            BookmarkPayload::Image { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// User-submitted input for creating or updating a bookmark.
///
/// `content` is the raw pasted/typed text; classification decides the
/// payload variant. A manual `title` always wins over resolution.
#[derive(Debug, Clone, Default)]
pub struct BookmarkDraft {
    pub content: String,
    pub title: Option<String>,
    pub group_id: Option<String>,
}

impl BookmarkDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            group_id: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}
