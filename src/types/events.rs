use serde::{Deserialize, Serialize};

use crate::types::bookmark::Bookmark;
use crate::types::group::Group;
use crate::types::session::Session;

/// The two remote collections tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Bookmarks,
    Groups,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Bookmarks => "bookmarks",
            Collection::Groups => "groups",
        }
    }
}

/// Auth lifecycle events emitted by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    /// The provider finished its startup probe. `None` means it found no
    /// persisted session of its own.
    InitialSession(Option<Session>),
}

/// Status of a push subscription channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

impl ChannelStatus {
    /// Terminal statuses end the subscription and trigger the reconnect
    /// path.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChannelStatus::ChannelError | ChannelStatus::TimedOut | ChannelStatus::Closed
        )
    }
}

/// A single row change delivered on a push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "row", rename_all = "snake_case")]
pub enum Change {
    UpsertBookmark(Bookmark),
    UpsertGroup(Group),
    Delete { id: String },
}

/// Envelope for a change event: which collection, which owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub user_id: String,
    #[serde(flatten)]
    pub change: Change,
}

/// Everything a push channel can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ChannelEvent {
    Status(ChannelStatus),
    Change(ChangeEvent),
}

/// Kinds of data-changed notifications exchanged between tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataChange {
    BookmarksChanged,
    GroupsChanged,
    GroupColorsChanged,
}

/// Topic-specific body of a cross-tab message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "lowercase")]
pub enum TabMessageBody {
    Auth {
        has_session: bool,
    },
    Data {
        change: DataChange,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
}

/// A message broadcast between same-origin tabs.
///
/// Stamped with the sending tab's random `origin_id` so receivers can drop
/// their own messages, and a timestamp receivers may use to discard stale
/// notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabMessage {
    pub origin_id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub body: TabMessageBody,
}
