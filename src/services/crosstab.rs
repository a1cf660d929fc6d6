//! Cross-tab coordination for BMarks.
//!
//! Same-origin broadcast messaging used to keep multiple open tabs of the
//! same user in sync without a server round trip. Two logical topics travel
//! over one hub: `auth` (session gained/lost) and `data` (bookmarks, groups
//! or group colors changed). Every outbound message is stamped with a
//! per-process random client id; receivers drop messages carrying their own
//! id so a tab never reacts to its own notifications.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::time_utils::now_ms;
use crate::types::events::{DataChange, TabMessage, TabMessageBody};

/// Default buffered capacity of the broadcast hub.
const HUB_CAPACITY: usize = 64;

/// The shared broadcast primitive connecting all tabs of one origin.
///
/// In the browser this is a `BroadcastChannel`; here it is a process-wide
/// fan-out channel every coordinator attaches to.
pub struct BroadcastHub {
    tx: broadcast::Sender<TabMessage>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    pub fn sender(&self) -> broadcast::Sender<TabMessage> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TabMessage> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One tab's endpoint on the broadcast hub.
pub struct CrosstabCoordinator {
    origin_id: String,
    tx: broadcast::Sender<TabMessage>,
}

impl CrosstabCoordinator {
    pub fn new(hub: &BroadcastHub) -> Self {
        Self {
            origin_id: Uuid::new_v4().to_string(),
            tx: hub.sender(),
        }
    }

    /// The random id stamped on every message this coordinator sends.
    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    /// Opens a receiving end on the hub. Pair with [`Self::accepts`] to
    /// filter out this coordinator's own messages.
    pub fn subscribe(&self) -> broadcast::Receiver<TabMessage> {
        self.tx.subscribe()
    }

    /// Whether an inbound message should be processed: messages stamped
    /// with the local origin id are dropped to prevent feedback loops.
    pub fn accepts(&self, message: &TabMessage) -> bool {
        message.origin_id != self.origin_id
    }

    /// Announces that the session was gained or lost.
    pub fn broadcast_auth(&self, has_session: bool) {
        self.post(TabMessageBody::Auth { has_session });
    }

    /// Announces a data change so other tabs request a coalesced resync.
    pub fn broadcast_data(&self, change: DataChange, payload: Option<serde_json::Value>) {
        self.post(TabMessageBody::Data { change, payload });
    }

    fn post(&self, body: TabMessageBody) {
        let message = TabMessage {
            origin_id: self.origin_id.clone(),
            timestamp: now_ms(),
            body,
        };
        // A send error only means no other tab is listening right now.
        let _ = self.tx.send(message);
    }
}
