//! HTTP implementation of the remote collections contract.
//!
//! Talks to the hosted backend over REST for row operations and consumes
//! the per-collection change feed as a server-sent-event stream. The
//! backend applies its own per-row ordering and access control; this client
//! only shapes requests and surfaces failures.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::bookmark::Bookmark;
use crate::types::errors::RemoteError;
use crate::types::events::{ChannelEvent, ChannelStatus, Collection};
use crate::types::group::Group;

use super::RemoteCollections;

/// Buffered capacity of each push channel.
const CHANNEL_CAPACITY: usize = 64;

/// REST + SSE client for the hosted bookmark store.
pub struct HttpRemote {
    base_url: String,
    api_key: String,
    access_token: std::sync::Mutex<Option<String>>,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: std::sync::Mutex::new(None),
            client: reqwest::Client::new(),
        }
    }

    /// Updates the bearer token attached to every request. Called by the
    /// composition root whenever the session token pair changes.
    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .lock()
            .expect("http remote mutex poisoned") = token;
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("apikey", self.api_key.as_str());
        let token = self
            .access_token
            .lock()
            .expect("http remote mutex poisoned")
            .clone();
        match token {
            Some(t) => builder.bearer_auth(t),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;
        Self::parse_response(response).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let payload =
            serde_json::to_string(body).map_err(|e| RemoteError::ApiError(e.to_string()))?;
        let response = self
            .authorized(self.client.request(method, url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let body = Self::check_status(response).await?;
        serde_json::from_str(&body).map_err(|e| RemoteError::ApiError(e.to_string()))
    }

    /// Maps the status code to the error taxonomy and returns the body.
    async fn check_status(response: reqwest::Response) -> Result<String, RemoteError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(body));
        }
        if !status.is_success() {
            return Err(RemoteError::ApiError(format!("{}: {}", status, body)));
        }
        Ok(body)
    }

    fn rows_url(&self, collection: Collection) -> String {
        format!("{}/rest/{}", self.base_url, collection.as_str())
    }

    fn row_url(&self, collection: Collection, id: &str) -> String {
        format!("{}/rest/{}/{}", self.base_url, collection.as_str(), id)
    }
}

#[async_trait]
impl RemoteCollections for HttpRemote {
    async fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, RemoteError> {
        let url = format!(
            "{}?user_id={}",
            self.rows_url(Collection::Bookmarks),
            urlencode(user_id)
        );
        self.get_json(&url).await
    }

    async fn search_bookmarks(
        &self,
        user_id: &str,
        group_id: Option<&str>,
        term: &str,
    ) -> Result<Vec<Bookmark>, RemoteError> {
        let mut url = format!(
            "{}?user_id={}&q={}",
            self.rows_url(Collection::Bookmarks),
            urlencode(user_id),
            urlencode(term)
        );
        if let Some(gid) = group_id {
            url.push_str(&format!("&group_id={}", urlencode(gid)));
        }
        self.get_json(&url).await
    }

    async fn create_bookmark(
        &self,
        user_id: &str,
        bookmark: &Bookmark,
    ) -> Result<Bookmark, RemoteError> {
        let body = json!({ "user_id": user_id, "row": bookmark });
        self.send_json(
            reqwest::Method::POST,
            &self.rows_url(Collection::Bookmarks),
            &body,
        )
        .await
    }

    async fn update_bookmark(
        &self,
        user_id: &str,
        bookmark: &Bookmark,
    ) -> Result<Bookmark, RemoteError> {
        let body = json!({ "user_id": user_id, "row": bookmark });
        self.send_json(
            reqwest::Method::PATCH,
            &self.row_url(Collection::Bookmarks, &bookmark.id),
            &body,
        )
        .await
    }

    async fn delete_bookmark(&self, user_id: &str, id: &str) -> Result<(), RemoteError> {
        let url = format!(
            "{}?user_id={}",
            self.row_url(Collection::Bookmarks, id),
            urlencode(user_id)
        );
        let response = self
            .authorized(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn list_groups(&self, user_id: &str) -> Result<Vec<Group>, RemoteError> {
        let url = format!(
            "{}?user_id={}",
            self.rows_url(Collection::Groups),
            urlencode(user_id)
        );
        self.get_json(&url).await
    }

    async fn create_group(&self, user_id: &str, group: &Group) -> Result<Group, RemoteError> {
        let body = json!({ "user_id": user_id, "row": group });
        self.send_json(
            reqwest::Method::POST,
            &self.rows_url(Collection::Groups),
            &body,
        )
        .await
    }

    async fn update_group(&self, user_id: &str, group: &Group) -> Result<Group, RemoteError> {
        let body = json!({ "user_id": user_id, "row": group });
        self.send_json(
            reqwest::Method::PATCH,
            &self.row_url(Collection::Groups, &group.id),
            &body,
        )
        .await
    }

    async fn delete_group(&self, user_id: &str, id: &str) -> Result<(), RemoteError> {
        let url = format!(
            "{}?user_id={}",
            self.row_url(Collection::Groups, id),
            urlencode(user_id)
        );
        let response = self
            .authorized(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        user_id: &str,
    ) -> Result<mpsc::Receiver<ChannelEvent>, RemoteError> {
        let url = format!(
            "{}/changes/{}?user_id={}",
            self.base_url,
            collection.as_str(),
            urlencode(user_id)
        );
        let response = self
            .authorized(self.client.get(&url))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| RemoteError::NetworkError(e.to_string()))?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(RemoteError::ApiError(response.status().to_string()));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump_event_stream(response, tx));
        Ok(rx)
    }
}

/// Reads the SSE body line by line, forwarding `data:` payloads as channel
/// events. Ends with a `Closed` status when the stream breaks so the
/// subscriber enters its reconnect path.
async fn pump_event_stream(response: reqwest::Response, tx: mpsc::Sender<ChannelEvent>) {
    if tx
        .send(ChannelEvent::Status(ChannelStatus::Subscribed))
        .await
        .is_err()
    {
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    loop {
        match stream.next().await {
            Some(Ok(chunk)) => {
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line: String = buffer.drain(..=newline).collect();
                    let line = line.trim();
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    match serde_json::from_str::<ChannelEvent>(data.trim()) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => debug!("Skipping unparseable change event: {}", e),
                    }
                }
            }
            Some(Err(e)) => {
                warn!("Change feed stream error: {}", e);
                let _ = tx.send(ChannelEvent::Status(ChannelStatus::ChannelError)).await;
                return;
            }
            None => {
                let _ = tx.send(ChannelEvent::Status(ChannelStatus::Closed)).await;
                return;
            }
        }
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
