//! Slack messages posted since a date
//!
//! Reads `conversations.history` for each configured channel. The history
//! endpoint wants channel ids, so configured names are resolved through
//! `conversations.list` first; values that already look like ids are used as
//! they are. User ids are resolved to display names through `users.info`.
//! Both lookups live in per-client caches that only ever grow.

use super::{http_client, FetchError, MessageSource};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_API_BASE: &str = "https://slack.com/api";
const PAGE_LIMIT: usize = 200;
const LIST_LIMIT: usize = 1000;
const MAX_PAGES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<ApiMessage>,
    #[serde(default)]
    has_more: bool,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    channels: Vec<ApiChannel>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ApiChannel {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct ApiMessage {
    user: Option<String>,
    username: Option<String>,
    bot_id: Option<String>,
    #[serde(default)]
    text: String,
    ts: String,
    subtype: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    user: ApiUser,
}

#[derive(Deserialize)]
struct ApiUser {
    name: String,
    real_name: Option<String>,
    profile: Option<ApiProfile>,
}

#[derive(Deserialize)]
struct ApiProfile {
    display_name: Option<String>,
}

impl ApiUser {
    fn best_name(self) -> String {
        self.profile
            .and_then(|p| p.display_name)
            .filter(|n| !n.is_empty())
            .or(self.real_name.filter(|n| !n.is_empty()))
            .unwrap_or(self.name)
    }
}

/// Append-only key → value map. Concurrent fetches may race to fill the
/// same key; every writer stores the same value, so the last one is harmless.
#[derive(Default)]
pub(crate) struct NameCache {
    names: Mutex<HashMap<String, String>>,
}

impl NameCache {
    pub(crate) fn get(&self, id: &str) -> Option<String> {
        self.names.lock().ok().and_then(|names| names.get(id).cloned())
    }

    pub(crate) fn insert(&self, id: &str, name: &str) {
        if let Ok(mut names) = self.names.lock() {
            names
                .entry(id.to_string())
                .or_insert_with(|| name.to_string());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.names.lock().map(|n| n.len()).unwrap_or(0)
    }
}

/// One Slack Web API method call, returning the raw JSON body
pub trait SlackTransport: Send + Sync {
    fn get<'a>(
        &'a self,
        method: &'a str,
        params: Vec<(&'static str, String)>,
    ) -> BoxFuture<'a, Result<String, FetchError>>;
}

/// Bearer-token HTTPS transport against the public API
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(token: &str) -> Result<Self, FetchError> {
        Ok(Self {
            http: http_client()?,
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.trim().to_string(),
        })
    }

    async fn send(
        &self,
        method: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<String, FetchError> {
        let resp = self
            .http
            .get(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_string();
            return Err(FetchError::RateLimit(format!("retry after {}s", retry)));
        }
        if !resp.status().is_success() {
            return Err(FetchError::Api(format!("Slack error ({})", resp.status())));
        }

        resp.text().await.map_err(FetchError::from_reqwest)
    }
}

impl SlackTransport for HttpTransport {
    fn get<'a>(
        &'a self,
        method: &'a str,
        params: Vec<(&'static str, String)>,
    ) -> BoxFuture<'a, Result<String, FetchError>> {
        self.send(method, params).boxed()
    }
}

pub struct SlackClient {
    transport: Box<dyn SlackTransport>,
    channels: Vec<String>,
    names: NameCache,
    channel_ids: NameCache,
}

impl SlackClient {
    pub fn new(token: &str, channels: Vec<String>) -> Result<Self, FetchError> {
        if token.trim().is_empty() {
            return Err(FetchError::Config("slack needs a token".to_string()));
        }
        Self::with_transport(Box::new(HttpTransport::new(token)?), channels)
    }

    pub fn with_transport(
        transport: Box<dyn SlackTransport>,
        channels: Vec<String>,
    ) -> Result<Self, FetchError> {
        let channels: Vec<String> = channels
            .into_iter()
            .map(|c| c.trim().trim_start_matches('#').to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if channels.is_empty() {
            return Err(FetchError::Config(
                "slack needs at least one channel".to_string(),
            ));
        }
        Ok(Self {
            transport,
            channels,
            names: NameCache::default(),
            channel_ids: NameCache::default(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<T, FetchError> {
        let body = self.transport.get(method, params).await?;
        parse_response(&body)
    }

    /// Fill the name → id cache from `conversations.list`
    async fn load_channel_ids(&self) -> Result<(), FetchError> {
        let mut cursor = String::new();
        for _ in 0..MAX_PAGES {
            let mut params = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", LIST_LIMIT.to_string()),
            ];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.clone()));
            }
            let page: ChannelListResponse = self.call("conversations.list", params).await?;
            for channel in page.channels {
                self.channel_ids.insert(&channel.name, &channel.id);
            }
            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }
        Ok(())
    }

    /// Channel id for a configured channel. The list is fetched at most once
    /// per call to [`Self::history`], and only when some name is not cached.
    fn cached_channel_id(&self, channel: &str) -> Option<String> {
        if looks_like_channel_id(channel) {
            return Some(channel.to_string());
        }
        self.channel_ids.get(channel)
    }

    async fn channel_history(
        &self,
        channel: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Message>, FetchError> {
        let id = self.cached_channel_id(channel).ok_or_else(|| {
            FetchError::Config(format!("unknown Slack channel #{}", channel))
        })?;
        let mut messages = Vec::new();
        let mut cursor = String::new();
        for _ in 0..MAX_PAGES {
            let mut params = vec![
                ("channel", id.clone()),
                ("oldest", slack_ts(since)),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.clone()));
            }
            let page: HistoryResponse = self.call("conversations.history", params).await?;

            for raw in page.messages {
                if let Some(message) = self.convert(channel, raw, since).await {
                    messages.push(message);
                }
            }

            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if !page.has_more || cursor.is_empty() {
                break;
            }
        }
        Ok(messages)
    }

    async fn convert(&self, channel: &str, raw: ApiMessage, since: DateTime<Utc>) -> Option<Message> {
        // Joins, leaves, topic changes
        if raw
            .subtype
            .as_deref()
            .is_some_and(|s| s.starts_with("channel_") || s.starts_with("group_"))
        {
            return None;
        }
        let timestamp = parse_slack_ts(&raw.ts)?;
        if timestamp <= since {
            return None;
        }
        let user = match (&raw.user, &raw.username, &raw.bot_id) {
            (Some(id), _, _) => self.display_name(id).await,
            (None, Some(name), _) => name.clone(),
            (None, None, Some(bot)) => bot.clone(),
            (None, None, None) => "unknown".to_string(),
        };
        Some(Message {
            channel: channel.to_string(),
            user,
            text: raw.text,
            timestamp,
        })
    }

    async fn display_name(&self, id: &str) -> String {
        if let Some(name) = self.names.get(id) {
            return name;
        }
        match self
            .call::<UserInfoResponse>("users.info", vec![("user", id.to_string())])
            .await
        {
            Ok(info) => {
                let name = info.user.best_name();
                self.names.insert(id, &name);
                name
            }
            Err(e) => {
                debug!(user = %id, error = %e, "could not resolve slack user");
                id.to_string()
            }
        }
    }

    async fn history(&self, since: DateTime<Utc>) -> Result<Vec<Message>, FetchError> {
        let mut first_error = None;
        if self
            .channels
            .iter()
            .any(|c| self.cached_channel_id(c).is_none())
        {
            if let Err(e) = self.load_channel_ids().await {
                warn!(error = %e, "could not list slack channels");
                first_error = Some(e);
            }
        }

        let mut messages = Vec::new();
        let mut succeeded = 0usize;
        for channel in &self.channels {
            match self.channel_history(channel, since).await {
                Ok(found) => {
                    succeeded += 1;
                    messages.extend(found);
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "skipping slack channel");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error.filter(|_| succeeded == 0) {
            return Err(e);
        }
        debug!(
            messages = messages.len(),
            cached_names = self.names.len(),
            cached_channels = self.channel_ids.len(),
            "slack fetch finished"
        );

        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(messages)
    }
}

impl MessageSource for SlackClient {
    fn messages_since(
        &self,
        since: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Message>, FetchError>> {
        self.history(since).boxed()
    }
}

/// Channel names are lowercase; ids are uppercase `C…`/`G…`/`D…` tokens
fn looks_like_channel_id(value: &str) -> bool {
    value.len() >= 9
        && value.starts_with(['C', 'G', 'D'])
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Slack reports failures as HTTP 200 with `ok: false`
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| FetchError::Api(format!("unexpected Slack response: {}", e)))?;
    if !envelope.ok {
        let code = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
        return Err(match code.as_str() {
            "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked"
            | "token_expired" | "missing_scope" => FetchError::Auth(code),
            "ratelimited" => FetchError::RateLimit(code),
            _ => FetchError::Api(format!("Slack error: {}", code)),
        });
    }
    serde_json::from_str(body).map_err(|e| FetchError::Api(format!("unexpected Slack response: {}", e)))
}

/// `1712345678.000200` → instant
fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, micros) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let micros: u32 = format!("{:0<6}", micros).get(..6)?.parse().ok()?;
    DateTime::<Utc>::from_timestamp(secs, micros * 1_000)
}

fn slack_ts(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}
