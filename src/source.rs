//! Chat message sources feeding the digest.
//!
//! | Source | Reads from |
//! |--------|-----------|
//! | [`SlackSource`] | `conversations.history` of one Slack channel |
//! | [`FileSource`] | a JSON array of [`ChatMessage`]s on disk |

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SlackConfig;

/// One human chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Source timestamp, verbatim (Slack `ts`).
    #[serde(default)]
    pub timestamp: String,
    pub author: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub has_thread: bool,
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Messages posted within the last `lookback_minutes`.
    async fn fetch(&self, lookback_minutes: u32) -> Result<Vec<ChatMessage>>;

    /// Human-readable origin, used in logs and "no messages" errors.
    fn describe(&self) -> String;
}

// ============ Slack ============

#[derive(Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct SlackMessage {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    ok: bool,
    #[serde(default)]
    user: Option<SlackUser>,
}

#[derive(Deserialize)]
struct SlackUser {
    #[serde(default)]
    real_name: Option<String>,
}

pub struct SlackSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
    channel: String,
    page_limit: u32,
    users: Mutex<HashMap<String, String>>,
}

impl SlackSource {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        channel: impl Into<String>,
        page_limit: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            channel: channel.into(),
            page_limit,
            users: Mutex::new(HashMap::new()),
        })
    }

    /// Token from `[slack].token_env`, channel from `[slack].channel_id` or
    /// `CHANNEL_ID`.
    pub fn from_config(config: &SlackConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("{} not set", config.token_env))?;
        let Some(channel) = config.resolve_channel() else {
            bail!("no Slack channel: set [slack].channel_id or CHANNEL_ID");
        };
        Self::new(
            &config.base_url,
            token,
            channel,
            config.page_limit,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Display name for `user_id`, cached per source. Lookup failures fall
    /// back to `User <id>` and are not cached.
    async fn user_name(&self, user_id: &str) -> String {
        if let Some(name) = self.cached_user(user_id) {
            return name;
        }
        match self.lookup_user(user_id).await {
            Ok(name) => {
                if let Ok(mut users) = self.users.lock() {
                    users.insert(user_id.to_string(), name.clone());
                }
                name
            }
            Err(e) => {
                tracing::debug!(user = user_id, error = %e, "user lookup failed");
                format!("User {}", user_id)
            }
        }
    }

    fn cached_user(&self, user_id: &str) -> Option<String> {
        self.users.lock().ok()?.get(user_id).cloned()
    }

    async fn lookup_user(&self, user_id: &str) -> Result<String> {
        let resp: UserInfoResponse = self
            .client
            .get(format!("{}/users.info", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !resp.ok {
            bail!("users.info failed");
        }
        resp.user
            .and_then(|u| u.real_name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow!("user has no real_name"))
    }
}

/// `now - lookback` as Slack's `oldest` parameter: seconds with six
/// decimals, rounded down.
pub fn oldest_timestamp(now_micros: i64, lookback_minutes: u32) -> String {
    let oldest = now_micros - i64::from(lookback_minutes) * 60 * 1_000_000;
    format!(
        "{}.{:06}",
        oldest.div_euclid(1_000_000),
        oldest.rem_euclid(1_000_000)
    )
}

/// Actionable text for a Slack API error code.
pub fn slack_error_message(code: &str, channel: &str) -> String {
    let mut msg = format!("Slack API error: {}", code);
    match code {
        "not_in_channel" => msg.push_str(
            ". Bot is not in the channel. Go to the Slack channel and type '/invite @YourBotName'",
        ),
        "missing_scope" => msg.push_str(
            ". Missing required Slack API scope. Add 'channels:history' to your Bot Scopes.",
        ),
        "channel_not_found" => msg.push_str(&format!(
            ". Channel ID '{}' not found. Please verify the channel ID is correct.",
            channel
        )),
        _ => {}
    }
    msg
}

#[async_trait]
impl MessageSource for SlackSource {
    async fn fetch(&self, lookback_minutes: u32) -> Result<Vec<ChatMessage>> {
        let oldest = oldest_timestamp(chrono::Utc::now().timestamp_micros(), lookback_minutes);
        let limit = self.page_limit.to_string();

        let resp: HistoryResponse = self
            .client
            .get(format!("{}/conversations.history", self.base_url))
            .bearer_auth(&self.token)
            .query(&[
                ("channel", self.channel.as_str()),
                ("oldest", oldest.as_str()),
                ("inclusive", "true"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Slack request failed")?
            .error_for_status()
            .context("Slack request failed")?
            .json()
            .await
            .context("Invalid Slack response")?;

        if !resp.ok {
            let code = resp.error.as_deref().unwrap_or("unknown_error");
            tracing::warn!(channel = %self.channel, error = code, "conversations.history failed");
            bail!("{}", slack_error_message(code, &self.channel));
        }

        tracing::info!(
            channel = %self.channel,
            lookback_minutes,
            raw = resp.messages.len(),
            has_more = resp.has_more,
            "slack history fetched"
        );

        let mut out = Vec::with_capacity(resp.messages.len());
        for msg in resp.messages {
            // joins, bot posts, edits and other system events
            if msg.subtype.is_some() {
                continue;
            }
            let author = match &msg.user {
                Some(user) => self.user_name(user).await,
                None => "User unknown".to_string(),
            };
            out.push(ChatMessage {
                timestamp: msg.ts.unwrap_or_default(),
                author,
                text: msg.text.unwrap_or_default(),
                has_thread: msg.thread_ts.is_some(),
            });
        }
        Ok(out)
    }

    fn describe(&self) -> String {
        format!("Slack channel {}", self.channel)
    }
}

// ============ File ============

/// Messages from a JSON file. The lookback window is not applied.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MessageSource for FileSource {
    async fn fetch(&self, _lookback_minutes: u32) -> Result<Vec<ChatMessage>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read messages: {}", self.path.display()))?;
        let messages: Vec<ChatMessage> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid messages file: {}", self.path.display()))?;
        Ok(messages)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
