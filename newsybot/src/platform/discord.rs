use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{Channel, ChatPlatform, PlatformError, TenantId};

/// Discord channel type for a guild text channel.
const GUILD_TEXT: u8 = 0;
/// Announcement channels accept messages like text channels.
const GUILD_ANNOUNCEMENT: u8 = 5;
/// Page size of `GET /users/@me/guilds`.
const GUILD_PAGE: usize = 200;

/// Discord REST client authenticated as a bot.
pub struct DiscordClient {
    base_url: String,
    token: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// The bot's own account, as returned by `GET /users/@me`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}

#[derive(Deserialize)]
struct PartialGuild {
    id: String,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    name: Option<String>,
}

impl DiscordClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .timeout(self.timeout)
            .header("Authorization", format!("Bot {}", self.token))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .timeout(self.timeout)
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Identify the bot. Succeeds once the token is accepted and the API is reachable.
    pub async fn current_user(&self) -> Result<CurrentUser, PlatformError> {
        let response = check(self.get("/users/@me").send().await?).await?;
        decode(response).await
    }

    /// Wait until the platform accepts the bot, retrying transient failures with
    /// exponential backoff (1s, 2s, 4s, ... capped at 60s). Rejected credentials are not retried.
    pub async fn wait_until_ready(&self, max_attempts: u32) -> Result<CurrentUser, PlatformError> {
        let mut attempt = 1;
        loop {
            match self.current_user().await {
                Ok(user) => {
                    info!(user = %user.username, id = %user.id, "connected to Discord");
                    return Ok(user);
                }
                Err(PlatformError::Status { status, body }) if status == 401 => {
                    return Err(PlatformError::Status { status, body });
                }
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let backoff = Duration::from_secs(2u64.pow((attempt - 1).min(6)).min(60));
                    info!(
                        "Discord not reachable yet (attempt {}/{}): {}; retrying after {:?}",
                        attempt, max_attempts, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatPlatform for DiscordClient {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, PlatformError> {
        let mut tenants = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut request = self
                .get("/users/@me/guilds")
                .query(&[("limit", GUILD_PAGE.to_string())]);
            if let Some(after) = &after {
                request = request.query(&[("after", after)]);
            }
            let page: Vec<PartialGuild> = decode(check(request.send().await?).await?).await?;
            let page_len = page.len();
            after = page.last().map(|g| g.id.clone());
            tenants.extend(page.into_iter().map(|g| TenantId::new(g.id)));

            if page_len < GUILD_PAGE {
                break;
            }
        }

        debug!(count = tenants.len(), "listed guilds");
        Ok(tenants)
    }

    async fn list_channels(&self, tenant: &TenantId) -> Result<Vec<Channel>, PlatformError> {
        let path = format!("/guilds/{}/channels", tenant);
        let raw: Vec<RawChannel> = decode(check(self.get(&path).send().await?).await?).await?;

        Ok(raw
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT || c.kind == GUILD_ANNOUNCEMENT)
            .map(|c| Channel {
                id: c.id,
                name: c.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_channel(
        &self,
        tenant: &TenantId,
        name: &str,
    ) -> Result<Channel, PlatformError> {
        let path = format!("/guilds/{}/channels", tenant);
        let response = self
            .post(&path)
            .json(&json!({ "name": name, "type": GUILD_TEXT }))
            .send()
            .await?;
        let created: RawChannel = decode(check(response).await?).await?;

        Ok(Channel {
            id: created.id,
            name: created.name.unwrap_or_else(|| name.to_string()),
        })
    }

    async fn send_file(
        &self,
        channel: &Channel,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), PlatformError> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/plain; charset=utf-8")?;
        let form = Form::new().part("files[0]", part);

        let path = format!("/channels/{}/messages", channel.id);
        check(self.post(&path).multipart(form).send().await?).await?;
        Ok(())
    }
}

/// Map non-success statuses to `PlatformError`; 403 becomes `PermissionDenied`.
async fn check(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::FORBIDDEN {
        return Err(PlatformError::PermissionDenied(body));
    }
    Err(PlatformError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| PlatformError::Decode(e.to_string()))
}
