use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Narrow view of the chat platform used by the distribution step.
#[async_trait::async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Every tenant (server/guild) the bot is currently a member of.
    async fn list_tenants(&self) -> Result<Vec<TenantId>, PlatformError>;

    /// Text channels of one tenant.
    async fn list_channels(&self, tenant: &TenantId) -> Result<Vec<Channel>, PlatformError>;

    /// Create a text channel. Missing permissions surface as `PlatformError::PermissionDenied`.
    async fn create_channel(&self, tenant: &TenantId, name: &str)
        -> Result<Channel, PlatformError>;

    /// Post `bytes` as a single file attachment.
    async fn send_file(
        &self,
        channel: &Channel,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), PlatformError>;
}

/// Opaque chat-server identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a text channel inside a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("missing permission: {0}")]
    PermissionDenied(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Run a platform call under `limit`, mapping expiry to `PlatformError::Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, PlatformError>
where
    F: std::future::Future<Output = Result<T, PlatformError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| PlatformError::Timeout(limit))?
}

pub mod discord;
