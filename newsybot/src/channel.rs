use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::platform::{with_timeout, Channel, ChatPlatform, PlatformError, TenantId};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("not allowed to create channel '{name}': {reason}")]
    PermissionDenied { name: String, reason: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Finds a tenant's delivery channel by name, creating it when missing.
pub struct ChannelResolver {
    platform: Arc<dyn ChatPlatform>,
    channel_name: String,
    timeout: Duration,
}

impl ChannelResolver {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        channel_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            platform,
            channel_name: channel_name.into(),
            timeout,
        }
    }

    /// Reuse the first existing channel whose name matches (case-insensitive); otherwise create one.
    /// Nothing is cached, so a denied creation is simply attempted again next cycle.
    pub async fn resolve(&self, tenant: &TenantId) -> Result<Channel, ResolveError> {
        let channels = with_timeout(self.timeout, self.platform.list_channels(tenant)).await?;
        let wanted = self.channel_name.to_lowercase();
        if let Some(existing) = channels.into_iter().find(|c| c.name.to_lowercase() == wanted) {
            return Ok(existing);
        }

        match with_timeout(
            self.timeout,
            self.platform.create_channel(tenant, &self.channel_name),
        )
        .await
        {
            Ok(channel) => {
                info!(tenant = %tenant, channel = %channel.id, "created delivery channel");
                Ok(channel)
            }
            Err(PlatformError::PermissionDenied(reason)) => Err(ResolveError::PermissionDenied {
                name: self.channel_name.clone(),
                reason,
            }),
            Err(e) => Err(e.into()),
        }
    }
}
