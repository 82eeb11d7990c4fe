use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::channel::{ChannelResolver, ResolveError};
use crate::digest::{compose_payload, DigestMap};
use crate::platform::{with_timeout, ChatPlatform, PlatformError, TenantId};
use crate::subscriptions::SubscriptionStore;

/// What happened to one tenant during a distribution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantOutcome {
    Delivered { bytes: usize },
    /// No subscriptions: nothing is sent and no channel is touched.
    NoSubscriptions,
    /// Subscribed, but every subscribed digest is empty this cycle.
    NothingToSend,
    /// Channel creation or posting was refused; retried next cycle.
    PermissionDenied,
    Failed(String),
}

#[derive(Debug, Default, Clone)]
pub struct DistributionReport {
    /// One entry per tenant, sorted by tenant id.
    pub outcomes: Vec<(TenantId, TenantOutcome)>,
}

impl DistributionReport {
    pub fn outcome(&self, tenant: &TenantId) -> Option<&TenantOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t == tenant)
            .map(|(_, o)| o)
    }

    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, TenantOutcome::Delivered { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                TenantOutcome::NoSubscriptions
                    | TenantOutcome::NothingToSend
                    | TenantOutcome::PermissionDenied
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TenantOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&TenantOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Fans a cycle's digest out to every tenant, one attachment per subscribed tenant.
pub struct Distributor {
    platform: Arc<dyn ChatPlatform>,
    store: SubscriptionStore,
    resolver: ChannelResolver,
    attachment_name: String,
    workers: usize,
    timeout: Duration,
}

impl Distributor {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: SubscriptionStore,
        channel_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let resolver = ChannelResolver::new(platform.clone(), channel_name, timeout);
        Self {
            platform,
            store,
            resolver,
            attachment_name: "news.txt".to_string(),
            workers: 4,
            timeout,
        }
    }

    pub fn with_defaults(mut self, attachment_name: impl Into<String>, workers: usize) -> Self {
        self.attachment_name = attachment_name.into();
        self.workers = workers.max(1);
        self
    }

    /// Deliver to every tenant the bot belongs to. Only failing to enumerate tenants is an
    /// error; per-tenant failures are recorded in the report.
    pub async fn distribute(&self, digest: &DigestMap) -> Result<DistributionReport, PlatformError> {
        let tenants = with_timeout(self.timeout, self.platform.list_tenants()).await?;
        info!(tenants = tenants.len(), "distributing digest");

        let mut outcomes: Vec<(TenantId, TenantOutcome)> = stream::iter(tenants)
            .map(|tenant| async move {
                let outcome = self.deliver_to(&tenant, digest).await;
                (tenant, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(DistributionReport { outcomes })
    }

    pub async fn deliver_to(&self, tenant: &TenantId, digest: &DigestMap) -> TenantOutcome {
        let categories = match self.store.list_categories(tenant).await {
            Ok(c) => c,
            Err(e) => {
                error!(tenant = %tenant, "skipping tenant, subscriptions unavailable: {}", e);
                return TenantOutcome::Failed(e.to_string());
            }
        };
        if categories.is_empty() {
            return TenantOutcome::NoSubscriptions;
        }

        let payload = compose_payload(digest, &categories);
        if payload.is_empty() {
            info!(tenant = %tenant, "no news for subscribed categories this cycle");
            return TenantOutcome::NothingToSend;
        }

        let channel = match self.resolver.resolve(tenant).await {
            Ok(c) => c,
            Err(ResolveError::PermissionDenied { name, reason }) => {
                warn!(tenant = %tenant, channel = %name, "Insufficient permissions: {}", reason);
                return TenantOutcome::PermissionDenied;
            }
            Err(e) => {
                error!(tenant = %tenant, "failed to resolve delivery channel: {}", e);
                return TenantOutcome::Failed(e.to_string());
            }
        };

        let bytes = payload.into_bytes();
        let size = bytes.len();
        match with_timeout(
            self.timeout,
            self.platform.send_file(&channel, bytes, &self.attachment_name),
        )
        .await
        {
            Ok(()) => {
                info!(tenant = %tenant, channel = %channel.id, bytes = size, "digest delivered");
                TenantOutcome::Delivered { bytes: size }
            }
            Err(PlatformError::PermissionDenied(reason)) => {
                warn!(tenant = %tenant, channel = %channel.id, "not allowed to post: {}", reason);
                TenantOutcome::PermissionDenied
            }
            Err(e) => {
                error!(tenant = %tenant, channel = %channel.id, "delivery failed: {}", e);
                TenantOutcome::Failed(e.to_string())
            }
        }
    }
}
