#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use newsybot::news::{Article, ArticleFetcher, FetchError, FetchErrorKind};
use newsybot::platform::{Channel, ChatPlatform, PlatformError, TenantId};
use newsybot::{Categories, Category, SubscriptionStore};

/// Store over a fresh, migrated in-memory database.
pub async fn memory_store(categories: &[&str]) -> (SubscriptionStore, sqlx::SqlitePool) {
    let pool = common::init_memory_pool().await.expect("memory pool");
    let cats = Categories::new(categories).expect("categories");
    (SubscriptionStore::new(pool.clone(), cats), pool)
}

pub async fn row_count(pool: &sqlx::SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
        .fetch_one(pool)
        .await
        .expect("count rows")
}

/// A file handed to `send_file`.
#[derive(Debug, Clone)]
pub struct SentFile {
    pub tenant: TenantId,
    pub channel: Channel,
    pub filename: String,
    pub body: String,
}

/// In-memory chat platform that records every mutating call.
#[derive(Default)]
pub struct FakePlatform {
    tenants: Vec<TenantId>,
    channels: Mutex<HashMap<TenantId, Vec<Channel>>>,
    deny_create: HashSet<TenantId>,
    fail_send: HashSet<TenantId>,
    hang_create: HashSet<TenantId>,
    hang_send: HashSet<TenantId>,
    fail_list_tenants: bool,
    next_id: AtomicUsize,
    pub created: Mutex<Vec<(TenantId, String)>>,
    pub sent: Mutex<Vec<SentFile>>,
}

impl FakePlatform {
    pub fn with_tenants(ids: &[&str]) -> Self {
        Self {
            tenants: ids.iter().map(|id| TenantId::new(*id)).collect(),
            ..Default::default()
        }
    }

    pub fn with_channel(self, tenant: &str, id: &str, name: &str) -> Self {
        self.channels
            .lock()
            .unwrap()
            .entry(TenantId::new(tenant))
            .or_default()
            .push(Channel {
                id: id.to_string(),
                name: name.to_string(),
            });
        self
    }

    pub fn denying_create(mut self, tenant: &str) -> Self {
        self.deny_create.insert(TenantId::new(tenant));
        self
    }

    pub fn failing_send(mut self, tenant: &str) -> Self {
        self.fail_send.insert(TenantId::new(tenant));
        self
    }

    /// `create_channel` for this tenant never answers.
    pub fn hanging_create(mut self, tenant: &str) -> Self {
        self.hang_create.insert(TenantId::new(tenant));
        self
    }

    /// `send_file` for this tenant never answers.
    pub fn hanging_send(mut self, tenant: &str) -> Self {
        self.hang_send.insert(TenantId::new(tenant));
        self
    }

    pub fn failing_tenant_listing(mut self) -> Self {
        self.fail_list_tenants = true;
        self
    }

    pub fn created(&self) -> Vec<(TenantId, String)> {
        self.created.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<SentFile> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, tenant: &str) -> Vec<SentFile> {
        self.sent()
            .into_iter()
            .filter(|s| s.tenant.as_str() == tenant)
            .collect()
    }

    fn owner_of(&self, channel: &Channel) -> Option<TenantId> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|(_, chans)| chans.iter().any(|c| c.id == channel.id))
            .map(|(t, _)| t.clone())
    }
}

#[async_trait::async_trait]
impl ChatPlatform for FakePlatform {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, PlatformError> {
        if self.fail_list_tenants {
            return Err(PlatformError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(self.tenants.clone())
    }

    async fn list_channels(&self, tenant: &TenantId) -> Result<Vec<Channel>, PlatformError> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .get(tenant)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_channel(
        &self,
        tenant: &TenantId,
        name: &str,
    ) -> Result<Channel, PlatformError> {
        self.created
            .lock()
            .unwrap()
            .push((tenant.clone(), name.to_string()));
        if self.hang_create.contains(tenant) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.deny_create.contains(tenant) {
            return Err(PlatformError::PermissionDenied(
                "Missing Permissions".to_string(),
            ));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let channel = Channel {
            id: format!("created-{}-{}", tenant, n),
            name: name.to_string(),
        };
        self.channels
            .lock()
            .unwrap()
            .entry(tenant.clone())
            .or_default()
            .push(channel.clone());
        Ok(channel)
    }

    async fn send_file(
        &self,
        channel: &Channel,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<(), PlatformError> {
        let tenant = self
            .owner_of(channel)
            .ok_or_else(|| PlatformError::Decode(format!("unknown channel {}", channel.id)))?;
        if self.hang_send.contains(&tenant) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_send.contains(&tenant) {
            return Err(PlatformError::Status {
                status: 500,
                body: "upload failed".to_string(),
            });
        }
        self.sent.lock().unwrap().push(SentFile {
            tenant,
            channel: channel.clone(),
            filename: filename.to_string(),
            body: String::from_utf8(bytes).expect("utf-8 payload"),
        });
        Ok(())
    }
}

/// Scripted behaviour for one category.
#[derive(Clone)]
pub enum Script {
    Articles(Vec<Article>),
    Fail,
    Hang,
}

/// Fetcher returning scripted results; unknown categories yield no articles.
#[derive(Default)]
pub struct FakeFetcher {
    scripts: HashMap<Category, Script>,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn script(mut self, category: &str, script: Script) -> Self {
        self.scripts.insert(Category::normalized(category), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ArticleFetcher for FakeFetcher {
    async fn fetch(&self, category: &Category) -> Result<Vec<Article>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(category).cloned() {
            Some(Script::Articles(articles)) => Ok(articles),
            Some(Script::Fail) => Err(FetchError::new(
                category,
                FetchErrorKind::Malformed("response has no news_results field".to_string()),
            )),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }
}

pub fn tenant(id: &str) -> TenantId {
    TenantId::new(id)
}

pub fn shared(platform: FakePlatform) -> Arc<FakePlatform> {
    Arc::new(platform)
}
