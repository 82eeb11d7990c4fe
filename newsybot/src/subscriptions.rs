use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::category::{Categories, Category, InvalidCategory};
use crate::platform::TenantId;

/// Result of a subscribe request. Both variants are normal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    AlreadySubscribed,
}

/// Result of an unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotSubscribed,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    InvalidCategory(#[from] InvalidCategory),

    #[error("subscription store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Persistent tenant -> categories mapping.
///
/// Rows are keyed by `(tenant_id, keyword)`; uniqueness is enforced by the table's primary key.
/// Every call checks a connection out of the pool for its own duration only.
#[derive(Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
    categories: Arc<Categories>,
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool, categories: Arc<Categories>) -> Self {
        Self { pool, categories }
    }

    pub fn categories(&self) -> &Arc<Categories> {
        &self.categories
    }

    /// Subscribed categories in canonical (configuration) order. Empty when the tenant
    /// has no rows.
    pub async fn list_categories(&self, tenant: &TenantId) -> Result<Vec<Category>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let keywords: Vec<String> =
            sqlx::query_scalar("SELECT keyword FROM subscriptions WHERE tenant_id = ?")
                .bind(tenant.as_str())
                .fetch_all(&mut *conn)
                .await?;
        drop(conn);

        let mut known: Vec<(usize, Category)> = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let category = Category::normalized(&keyword);
            match self.categories.position(&category) {
                Some(pos) => known.push((pos, category)),
                None => warn!(
                    tenant = %tenant,
                    keyword = %keyword,
                    "ignoring subscription to a category that is no longer configured"
                ),
            }
        }
        known.sort_by_key(|(pos, _)| *pos);

        Ok(known.into_iter().map(|(_, c)| c).collect())
    }

    /// Subscribe `tenant` to the category named by `raw` (any case).
    /// Unknown categories are rejected before the database is touched.
    pub async fn add(&self, tenant: &TenantId, raw: &str) -> Result<AddOutcome, StoreError> {
        let category = self.categories.parse(raw)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO subscriptions (tenant_id, keyword) VALUES (?, ?) \
             ON CONFLICT (tenant_id, keyword) DO NOTHING",
        )
        .bind(tenant.as_str())
        .bind(category.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            debug!(tenant = %tenant, category = %category, "already subscribed");
            Ok(AddOutcome::AlreadySubscribed)
        } else {
            info!(tenant = %tenant, category = %category, "subscription added");
            Ok(AddOutcome::Inserted)
        }
    }

    /// Unsubscribe `tenant` from `raw` (any case). Keywords that are no longer configured
    /// can still be removed.
    pub async fn remove(&self, tenant: &TenantId, raw: &str) -> Result<RemoveOutcome, StoreError> {
        let category = Category::normalized(raw);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM subscriptions WHERE tenant_id = ? AND keyword = ?")
            .bind(tenant.as_str())
            .bind(category.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            debug!(tenant = %tenant, category = %category, "nothing to unsubscribe");
            Ok(RemoveOutcome::NotSubscribed)
        } else {
            info!(tenant = %tenant, category = %category, "subscription removed");
            Ok(RemoveOutcome::Removed)
        }
    }
}
