//! User-facing command handlers. Each handler maps to exactly one store or health
//! operation and always produces a reply.

use std::time::Duration;
use tracing::error;

use crate::platform::TenantId;
use crate::subscriptions::{AddOutcome, RemoveOutcome, StoreError, SubscriptionStore};

/// Acknowledgement for a successful change.
pub const ACK: &str = "\u{2705}";

const STORE_DOWN: &str = "Subscriptions are temporarily unavailable, please try again later.";

pub async fn add_category(store: &SubscriptionStore, tenant: &TenantId, raw: &str) -> String {
    match store.add(tenant, raw).await {
        Ok(AddOutcome::Inserted) => ACK.to_string(),
        Ok(AddOutcome::AlreadySubscribed) => {
            "You are already subscribed to this category.".to_string()
        }
        Err(StoreError::InvalidCategory(e)) => {
            format!("Invalid category. Valid categories: `{}`.", e.valid)
        }
        Err(StoreError::Unavailable(e)) => {
            error!(tenant = %tenant, "add category failed: {}", e);
            STORE_DOWN.to_string()
        }
    }
}

pub async fn remove_category(store: &SubscriptionStore, tenant: &TenantId, raw: &str) -> String {
    match store.remove(tenant, raw).await {
        Ok(RemoveOutcome::Removed) => ACK.to_string(),
        Ok(RemoveOutcome::NotSubscribed) => "You were not subscribed to this category.".to_string(),
        Err(StoreError::InvalidCategory(e)) => {
            format!("Invalid category. Valid categories: `{}`.", e.valid)
        }
        Err(StoreError::Unavailable(e)) => {
            error!(tenant = %tenant, "remove category failed: {}", e);
            STORE_DOWN.to_string()
        }
    }
}

pub async fn list_categories(store: &SubscriptionStore, tenant: &TenantId) -> String {
    match store.list_categories(tenant).await {
        Ok(categories) if categories.is_empty() => format!(
            "You are not subscribed to any category. Valid categories: `{}`.",
            store.categories().joined()
        ),
        Ok(categories) => {
            let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
            format!("Subscribed categories: `{}`.", names.join(", "))
        }
        Err(e) => {
            error!(tenant = %tenant, "list categories failed: {}", e);
            STORE_DOWN.to_string()
        }
    }
}

/// Liveness reply with the measured round trip in milliseconds.
pub fn pong(round_trip: Duration) -> String {
    format!("Pong! `{:.2}ms`", round_trip.as_secs_f64() * 1000.0)
}
