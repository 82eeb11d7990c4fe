use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::category::Category;

/// Core trait for news search providers.
#[async_trait::async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// Search the provider for one category. Articles come back in provider order.
    async fn fetch(&self, category: &Category) -> Result<Vec<Article>, FetchError>;
}

/// One search hit. Lives only for the duration of a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
}

impl Article {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Failure to fetch a single category. Never fatal to a cycle.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch news for {category}: {kind}")]
pub struct FetchError {
    pub category: Category,
    #[source]
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(category: &Category, kind: FetchErrorKind) -> Self {
        Self {
            category: category.clone(),
            kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchErrorKind {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider rejected credentials ({0})")]
    Auth(reqwest::StatusCode),

    #[error("provider returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),
}

pub mod scaleserp;
