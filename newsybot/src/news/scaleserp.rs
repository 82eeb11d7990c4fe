use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Article, ArticleFetcher, FetchError, FetchErrorKind};
use crate::category::Category;

/// News search over the Scale SERP HTTP API (`search_type=news`).
pub struct ScaleSerpFetcher {
    base_url: String,
    api_key: String,
    language: String,
    search_type: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ScaleSerpFetcher {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            language: "en".to_string(),
            search_type: "news".to_string(),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(
        mut self,
        language: impl Into<String>,
        search_type: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        self.language = language.into();
        self.search_type = search_type.into();
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    news_results: Option<Vec<NewsResult>>,
    request_info: Option<RequestInfo>,
}

#[derive(Deserialize)]
struct NewsResult {
    title: Option<String>,
    link: Option<String>,
}

#[derive(Deserialize)]
struct RequestInfo {
    message: Option<String>,
}

#[async_trait::async_trait]
impl ArticleFetcher for ScaleSerpFetcher {
    async fn fetch(&self, category: &Category) -> Result<Vec<Article>, FetchError> {
        let fail = |kind| FetchError::new(category, kind);

        let response = self
            .client
            .get(&self.base_url)
            .timeout(self.timeout)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("search_type", self.search_type.as_str()),
                ("hl", self.language.as_str()),
                ("q", category.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fail(FetchErrorKind::Timeout(self.timeout))
                } else {
                    fail(FetchErrorKind::Network(e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(fail(FetchErrorKind::Auth(status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fail(FetchErrorKind::Status { status, body }));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fail(FetchErrorKind::Network(e)))?;
        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| fail(FetchErrorKind::Malformed(e.to_string())))?;

        let Some(results) = parsed.news_results else {
            let detail = parsed
                .request_info
                .and_then(|info| info.message)
                .unwrap_or_else(|| "response has no news_results field".to_string());
            return Err(fail(FetchErrorKind::Malformed(detail)));
        };

        let total = results.len();
        let articles: Vec<Article> = results
            .into_iter()
            .filter_map(|r| match (r.title, r.link) {
                (Some(title), Some(link)) => Some(Article { title, link }),
                _ => None,
            })
            .collect();

        if articles.len() < total {
            warn!(
                category = %category,
                skipped = total - articles.len(),
                "news results without title or link were dropped"
            );
        }
        debug!(category = %category, count = articles.len(), "fetched news results");

        Ok(articles)
    }
}
