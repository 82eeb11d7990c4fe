use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::category::{Categories, Category};
use crate::digest::DigestMap;
use crate::distributor::{DistributionReport, Distributor};
use crate::news::{Article, ArticleFetcher, FetchError, FetchErrorKind};
use crate::platform::PlatformError;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("could not enumerate tenants: {0}")]
    Tenants(#[from] PlatformError),
}

/// Summary of one fetch, build, distribute pass.
#[derive(Debug)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Categories that degraded to an empty digest this cycle.
    pub fetch_failures: Vec<FetchError>,
    pub categories_with_news: usize,
    pub distribution: DistributionReport,
}

/// Everything needed to run a cycle. Shared by the scheduler and the one-shot command.
pub struct NewsCycle {
    categories: Arc<Categories>,
    fetcher: Arc<dyn ArticleFetcher>,
    distributor: Distributor,
    fetch_workers: usize,
    fetch_timeout: Duration,
}

impl NewsCycle {
    pub fn new(
        categories: Arc<Categories>,
        fetcher: Arc<dyn ArticleFetcher>,
        distributor: Distributor,
    ) -> Self {
        Self {
            categories,
            fetcher,
            distributor,
            fetch_workers: 4,
            fetch_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_defaults(mut self, fetch_workers: usize, fetch_timeout: Duration) -> Self {
        self.fetch_workers = fetch_workers.max(1);
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Fetch every configured category with bounded concurrency. A failed category yields an
    /// empty article list plus an entry in the returned error list; nothing is retried.
    pub async fn fetch_all(&self) -> (HashMap<Category, Vec<Article>>, Vec<FetchError>) {
        let fetched: Vec<(Category, Result<Vec<Article>, FetchError>)> =
            stream::iter(self.categories.iter().cloned())
                .map(|category| async move {
                    let result =
                        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&category))
                            .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(FetchError::new(
                                &category,
                                FetchErrorKind::Timeout(self.fetch_timeout),
                            )),
                        };
                    (category, result)
                })
                .buffer_unordered(self.fetch_workers)
                .collect()
                .await;

        let mut results = HashMap::with_capacity(fetched.len());
        let mut failures = Vec::new();
        for (category, result) in fetched {
            match result {
                Ok(articles) => {
                    info!(category = %category, count = articles.len(), "fetched articles");
                    results.insert(category, articles);
                }
                Err(e) => {
                    warn!(category = %category, "{}; using an empty digest", e);
                    results.insert(category, Vec::new());
                    failures.push(e);
                }
            }
        }
        (results, failures)
    }

    /// Run one complete cycle.
    pub async fn run_once(&self) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        info!(categories = %self.categories.joined(), "cycle started");

        let (results, fetch_failures) = self.fetch_all().await;
        let digest = DigestMap::build(&self.categories, &results);
        drop(results);

        let distribution = self.distributor.distribute(&digest).await?;

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            categories_with_news: digest.non_empty(),
            fetch_failures,
            distribution,
        };
        info!(
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            fetch_failures = report.fetch_failures.len(),
            delivered = report.distribution.delivered(),
            skipped = report.distribution.skipped(),
            failed = report.distribution.failed(),
            "cycle finished"
        );
        Ok(report)
    }
}
