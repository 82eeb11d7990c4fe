//! Fetch the configured categories once and print the resulting digests.
//! Usage: test_search [CONFIG] [CATEGORY...]

use common::Config;
use newsybot::news::scaleserp::ScaleSerpFetcher;
use newsybot::news::ArticleFetcher;
use newsybot::{Categories, DigestMap};
use std::collections::HashMap;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.default.toml"));
    let config = Config::from_file(&config_path).await?;

    let requested: Vec<String> = args.collect();
    let categories = if requested.is_empty() {
        Categories::new(&config.news.categories)?
    } else {
        Categories::new(&requested)?
    };

    let api_key = Config::secret_from_env(config.news.api_key_env.as_deref(), "News search API key")?;
    let fetcher = ScaleSerpFetcher::new(config.news.api_url(), api_key).with_defaults(
        config.news.language.clone().unwrap_or_else(|| "en".to_string()),
        config.news.search_type.clone().unwrap_or_else(|| "news".to_string()),
        config.news.timeout(),
    );

    let mut results = HashMap::new();
    for category in categories.iter() {
        println!("\n{}", "=".repeat(60));
        println!("Category: {}", category);
        println!("{}", "=".repeat(60));

        match fetcher.fetch(category).await {
            Ok(articles) => {
                println!("✓ {} articles", articles.len());
                results.insert(category.clone(), articles);
            }
            Err(e) => println!("✗ Failed: {}", e),
        }
    }

    let digest = DigestMap::build(&categories, &results);
    for category in categories.iter() {
        println!("\n--- {} ---\n{}", category, digest.get(category));
    }

    Ok(())
}
