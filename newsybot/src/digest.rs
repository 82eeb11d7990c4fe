use std::collections::HashMap;

use crate::category::{Categories, Category};
use crate::news::Article;

/// Per-category digest text for one cycle. Rebuilt from scratch every cycle.
///
/// Every configured category has an entry; a category without articles maps to the
/// empty string, so joins never need to distinguish "absent" from "no news".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestMap {
    entries: HashMap<Category, String>,
}

impl DigestMap {
    /// Render fetch results in provider order, one `title | link` entry per article,
    /// each entry followed by a blank line.
    pub fn build(categories: &Categories, results: &HashMap<Category, Vec<Article>>) -> Self {
        let entries = categories
            .iter()
            .map(|category| {
                let text = results
                    .get(category)
                    .map(|articles| render_articles(articles))
                    .unwrap_or_default();
                (category.clone(), text)
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, category: &Category) -> &str {
        self.entries.get(category).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of categories with at least one article.
    pub fn non_empty(&self) -> usize {
        self.entries.values().filter(|t| !t.is_empty()).count()
    }
}

fn render_articles(articles: &[Article]) -> String {
    let mut out = String::new();
    for article in articles {
        out.push_str(&article.title);
        out.push_str(" | ");
        out.push_str(&article.link);
        out.push_str("\n\n");
    }
    out
}

/// Concatenate the digests of `subscribed`, in the order given.
pub fn compose_payload(digest: &DigestMap, subscribed: &[Category]) -> String {
    subscribed.iter().map(|c| digest.get(c)).collect()
}
