use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A news topic keyword, used both as the search query and as the subscription key.
/// Always stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category(String);

impl Category {
    /// Normalise raw user or config input. Does not check membership.
    pub fn normalized(raw: &str) -> Self {
        Category(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid category '{given}'. Valid categories: `{valid}`.")]
pub struct InvalidCategory {
    pub given: String,
    pub valid: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CategoriesError {
    #[error("at least one news category must be configured")]
    Empty,
    #[error("category '{0}' is configured more than once")]
    Duplicate(Category),
    #[error("blank category name in configuration")]
    Blank,
}

/// The fixed category enumeration, loaded once at startup and shared read-only.
/// Configuration order is the canonical order used everywhere output is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Categories {
    ordered: Vec<Category>,
}

impl Categories {
    pub fn new<I, S>(raw: I) -> Result<Arc<Self>, CategoriesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ordered: Vec<Category> = Vec::new();
        for item in raw {
            let category = Category::normalized(item.as_ref());
            if category.as_str().is_empty() {
                return Err(CategoriesError::Blank);
            }
            if ordered.contains(&category) {
                return Err(CategoriesError::Duplicate(category));
            }
            ordered.push(category);
        }
        if ordered.is_empty() {
            return Err(CategoriesError::Empty);
        }
        Ok(Arc::new(Self { ordered }))
    }

    /// Resolve user input (any case) to a known category.
    pub fn parse(&self, raw: &str) -> Result<Category, InvalidCategory> {
        let candidate = Category::normalized(raw);
        if self.ordered.contains(&candidate) {
            Ok(candidate)
        } else {
            Err(InvalidCategory {
                given: candidate.0,
                valid: self.joined(),
            })
        }
    }

    /// Position in the canonical order, `None` for unknown categories.
    pub fn position(&self, category: &Category) -> Option<usize> {
        self.ordered.iter().position(|c| c == category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.ordered.iter()
    }

    /// Comma separated list, as shown to users.
    pub fn joined(&self) -> String {
        self.ordered
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
