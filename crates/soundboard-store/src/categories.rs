//! One-shot memoized lookup of the game-sound categories.
//!
//! The first successful listing that carries a `results` array is kept for
//! the life of the store and never refetched. Population is single-flight:
//! concurrent first callers wait on the one in-flight request instead of
//! each issuing their own. A failed request or a body without `results`
//! leaves the cache empty, and the next call tries again.

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::api::ApiClient;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Snapshot of the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryCache {
    /// `None` until the first listing with `results` lands.
    pub categories: Option<Vec<Value>>,
}

/// Why a fetch did not populate the cache.
enum Unpopulated {
    NoResults,
    Failed(StoreError),
}

/// Memoized category listing.
pub struct CategoryStore {
    api: ApiClient,
    path: String,
    limit: u32,
    categories: OnceCell<Vec<Value>>,
}

impl CategoryStore {
    /// Create an empty cache reading from `config.categories_path`.
    pub fn new(api: ApiClient, config: &StoreConfig) -> Self {
        Self {
            api,
            path: config.categories_path.clone(),
            limit: config.categories_limit,
            categories: OnceCell::new(),
        }
    }

    /// Current cache contents.
    pub fn state(&self) -> CategoryCache {
        CategoryCache {
            categories: self.categories.get().cloned(),
        }
    }

    /// Return the categories, fetching them if the cache is empty.
    ///
    /// Yields an empty vector when the service answered without `results`.
    ///
    /// # Errors
    ///
    /// Transport failures and non-JSON bodies propagate; the cache stays
    /// empty in that case.
    pub async fn retrieve_categories(&self) -> Result<Vec<Value>> {
        if let Some(categories) = self.categories.get() {
            tracing::debug!(count = categories.len(), "category cache hit");
            return Ok(categories.clone());
        }

        match self.categories.get_or_try_init(|| self.fetch()).await {
            Ok(categories) => Ok(categories.clone()),
            Err(Unpopulated::NoResults) => Ok(Vec::new()),
            Err(Unpopulated::Failed(e)) => Err(e),
        }
    }

    async fn fetch(&self) -> std::result::Result<Vec<Value>, Unpopulated> {
        let response = self
            .api
            .fetch_api_json(&self.path, [("limit", self.limit.to_string())])
            .await
            .map_err(Unpopulated::Failed)?;
        let data = response.json().map_err(Unpopulated::Failed)?;

        match data {
            Value::Object(mut body) => match body.remove("results") {
                Some(Value::Array(results)) => {
                    tracing::info!(count = results.len(), "category cache populated");
                    Ok(results)
                }
                Some(Value::Null) | None => {
                    tracing::debug!(status = response.status, "category listing had no results");
                    Err(Unpopulated::NoResults)
                }
                Some(other) => {
                    tracing::warn!(kind = json_kind(&other), "category results is not an array");
                    Err(Unpopulated::NoResults)
                }
            },
            other => {
                tracing::warn!(kind = json_kind(&other), "category listing is not an object");
                Err(Unpopulated::NoResults)
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
