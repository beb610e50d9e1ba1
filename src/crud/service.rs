use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Identity;
use crate::errors::AppResult;

pub type Filters = BTreeMap<String, String>;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// One page request against a collection. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    pub page: u32,
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default)]
    pub filters: Filters,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            sort: None,
            filters: Filters::new(),
        }
    }
}

impl SearchQuery {
    pub fn page(mut self, page: u32, size: u32) -> Self {
        self.page = page.max(1);
        self.size = size.max(1);
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Remote access to one entity collection, keyed by its identity fields.
#[async_trait]
pub trait RemoteService<T: Send + Sync>: Send + Sync {
    fn entity_name(&self) -> &str;

    fn identity_fields(&self) -> &[&'static str];

    async fn create(&self, item: &T) -> AppResult<T>;

    async fn update(&self, key: &Identity, item: &T) -> AppResult<T>;

    async fn remove(&self, key: &Identity) -> AppResult<()>;

    async fn search(&self, query: &SearchQuery) -> AppResult<Page<T>>;

    /// Fails with `AppError::NotFound` when no record matches.
    async fn get_by_id(&self, key: &Identity) -> AppResult<T>;

    async fn count(&self, filters: &Filters) -> AppResult<u64>;
}
