use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::service::{Page, SearchQuery};

#[derive(Debug, Clone)]
struct Entry<T> {
    page: Page<T>,
    fetched_at: Instant,
    invalidated: bool,
}

/// Pages fetched for one collection, keyed by query.
///
/// The page last stored or selected is the "current" page: the one shown to
/// the user and the one optimistic updates are applied to.
#[derive(Debug, Clone)]
pub struct ListCache<T> {
    entries: HashMap<SearchQuery, Entry<T>>,
    current: Option<SearchQuery>,
    stale_time: Duration,
}

impl<T: Clone> ListCache<T> {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            current: None,
            stale_time,
        }
    }

    fn is_fresh(&self, entry: &Entry<T>) -> bool {
        !entry.invalidated && entry.fetched_at.elapsed() < self.stale_time
    }

    /// Cached page for `query` if it is still within the stale window.
    pub fn fresh(&self, query: &SearchQuery) -> Option<Page<T>> {
        self.entries
            .get(query)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.page.clone())
    }

    pub fn store(&mut self, query: SearchQuery, page: Page<T>) {
        self.entries.insert(
            query.clone(),
            Entry {
                page,
                fetched_at: Instant::now(),
                invalidated: false,
            },
        );
        self.current = Some(query);
    }

    pub fn select(&mut self, query: &SearchQuery) {
        if self.entries.contains_key(query) {
            self.current = Some(query.clone());
        }
    }

    pub fn current_query(&self) -> Option<&SearchQuery> {
        self.current.as_ref()
    }

    pub fn current_page(&self) -> Option<&Page<T>> {
        self.current.as_ref().and_then(|q| self.entries.get(q)).map(|e| &e.page)
    }

    /// Whether the current page should be fetched again. Nothing shown means
    /// nothing to refresh.
    pub fn is_current_stale(&self) -> bool {
        self.current
            .as_ref()
            .and_then(|q| self.entries.get(q))
            .is_some_and(|entry| !self.is_fresh(entry))
    }

    /// Mark every page stale; data stays visible until refetched.
    pub fn invalidate(&mut self) {
        for entry in self.entries.values_mut() {
            entry.invalidated = true;
        }
    }

    /// Apply `change` to the current page, returning what it yields.
    pub fn update_current<F, R>(&mut self, change: F) -> Option<R>
    where
        F: FnOnce(&mut Page<T>) -> R,
    {
        let query = self.current.as_ref()?;
        let entry = self.entries.get_mut(query)?;
        Some(change(&mut entry.page))
    }
}
