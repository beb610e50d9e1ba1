#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use admin_console::crud::{Entity, Filters, Identity, Navigation, Navigator, Notifier, Page, RemoteService, SearchQuery};
use admin_console::models::Position;
use admin_console::{AppError, AppResult};

/// In-memory collection with failure and latency injection.
pub struct MemoryService<T> {
    pub rows: Mutex<Vec<T>>,
    pub search_calls: AtomicU32,
    pub mutation_calls: AtomicU32,
    pub failing_searches: AtomicU32,
    pub fail_mutations: AtomicBool,
    pub search_delay: Mutex<Duration>,
    /// Records (by `Identity` display) whose mutations fail after a delay.
    pub slow_failures: Mutex<HashMap<String, Duration>>,
}

impl<T: Entity> MemoryService<T> {
    pub fn new(rows: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            search_calls: AtomicU32::new(0),
            mutation_calls: AtomicU32::new(0),
            failing_searches: AtomicU32::new(0),
            fail_mutations: AtomicBool::new(false),
            search_delay: Mutex::new(Duration::ZERO),
            slow_failures: Mutex::new(HashMap::new()),
        })
    }

    pub fn rows(&self) -> Vec<T> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_slowly(&self, key: &Identity, delay: Duration) {
        self.slow_failures.lock().unwrap().insert(key.to_string(), delay);
    }

    async fn mutation(&self, operation: &'static str, key: &Identity) -> AppResult<()> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let slow = self.slow_failures.lock().unwrap().get(&key.to_string()).copied();
        if let Some(delay) = slow {
            tokio::time::sleep(delay).await;
            return Err(AppError::status(operation, "memory://", 500, "backend unavailable"));
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(AppError::status(operation, "memory://", 500, "backend unavailable"));
        }
        Ok(())
    }
}

/// Lets tests keep a handle on the service after handing it to the factory.
pub struct Shared<T>(pub Arc<MemoryService<T>>);

#[async_trait]
impl<T: Entity> RemoteService<T> for Shared<T> {
    fn entity_name(&self) -> &str {
        T::NAME
    }

    fn identity_fields(&self) -> &[&'static str] {
        T::IDENTITY_FIELDS
    }

    async fn create(&self, item: &T) -> AppResult<T> {
        self.0.mutation("create", &item.identity()?).await?;
        self.0.rows.lock().unwrap().push(item.clone());
        Ok(item.clone())
    }

    async fn update(&self, key: &Identity, item: &T) -> AppResult<T> {
        self.0.mutation("update", key).await?;
        let mut rows = self.0.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| key.identifies(&**row))
            .ok_or_else(|| AppError::not_found(format!("{} not found", T::NAME)))?;
        *row = item.clone();
        Ok(item.clone())
    }

    async fn remove(&self, key: &Identity) -> AppResult<()> {
        self.0.mutation("remove", key).await?;
        self.0.rows.lock().unwrap().retain(|row| !key.identifies(row));
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> AppResult<Page<T>> {
        self.0.search_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.0.search_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.0.failing_searches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.failing_searches.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::status("search", "memory://", 503, "try again"));
        }

        let rows = self.0.rows.lock().unwrap();
        let size = query.size as usize;
        let start = (query.page.saturating_sub(1) as usize) * size;
        Ok(Page {
            items: rows.iter().skip(start).take(size).cloned().collect(),
            total: rows.len() as u64,
        })
    }

    async fn get_by_id(&self, key: &Identity) -> AppResult<T> {
        self.0
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| key.identifies(*row))
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("{} not found", T::NAME)))
    }

    async fn count(&self, _filters: &Filters) -> AppResult<u64> {
        Ok(self.0.rows.lock().unwrap().len() as u64)
    }
}

#[derive(Default)]
pub struct RecordingNavigator(pub Mutex<Vec<Navigation>>);

impl Navigator for RecordingNavigator {
    fn navigate(&self, to: Navigation) {
        self.0.lock().unwrap().push(to);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub successes: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.successes.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

pub fn position(code: &str, name: &str) -> Position {
    Position {
        company: "ACME".to_string(),
        code: code.to_string(),
        name: name.to_string(),
        department: None,
        active: true,
    }
}
