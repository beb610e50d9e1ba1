use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use super::cache::ListCache;
use super::preset::{CachePreset, CacheSettings, RefetchTrigger};
use super::service::{Filters, Page, RemoteService, SearchQuery};
use super::{Entity, Identity};
use crate::authz::PermissionResolver;
use crate::errors::{AppError, AppResult};
use crate::obfuscation::PathObfuscator;
use crate::retry::RetryPolicy;

// =============================================================================
// SIDE EFFECTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Push(String),
    Back,
}

/// Receives navigation requests in page mode.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: Navigation);
}

/// Receives user-facing success and failure messages.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, to: Navigation) {
        tracing::info!(navigation = ?to, "navigate");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(%message, "notification");
    }

    fn error(&self, message: &str) {
        tracing::warn!(%message, "notification");
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Whether forms open inline or on their own page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CrudMode {
    #[default]
    Modal,
    /// Forms live under `base_path`: `{base}/new` and `{base}/edit/{key}`.
    Page { base_path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Get,
    Count,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Count => "count",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error(String),
}

impl OperationStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, OperationStatus::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationStatus::Success)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            OperationStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FormState<T> {
    #[default]
    Closed,
    Creating,
    Editing { key: Identity, item: T },
}

/// What the current user may do on this screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Abilities {
    pub can_create: bool,
    pub can_read: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

/// Point-in-time copy of a controller's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct CrudSnapshot<T> {
    pub list: OperationStatus,
    pub create: OperationStatus,
    pub update: OperationStatus,
    pub delete: OperationStatus,
    pub form: FormState<T>,
    pub items: Vec<T>,
    pub total: u64,
}

struct State<T> {
    statuses: HashMap<Operation, OperationStatus>,
    form: FormState<T>,
    cache: ListCache<T>,
}

impl<T> State<T> {
    fn set(&mut self, operation: Operation, status: OperationStatus) {
        self.statuses.insert(operation, status);
    }

    fn status(&self, operation: Operation) -> OperationStatus {
        self.statuses.get(&operation).cloned().unwrap_or_default()
    }
}

/// A superseded request is told to stop through its oneshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Slot {
    operation: Operation,
    key: Option<String>,
}

/// Takes back one optimistic change without touching rows changed since.
enum Undo<T> {
    Insert(Identity),
    Edit { key: Identity, previous: T },
    Delete { index: usize, key: Identity, item: T },
}

impl<T: Entity> Undo<T> {
    fn revert(self, page: &mut Page<T>) {
        match self {
            Undo::Insert(key) => {
                if let Some(index) = page.items.iter().rposition(|item| key.identifies(item)) {
                    page.items.remove(index);
                    page.total = page.total.saturating_sub(1);
                }
            }
            Undo::Edit { key, previous } => {
                if let Some(existing) = page.items.iter_mut().find(|existing| key.identifies(&**existing)) {
                    *existing = previous;
                }
            }
            Undo::Delete { index, key, item } => {
                if !page.items.iter().any(|existing| key.identifies(existing)) {
                    page.items.insert(index.min(page.items.len()), item);
                    page.total += 1;
                }
            }
        }
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// Builder returned by [`crud_config`].
pub struct CrudConfig<T: Entity> {
    entity_name: String,
    service: Arc<dyn RemoteService<T>>,
    preset: CachePreset,
    mode: CrudMode,
    retry: RetryPolicy,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    obfuscator: Option<PathObfuscator>,
}

/// Bind an entity, its remote service and a caching preset.
pub fn crud_config<T, S>(entity_name: impl Into<String>, service: S, preset: CachePreset) -> CrudConfig<T>
where
    T: Entity,
    S: RemoteService<T> + 'static,
{
    CrudConfig {
        entity_name: entity_name.into(),
        service: Arc::new(service),
        preset,
        mode: CrudMode::default(),
        retry: RetryPolicy::default(),
        navigator: Arc::new(LogNavigator),
        notifier: Arc::new(TracingNotifier),
        obfuscator: None,
    }
}

impl<T: Entity> CrudConfig<T> {
    pub fn with_mode(mut self, mode: CrudMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Encrypt record keys in page-mode edit URLs.
    pub fn with_obfuscator(mut self, obfuscator: PathObfuscator) -> Self {
        self.obfuscator = Some(obfuscator);
        self
    }

    pub fn build(self) -> CrudController<T> {
        let settings = self.preset.settings();
        tracing::debug!(
            entity = %self.entity_name,
            preset = %self.preset,
            mode = ?self.mode,
            "crud controller configured"
        );

        CrudController {
            entity_name: self.entity_name,
            service: self.service,
            preset: self.preset,
            settings,
            mode: self.mode,
            retry: self.retry,
            navigator: self.navigator,
            notifier: self.notifier,
            obfuscator: self.obfuscator,
            state: Mutex::new(State {
                statuses: HashMap::new(),
                form: FormState::Closed,
                cache: ListCache::new(settings.stale_time),
            }),
            in_flight: Mutex::new(HashMap::new()),
            tickets: AtomicU64::new(0),
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Bound CRUD operations for one entity screen.
///
/// Methods take `&self`; share the controller behind an `Arc` to drive it
/// from several tasks. A new request for an operation (per record for
/// update and delete) cancels the one still in flight, whose caller gets
/// `AppError::Cancelled`.
pub struct CrudController<T: Entity> {
    entity_name: String,
    service: Arc<dyn RemoteService<T>>,
    preset: CachePreset,
    settings: CacheSettings,
    mode: CrudMode,
    retry: RetryPolicy,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    obfuscator: Option<PathObfuscator>,
    state: Mutex<State<T>>,
    in_flight: Mutex<HashMap<Slot, (u64, oneshot::Sender<()>)>>,
    tickets: AtomicU64,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Entity> CrudController<T> {
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn preset(&self) -> CachePreset {
        self.preset
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn mode(&self) -> &CrudMode {
        &self.mode
    }

    pub fn snapshot(&self) -> CrudSnapshot<T> {
        let state = lock(&self.state);
        let page = state.cache.current_page().cloned().unwrap_or_default();
        CrudSnapshot {
            list: state.status(Operation::List),
            create: state.status(Operation::Create),
            update: state.status(Operation::Update),
            delete: state.status(Operation::Delete),
            form: state.form.clone(),
            items: page.items,
            total: page.total,
        }
    }

    pub fn status(&self, operation: Operation) -> OperationStatus {
        lock(&self.state).status(operation)
    }

    pub fn abilities(&self, resolver: &PermissionResolver) -> Abilities {
        Abilities {
            can_create: resolver.can_access(T::NAME, "create"),
            can_read: resolver.can_access(T::NAME, "read"),
            can_update: resolver.can_access(T::NAME, "update"),
            can_delete: resolver.can_access(T::NAME, "delete"),
        }
    }

    // -------------------------------------------------------------------------
    // in-flight bookkeeping
    // -------------------------------------------------------------------------

    /// Run `request` as the only in-flight request for `slot`.
    async fn exclusive<R, F>(&self, slot: Slot, request: F) -> AppResult<R>
    where
        F: Future<Output = AppResult<R>>,
    {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let previous = lock(&self.in_flight).insert(slot.clone(), (ticket, cancel_tx));
        if let Some((_, previous)) = previous {
            tracing::debug!(entity = %self.entity_name, operation = slot.operation.as_str(), "superseding in-flight request");
            let _ = previous.send(());
        }

        let result = tokio::select! {
            biased;
            _ = cancel_rx => Err(AppError::Cancelled),
            result = request => result,
        };

        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(&slot).is_some_and(|(owner, _)| *owner == ticket) {
            in_flight.remove(&slot);
        }
        result
    }

    /// Cancel every in-flight request of `operation`. Its status returns to
    /// `Idle` since no newer request owns it.
    pub fn cancel(&self, operation: Operation) {
        let cancelled: Vec<_> = {
            let mut in_flight = lock(&self.in_flight);
            let slots: Vec<Slot> = in_flight.keys().filter(|s| s.operation == operation).cloned().collect();
            let cancelled: Vec<_> = slots.into_iter().filter_map(|slot| in_flight.remove(&slot)).collect();
            if !cancelled.is_empty() {
                lock(&self.state).set(operation, OperationStatus::Idle);
            }
            cancelled
        };
        if !cancelled.is_empty() {
            tracing::debug!(entity = %self.entity_name, operation = operation.as_str(), "cancelled in-flight requests");
        }
        for (_, sender) in cancelled {
            let _ = sender.send(());
        }
    }

    fn begin(&self, operation: Operation) {
        lock(&self.state).set(operation, OperationStatus::Loading);
    }

    /// Record the outcome unless the request was superseded.
    fn finish<R>(&self, operation: Operation, result: &AppResult<R>) {
        match result {
            Ok(_) => lock(&self.state).set(operation, OperationStatus::Success),
            Err(AppError::Cancelled) => {}
            Err(err) => {
                tracing::warn!(
                    entity = %self.entity_name,
                    operation = operation.as_str(),
                    kind = err.kind(),
                    error = %err,
                    "operation failed"
                );
                lock(&self.state).set(operation, OperationStatus::Error(err.to_string()));
                self.notifier.error(&err.to_string());
            }
        }
    }

    // -------------------------------------------------------------------------
    // reads
    // -------------------------------------------------------------------------

    /// List a page, served from cache while it is fresh.
    pub async fn list(&self, query: SearchQuery) -> AppResult<Page<T>> {
        let cached = {
            let mut state = lock(&self.state);
            let cached = state.cache.fresh(&query);
            if cached.is_some() {
                state.cache.select(&query);
            }
            cached
        };
        if let Some(page) = cached {
            return Ok(page);
        }
        self.fetch_list(query).await
    }

    /// Fetch the current page again, ignoring freshness.
    pub async fn refresh(&self) -> AppResult<Page<T>> {
        let query = lock(&self.state).cache.current_query().cloned().unwrap_or_default();
        self.fetch_list(query).await
    }

    /// React to focus, mount or reconnect. Returns the refetched page when
    /// the preset asks for it and the current page is stale.
    pub async fn handle_trigger(&self, trigger: RefetchTrigger) -> AppResult<Option<Page<T>>> {
        let stale = lock(&self.state).cache.is_current_stale();
        if !self.settings.refetches_on(trigger) || !stale {
            return Ok(None);
        }
        tracing::debug!(entity = %self.entity_name, ?trigger, "refetching stale list");
        self.refresh().await.map(Some)
    }

    async fn fetch_list(&self, query: SearchQuery) -> AppResult<Page<T>> {
        self.begin(Operation::List);
        let service = &self.service;
        let retry = self.retry;
        let request = {
            let query = &query;
            async move { retry.run(|| service.search(query)).await }
        };
        let result = self
            .exclusive(Slot { operation: Operation::List, key: None }, request)
            .await;

        if let Ok(page) = &result {
            lock(&self.state).cache.store(query, page.clone());
        }
        self.finish(Operation::List, &result);
        result
    }

    pub async fn get(&self, key: &Identity) -> AppResult<T> {
        let service = &self.service;
        let retry = self.retry;
        let request = async move { retry.run(|| service.get_by_id(key)).await };
        self.exclusive(Slot { operation: Operation::Get, key: None }, request).await
    }

    pub async fn count(&self, filters: &Filters) -> AppResult<u64> {
        let service = &self.service;
        let retry = self.retry;
        let request = async move { retry.run(|| service.count(filters)).await };
        self.exclusive(Slot { operation: Operation::Count, key: None }, request).await
    }

    // -------------------------------------------------------------------------
    // forms
    // -------------------------------------------------------------------------

    pub fn open_create(&self) {
        lock(&self.state).form = FormState::Creating;
        if let CrudMode::Page { base_path } = &self.mode {
            self.navigator.navigate(Navigation::Push(format!("{base_path}/new")));
        }
    }

    pub fn open_edit(&self, item: &T) -> AppResult<()> {
        let key = item.identity()?;
        if let CrudMode::Page { base_path } = &self.mode {
            let route_key = self.route_key(&key)?;
            self.navigator
                .navigate(Navigation::Push(format!("{base_path}/edit/{route_key}")));
        }
        lock(&self.state).form = FormState::Editing { key, item: item.clone() };
        Ok(())
    }

    pub fn close_form(&self) {
        lock(&self.state).form = FormState::Closed;
        if matches!(self.mode, CrudMode::Page { .. }) {
            self.navigator.navigate(Navigation::Back);
        }
    }

    /// Route parameter for an edit page: encrypted when an obfuscator is
    /// configured, the plain identity segments otherwise.
    pub fn route_key(&self, key: &Identity) -> AppResult<String> {
        match &self.obfuscator {
            Some(obfuscator) => obfuscator.encrypt(&key.to_payload()?),
            None => Ok(key.to_string()),
        }
    }

    /// Inverse of [`route_key`](Self::route_key) for obfuscated keys.
    pub fn resolve_route_key(&self, route_key: &str) -> AppResult<Identity> {
        let obfuscator = self
            .obfuscator
            .as_ref()
            .ok_or_else(|| AppError::configuration("route keys are not obfuscated"))?;
        Identity::from_payload(&obfuscator.decrypt(route_key)?)
    }

    // -------------------------------------------------------------------------
    // mutations
    // -------------------------------------------------------------------------

    /// Save the open form: create or update depending on how it was opened.
    pub async fn submit(&self, item: T) -> AppResult<T> {
        let form = lock(&self.state).form.clone();
        let saved = match form {
            FormState::Closed => return Err(AppError::bad_request("no form is open")),
            FormState::Creating => self.create(item).await?,
            FormState::Editing { key, .. } => self.update(&key, item).await?,
        };
        self.close_form();
        Ok(saved)
    }

    pub async fn create(&self, item: T) -> AppResult<T> {
        self.begin(Operation::Create);
        // An insert without a key cannot be reverted, so it waits for the server.
        let undo = match item.identity() {
            Ok(key) => self.optimistic(|page| {
                page.items.push(item.clone());
                page.total += 1;
                Some(Undo::Insert(key))
            }),
            Err(_) => None,
        };

        let service = &self.service;
        let request = {
            let item = &item;
            async move { service.create(item).await }
        };
        let result = self
            .exclusive(Slot { operation: Operation::Create, key: None }, request)
            .await;
        self.settle(Operation::Create, &result, undo, "created");
        result
    }

    pub async fn update(&self, key: &Identity, item: T) -> AppResult<T> {
        let slot = Slot {
            operation: Operation::Update,
            key: Some(key.to_payload()?),
        };
        self.begin(Operation::Update);
        let undo = self.optimistic(|page| {
            let existing = page.items.iter_mut().find(|existing| key.identifies(&**existing))?;
            Some(Undo::Edit {
                key: key.clone(),
                previous: std::mem::replace(existing, item.clone()),
            })
        });

        let service = &self.service;
        let request = {
            let item = &item;
            async move { service.update(key, item).await }
        };
        let result = self.exclusive(slot, request).await;
        self.settle(Operation::Update, &result, undo, "updated");
        result
    }

    pub async fn delete_item(&self, item: &T) -> AppResult<()> {
        let key = item.identity()?;
        let slot = Slot {
            operation: Operation::Delete,
            key: Some(key.to_payload()?),
        };
        self.begin(Operation::Delete);
        let undo = self.optimistic(|page| {
            let index = page.items.iter().position(|existing| key.identifies(existing))?;
            let removed = page.items.remove(index);
            page.total = page.total.saturating_sub(1);
            Some(Undo::Delete {
                index,
                key: key.clone(),
                item: removed,
            })
        });

        let service = &self.service;
        let request = {
            let key = &key;
            async move { service.remove(key).await }
        };
        let result = self.exclusive(slot, request).await;
        self.settle(Operation::Delete, &result, undo, "deleted");
        result
    }

    /// Apply `change` to the visible page when the preset allows it.
    fn optimistic<F>(&self, change: F) -> Option<Undo<T>>
    where
        F: FnOnce(&mut Page<T>) -> Option<Undo<T>>,
    {
        if !self.settings.optimistic_updates {
            return None;
        }
        lock(&self.state).cache.update_current(change).flatten()
    }

    fn settle<R>(&self, operation: Operation, result: &AppResult<R>, undo: Option<Undo<T>>, verb: &str) {
        {
            let mut state = lock(&self.state);
            match result {
                // A superseded request leaves its change to the one that
                // replaced it; the next read reconciles.
                Ok(_) | Err(AppError::Cancelled) => state.cache.invalidate(),
                Err(_) => {
                    if let Some(undo) = undo {
                        state.cache.update_current(|page| undo.revert(page));
                    }
                }
            }
        }
        if result.is_ok() {
            self.notifier.success(&format!("{} {verb}", self.entity_name));
        }
        self.finish(operation, result);
    }
}
