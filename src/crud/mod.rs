//! Generic CRUD plumbing for master-data screens.
//!
//! [`crud_config`] binds an entity, a [`RemoteService`] and a [`CachePreset`]
//! into a [`CrudController`] exposing create/edit/delete/list with
//! per-operation state.

mod cache;
mod controller;
mod preset;
mod rest;
mod service;

pub use cache::ListCache;
pub use controller::{
    crud_config, Abilities, CrudConfig, CrudController, CrudMode, CrudSnapshot, FormState, LogNavigator,
    Navigation, Navigator, Notifier, Operation, OperationStatus, TracingNotifier,
};
pub use preset::{CachePreset, CacheSettings, RefetchTrigger};
pub use rest::RestService;
pub use service::{Filters, Page, RemoteService, SearchQuery};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// A master-data record maintained through the console.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Resource name, also used for permission lookups.
    const NAME: &'static str;
    /// Collection path on the REST backend.
    const PATH: &'static str;
    /// Fields that together identify a record.
    const IDENTITY_FIELDS: &'static [&'static str];

    fn identity(&self) -> AppResult<Identity> {
        Identity::of(self, Self::NAME, Self::IDENTITY_FIELDS)
    }
}

/// Values of the identity fields of one record, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Vec<(String, Value)>);

impl Identity {
    pub fn new<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Pick `fields` out of the serialized `item`. Missing or null fields are
    /// rejected.
    pub fn of<T: Serialize>(item: &T, entity: &str, fields: &[&str]) -> AppResult<Self> {
        let value = serde_json::to_value(item)
            .map_err(|err| AppError::internal(format!("cannot serialize {entity}: {err}")))?;
        let Value::Object(obj) = value else {
            return Err(AppError::internal(format!("{entity} does not serialize to an object")));
        };

        fields
            .iter()
            .map(|field| match obj.get(*field) {
                Some(v) if !v.is_null() => Ok((field.to_string(), v.clone())),
                _ => Err(AppError::bad_request(format!("{field} is required to identify {entity}"))),
            })
            .collect::<AppResult<Vec<_>>>()
            .map(Self)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Values rendered as path segments; strings are used verbatim.
    pub fn segments(&self) -> Vec<String> {
        self.0.iter().map(|(_, v)| render(v)).collect()
    }

    pub fn as_filters(&self) -> Filters {
        self.0.iter().map(|(k, v)| (k.clone(), render(v))).collect()
    }

    /// JSON form used for route keys and in-flight bookkeeping.
    pub fn to_payload(&self) -> AppResult<String> {
        serde_json::to_string(self).map_err(|err| AppError::internal(format!("cannot serialize record key: {err}")))
    }

    pub fn from_payload(payload: &str) -> AppResult<Self> {
        serde_json::from_str(payload).map_err(|_| AppError::bad_request("malformed record key"))
    }

    pub fn identifies<T: Entity>(&self, item: &T) -> bool {
        item.identity().is_ok_and(|key| &key == self)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}
