use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::service::{Filters, Page, RemoteService, SearchQuery};
use super::{Entity, Identity};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// [`RemoteService`] over the console's JSON REST backend.
///
/// `{base}/{path}` is the collection; records live at
/// `{base}/{path}/{identity segments...}`.
#[derive(Debug, Clone)]
pub struct RestService<T> {
    client: Client,
    base_url: Url,
    bearer: Option<String>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> RestService<T> {
    pub fn new(base_url: &str) -> AppResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| AppError::configuration(format!("invalid API base URL `{base_url}`: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::configuration(format!("API base URL `{base_url}` cannot be a base")));
        }

        Ok(Self {
            client,
            base_url,
            bearer: None,
            _entity: PhantomData,
        })
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    fn url<'a, I>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(T::PATH).extend(segments);
        }
        url
    }

    fn collection_url(&self) -> Url {
        self.url(std::iter::empty())
    }

    fn item_url(&self, key: &Identity) -> Url {
        let segments = key.segments();
        self.url(segments.iter().map(String::as_str))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, operation: &'static str, url: &Url, request: RequestBuilder) -> AppResult<reqwest::Response> {
        tracing::debug!(entity = T::NAME, operation, endpoint = %url, "sending request");

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| AppError::request(operation, url.as_str(), err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!("{} not found", T::NAME)));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::status(operation, url.as_str(), status.as_u16(), message));
        }
        Ok(response)
    }

    async fn fetch<R: DeserializeOwned>(&self, operation: &'static str, url: Url, request: RequestBuilder) -> AppResult<R> {
        let response = self.execute(operation, &url, request).await?;
        response
            .json::<R>()
            .await
            .map_err(|err| AppError::decode(format!("{operation} {url}: {err}")))
    }
}

#[async_trait]
impl<T: Entity> RemoteService<T> for RestService<T> {
    fn entity_name(&self) -> &str {
        T::NAME
    }

    fn identity_fields(&self) -> &[&'static str] {
        T::IDENTITY_FIELDS
    }

    async fn create(&self, item: &T) -> AppResult<T> {
        let url = self.collection_url();
        let request = self.client.post(url.clone()).json(item);
        self.fetch("create", url, request).await
    }

    async fn update(&self, key: &Identity, item: &T) -> AppResult<T> {
        let url = self.item_url(key);
        let request = self.client.put(url.clone()).json(item);
        self.fetch("update", url, request).await
    }

    async fn remove(&self, key: &Identity) -> AppResult<()> {
        let url = self.item_url(key);
        let request = self.client.delete(url.clone());
        self.execute("remove", &url, request).await.map(|_| ())
    }

    async fn search(&self, query: &SearchQuery) -> AppResult<Page<T>> {
        let url = self.collection_url();
        let mut request = self
            .client
            .get(url.clone())
            .query(&[("page", query.page), ("size", query.size)])
            .query(&query.filters);
        if let Some(sort) = &query.sort {
            request = request.query(&[("sort", sort)]);
        }
        self.fetch("search", url, request).await
    }

    async fn get_by_id(&self, key: &Identity) -> AppResult<T> {
        let query = SearchQuery {
            page: 1,
            size: 1,
            sort: None,
            filters: key.as_filters(),
        };
        self.search(&query)
            .await?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found(format!("{} not found", T::NAME)))
    }

    async fn count(&self, filters: &Filters) -> AppResult<u64> {
        let url = self.url(["count"]);
        let request = self.client.get(url.clone()).query(filters);
        let response: CountResponse = self.fetch("count", url, request).await?;
        Ok(response.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use serde_json::json;

    #[test]
    fn item_urls_carry_every_identity_segment() {
        let service = RestService::<Position>::new("http://localhost:8000/api/").expect("valid base");
        let key = Identity::new([("company", json!("ACME Corp")), ("code", json!(7))]);

        assert_eq!(service.collection_url().as_str(), "http://localhost:8000/api/positions");
        assert_eq!(
            service.item_url(&key).as_str(),
            "http://localhost:8000/api/positions/ACME%20Corp/7"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(RestService::<Position>::new("not a url").is_err());
        assert!(RestService::<Position>::new("mailto:ops@example.com").is_err());
    }
}
