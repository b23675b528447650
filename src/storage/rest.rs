//! HTTP implementation of CollectionGateway
//!
//! Speaks the list/detail conventions of a JSON REST backend:
//!
//! ```text
//! GET    {base}/{resource}?page=1&limit=20&filter={..}&search=..&sort=name:asc
//! GET    {base}/{resource}/{id}
//! POST   {base}/{resource}
//! PATCH  {base}/{resource}/{id}
//! DELETE {base}/{resource}/{id}
//! ```
//!
//! Failed responses carrying an [`ErrorResponse`] body are mapped onto the
//! error taxonomy with [`CollectionError::from_status`].

use crate::core::entity::{Entity, Patch};
use crate::core::error::{CollectionError, ErrorResponse};
use crate::core::gateway::CollectionGateway;
use crate::core::query::{ListQuery, ListResult, PaginatedResponse, QueryParams};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

/// Gateway over a JSON REST backend
pub struct RestGateway<T: Entity> {
    client: Client,
    base_url: String,
    token: Option<String>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for RestGateway<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> RestGateway<T> {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CollectionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            _entity: PhantomData,
        }
    }

    /// Send `Authorization: Bearer <token>` on every request
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, T::resource_name())
    }

    pub fn entity_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, id: Option<&str>) -> Result<Response, CollectionError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        debug!(resource = T::resource_name(), status = status.as_u16(), "request rejected");
        let body = response.json::<ErrorResponse>().await.ok();
        Err(CollectionError::from_status(
            status.as_u16(),
            body,
            T::resource_name(),
            id,
        ))
    }
}

#[async_trait]
impl<T: Entity> CollectionGateway<T> for RestGateway<T> {
    async fn list(&self, query: &ListQuery) -> Result<ListResult<T>, CollectionError> {
        let params = QueryParams::from_query(query)?;
        let request = self.client.get(self.collection_url()).query(&params);
        let page: PaginatedResponse<T> = self.send(request, None).await?.json().await?;
        Ok(ListResult {
            items: page.data,
            total: page.pagination.total,
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<T, CollectionError> {
        let request = self.client.get(self.entity_url(id));
        Ok(self.send(request, Some(id)).await?.json().await?)
    }

    async fn create(&self, entity: T) -> Result<T, CollectionError> {
        let request = self.client.post(self.collection_url()).json(&entity);
        Ok(self.send(request, None).await?.json().await?)
    }

    async fn update(&self, id: &str, patch: &Patch) -> Result<T, CollectionError> {
        let request = self.client.patch(self.entity_url(id)).json(patch);
        Ok(self.send(request, Some(id)).await?.json().await?)
    }

    async fn remove(&self, id: &str) -> Result<(), CollectionError> {
        let request = self.authorize(self.client.delete(self.entity_url(id)));
        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            // Already gone counts as removed
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(()),
            status => {
                let body = response.json::<ErrorResponse>().await.ok();
                Err(CollectionError::from_status(
                    status.as_u16(),
                    body,
                    T::resource_name(),
                    Some(id),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Patient;

    #[test]
    fn test_urls() {
        let gateway = RestGateway::<Patient>::with_client(Client::new(), "https://api.example.com/v1/");
        assert_eq!(gateway.collection_url(), "https://api.example.com/v1/patients");
        assert_eq!(gateway.entity_url("p-1"), "https://api.example.com/v1/patients/p-1");
    }
}
