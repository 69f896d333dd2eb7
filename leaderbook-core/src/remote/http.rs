//! REST client for the hosted data store.
//!
//! Talks to a PostgREST-style API where every collection is a table under
//! `/rest/v1/<collection>`:
//! - `GET    /rest/v1/people?select=*&order=updated_at.desc`
//! - `POST   /rest/v1/people` (`Prefer: return=representation`)
//! - `PATCH  /rest/v1/people?id=eq.<id>`
//! - `DELETE /rest/v1/people?id=eq.<id>`

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};

use super::{RemoteError, RemoteStore};
use crate::models::Entity;

/// Remote store reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL probed to decide whether the store is reachable.
    pub fn health_url(&self) -> String {
        format!("{}/rest/v1/", self.http_base())
    }

    fn http_base(&self) -> String {
        let base_url = if !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
        {
            format!("http://{}", self.base_url)
        } else {
            self.base_url.clone()
        };
        base_url.trim_end_matches('/').to_string()
    }

    /// Builds the table URL for a collection, with an optional query string.
    fn build_url(&self, collection: &str, query: Option<&str>) -> String {
        let mut url = format!(
            "{}/rest/v1/{}",
            self.http_base(),
            urlencoding::encode(collection)
        );
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    fn id_filter(id: &str) -> String {
        format!("id=eq.{}", urlencoding::encode(id))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| RemoteError::Connectivity(e.to_string()))
    }

    /// Maps a non-success response onto the error taxonomy.
    async fn check(
        response: Response,
        collection: &str,
        id: Option<&str>,
    ) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(classify_status(status, message, collection, id))
    }

    /// Reads a `return=representation` body, which is an array of rows.
    async fn first_row(response: Response) -> Result<Option<Entity>, RemoteError> {
        let rows: Vec<Entity> = response
            .json()
            .await
            .map_err(|e| RemoteError::Connectivity(format!("Invalid response body: {}", e)))?;
        Ok(rows.into_iter().next())
    }
}

fn classify_status(
    status: StatusCode,
    message: String,
    collection: &str,
    id: Option<&str>,
) -> RemoteError {
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            };
        }
    }

    if status.is_server_error() {
        RemoteError::Connectivity(format!("HTTP {}: {}", status, message))
    } else {
        RemoteError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn list(&self, collection: &str) -> Result<Vec<Entity>, RemoteError> {
        let url = self.build_url(collection, Some("select=*&order=updated_at.desc"));
        let response = self.send(self.client.get(&url)).await?;
        let response = Self::check(response, collection, None).await?;

        response
            .json()
            .await
            .map_err(|e| RemoteError::Connectivity(format!("Invalid response body: {}", e)))
    }

    async fn create(&self, collection: &str, payload: &Entity) -> Result<Entity, RemoteError> {
        let url = self.build_url(collection, None);
        let request = self
            .client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(payload);
        let response = self.send(request).await?;
        let response = Self::check(response, collection, None).await?;

        Ok(Self::first_row(response)
            .await?
            .unwrap_or_else(|| payload.clone()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Entity,
    ) -> Result<Entity, RemoteError> {
        let url = self.build_url(collection, Some(&Self::id_filter(id)));
        let request = self
            .client
            .patch(&url)
            .header("Prefer", "return=representation")
            .json(payload);
        let response = self.send(request).await?;
        let response = Self::check(response, collection, Some(id)).await?;

        // PATCH on a filter that matches nothing succeeds with zero rows
        Self::first_row(response)
            .await?
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let url = self.build_url(collection, Some(&Self::id_filter(id)));
        let response = self.send(self.client.delete(&url)).await?;
        Self::check(response, collection, Some(id)).await?;
        Ok(())
    }
}
