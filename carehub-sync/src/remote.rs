//! HTTP client for the remote authority
//!
//! Wire contract per collection: GET lists, POST creates, PUT `/{id}`
//! replaces, DELETE `/{id}` removes. Every failure is surfaced as
//! [`SyncError::Network`] or [`SyncError::RemoteStatus`] so the repository
//! can fall back to local state.

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use uuid::Uuid;

use crate::config::{Session, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::record::Record;
use crate::service::RecordService;

/// Remote collection of `T`
pub struct HttpRemote<T: Record> {
    client: Client,
    collection_url: Url,
    auth_token: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> HttpRemote<T> {
    pub fn new(config: &SyncConfig, session: &Session) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            collection_url: collection_url(&config.api_base_url, T::API_PATH)?,
            auth_token: session.auth_token.clone(),
            _marker: PhantomData,
        })
    }

    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    fn item_url(&self, id: Uuid) -> String {
        format!("{}/{}", self.collection_url.as_str().trim_end_matches('/'), id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, url: &str) -> SyncResult<Response> {
        req.send().await.map_err(|e| {
            tracing::debug!(entity_type = T::ENTITY_TYPE, url, error = %e, "Remote call failed");
            SyncError::Network(e.to_string())
        })
    }

    /// Decode an optional echoed record, keeping `sent` when the body is
    /// empty or not a record.
    async fn echoed_or(&self, response: Response, sent: T) -> T {
        let bytes = match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return sent,
        };
        match serde_json::from_slice::<T>(&bytes) {
            Ok(mut echoed) => {
                if !echoed.has_id() {
                    echoed.set_id(sent.id());
                }
                echoed
            }
            Err(_) => sent,
        }
    }
}

fn collection_url(base: &str, path: &str) -> SyncResult<Url> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)
        .and_then(|url| url.join(path))
        .map_err(|e| SyncError::Configuration(format!("Invalid api_base_url {}: {}", base, e)))
}

fn status_error(status: StatusCode, url: &str) -> SyncError {
    SyncError::RemoteStatus {
        status: status.as_u16(),
        url: url.to_string(),
    }
}

#[async_trait]
impl<T: Record> RecordService<T> for HttpRemote<T> {
    async fn load_all(&self) -> SyncResult<Vec<T>> {
        let url = self.collection_url.as_str();
        let response = self.send(self.request(Method::GET, url), url).await?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), url));
        }

        let items: Vec<T> = response.json().await?;
        tracing::debug!(entity_type = T::ENTITY_TYPE, count = items.len(), "Loaded remote records");
        Ok(items)
    }

    async fn create(&self, mut record: T) -> SyncResult<T> {
        record.ensure_id();
        let url = self.collection_url.as_str();
        let response = self
            .send(self.request(Method::POST, url).json(&record), url)
            .await?;

        match response.status() {
            StatusCode::CONFLICT => {
                // Already created by an earlier replay that lost its response.
                tracing::info!(
                    entity_type = T::ENTITY_TYPE,
                    record_id = %record.id(),
                    "Remote already holds record"
                );
                Ok(record)
            }
            status if status.is_success() => Ok(self.echoed_or(response, record).await),
            status => Err(status_error(status, url)),
        }
    }

    async fn update(&self, record: T) -> SyncResult<T> {
        if !record.has_id() {
            return self.create(record).await;
        }
        let url = self.item_url(record.id());
        let response = self
            .send(self.request(Method::PUT, &url).json(&record), &url)
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response.status(), &url));
        }
        Ok(self.echoed_or(response, record).await)
    }

    async fn delete(&self, record: &T) -> SyncResult<()> {
        let url = self.item_url(record.id());
        let response = self.send(self.request(Method::DELETE, &url), &url).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(status_error(status, &url)),
        }
    }
}
