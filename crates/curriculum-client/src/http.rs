use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use curriculum_core::config::EditorConfig;
use curriculum_core::types::{
    DeleteAssetRequest, ItemKind, OrderEntry, OrderableItem, SaveOrderRequest, ScopeId,
    UpdateItemContentRequest, UploadTicket, UploadUrlRequest,
};

use crate::persistence::{BlobTransport, ByteProgress, PersistenceClient};
use crate::{ClientError, Result};

const COURSES: &str = "/api/courses";
const DEFAULT_CHUNK: usize = 64 * 1024;

// ─── HttpPersistenceClient ────────────────────────────────────────────────

/// reqwest-backed implementation of both [`PersistenceClient`] and
/// [`BlobTransport`].
///
/// `timeout` bounds the REST calls only. Storage PUTs run for as long as the
/// body takes to send unless [`with_transfer_timeout`](Self::with_transfer_timeout)
/// sets a ceiling.
#[derive(Debug, Clone)]
pub struct HttpPersistenceClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    chunk_size: usize,
    timeout: Duration,
    transfer_timeout: Option<Duration>,
}

impl HttpPersistenceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            chunk_size: DEFAULT_CHUNK,
            timeout,
            transfer_timeout: None,
        })
    }

    /// Build from the `api` and `upload` sections of the editor config.
    pub fn from_config(config: &EditorConfig) -> Result<Self> {
        let mut client = Self::new(
            &config.api.base_url,
            Duration::from_secs(config.api.timeout_secs),
        )?
        .with_chunk_size(config.upload.chunk_size_bytes)
        .with_transfer_timeout(config.upload.transfer_timeout_secs.map(Duration::from_secs));
        if let Some(token) = config.auth_token() {
            client.set_token(token);
        }
        Ok(client)
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Granularity of progress callbacks during a PUT.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Total time allowed for one storage PUT; `None` means unbounded.
    pub fn with_transfer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.request(method, url).timeout(self.timeout);
        match &self.token {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let resp = self.request(method, path).json(body).send().await?;
        check_status(resp).await
    }
}

fn scope_path(scope: &ScopeId) -> String {
    match scope {
        ScopeId::Course { course_id } => format!("{COURSES}/{course_id}/sections"),
        ScopeId::Section {
            course_id,
            section_id,
        } => format!("{COURSES}/{course_id}/sections/{section_id}/curriculum"),
    }
}

fn item_path(scope: &ScopeId, item_id: &str) -> String {
    format!("{}/{item_id}", scope_path(scope))
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        message: server_message(&text),
    })
}

/// Pull `message` out of a JSON error body, falling back to the raw text.
fn server_message(text: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(text)
        .map(|b| b.message)
        .unwrap_or_else(|_| text.trim().to_string())
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response, context: &str) -> Result<T> {
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|source| ClientError::Decode {
        context: context.to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct SectionRow {
    #[serde(rename = "_id", alias = "id")]
    id: String,
    order: u32,
}

#[async_trait]
impl PersistenceClient for HttpPersistenceClient {
    async fn fetch_scope(&self, scope: &ScopeId) -> Result<Vec<OrderableItem>> {
        let resp = check_status(self.request(Method::GET, &scope_path(scope)).send().await?).await?;
        let items = match scope {
            ScopeId::Course { .. } => decode::<Vec<SectionRow>>(resp, "section list")
                .await?
                .into_iter()
                .map(|row| OrderableItem::new(row.id, row.order, ItemKind::Section))
                .collect(),
            ScopeId::Section { .. } => decode::<Vec<OrderEntry>>(resp, "curriculum")
                .await?
                .into_iter()
                .map(|e| OrderableItem::new(e.item_id, e.order, e.item_type))
                .collect(),
        };
        Ok(items)
    }

    async fn save_order(&self, scope: &ScopeId, request: &SaveOrderRequest) -> Result<()> {
        let path = format!("{}/order", scope_path(scope));
        self.send_json(Method::PUT, &path, request).await?;
        Ok(())
    }

    async fn request_upload_url(&self, request: &UploadUrlRequest) -> Result<UploadTicket> {
        let resp = self
            .send_json(Method::POST, "/api/generateUploadURL", request)
            .await?;
        decode(resp, "upload URL").await
    }

    async fn delete_asset(&self, request: &DeleteAssetRequest) -> Result<()> {
        self.send_json(Method::DELETE, "/api/deleteFile", request)
            .await?;
        Ok(())
    }

    async fn update_item_content(
        &self,
        scope: &ScopeId,
        request: &UpdateItemContentRequest,
    ) -> Result<()> {
        let path = item_path(scope, &request.item_id);
        self.send_json(Method::PUT, &path, request).await?;
        Ok(())
    }
}

// ─── Binary PUT ───────────────────────────────────────────────────────────

/// Slice `body` into `chunk_size` pieces and report the running byte count
/// as each piece is pulled by the HTTP stack.
fn progress_body(body: Bytes, chunk_size: usize, progress: ByteProgress) -> reqwest::Body {
    let total = body.len();
    let pieces = (0..total)
        .step_by(chunk_size.max(1))
        .map(move |start| body.slice(start..(start + chunk_size).min(total)));
    let mut sent: u64 = 0;
    let stream = futures::stream::iter(pieces).map(move |piece| {
        sent += piece.len() as u64;
        progress(sent);
        Ok::<Bytes, std::io::Error>(piece)
    });
    reqwest::Body::wrap_stream(stream)
}

#[async_trait]
impl BlobTransport for HttpPersistenceClient {
    async fn put_object(
        &self,
        upload_url: &str,
        body: Bytes,
        content_type: &str,
        progress: ByteProgress,
    ) -> Result<()> {
        let len = body.len();
        // Pre-signed URLs carry their own auth; no bearer header here.
        let mut req = self
            .client
            .put(upload_url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, len)
            .body(progress_body(body, self.chunk_size, progress));
        if let Some(limit) = self.transfer_timeout {
            req = req.timeout(limit);
        }
        let resp = req.send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
