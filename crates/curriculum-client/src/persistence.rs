use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use curriculum_core::types::{
    DeleteAssetRequest, OrderableItem, SaveOrderRequest, ScopeId, UpdateItemContentRequest,
    UploadTicket, UploadUrlRequest,
};

use crate::Result;

/// Receives the cumulative number of body bytes handed to the network so far.
pub type ByteProgress = Arc<dyn Fn(u64) + Send + Sync>;

// ─── PersistenceClient ────────────────────────────────────────────────────

/// The REST operations the editor consumes.
///
/// Every call is a single round trip with no retry. Callers that need
/// cancellation drop the returned future.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Current children of `scope`, in whatever order the server stores them.
    async fn fetch_scope(&self, scope: &ScopeId) -> Result<Vec<OrderableItem>>;

    /// Full-replace ordering write. `request.items` is always the complete
    /// renumbered list.
    async fn save_order(&self, scope: &ScopeId, request: &SaveOrderRequest) -> Result<()>;

    /// One pre-signed destination per asset.
    async fn request_upload_url(&self, request: &UploadUrlRequest) -> Result<UploadTicket>;

    async fn delete_asset(&self, request: &DeleteAssetRequest) -> Result<()>;

    /// `scope` is the item's owning scope; it routes the request.
    async fn update_item_content(
        &self,
        scope: &ScopeId,
        request: &UpdateItemContentRequest,
    ) -> Result<()>;
}

// ─── BlobTransport ────────────────────────────────────────────────────────

/// Raw binary PUT to a pre-signed object-storage URL.
#[async_trait]
pub trait BlobTransport: Send + Sync {
    /// Send `body` with the given `Content-Type`, calling `progress` as bytes
    /// leave. Dropping the future aborts the transfer.
    async fn put_object(
        &self,
        upload_url: &str,
        body: Bytes,
        content_type: &str,
        progress: ByteProgress,
    ) -> Result<()>;
}
