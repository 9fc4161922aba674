//! `curriculum-client`: async ordering and upload engines for the
//! curriculum editor.
//!
//! The pure math lives in `curriculum-core`; this crate wires it to the
//! network behind two traits so every engine can be driven against an
//! in-memory backend in tests.
//!
//! # Architecture
//!
//! ```text
//! drag gesture ──► OrderingEngine ──► PersistenceClient::save_order
//!                    │  working / snapshot per scope
//!                    └─ rollback on failure
//!
//! file selection ──► UploadCoordinator
//!                    │  Preparing    ThumbnailDeriver (ffmpeg)
//!                    │  Transferring PersistenceClient::request_upload_url
//!                    │               BlobTransport::put_object ──► watch<UploadProgress>
//!                    │  Finalizing   delete_asset, update_item_content
//!                    └─ one CancellationToken per job
//!
//! ScopeCache ◄── read-through for both, invalidated on successful writes
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use curriculum_client::{HttpPersistenceClient, OrderingEngine};
//! use curriculum_core::types::ScopeId;
//!
//! let http = Arc::new(HttpPersistenceClient::from_config(&config)?);
//! let engine = OrderingEngine::new(http);
//! let scope = ScopeId::section("course-1", "section-2");
//!
//! engine.open(&scope).await?;
//! engine.move_item(&scope, "lecture-9", 0).await?;
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod http;
pub mod persistence;
pub mod thumbnail;
pub mod upload;

#[cfg(test)]
mod tests;

pub use cache::ScopeCache;
pub use engine::{CommitOutcome, OrderingEngine};
pub use error::{ClientError, FinalizeStage};
pub use http::HttpPersistenceClient;
pub use persistence::{BlobTransport, ByteProgress, PersistenceClient};
pub use thumbnail::{DerivedAsset, FfmpegDeriver, ThumbnailDeriver};
pub use upload::{UploadCoordinator, UploadHandle, UploadJobSpec, UploadOutcome, UploadProgress};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClientError>;
