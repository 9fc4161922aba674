//! Multi-asset content replacement.
//!
//! A job moves through `Preparing → Transferring → Finalizing` on a spawned
//! task. Every network call the job makes races one shared
//! [`CancellationToken`]; once the token fires no further request is issued
//! and the finalize writes never run.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::future::try_join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use curriculum_core::config::{FinalizeOrder, UploadConfig};
use curriculum_core::progress::{AssetSlot, ProgressTracker};
use curriculum_core::state::UploadPhase;
use curriculum_core::types::{
    AssetRole, DeleteAssetRequest, FinalizedContent, ScopeId, UpdateItemContentRequest,
    UploadTicket, UploadUrlRequest,
};
use curriculum_core::CurriculumError;

use crate::cache::ScopeCache;
use crate::error::FinalizeStage;
use crate::persistence::{BlobTransport, ByteProgress, PersistenceClient};
use crate::thumbnail::{thumbnail_name, ThumbnailDeriver};
use crate::{ClientError, Result};

// ─── Job description ──────────────────────────────────────────────────────

/// One logical content replacement for one item.
#[derive(Debug, Clone)]
pub struct UploadJobSpec {
    /// Owning scope of the item; routes the metadata update and is the cache
    /// key invalidated on success.
    pub scope: ScopeId,
    pub item_id: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    /// On-disk location of the primary, when there is one. Thumbnail
    /// derivation reads from here instead of spilling `bytes` to a temp file.
    pub source_path: Option<PathBuf>,
    pub derive_thumbnail: bool,
    /// Object keys of the content being superseded, deleted on finalize.
    pub replaces: Vec<String>,
}

impl UploadJobSpec {
    pub fn new(
        scope: ScopeId,
        item_id: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let content_type = content_type.into();
        Self {
            scope,
            item_id: item_id.into(),
            file_name: file_name.into(),
            derive_thumbnail: is_video(&content_type),
            content_type,
            bytes: bytes.into(),
            source_path: None,
            replaces: Vec::new(),
        }
    }

    /// Read `path` and guess its content type from the extension.
    pub async fn from_path(scope: ScopeId, item_id: impl Into<String>, path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let mut spec = Self::new(scope, item_id, file_name, content_type, bytes);
        spec.source_path = Some(path.to_path_buf());
        Ok(spec)
    }

    pub fn replacing(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.replaces.extend(keys);
        self
    }

    pub fn without_thumbnail(mut self) -> Self {
        self.derive_thumbnail = false;
        self
    }

    pub fn is_video(&self) -> bool {
        is_video(&self.content_type)
    }
}

fn is_video(content_type: &str) -> bool {
    content_type.starts_with("video/")
}

/// Published on every phase change and byte report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub phase: UploadPhase,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub percent: u8,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self {
            phase: UploadPhase::Idle,
            uploaded_bytes: 0,
            total_bytes: 0,
            percent: 0,
        }
    }
}

/// How a job ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Completed(FinalizedContent),
    /// Stopped before finalize. Nothing was deleted or updated.
    Cancelled,
}

// ─── Handle ───────────────────────────────────────────────────────────────

pub struct UploadHandle {
    id: Uuid,
    progress: watch::Receiver<UploadProgress>,
    token: CancellationToken,
    task: JoinHandle<Result<UploadOutcome>>,
}

impl UploadHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.progress.clone()
    }

    pub fn progress_stream(&self) -> WatchStream<UploadProgress> {
        WatchStream::new(self.progress.clone())
    }

    /// Run `cb` on every published update until the job reaches a terminal
    /// phase. Intermediate values may be coalesced.
    pub fn on_progress<F>(&self, mut cb: F) -> JoinHandle<()>
    where
        F: FnMut(UploadProgress) + Send + 'static,
    {
        let mut rx = self.progress.clone();
        tokio::spawn(async move {
            loop {
                let current = *rx.borrow_and_update();
                cb(current);
                if current.phase.is_terminal() || rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// A clone of the job's token, for wiring cancellation from elsewhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn current(&self) -> UploadProgress {
        *self.progress.borrow()
    }

    pub async fn result(self) -> Result<UploadOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(join) => Err(ClientError::Io(std::io::Error::other(format!(
                "upload task {} aborted: {join}",
                self.id
            )))),
        }
    }
}

// ─── Coordinator ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct UploadCoordinator {
    client: Arc<dyn PersistenceClient>,
    transport: Arc<dyn BlobTransport>,
    deriver: Arc<dyn ThumbnailDeriver>,
    config: UploadConfig,
    cache: Option<Arc<ScopeCache>>,
}

impl UploadCoordinator {
    pub fn new(
        client: Arc<dyn PersistenceClient>,
        transport: Arc<dyn BlobTransport>,
        deriver: Arc<dyn ThumbnailDeriver>,
        config: UploadConfig,
    ) -> Self {
        Self {
            client,
            transport,
            deriver,
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ScopeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Spawn the job with a fresh cancellation token.
    pub fn start(&self, spec: UploadJobSpec) -> UploadHandle {
        self.start_with_token(spec, CancellationToken::new())
    }

    /// Spawn the job under `token`; cancelling it has the same effect as
    /// [`UploadHandle::cancel`].
    pub fn start_with_token(&self, spec: UploadJobSpec, token: CancellationToken) -> UploadHandle {
        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(UploadProgress::default());
        let job = Job {
            id,
            coordinator: self.clone(),
            reporter: Arc::new(Reporter::new(tx)),
            token: token.clone(),
        };
        let task = tokio::spawn(job.run(spec));
        UploadHandle {
            id,
            progress: rx,
            token,
            task,
        }
    }
}

// ─── Progress publishing ──────────────────────────────────────────────────

struct Reporter {
    tx: watch::Sender<UploadProgress>,
    tracker: Mutex<ProgressTracker>,
}

impl Reporter {
    fn new(tx: watch::Sender<UploadProgress>) -> Self {
        Self {
            tx,
            tracker: Mutex::new(ProgressTracker::default()),
        }
    }

    fn tracker(&self) -> MutexGuard<'_, ProgressTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase(&self) -> UploadPhase {
        self.tx.borrow().phase
    }

    fn enter(&self, job: Uuid, next: UploadPhase) -> Result<()> {
        let prev = self.phase();
        let next = prev.transition(next)?;
        debug!(job = %job, from = %prev, to = %next, "upload phase");
        self.tx.send_modify(|p| p.phase = next);
        Ok(())
    }

    /// Fix the job's total. Called once, at the end of Preparing.
    fn install(&self, sizes: &[u64]) {
        let snap = {
            let mut tracker = self.tracker();
            *tracker = ProgressTracker::new(sizes);
            tracker.snapshot()
        };
        self.tx.send_modify(|p| {
            p.total_bytes = snap.total_bytes;
            p.uploaded_bytes = snap.uploaded_bytes;
            p.percent = snap.percent;
        });
    }

    fn advance(&self, slot: AssetSlot, loaded: u64) {
        let snap = self.tracker().advance(slot, loaded);
        self.publish_bytes(snap.uploaded_bytes, snap.percent);
    }

    fn complete(&self, slot: AssetSlot) {
        let snap = self.tracker().complete(slot);
        self.publish_bytes(snap.uploaded_bytes, snap.percent);
    }

    fn freeze(&self) {
        self.tracker().freeze();
    }

    fn publish_bytes(&self, uploaded: u64, percent: u8) {
        self.tx.send_if_modified(|p| {
            if p.uploaded_bytes == uploaded && p.percent == percent {
                return false;
            }
            p.uploaded_bytes = uploaded;
            p.percent = percent;
            true
        });
    }
}

// ─── Job ──────────────────────────────────────────────────────────────────

/// One asset ready to transfer.
struct PreparedAsset {
    role: AssetRole,
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

struct Job {
    id: Uuid,
    coordinator: UploadCoordinator,
    reporter: Arc<Reporter>,
    token: CancellationToken,
}

impl Job {
    async fn run(self, spec: UploadJobSpec) -> Result<UploadOutcome> {
        let result = self.drive(&spec).await;
        let terminal = match &result {
            Ok(UploadOutcome::Completed(_)) => UploadPhase::Completed,
            Ok(UploadOutcome::Cancelled) => UploadPhase::Cancelled,
            Err(_) => UploadPhase::Failed,
        };
        if let Err(e) = self.reporter.enter(self.id, terminal) {
            warn!(job = %self.id, error = %e, "unexpected terminal transition");
        }
        match &result {
            Ok(UploadOutcome::Completed(content)) => {
                info!(job = %self.id, item = %spec.item_id, key = %content.object_key, "upload completed")
            }
            Ok(UploadOutcome::Cancelled) => info!(job = %self.id, item = %spec.item_id, "upload cancelled"),
            Err(e) => warn!(job = %self.id, item = %spec.item_id, error = %e, "upload failed"),
        }
        result
    }

    async fn drive(&self, spec: &UploadJobSpec) -> Result<UploadOutcome> {
        self.reporter.enter(self.id, UploadPhase::Preparing)?;
        let (assets, duration) = match self.prepare(spec).await {
            Ok(prepared) => prepared,
            Err(ClientError::Cancelled) => return Ok(UploadOutcome::Cancelled),
            Err(e) => return Err(e),
        };
        if self.token.is_cancelled() {
            return Ok(UploadOutcome::Cancelled);
        }

        let sizes: Vec<u64> = assets.iter().map(|a| a.bytes.len() as u64).collect();
        self.reporter.install(&sizes);
        self.reporter.enter(self.id, UploadPhase::Transferring)?;
        info!(
            job = %self.id,
            item = %spec.item_id,
            assets = assets.len(),
            bytes = sizes.iter().sum::<u64>(),
            "transfer started"
        );

        let tickets = match self.transfer(spec, &assets).await {
            Ok(tickets) => tickets,
            Err(ClientError::Cancelled) => {
                self.reporter.freeze();
                return Ok(UploadOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };

        // Last chance to back out: nothing destructive has happened yet.
        if self.token.is_cancelled() {
            self.reporter.freeze();
            return Ok(UploadOutcome::Cancelled);
        }

        self.reporter.enter(self.id, UploadPhase::Finalizing)?;
        let content = finalized_content(&assets, &tickets, duration);
        self.finalize(spec, content).await.map(UploadOutcome::Completed)
    }

    // ── Preparing ─────────────────────────────────────────────────────────

    async fn prepare(&self, spec: &UploadJobSpec) -> Result<(Vec<PreparedAsset>, Option<f64>)> {
        let config = &self.coordinator.config;
        let size = spec.bytes.len() as u64;
        if size == 0 {
            return Err(CurriculumError::EmptyAsset(spec.file_name.clone()).into());
        }
        if let Some(limit) = config.max_file_bytes {
            if size > limit {
                return Err(CurriculumError::AssetTooLarge {
                    file_name: spec.file_name.clone(),
                    size,
                    limit,
                }
                .into());
            }
        }

        let offset = if spec.is_video() && spec.derive_thumbnail {
            Some(thumbnail_offset(config)?)
        } else {
            None
        };

        let mut assets = vec![PreparedAsset {
            role: AssetRole::Primary,
            file_name: spec.file_name.clone(),
            content_type: spec.content_type.clone(),
            bytes: spec.bytes.clone(),
        }];
        if !spec.is_video() {
            return Ok((assets, None));
        }

        // Held until derivation is done.
        let spill;
        let source = match &spec.source_path {
            Some(path) => path.as_path(),
            None => {
                spill = spill_to_temp(spec).await?;
                spill.path()
            }
        };
        let deriver = &self.coordinator.deriver;

        let duration = match cancellable(&self.token, deriver.probe_duration(source)).await {
            Ok(d) => d,
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => {
                warn!(job = %self.id, error = %e, "duration probe failed");
                None
            }
        };

        if let Some(offset) = offset {
            let thumb = cancellable(&self.token, deriver.derive(source, offset)).await?;
            debug!(job = %self.id, bytes = thumb.bytes.len(), "thumbnail derived");
            assets.push(PreparedAsset {
                role: AssetRole::DerivedThumbnail,
                file_name: thumbnail_name(&spec.file_name),
                content_type: thumb.content_type,
                bytes: thumb.bytes,
            });
        }
        Ok((assets, duration))
    }

    // ── Transferring ──────────────────────────────────────────────────────

    /// Run every asset's URL request and PUT. Tickets come back in asset
    /// order. The first failure drops the remaining transfers.
    async fn transfer(
        &self,
        spec: &UploadJobSpec,
        assets: &[PreparedAsset],
    ) -> Result<Vec<UploadTicket>> {
        let landed = Mutex::new(Vec::new());

        let result: Result<Vec<UploadTicket>> = if self.coordinator.config.parallel_transfers {
            try_join_all(
                assets
                    .iter()
                    .enumerate()
                    .map(|(slot, asset)| self.transfer_one(spec, slot, asset, &landed)),
            )
            .await
        } else {
            async {
                let mut tickets = Vec::with_capacity(assets.len());
                for (slot, asset) in assets.iter().enumerate() {
                    if self.token.is_cancelled() {
                        return Err(ClientError::Cancelled);
                    }
                    tickets.push(self.transfer_one(spec, slot, asset, &landed).await?);
                }
                Ok::<_, ClientError>(tickets)
            }
            .await
        };

        result.map_err(|err| match err {
            ClientError::Transfer {
                role,
                file_name,
                source,
                ..
            } => {
                let orphaned_keys = lock(&landed).clone();
                if !orphaned_keys.is_empty() {
                    warn!(
                        job = %self.id,
                        keys = ?orphaned_keys,
                        "uploaded sibling assets left orphaned in storage"
                    );
                }
                ClientError::Transfer {
                    role,
                    file_name,
                    orphaned_keys,
                    source,
                }
            }
            other => other,
        })
    }

    async fn transfer_one(
        &self,
        spec: &UploadJobSpec,
        slot: AssetSlot,
        asset: &PreparedAsset,
        landed: &Mutex<Vec<String>>,
    ) -> Result<UploadTicket> {
        let wrap = |source: ClientError| {
            if source.is_cancelled() {
                source
            } else {
                ClientError::Transfer {
                    role: asset.role,
                    file_name: asset.file_name.clone(),
                    orphaned_keys: Vec::new(),
                    source: Box::new(source),
                }
            }
        };

        let request = UploadUrlRequest {
            scope_id: spec.scope.wire_id().to_string(),
            asset_role: asset.role,
            file_name: asset.file_name.clone(),
            content_type: asset.content_type.clone(),
        };
        let ticket = cancellable(
            &self.token,
            self.coordinator.client.request_upload_url(&request),
        )
        .await
        .map_err(&wrap)?;

        let reporter = Arc::clone(&self.reporter);
        let progress: ByteProgress = Arc::new(move |loaded| reporter.advance(slot, loaded));
        cancellable(
            &self.token,
            self.coordinator.transport.put_object(
                &ticket.upload_url,
                asset.bytes.clone(),
                &asset.content_type,
                progress,
            ),
        )
        .await
        .map_err(&wrap)?;

        self.reporter.complete(slot);
        lock(landed).push(ticket.object_key.clone());
        debug!(job = %self.id, role = %asset.role, key = %ticket.object_key, "asset transferred");
        Ok(ticket)
    }

    // ── Finalizing ────────────────────────────────────────────────────────

    async fn finalize(
        &self,
        spec: &UploadJobSpec,
        content: FinalizedContent,
    ) -> Result<FinalizedContent> {
        let update = UpdateItemContentRequest {
            item_id: spec.item_id.clone(),
            content,
        };
        let result = match self.coordinator.config.finalize_order {
            FinalizeOrder::DeleteThenUpdate => {
                self.delete_superseded(spec).await?;
                self.update_metadata(spec, &update).await
            }
            FinalizeOrder::UpdateThenDelete => {
                self.update_metadata(spec, &update).await?;
                self.delete_superseded(spec).await
            }
        };
        result?;
        Ok(update.content)
    }

    async fn delete_superseded(&self, spec: &UploadJobSpec) -> Result<()> {
        for key in &spec.replaces {
            let request = DeleteAssetRequest {
                object_key: key.clone(),
            };
            self.coordinator
                .client
                .delete_asset(&request)
                .await
                .map_err(|source| ClientError::Finalize {
                    stage: FinalizeStage::DeleteOld,
                    source: Box::new(source),
                })?;
            debug!(job = %self.id, key = %key, "superseded asset deleted");
        }
        Ok(())
    }

    async fn update_metadata(
        &self,
        spec: &UploadJobSpec,
        update: &UpdateItemContentRequest,
    ) -> Result<()> {
        self.coordinator
            .client
            .update_item_content(&spec.scope, update)
            .await
            .map_err(|source| ClientError::Finalize {
                stage: FinalizeStage::UpdateMetadata,
                source: Box::new(source),
            })?;
        if let Some(cache) = &self.coordinator.cache {
            cache.invalidate(&spec.scope);
        }
        Ok(())
    }
}

/// Race `fut` against the job's token.
async fn cancellable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ClientError::Cancelled),
        result = fut => result,
    }
}

fn thumbnail_offset(config: &UploadConfig) -> Result<Duration> {
    Duration::try_from_secs_f64(config.thumbnail_offset_secs).map_err(|_| {
        CurriculumError::Config(format!(
            "upload.thumbnail_offset_secs={} must be a non-negative number",
            config.thumbnail_offset_secs
        ))
        .into()
    })
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn spill_to_temp(spec: &UploadJobSpec) -> Result<tempfile::NamedTempFile> {
    let suffix = Path::new(&spec.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix("curriculum-src-")
        .suffix(&suffix)
        .tempfile()?;
    tokio::fs::write(file.path(), &spec.bytes).await?;
    Ok(file)
}

fn finalized_content(
    assets: &[PreparedAsset],
    tickets: &[UploadTicket],
    duration: Option<f64>,
) -> FinalizedContent {
    let mut content = FinalizedContent {
        object_key: String::new(),
        public_url: String::new(),
        derived_thumbnail_key: None,
        derived_thumbnail_url: None,
        duration,
        file_name: String::new(),
    };
    for (asset, ticket) in assets.iter().zip(tickets) {
        match asset.role {
            AssetRole::Primary => {
                content.object_key = ticket.object_key.clone();
                content.public_url = ticket.public_url.clone();
                content.file_name = asset.file_name.clone();
            }
            AssetRole::DerivedThumbnail => {
                content.derived_thumbnail_key = Some(ticket.object_key.clone());
                content.derived_thumbnail_url = Some(ticket.public_url.clone());
            }
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults_follow_content_type() {
        let video = UploadJobSpec::new(
            ScopeId::section("c1", "s1"),
            "l1",
            "intro.mp4",
            "video/mp4",
            vec![1u8; 4],
        );
        assert!(video.derive_thumbnail);
        assert!(!video.clone().without_thumbnail().derive_thumbnail);

        let pdf = UploadJobSpec::new(
            ScopeId::section("c1", "s1"),
            "l1",
            "notes.pdf",
            "application/pdf",
            vec![1u8; 4],
        );
        assert!(!pdf.derive_thumbnail);
    }

    #[tokio::test]
    async fn from_path_reads_file_and_guesses_type() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lesson.mp4");
        std::fs::write(&path, b"fake video").unwrap();

        let spec = UploadJobSpec::from_path(ScopeId::section("c1", "s1"), "l1", &path)
            .await
            .unwrap();
        assert_eq!(spec.file_name, "lesson.mp4");
        assert_eq!(spec.content_type, "video/mp4");
        assert_eq!(spec.bytes.len(), 10);
        assert_eq!(spec.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn finalized_content_maps_roles() {
        let assets = vec![
            PreparedAsset {
                role: AssetRole::Primary,
                file_name: "a.mp4".into(),
                content_type: "video/mp4".into(),
                bytes: Bytes::from_static(b"v"),
            },
            PreparedAsset {
                role: AssetRole::DerivedThumbnail,
                file_name: "a-thumbnail.jpg".into(),
                content_type: "image/jpeg".into(),
                bytes: Bytes::from_static(b"t"),
            },
        ];
        let ticket = |k: &str| UploadTicket {
            upload_url: format!("https://put/{k}"),
            object_key: k.to_string(),
            public_url: format!("https://get/{k}"),
        };
        let content = finalized_content(&assets, &[ticket("v"), ticket("t")], Some(3.5));
        assert_eq!(content.object_key, "v");
        assert_eq!(content.file_name, "a.mp4");
        assert_eq!(content.derived_thumbnail_key.as_deref(), Some("t"));
        assert_eq!(content.derived_thumbnail_url.as_deref(), Some("https://get/t"));
        assert_eq!(content.duration, Some(3.5));
    }
}
