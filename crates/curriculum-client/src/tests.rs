/// In-memory backend that records every call and can be scripted to fail
/// or stall individual operations.
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::{Notify, Semaphore};
    use tokio_util::sync::CancellationToken;

    use curriculum_core::types::{
        AssetRole, DeleteAssetRequest, ItemKind, OrderableItem, SaveOrderRequest, ScopeId,
        UpdateItemContentRequest, UploadTicket, UploadUrlRequest,
    };

    use crate::persistence::{BlobTransport, ByteProgress, PersistenceClient};
    use crate::thumbnail::{DerivedAsset, ThumbnailDeriver};
    use crate::{ClientError, Result};

    /// `[A(1) lecture, B(2) quiz, C(3) lecture]`
    pub fn abc() -> Vec<OrderableItem> {
        vec![
            OrderableItem::new("A", 1, ItemKind::Lecture),
            OrderableItem::new("B", 2, ItemKind::Quiz),
            OrderableItem::new("C", 3, ItemKind::Lecture),
        ]
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Fetch(ScopeId),
        SaveOrder(Vec<String>),
        UploadUrl(AssetRole, String),
        Put(String),
        Delete(String),
        Update(String),
    }

    #[derive(Default)]
    struct Script {
        scopes: HashMap<ScopeId, Vec<OrderableItem>>,
        fail_saves: usize,
        fail_puts: HashSet<String>,
        hold_puts: HashSet<String>,
        fail_delete: bool,
        fail_update: bool,
        cancel_after_put: Option<(String, CancellationToken)>,
    }

    #[derive(Default)]
    pub struct FakeBackend {
        script: Mutex<Script>,
        calls: Mutex<Vec<Call>>,
        save_gate: Option<Semaphore>,
    }

    fn unavailable(what: &str) -> ClientError {
        ClientError::Status {
            status: 503,
            message: format!("{what} unavailable"),
        }
    }

    impl FakeBackend {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn with_scope(scope: ScopeId, items: Vec<OrderableItem>) -> Arc<Self> {
            let backend = Self::new();
            backend.set_scope(scope, items);
            backend
        }

        /// Every `save_order` blocks until [`release_saves`](Self::release_saves).
        pub fn gated() -> Arc<Self> {
            Arc::new(Self {
                save_gate: Some(Semaphore::new(0)),
                ..Self::default()
            })
        }

        pub fn set_scope(&self, scope: ScopeId, items: Vec<OrderableItem>) {
            self.script.lock().unwrap().scopes.insert(scope, items);
        }

        pub fn fail_next_saves(&self, n: usize) {
            self.script.lock().unwrap().fail_saves = n;
        }

        pub fn fail_put(&self, file_name: &str) {
            self.script.lock().unwrap().fail_puts.insert(file_name.into());
        }

        /// The PUT for `file_name` never resolves on its own.
        pub fn hold_put(&self, file_name: &str) {
            self.script.lock().unwrap().hold_puts.insert(file_name.into());
        }

        pub fn fail_delete(&self) {
            self.script.lock().unwrap().fail_delete = true;
        }

        pub fn fail_update(&self) {
            self.script.lock().unwrap().fail_update = true;
        }

        /// Fire `token` right after the PUT for `file_name` resolves.
        pub fn cancel_after_put(&self, file_name: &str, token: CancellationToken) {
            self.script.lock().unwrap().cancel_after_put = Some((file_name.into(), token));
        }

        pub fn release_saves(&self, n: usize) {
            if let Some(gate) = &self.save_gate {
                gate.add_permits(n);
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        pub fn fetch_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::Fetch(_)))
                .count()
        }

        pub fn saved_orders(&self) -> Vec<Vec<String>> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::SaveOrder(ids) => Some(ids),
                    _ => None,
                })
                .collect()
        }

        pub fn destructive_calls(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Delete(_) | Call::Update(_)))
                .collect()
        }

        pub async fn wait_for_saves(&self, n: usize) {
            while self.saved_orders().len() < n {
                tokio::task::yield_now().await;
            }
        }

        pub async fn wait_for_put(&self, file_name: &str) {
            let wanted = Call::Put(file_name.to_string());
            while !self.calls().contains(&wanted) {
                tokio::task::yield_now().await;
            }
        }
    }

    #[async_trait]
    impl PersistenceClient for FakeBackend {
        async fn fetch_scope(&self, scope: &ScopeId) -> Result<Vec<OrderableItem>> {
            self.record(Call::Fetch(scope.clone()));
            Ok(self
                .script
                .lock()
                .unwrap()
                .scopes
                .get(scope)
                .cloned()
                .unwrap_or_default())
        }

        async fn save_order(&self, _scope: &ScopeId, request: &SaveOrderRequest) -> Result<()> {
            self.record(Call::SaveOrder(
                request.items.iter().map(|e| e.item_id.clone()).collect(),
            ));
            if let Some(gate) = &self.save_gate {
                gate.acquire().await.unwrap().forget();
            }
            let mut script = self.script.lock().unwrap();
            if script.fail_saves > 0 {
                script.fail_saves -= 1;
                return Err(unavailable("order store"));
            }
            Ok(())
        }

        async fn request_upload_url(&self, request: &UploadUrlRequest) -> Result<UploadTicket> {
            self.record(Call::UploadUrl(request.asset_role, request.file_name.clone()));
            let key = format!("{}/{}/{}", request.scope_id, request.asset_role, request.file_name);
            Ok(UploadTicket {
                upload_url: format!("fake://{}", request.file_name),
                public_url: format!("https://cdn.test/{key}"),
                object_key: key,
            })
        }

        async fn delete_asset(&self, request: &DeleteAssetRequest) -> Result<()> {
            self.record(Call::Delete(request.object_key.clone()));
            if self.script.lock().unwrap().fail_delete {
                return Err(unavailable("object store"));
            }
            Ok(())
        }

        async fn update_item_content(
            &self,
            _scope: &ScopeId,
            request: &UpdateItemContentRequest,
        ) -> Result<()> {
            self.record(Call::Update(request.item_id.clone()));
            if self.script.lock().unwrap().fail_update {
                return Err(unavailable("content store"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BlobTransport for FakeBackend {
        async fn put_object(
            &self,
            upload_url: &str,
            body: Bytes,
            _content_type: &str,
            progress: ByteProgress,
        ) -> Result<()> {
            let name = upload_url.trim_start_matches("fake://").to_string();
            self.record(Call::Put(name.clone()));
            let (fail, hold) = {
                let script = self.script.lock().unwrap();
                (script.fail_puts.contains(&name), script.hold_puts.contains(&name))
            };

            let len = body.len() as u64;
            progress(len / 2);
            tokio::task::yield_now().await;
            if hold {
                std::future::pending::<()>().await;
            }
            if fail {
                return Err(unavailable("bucket"));
            }
            progress(len);

            let script = self.script.lock().unwrap();
            if let Some((after, token)) = &script.cancel_after_put {
                if *after == name {
                    token.cancel();
                }
            }
            Ok(())
        }
    }

    /// Stands in for ffmpeg: a thumbnail of `thumb_bytes` zero bytes.
    #[derive(Default)]
    pub struct FakeDeriver {
        pub thumb_bytes: usize,
        pub duration: Option<f64>,
        pub fail: bool,
        /// `derive` never resolves on its own.
        pub stall: bool,
        /// Signalled when `derive` is entered.
        pub entered: Notify,
    }

    impl FakeDeriver {
        pub fn new(thumb_bytes: usize) -> Arc<Self> {
            Arc::new(Self {
                thumb_bytes,
                duration: Some(42.5),
                ..Self::default()
            })
        }

        pub fn stalling() -> Arc<Self> {
            Arc::new(Self {
                stall: true,
                ..Self::default()
            })
        }
    }

    #[async_trait]
    impl ThumbnailDeriver for FakeDeriver {
        async fn derive(&self, source: &Path, _offset: Duration) -> Result<DerivedAsset> {
            assert!(source.exists(), "deriver must see the primary on disk");
            self.entered.notify_one();
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(ClientError::Thumbnail("decoder error".into()));
            }
            Ok(DerivedAsset {
                bytes: Bytes::from(vec![0u8; self.thumb_bytes]),
                content_type: "image/jpeg".into(),
            })
        }

        async fn probe_duration(&self, _source: &Path) -> Result<Option<f64>> {
            Ok(self.duration)
        }
    }
}

/// End-to-end behaviour of both engines against the fake backend.
#[cfg(test)]
mod scenarios {
    use std::sync::{Arc, Mutex};

    use futures::StreamExt;

    use curriculum_core::config::{EditorConfig, FinalizeOrder, UploadConfig};
    use curriculum_core::gesture::{DragTracker, Point, PointerTarget};
    use curriculum_core::ordering;
    use curriculum_core::state::{ScopePhase, UploadPhase};
    use curriculum_core::types::{AssetRole, OrderableItem, OrderedScope, ScopeId};
    use curriculum_core::CurriculumError;
    use tokio_util::sync::CancellationToken;

    use super::fake::{abc, Call, FakeBackend, FakeDeriver};
    use crate::{
        ClientError, CommitOutcome, FinalizeStage, OrderingEngine, ScopeCache, UploadCoordinator,
        UploadJobSpec, UploadOutcome, UploadProgress,
    };

    fn scope() -> ScopeId {
        ScopeId::section("c1", "s1")
    }

    fn ids(items: &[OrderableItem]) -> Vec<(&str, u32)> {
        items.iter().map(|i| (i.id.as_str(), i.order)).collect()
    }

    fn loaded_engine(backend: &Arc<FakeBackend>) -> Arc<OrderingEngine> {
        let engine = Arc::new(OrderingEngine::new(backend.clone()));
        engine.load(OrderedScope::new(scope(), abc()));
        engine
    }

    // ── Ordering ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn move_first_to_last_persists_and_becomes_snapshot() {
        let backend = FakeBackend::new();
        let engine = loaded_engine(&backend);

        let optimistic = engine.reorder(&scope(), "A", 2).unwrap();
        assert_eq!(ids(&optimistic), vec![("B", 1), ("C", 2), ("A", 3)]);
        assert_eq!(
            engine.phase(&scope()).unwrap(),
            ScopePhase::OptimisticallyApplied
        );

        assert_eq!(
            engine.commit(&scope()).await.unwrap(),
            CommitOutcome::Persisted
        );
        assert_eq!(backend.saved_orders(), vec![vec!["B", "C", "A"]]);
        assert_eq!(
            ids(&engine.snapshot(&scope()).unwrap()),
            vec![("B", 1), ("C", 2), ("A", 3)]
        );
        assert_eq!(engine.phase(&scope()).unwrap(), ScopePhase::Idle);
    }

    #[tokio::test]
    async fn failed_save_restores_pre_drag_order() {
        let backend = FakeBackend::new();
        backend.fail_next_saves(1);
        let engine = loaded_engine(&backend);
        let before = engine.rendered(&scope()).unwrap();

        engine.reorder(&scope(), "A", 2).unwrap();
        let err = engine.commit(&scope()).await.unwrap_err();

        assert!(matches!(err, ClientError::OrderPersist { .. }), "{err}");
        assert_eq!(engine.rendered(&scope()).unwrap(), before);
        assert_eq!(
            ids(&engine.rendered(&scope()).unwrap()),
            vec![("A", 1), ("B", 2), ("C", 3)]
        );
        assert_eq!(engine.phase(&scope()).unwrap(), ScopePhase::Idle);
    }

    #[tokio::test]
    async fn every_committed_order_is_contiguous() {
        let backend = FakeBackend::new();
        let engine = loaded_engine(&backend);
        for (id, to) in [("C", 0), ("A", 1), ("B", 9), ("C", 2)] {
            engine.move_item(&scope(), id, to).await.unwrap();
            assert!(ordering::is_contiguous(&engine.snapshot(&scope()).unwrap()));
        }
    }

    #[tokio::test]
    async fn commit_during_flight_is_deferred_and_last_write_wins() {
        let backend = FakeBackend::gated();
        let engine = loaded_engine(&backend);

        engine.reorder(&scope(), "A", 2).unwrap();
        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.commit(&scope()).await })
        };
        backend.wait_for_saves(1).await;
        assert_eq!(engine.phase(&scope()).unwrap(), ScopePhase::Persisting);

        // The view moves immediately even though persistence is busy.
        let rendered = engine.reorder(&scope(), "B", 2).unwrap();
        assert_eq!(ids(&rendered), vec![("C", 1), ("A", 2), ("B", 3)]);
        assert_eq!(
            engine.commit(&scope()).await.unwrap(),
            CommitOutcome::Deferred
        );
        assert_eq!(backend.saved_orders().len(), 1);

        backend.release_saves(2);
        assert_eq!(first.await.unwrap().unwrap(), CommitOutcome::Persisted);

        assert_eq!(
            backend.saved_orders(),
            vec![vec!["B", "C", "A"], vec!["C", "A", "B"]]
        );
        assert_eq!(
            ids(&engine.snapshot(&scope()).unwrap()),
            vec![("C", 1), ("A", 2), ("B", 3)]
        );
        assert_eq!(engine.phase(&scope()).unwrap(), ScopePhase::Idle);
    }

    #[tokio::test]
    async fn failure_of_queued_save_rolls_back_to_first_confirmed_order() {
        let backend = FakeBackend::gated();
        let engine = loaded_engine(&backend);

        engine.reorder(&scope(), "A", 2).unwrap();
        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.commit(&scope()).await })
        };
        backend.wait_for_saves(1).await;
        engine.reorder(&scope(), "B", 2).unwrap();
        engine.commit(&scope()).await.unwrap();

        // First save lands, the queued one fails.
        backend.release_saves(1);
        backend.wait_for_saves(2).await;
        backend.fail_next_saves(1);
        backend.release_saves(1);

        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::OrderPersist { .. }));
        assert_eq!(
            ids(&engine.rendered(&scope()).unwrap()),
            vec![("B", 1), ("C", 2), ("A", 3)]
        );
    }

    #[tokio::test]
    async fn drag_release_feeds_engine_and_persists() {
        let config: EditorConfig =
            serde_yaml::from_str("drag:\n  activation_distance_px: 12.0\n").unwrap();
        let backend = FakeBackend::new();
        let engine = loaded_engine(&backend);
        let mut tracker = DragTracker::from_config(&config.drag);

        assert!(tracker.pointer_down("A", 0, PointerTarget::DragHandle, Point::new(0.0, 0.0)));
        assert!(!tracker.pointer_move(Point::new(0.0, 10.0)));
        assert!(tracker.pointer_move(Point::new(0.0, 80.0)));
        engine.begin_drag(&scope()).unwrap();
        assert_eq!(engine.phase(&scope()).unwrap(), ScopePhase::Dragging);

        let intent = tracker.release(2).unwrap();
        let rendered = engine.apply_intent(&scope(), &intent).unwrap();
        assert_eq!(ids(&rendered), vec![("B", 1), ("C", 2), ("A", 3)]);

        assert_eq!(
            engine.commit(&scope()).await.unwrap(),
            CommitOutcome::Persisted
        );
        assert_eq!(backend.saved_orders(), vec![vec!["B", "C", "A"]]);
        assert_eq!(engine.phase(&scope()).unwrap(), ScopePhase::Idle);
    }

    #[tokio::test]
    async fn failed_save_during_drag_keeps_gesture_alive() {
        let backend = FakeBackend::gated();
        backend.fail_next_saves(1);
        let engine = loaded_engine(&backend);

        engine.reorder(&scope(), "A", 2).unwrap();
        let save = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.commit(&scope()).await })
        };
        backend.wait_for_saves(1).await;
        engine.begin_drag(&scope()).unwrap();

        backend.release_saves(1);
        assert!(matches!(
            save.await.unwrap(),
            Err(ClientError::OrderPersist { .. })
        ));

        assert_eq!(engine.phase(&scope()).unwrap(), ScopePhase::Dragging);
        assert_eq!(
            ids(&engine.rendered(&scope()).unwrap()),
            vec![("A", 1), ("B", 2), ("C", 3)]
        );

        // The drag lands on the restored order.
        engine.reorder(&scope(), "C", 0).unwrap();
        assert_eq!(
            ids(&engine.rendered(&scope()).unwrap()),
            vec![("C", 1), ("A", 2), ("B", 3)]
        );
        assert_eq!(
            engine.phase(&scope()).unwrap(),
            ScopePhase::OptimisticallyApplied
        );
    }

    // ── Uploads ───────────────────────────────────────────────────────────

    fn coordinator(backend: &Arc<FakeBackend>, config: UploadConfig) -> UploadCoordinator {
        UploadCoordinator::new(
            backend.clone(),
            backend.clone(),
            FakeDeriver::new(2_000),
            config,
        )
    }

    fn sequential() -> UploadConfig {
        UploadConfig {
            parallel_transfers: false,
            ..UploadConfig::default()
        }
    }

    fn video_job() -> UploadJobSpec {
        UploadJobSpec::new(scope(), "lec-1", "intro.mp4", "video/mp4", vec![7u8; 40_000])
            .replacing(["s1/primary/old.mp4".to_string()])
    }

    #[tokio::test]
    async fn video_upload_derives_thumbnail_and_finalizes() {
        let backend = FakeBackend::new();
        let handle = coordinator(&backend, UploadConfig::default()).start(video_job());

        let UploadOutcome::Completed(content) = handle.result().await.unwrap() else {
            panic!("expected Completed")
        };
        assert_eq!(content.object_key, "s1/primary/intro.mp4");
        assert_eq!(
            content.derived_thumbnail_key.as_deref(),
            Some("s1/derived-thumbnail/intro-thumbnail.jpg")
        );
        assert_eq!(content.duration, Some(42.5));
        assert_eq!(content.file_name, "intro.mp4");

        // Delete-then-update, once each, after both transfers.
        assert_eq!(
            backend.destructive_calls(),
            vec![
                Call::Delete("s1/primary/old.mp4".into()),
                Call::Update("lec-1".into())
            ]
        );
        let calls = backend.calls();
        let last_put = calls
            .iter()
            .rposition(|c| matches!(c, Call::Put(_)))
            .unwrap();
        let first_delete = calls
            .iter()
            .position(|c| matches!(c, Call::Delete(_)))
            .unwrap();
        assert!(last_put < first_delete);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_hits_100_only_at_completion() {
        let backend = FakeBackend::new();
        let handle = coordinator(&backend, UploadConfig::default()).start(video_job());

        let seen = Arc::new(Mutex::new(Vec::<UploadProgress>::new()));
        let sink = seen.clone();
        let watcher = handle.on_progress(move |p| sink.lock().unwrap().push(p));

        handle.result().await.unwrap();
        watcher.await.unwrap();

        let seen = seen.lock().unwrap();
        let last = *seen.last().unwrap();
        assert_eq!(last.phase, UploadPhase::Completed);
        assert_eq!(last.percent, 100);
        assert_eq!(last.total_bytes, 42_000);
        assert_eq!(last.uploaded_bytes, 42_000);
        for pair in seen.windows(2) {
            assert!(pair[0].percent <= pair[1].percent, "{:?}", *seen);
            assert!(pair[0].uploaded_bytes <= pair[1].uploaded_bytes);
        }
        for p in seen.iter() {
            assert!(p.uploaded_bytes <= p.total_bytes || p.total_bytes == 0);
            if p.percent == 100 {
                assert_eq!(p.uploaded_bytes, p.total_bytes);
            }
        }
    }

    #[tokio::test]
    async fn cancel_after_video_before_thumbnail_is_clean() {
        let backend = FakeBackend::new();
        let token = CancellationToken::new();
        backend.cancel_after_put("intro.mp4", token.clone());

        let handle = coordinator(&backend, sequential()).start_with_token(video_job(), token);
        let rx = handle.subscribe();
        let outcome = handle.result().await.unwrap();

        assert_eq!(outcome, UploadOutcome::Cancelled);
        assert!(backend.destructive_calls().is_empty());
        assert!(!backend
            .calls()
            .contains(&Call::UploadUrl(AssetRole::DerivedThumbnail, "intro-thumbnail.jpg".into())));

        let last = *rx.borrow();
        assert_eq!(last.phase, UploadPhase::Cancelled);
        assert_eq!(last.total_bytes, 42_000);
        assert_eq!(last.uploaded_bytes, 40_000);
        assert_eq!(last.percent, 95);
    }

    #[tokio::test]
    async fn cancel_mid_parallel_transfer_skips_finalize() {
        let backend = FakeBackend::new();
        backend.hold_put("intro-thumbnail.jpg");
        let handle = coordinator(&backend, UploadConfig::default()).start(video_job());

        backend.wait_for_put("intro-thumbnail.jpg").await;
        handle.cancel();

        assert_eq!(handle.result().await.unwrap(), UploadOutcome::Cancelled);
        assert!(backend.destructive_calls().is_empty());
    }

    #[tokio::test]
    async fn transfer_failure_fails_job_and_reports_orphans() {
        let backend = FakeBackend::new();
        backend.fail_put("intro-thumbnail.jpg");
        let handle = coordinator(&backend, sequential()).start(video_job());

        let err = handle.result().await.unwrap_err();
        match err {
            ClientError::Transfer {
                role,
                orphaned_keys,
                ..
            } => {
                assert_eq!(role, AssetRole::DerivedThumbnail);
                assert_eq!(orphaned_keys, vec!["s1/primary/intro.mp4".to_string()]);
            }
            other => panic!("expected Transfer, got {other:?}"),
        }
        assert!(backend.destructive_calls().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_stops_before_metadata_update() {
        let backend = FakeBackend::new();
        backend.fail_delete();
        let handle = coordinator(&backend, UploadConfig::default()).start(video_job());
        let rx = handle.subscribe();

        let err = handle.result().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Finalize {
                stage: FinalizeStage::DeleteOld,
                ..
            }
        ));
        assert!(!backend.calls().contains(&Call::Update("lec-1".into())));
        assert_eq!(rx.borrow().phase, UploadPhase::Failed);
    }

    #[tokio::test]
    async fn failed_update_after_delete_is_reported() {
        let backend = FakeBackend::new();
        backend.fail_update();
        let handle = coordinator(&backend, UploadConfig::default()).start(video_job());

        let err = handle.result().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Finalize {
                stage: FinalizeStage::UpdateMetadata,
                ..
            }
        ));
        // The old object is already gone.
        assert!(backend
            .calls()
            .contains(&Call::Delete("s1/primary/old.mp4".into())));
    }

    #[tokio::test]
    async fn update_then_delete_keeps_old_asset_when_update_fails() {
        let backend = FakeBackend::new();
        backend.fail_update();
        let config = UploadConfig {
            finalize_order: FinalizeOrder::UpdateThenDelete,
            ..UploadConfig::default()
        };
        let handle = coordinator(&backend, config).start(video_job());

        assert!(handle.result().await.is_err());
        assert_eq!(backend.destructive_calls(), vec![Call::Update("lec-1".into())]);
    }

    #[tokio::test]
    async fn oversized_asset_is_rejected_before_any_request() {
        let backend = FakeBackend::new();
        let config = UploadConfig {
            max_file_bytes: Some(1_000),
            ..UploadConfig::default()
        };
        let handle = coordinator(&backend, config).start(video_job());

        let err = handle.result().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Core(CurriculumError::AssetTooLarge { .. })
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn thumbnail_failure_fails_before_any_request() {
        let backend = FakeBackend::new();
        let deriver = Arc::new(FakeDeriver {
            fail: true,
            ..FakeDeriver::default()
        });
        let handle = UploadCoordinator::new(
            backend.clone(),
            backend.clone(),
            deriver,
            UploadConfig::default(),
        )
        .start(video_job());

        let err = handle.result().await.unwrap_err();
        assert!(matches!(err, ClientError::Thumbnail(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_while_deriving_thumbnail_issues_no_requests() {
        let backend = FakeBackend::new();
        let deriver = FakeDeriver::stalling();
        let handle = UploadCoordinator::new(
            backend.clone(),
            backend.clone(),
            deriver.clone(),
            UploadConfig::default(),
        )
        .start(video_job());
        let rx = handle.subscribe();

        deriver.entered.notified().await;
        assert_eq!(rx.borrow().phase, UploadPhase::Preparing);
        handle.cancel();

        assert_eq!(handle.result().await.unwrap(), UploadOutcome::Cancelled);
        assert!(backend.calls().is_empty());
        assert!(backend.destructive_calls().is_empty());
        assert_eq!(rx.borrow().phase, UploadPhase::Cancelled);
    }

    #[tokio::test]
    async fn negative_thumbnail_offset_fails_job_cleanly() {
        let backend = FakeBackend::new();
        let config: UploadConfig = serde_yaml::from_str("thumbnail_offset_secs: -1.0").unwrap();
        let handle = coordinator(&backend, config).start(video_job());
        let rx = handle.subscribe();

        let err = handle.result().await.unwrap_err();
        assert!(
            matches!(err, ClientError::Core(CurriculumError::Config(_))),
            "{err:?}"
        );
        assert_eq!(rx.borrow().phase, UploadPhase::Failed);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn handle_exposes_id_current_and_stream() {
        let backend = FakeBackend::new();
        let coordinator = coordinator(&backend, UploadConfig::default());
        let handle = coordinator.start(video_job());
        let other = coordinator.start(video_job());
        assert_ne!(handle.id(), other.id());

        let stream = handle.progress_stream();
        let mut rx = handle.subscribe();
        rx.wait_for(|p| p.phase.is_terminal()).await.unwrap();
        assert_eq!(handle.current().phase, UploadPhase::Completed);
        assert_eq!(handle.current().percent, 100);

        handle.result().await.unwrap();
        other.result().await.unwrap();

        // The stream ends once the job drops its sender.
        let seen: Vec<UploadProgress> = stream.collect().await;
        assert_eq!(seen.last().map(|p| p.phase), Some(UploadPhase::Completed));
    }

    #[tokio::test]
    async fn document_upload_has_no_derived_asset() {
        let backend = FakeBackend::new();
        let spec = UploadJobSpec::new(scope(), "lec-2", "notes.pdf", "application/pdf", vec![1u8; 500]);
        let handle = coordinator(&backend, UploadConfig::default()).start(spec);

        let UploadOutcome::Completed(content) = handle.result().await.unwrap() else {
            panic!("expected Completed")
        };
        assert!(content.derived_thumbnail_key.is_none());
        assert!(content.duration.is_none());
        let puts: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Put(_)))
            .collect();
        assert_eq!(puts, vec![Call::Put("notes.pdf".into())]);
    }

    #[tokio::test]
    async fn finalized_upload_invalidates_owning_scope() {
        let backend = FakeBackend::with_scope(scope(), abc());
        let cache = Arc::new(ScopeCache::new());
        cache.get(&*backend, &scope()).await.unwrap();

        let handle = coordinator(&backend, UploadConfig::default())
            .with_cache(cache.clone())
            .start(video_job());
        handle.result().await.unwrap();
        assert!(cache.peek(&scope()).is_none());
    }
}
