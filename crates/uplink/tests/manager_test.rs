//! Admission, removal and file-operation behavior.

mod helpers;

use std::sync::Arc;

use helpers::{input, EventRecorder, MockAdapter};
use uplink::{
    DeleteFromStorage, FilePatch, FileSource, FileStatus, ManagerConfig, RemoveOptions,
    UploadError, UploadManager,
};

fn manager_with(config: ManagerConfig) -> (UploadManager, Arc<MockAdapter>) {
    let adapter = Arc::new(MockAdapter::new());
    let manager = UploadManager::builder()
        .config(config)
        .storage(adapter.clone())
        .build();
    (manager, adapter)
}

#[tokio::test]
async fn test_add_file_admits_with_waiting_status() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let recorder = EventRecorder::attach(&manager);

    let file = manager.add_file(input("test.jpg", 1024)).await.unwrap();

    assert_eq!(file.status, FileStatus::Waiting);
    assert_eq!(file.size, 1024);
    assert_eq!(file.mime_type, "image/jpeg");
    assert_eq!(file.source, FileSource::Local);
    assert!(file.id.ends_with(".jpg"), "id was {}", file.id);
    assert_eq!(file.progress.percentage, 0);

    assert_eq!(manager.files_snapshot().len(), 1);
    assert_eq!(recorder.count("file:added"), 1);
}

#[tokio::test]
async fn test_ids_are_unique_across_admissions() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let a = manager.add_file(input("same.jpg", 1)).await.unwrap();
    let b = manager.add_file(input("other.jpg", 2)).await.unwrap();
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_add_file_without_extension_is_rejected() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let recorder = EventRecorder::attach(&manager);

    let err = manager.add_file(input("noextension", 10)).await.unwrap_err();
    assert!(matches!(err, UploadError::InvalidFileName(_)));
    assert!(manager.files_snapshot().is_empty());
    assert_eq!(recorder.names().len(), 0);
}

#[tokio::test]
async fn test_max_size_batch_admits_survivors_and_keeps_errored_entry() {
    let (manager, _) = manager_with(ManagerConfig {
        max_file_size: Some(500),
        ..Default::default()
    });
    let recorder = EventRecorder::attach(&manager);

    let admitted = manager
        .add_files(vec![
            input("small.jpg", 100),
            input("large.jpg", 1000),
            input("small2.jpg", 200),
        ])
        .await;

    assert_eq!(admitted.len(), 2);
    let files = manager.files_snapshot();
    assert_eq!(files.len(), 3);

    let large = files.iter().find(|f| f.name == "large.jpg").unwrap();
    assert_eq!(large.status, FileStatus::Error);
    assert!(large.error.as_ref().unwrap().message.contains("too large"));
    assert_eq!(recorder.count("file:error"), 1);
    assert_eq!(recorder.count("file:added"), 2);
}

#[tokio::test]
async fn test_max_files_limit_caps_registry_growth() {
    let (manager, _) = manager_with(ManagerConfig {
        max_files: Some(2),
        ..Default::default()
    });

    for i in 0..5 {
        let _ = manager.add_file(input(&format!("f{}.jpg", i), 10)).await;
    }
    assert_eq!(manager.files_snapshot().len(), 2);
}

struct SeatLimiter {
    seats: usize,
}

#[async_trait::async_trait]
impl uplink::Plugin for SeatLimiter {
    fn id(&self) -> &str {
        "seat-limiter"
    }

    async fn validate(
        &self,
        _file: &uplink::TrackedFile,
        ctx: &uplink::PluginContext,
    ) -> Result<(), uplink::FileError> {
        if ctx.files.len() >= self.seats {
            return Err(uplink::FileError::capacity(
                format!("All {} seats taken", self.seats),
                serde_json::json!({ "seats": self.seats }),
            ));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_user_capacity_validator_also_caps_growth() {
    // The capacity error kind carries the policy, not the built-in's id.
    let manager = UploadManager::builder()
        .storage(Arc::new(MockAdapter::new()))
        .plugin(Arc::new(SeatLimiter { seats: 1 }))
        .build();

    manager.add_file(input("a.jpg", 1)).await.unwrap();
    let err = manager.add_file(input("b.jpg", 1)).await.unwrap_err();
    assert!(matches!(err, UploadError::Validation(ref e) if e.is_capacity()));
    assert_eq!(manager.files_snapshot().len(), 1);
}

#[tokio::test]
async fn test_allowed_types_reject_unlisted_mime() {
    let (manager, _) = manager_with(ManagerConfig {
        allowed_file_types: Some(vec!["image/png".to_string()]),
        ..Default::default()
    });

    assert!(manager.add_file(input("ok.png", 10)).await.is_ok());
    let err = manager.add_file(input("nope.gif", 10)).await.unwrap_err();
    assert!(matches!(err, UploadError::Validation(_)));
}

#[tokio::test]
async fn test_duplicate_files_are_rejected() {
    let (manager, _) = manager_with(ManagerConfig::default());

    manager.add_file(input("dup.jpg", 64)).await.unwrap();
    let err = manager.add_file(input("dup.jpg", 64)).await.unwrap_err();
    assert!(matches!(err, UploadError::Validation(_)));

    // Disabled detection admits the copy.
    let (relaxed, _) = manager_with(ManagerConfig {
        detect_duplicates: false,
        ..Default::default()
    });
    relaxed.add_file(input("dup.jpg", 64)).await.unwrap();
    relaxed.add_file(input("dup.jpg", 64)).await.unwrap();
    assert_eq!(relaxed.files_snapshot().len(), 2);
}

#[tokio::test]
async fn test_remove_file_calls_adapter_only_for_remote_files() {
    let (manager, adapter) = manager_with(ManagerConfig::default());
    adapter.insert_remote("seeded.png", 2048, "image/png");

    let appended = manager
        .append_existing_files(vec!["seeded.png".to_string()])
        .await
        .unwrap();
    let remote_id = appended[0].id.clone();

    let recorder = EventRecorder::attach(&manager);
    manager.remove_file(&remote_id).await.unwrap();
    assert_eq!(adapter.removed_keys(), vec!["seeded.png".to_string()]);
    assert_eq!(recorder.count("file:removed"), 1);

    // A local file that never uploaded has no remote presence.
    let local = manager.add_file(input("local.jpg", 10)).await.unwrap();
    manager.remove_file(&local.id).await.unwrap();
    assert_eq!(adapter.removed_keys().len(), 1);
}

#[tokio::test]
async fn test_remove_file_never_policy_skips_adapter() {
    let (manager, adapter) = manager_with(ManagerConfig::default());
    adapter.insert_remote("seeded.png", 2048, "image/png");
    let appended = manager
        .append_existing_files(vec!["seeded.png".to_string()])
        .await
        .unwrap();

    manager
        .remove_file_with(
            &appended[0].id,
            RemoveOptions {
                delete_from_storage: DeleteFromStorage::Never,
            },
        )
        .await
        .unwrap();
    assert!(adapter.removed_keys().is_empty());
    assert!(manager.files_snapshot().is_empty());
}

#[tokio::test]
async fn test_remove_local_only_policy_spares_seeded_remotes() {
    let (manager, adapter) = manager_with(ManagerConfig::default());
    adapter.insert_remote("seeded.png", 2048, "image/png");
    let appended = manager
        .append_existing_files(vec!["seeded.png".to_string()])
        .await
        .unwrap();

    manager
        .remove_file_with(
            &appended[0].id,
            RemoveOptions {
                delete_from_storage: DeleteFromStorage::LocalOnly,
            },
        )
        .await
        .unwrap();
    assert!(adapter.removed_keys().is_empty());
}

#[tokio::test]
async fn test_remove_unknown_id_is_noop() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let recorder = EventRecorder::attach(&manager);
    assert!(manager.remove_file("missing").await.is_none());
    assert!(recorder.names().is_empty());
}

#[tokio::test]
async fn test_bulk_remove_is_local_only() {
    let (manager, adapter) = manager_with(ManagerConfig::default());
    let a = manager.add_file(input("a.jpg", 1)).await.unwrap();
    let b = manager.add_file(input("b.jpg", 1)).await.unwrap();
    manager.upload().await.unwrap();

    let recorder = EventRecorder::attach(&manager);
    let removed = manager.remove_files(&[a.id.as_str(), b.id.as_str()]);
    assert_eq!(removed.len(), 2);
    assert_eq!(recorder.count("file:removed"), 2);
    // Uploaded files have remote state, yet bulk removal skips the adapter.
    assert!(adapter.removed_keys().is_empty());
    assert!(manager.files_snapshot().is_empty());
}

#[tokio::test]
async fn test_reorder_emits_event_and_ignores_out_of_bounds() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let a = manager.add_file(input("a.jpg", 1)).await.unwrap();
    manager.add_file(input("b.jpg", 1)).await.unwrap();

    let recorder = EventRecorder::attach(&manager);
    manager.reorder_file(0, 1);
    assert_eq!(recorder.count("files:reorder"), 1);
    assert_eq!(manager.files_snapshot()[1].id, a.id);

    manager.reorder_file(0, 5);
    manager.reorder_file(1, 1);
    assert_eq!(recorder.count("files:reorder"), 1);
}

#[tokio::test]
async fn test_get_file_url_caches_object_urls() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let file = manager.add_file(input("a.jpg", 10)).await.unwrap();

    let url = manager.get_file_url(&file.id).unwrap();
    assert!(url.starts_with("mem://"));
    assert_eq!(manager.get_file_url(&file.id).unwrap(), url);
    assert_eq!(manager.tracked_url_count(), 1);

    assert!(matches!(
        manager.get_file_url("missing"),
        Err(UploadError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_get_file_data_returns_local_bytes() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let file = manager.add_file(input("a.jpg", 10)).await.unwrap();
    let data = manager.get_file_data(&file.id).await.unwrap();
    assert_eq!(data.len(), 10);
}

#[tokio::test]
async fn test_get_file_stream_chunks_local_bytes() {
    use futures::StreamExt;

    let (manager, _) = manager_with(ManagerConfig::default());
    let file = manager.add_file(input("a.jpg", 200_000)).await.unwrap();

    let mut stream = manager.get_file_stream(&file.id).await.unwrap();
    let mut total = 0usize;
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        total += chunk.unwrap().len();
        chunks += 1;
    }
    assert_eq!(total, 200_000);
    assert!(chunks > 1);
}

#[tokio::test]
async fn test_replace_file_data_resets_lifecycle() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let file = manager.add_file(input("a.jpg", 10)).await.unwrap();
    manager.upload().await.unwrap();
    manager.get_file_url(&file.id).unwrap();

    let uploaded = manager.get_file(&file.id).unwrap();
    assert_eq!(uploaded.status, FileStatus::Complete);
    assert!(uploaded.remote_url.is_some());

    let recorder = EventRecorder::attach(&manager);
    let replaced = manager
        .replace_file_data(&file.id, vec![1u8; 42], Some("b.jpg".to_string()), None)
        .await
        .unwrap();

    assert_eq!(replaced.id, file.id);
    assert_eq!(replaced.name, "b.jpg");
    assert_eq!(replaced.size, 42);
    assert_eq!(replaced.status, FileStatus::Waiting);
    assert!(replaced.remote_url.is_none());
    assert!(replaced.meta.is_empty());
    // The stale object URL was released.
    assert_eq!(manager.tracked_url_count(), 0);

    let names = recorder.names();
    assert_eq!(names, vec!["file:replaced", "file:added"]);
}

#[tokio::test]
async fn test_update_file_patches_without_events() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let file = manager.add_file(input("a.jpg", 10)).await.unwrap();

    let recorder = EventRecorder::attach(&manager);
    let mut meta = serde_json::Map::new();
    meta.insert("caption".to_string(), serde_json::json!("hello"));
    let updated = manager
        .update_file(
            &file.id,
            FilePatch {
                name: Some("renamed.jpg".to_string()),
                meta: Some(meta),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.name, "renamed.jpg");
    assert_eq!(updated.meta["caption"], "hello");
    assert!(recorder.names().is_empty());
}

#[tokio::test]
async fn test_clear_files_emits_per_file_and_releases_urls() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let a = manager.add_file(input("a.jpg", 1)).await.unwrap();
    manager.add_file(input("b.jpg", 1)).await.unwrap();
    manager.get_file_url(&a.id).unwrap();

    let recorder = EventRecorder::attach(&manager);
    let removed = manager.clear_files();
    assert_eq!(removed.len(), 2);
    assert_eq!(recorder.count("file:removed"), 2);
    assert_eq!(manager.tracked_url_count(), 0);
    assert!(manager.files_snapshot().is_empty());
}

#[tokio::test]
async fn test_reset_is_silent_and_releases_resources() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let a = manager.add_file(input("a.jpg", 1)).await.unwrap();
    manager.get_file_url(&a.id).unwrap();

    let recorder = EventRecorder::attach(&manager);
    manager.reset();
    assert!(recorder.names().is_empty());
    assert!(manager.files_snapshot().is_empty());
    assert_eq!(manager.tracked_url_count(), 0);
}

#[tokio::test]
async fn test_files_watch_observes_mutations() {
    let (manager, _) = manager_with(ManagerConfig::default());
    let rx = manager.files();
    manager.add_file(input("a.jpg", 1)).await.unwrap();
    assert_eq!(rx.borrow().len(), 1);
}
