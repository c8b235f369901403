use course_market::storage::{AssetStore, MockAssetStore, S3AssetStore};

mod common;

#[tokio::test]
async fn test_mock_store_returns_reference() {
    let mock = MockAssetStore::new();

    let image = mock
        .store("cover.png", "image/png", b"png-bytes".to_vec())
        .await
        .unwrap();

    assert!(image.asset_id.starts_with("courses/"));
    assert!(image.url.contains(&image.asset_id));
    assert_eq!(mock.stored(), vec![image.asset_id]);
}

#[tokio::test]
async fn test_mock_store_sanitizes_traversal_segments() {
    let mock = MockAssetStore::new();

    let image = mock
        .store("../../etc/passwd", "image/png", b"data".to_vec())
        .await
        .unwrap();

    assert!(!image.asset_id.contains(".."));
}

#[tokio::test]
async fn test_mock_store_failure() {
    let mock = MockAssetStore::new_failing();
    let result = mock.store("cover.png", "image/png", b"data".to_vec()).await;
    assert!(result.is_err());
    assert!(mock.stored().is_empty());
}

#[tokio::test]
async fn test_replace_stores_new_without_touching_old() {
    // `replace` only uploads the new object; discarding the old one is the
    // caller's decision, taken after the owning record write commits.
    let mock = MockAssetStore::new();

    let old = mock
        .store("old.png", "image/png", b"old".to_vec())
        .await
        .unwrap();
    let new = mock
        .replace(&old.asset_id, "new.jpg", "image/jpeg", b"new".to_vec())
        .await
        .unwrap();

    assert_ne!(new.asset_id, old.asset_id);
    assert!(mock.discarded().is_empty());
}

#[tokio::test]
async fn test_discard_is_recorded() {
    let mock = MockAssetStore::new();
    let image = mock
        .store("cover.png", "image/png", b"data".to_vec())
        .await
        .unwrap();

    mock.discard(&image.asset_id).await.unwrap();
    assert_eq!(mock.discarded(), vec![image.asset_id]);
}

#[tokio::test]
async fn test_discard_failure_surfaces_to_caller() {
    // The handler decides to swallow this; the store itself must report it.
    let mock = MockAssetStore::new_failing_discard();
    assert!(mock.discard("courses/some-key.png").await.is_err());
}

#[tokio::test]
async fn test_s3_store_construction() {
    // Just testing that construction doesn't panic; no network I/O happens
    // until the first request.
    let _store = S3AssetStore::new(
        "http://localhost:9000",
        "us-east-1",
        "test-key",
        "test-secret",
        "test-bucket",
    )
    .await;
}
