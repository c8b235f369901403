use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode, header},
};
use course_market::{
    auth::LearnerAuth, create_router, error::ApiError, handlers, storage::MockAssetStore,
    token::TokenService,
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

mod common;

use common::MemoryRepo;

#[tokio::test]
async fn test_sequential_double_purchase() {
    let repo = Arc::new(MemoryRepo::new());
    let state = common::test_state(&repo, &Arc::new(MockAssetStore::new()));

    let admin_id = Uuid::new_v4();
    let learner_id = Uuid::new_v4();
    let course = common::seed_course(&repo, admin_id, "C1").await;

    // First buy succeeds and records the purchase.
    let purchase = handlers::buy_course(
        LearnerAuth(learner_id),
        State(state.clone()),
        Path(course.id),
    )
    .await
    .unwrap()
    .0;
    assert_eq!(purchase.learner_id, learner_id);
    assert_eq!(purchase.course_id, course.id);

    // Second buy of the same course must fail, exactly once purchased.
    let err = handlers::buy_course(LearnerAuth(learner_id), State(state), Path(course.id))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::DuplicatePurchase));
    assert_eq!(repo.purchase_count(learner_id, course.id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_yield_exactly_one_record() {
    let repo = Arc::new(MemoryRepo::new());
    let state = common::test_state(&repo, &Arc::new(MockAssetStore::new()));

    let learner_id = Uuid::new_v4();
    let course = common::seed_course(&repo, Uuid::new_v4(), "C-race").await;
    let course_id = course.id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            handlers::buy_course(LearnerAuth(learner_id), State(state), Path(course_id)).await
        }));
    }

    let mut successes = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ApiError::DuplicatePurchase) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Exactly one request wins the race; every loser sees the duplicate
    // rejection, never a silent success.
    assert_eq!(successes, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(repo.purchase_count(learner_id, course.id), 1);
}

#[tokio::test]
async fn test_purchase_of_unknown_course_is_not_found() {
    let state = common::test_state(&Arc::new(MemoryRepo::new()), &Arc::new(MockAssetStore::new()));

    let err = handlers::buy_course(
        LearnerAuth(Uuid::new_v4()),
        State(state),
        Path(Uuid::new_v4()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_malformed_course_id_rejected_at_the_path() {
    // A non-UUID course id never reaches the handler: the path extractor
    // rejects it as a 400.
    let repo = Arc::new(MemoryRepo::new());
    let state = common::test_state(&repo, &Arc::new(MockAssetStore::new()));
    let token = TokenService::learner(&state.config)
        .issue(Uuid::new_v4())
        .unwrap();
    let router = create_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/course/buy/not-a-uuid")
                .header(header::COOKIE, format!("session={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purchase_listing_joins_courses() {
    let repo = Arc::new(MemoryRepo::new());
    let state = common::test_state(&repo, &Arc::new(MockAssetStore::new()));

    let learner_id = Uuid::new_v4();
    let course = common::seed_course(&repo, Uuid::new_v4(), "C1").await;
    common::seed_course(&repo, Uuid::new_v4(), "C2").await;

    handlers::buy_course(
        LearnerAuth(learner_id),
        State(state.clone()),
        Path(course.id),
    )
    .await
    .unwrap();

    let listing = handlers::list_purchases(LearnerAuth(learner_id), State(state))
        .await
        .unwrap()
        .0;

    // Exactly the purchased course, joined with its record.
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].purchase.learner_id, learner_id);
    assert_eq!(listing[0].course.id, course.id);
    assert_eq!(listing[0].course.title, "C1");
}

#[tokio::test]
async fn test_purchase_listing_empty_is_ok() {
    let state = common::test_state(&Arc::new(MemoryRepo::new()), &Arc::new(MockAssetStore::new()));

    let listing = handlers::list_purchases(LearnerAuth(Uuid::new_v4()), State(state))
        .await
        .unwrap()
        .0;
    assert!(listing.is_empty());
}
