//! Integration tests for concurrent access to sessions
//!
//! - Parallel mutations on one session are serialized (no lost updates)
//! - Readers never observe a half-applied mutation
//! - Different sessions proceed independently

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use eda_common::config::TomlConfig;
use eda_server::dataset::load::read_csv;
use eda_server::pipeline::{fill_missing, remove_columns, FillMethod};
use eda_server::session::SessionStore;
use eda_server::{build_router, AppState};
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tower::util::ServiceExt;

const COLUMNS: usize = 24;

/// Table with columns c0..c{n-1} and three rows
fn wide_csv(columns: usize) -> String {
    let header: Vec<String> = (0..columns).map(|i| format!("c{i}")).collect();
    let row: Vec<String> = (0..columns).map(|i| i.to_string()).collect();
    format!(
        "{}\n{}\n{}\n{}\n",
        header.join(","),
        row.join(","),
        row.join(","),
        row.join(",")
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_removals_lose_no_updates() {
    let store = SessionStore::new(Duration::from_secs(10));
    let id = store
        .create(read_csv(wide_csv(COLUMNS).as_bytes()).unwrap(), "wide.csv")
        .await;

    let mut join_set = JoinSet::new();
    for i in 0..COLUMNS {
        let store = store.clone();
        join_set.spawn(async move {
            store
                .mutate(id, move |dataset| remove_columns(dataset, &[format!("c{i}")]))
                .await
                .map(|committed| committed.action)
        });
    }

    let mut committed = 0;
    while let Some(result) = join_set.join_next().await {
        let action = result.unwrap().unwrap();
        assert!(action.is_some());
        committed += 1;
    }
    assert_eq!(committed, COLUMNS);

    let snapshot = store.get(id).await.unwrap();
    assert_eq!(snapshot.current.width(), 0);
    assert_eq!(snapshot.actions.len(), COLUMNS);
    assert_eq!(snapshot.original.width(), COLUMNS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_removals_of_same_column() {
    let store = SessionStore::new(Duration::from_secs(10));
    let id = store
        .create(read_csv(wide_csv(4).as_bytes()).unwrap(), "wide.csv")
        .await;

    let mut join_set = JoinSet::new();
    for _ in 0..8 {
        let store = store.clone();
        join_set.spawn(async move {
            store
                .mutate(id, |dataset| remove_columns(dataset, &["c0".to_string()]))
                .await
                .is_ok()
        });
    }

    let mut successes = 0;
    while let Some(result) = join_set.join_next().await {
        if result.unwrap() {
            successes += 1;
        }
    }

    // exactly one request sees the column
    assert_eq!(successes, 1);
    assert_eq!(store.get(id).await.unwrap().actions.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_consistent_snapshots() {
    let store = SessionStore::new(Duration::from_secs(10));
    let id = store
        .create(read_csv(wide_csv(COLUMNS).as_bytes()).unwrap(), "wide.csv")
        .await;

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..COLUMNS {
                store
                    .mutate(id, move |dataset| remove_columns(dataset, &[format!("c{i}")]))
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = JoinSet::new();
    for _ in 0..4 {
        let store = store.clone();
        readers.spawn(async move {
            for _ in 0..50 {
                let snapshot = store.get(id).await.unwrap();
                // table and log always move together
                assert_eq!(snapshot.current.width() + snapshot.actions.len(), COLUMNS);
                tokio::task::yield_now().await;
            }
        });
    }

    writer.await.unwrap();
    while let Some(result) = readers.join_next().await {
        result.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sessions_are_independent() {
    let store = SessionStore::new(Duration::from_secs(10));
    let a = store
        .create(read_csv(b"x,y\n1,a\n,b\n3,c\n").unwrap(), "a.csv")
        .await;
    let b = store
        .create(read_csv(b"x,y\n1,a\n,b\n3,c\n").unwrap(), "b.csv")
        .await;

    let (left, right) = tokio::join!(
        store.mutate(a, |dataset| fill_missing(dataset, "x", FillMethod::Mean, None)),
        store.mutate(b, |dataset| remove_columns(dataset, &["x".to_string()])),
    );
    left.unwrap();
    right.unwrap();

    let a = store.get(a).await.unwrap();
    let b = store.get(b).await.unwrap();
    assert_eq!(a.current.null_count("x").unwrap(), 0);
    assert_eq!(a.current.width(), 2);
    assert_eq!(b.current.column_names(), vec!["y"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_http_mutations() {
    let app = build_router(AppState::new(TomlConfig::default()));

    let boundary = "eda-test-boundary";
    let csv = wide_csv(8);
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"wide.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let uploaded: Value = serde_json::from_slice(&bytes).unwrap();
    let file_id = uploaded["file_id"].as_str().unwrap().to_string();

    let mut join_set = JoinSet::new();
    for i in 0..8 {
        let app = app.clone();
        let payload = json!({"file_id": file_id, "columns": [format!("c{i}")]});
        join_set.spawn(async move {
            let request = Request::builder()
                .method("POST")
                .uri("/api/cleaning/remove_columns")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap();
            app.oneshot(request).await.unwrap().status()
        });
    }
    while let Some(status) = join_set.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/overview/{file_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let overview: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(overview["actions"].as_array().unwrap().len(), 8);
    assert_eq!(overview["preview"]["columns"], json!([]));
}
