//! End-to-end codec flow against a local registry server: HTTP repository
//! wrapped in logging and caching decorators, encoder and decoder sharing
//! the same registry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use keel_schema::{CachedRepository, Decoder, Encoder, HttpRepository, LoggedRepository};

const TAGS_SCHEMA: &str = r#"{"type":"record","name":"Tags","fields":[{"name":"Tags","type":{"type":"array","items":"string"}}]}"#;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Tags {
    #[serde(rename = "Tags")]
    tags: Vec<String>,
}

#[derive(Clone, Default)]
struct Hits {
    by_id: Arc<AtomicU32>,
    by_subject: Arc<AtomicU32>,
}

async fn spawn_registry(hits: Hits) -> String {
    let app = Router::new()
        .route(
            "/schemas/ids/:id",
            get(|State(hits): State<Hits>| async move {
                hits.by_id.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "schema": TAGS_SCHEMA }))
            }),
        )
        .route(
            "/subjects/:subject",
            post(|State(hits): State<Hits>| async move {
                hits.by_subject.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "id": 1, "schema": TAGS_SCHEMA }))
            }),
        )
        .with_state(hits);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn round_trip_through_a_shared_registry() {
    let hits = Hits::default();
    let base_url = spawn_registry(hits.clone()).await;

    let repository = Arc::new(CachedRepository::new(LoggedRepository::new(
        HttpRepository::new(base_url),
    )));

    let encoder = Encoder::new(repository.as_ref(), "tags-value", TAGS_SCHEMA)
        .await
        .expect("encoder construction");
    let decoder = Decoder::new(repository.clone());

    let value = Tags {
        tags: vec!["a".to_string(), "b".to_string(), "c".to_string()],
    };

    for _ in 0..3 {
        let bytes = encoder.encode(&value).expect("encode");
        assert_eq!(&bytes[..5], &[0, 0, 0, 0, 1]);
        let decoded: Tags = decoder.decode(&bytes).await.expect("decode");
        assert_eq!(decoded, value);
    }

    // The subject was resolved once at encoder construction, and that
    // lookup stored both cache directions: id lookups never reach the
    // registry at all.
    assert_eq!(hits.by_subject.load(Ordering::SeqCst), 1);
    assert_eq!(hits.by_id.load(Ordering::SeqCst), 0);
}
