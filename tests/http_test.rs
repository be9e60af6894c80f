mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::{note, registry, StubStore};
use doc_crud::extractors::ACTOR_HEADER;
use doc_crud::{common_routes, crud_routes, AppState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn app(store: &StubStore) -> Router {
    let state = AppState::new(Arc::new(store.clone()), &registry(), HashMap::new()).unwrap();
    common_routes(state.clone()).merge(crud_routes(state))
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn create_then_read_round_trip() {
    let store = StubStore::new();
    let actor = Uuid::new_v4();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/note")
        .header("content-type", "application/json")
        .header(ACTOR_HEADER, actor.to_string())
        .body(Body::from(json!({"title": "hello", "secret": true}).to_string()))
        .unwrap();
    let response = app(&store).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(created["title"], json!("hello"));
    assert!(created.get("secret").is_none());
    assert_eq!(created["user"], json!(actor.to_string()));

    let id = created["_id"].as_str().unwrap();
    let (status, read) = send(app(&store), Method::GET, &format!("/note/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["_id"], json!(id));
    assert_eq!(read["title"], json!("hello"));
}

#[tokio::test]
async fn invalid_id_is_rejected_before_storage() {
    let store = StubStore::new();
    let (status, body) = send(app(&store), Method::GET, "/note/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], json!("ID is invalid"));
    assert!(store.operations().is_empty());
}

#[tokio::test]
async fn unknown_document_is_404() {
    let store = StubStore::new();
    let uri = format!("/note/{}", Uuid::new_v4());
    for method in [Method::GET, Method::PATCH, Method::DELETE] {
        let body = (method == Method::PATCH).then(|| json!({"title": "x"}));
        let (status, resp) = send(app(&store), method, &uri, body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["error"]["message"], json!("No item with that identifier has been found"));
    }
}

#[tokio::test]
async fn list_returns_items_and_count() {
    let store = StubStore::new();
    store
        .seed(
            "notes",
            &[note(json!({"title": "a", "status": "draft"})), note(json!({"title": "b", "status": "published"}))],
        )
        .await;
    let (status, body) = send(app(&store), Method::GET, "/note?status=draft", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["count"], json!(2));

    let (status, body) = send(app(&store), Method::GET, "/note?page=zero", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("operation_failed"));
}

#[tokio::test]
async fn patch_and_put_update_then_delete() {
    let store = StubStore::new();
    let existing = note(json!({"title": "old", "status": "draft"}));
    store.seed("notes", &[existing.clone()]).await;
    let uri = format!("/note/{}", existing.id);

    let (status, body) = send(app(&store), Method::PATCH, &uri, Some(json!({"title": "new"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], json!("new"));
    assert_eq!(body["status"], json!("draft"));

    let (status, body) = send(app(&store), Method::PUT, &uri, Some(json!({"status": "published"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], json!("new"));
    assert_eq!(body["status"], json!("published"));

    let (status, _) = send(app(&store), Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app(&store), Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_object_body_is_bad_request() {
    let store = StubStore::new();
    let (status, body) = send(app(&store), Method::POST, "/note", Some(json!(["title"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));
}

#[tokio::test]
async fn unknown_model_is_404() {
    let store = StubStore::new();
    let (status, body) = send(app(&store), Method::GET, "/widget", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
}

#[tokio::test]
async fn gate_storage_error_is_500() {
    let store = StubStore::failing();
    let (status, body) = send(app(&store), Method::GET, &format!("/note/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], json!("storage_error"));
}

#[tokio::test]
async fn readiness_reflects_store() {
    let (status, body) = send(app(&StubStore::new()), Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, _) = send(app(&StubStore::failing()), Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
