mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use cineadmin::{AppState, config::Config, routes};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> Router {
    let (db, site) = common::setup().await;
    let state =
        Arc::new(AppState { config: Arc::new(Config::in_memory()), db, site: Arc::new(site) });
    routes::router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn index_describes_registered_models() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/admin", None).await;
    assert_eq!(status, StatusCode::OK);

    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 7);
    let comment = models.iter().find(|model| model["name"] == "comment").unwrap();
    assert_eq!(comment["actions"][0]["name"], "delete_selected");
    assert_eq!(comment["list_filter"][1]["kind"], "related");
}

#[tokio::test]
async fn genres_round_trip_over_http() {
    let app = app().await;

    let (status, body) =
        send(&app, Method::POST, "/admin/genre", Some(json!({ "data": { "name": "Drama" } })))
            .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["object"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, Method::GET, "/admin/genre?q=dra", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["name"], "Drama");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/admin/genre/{id}"),
        Some(json!({ "data": { "name": "Melodrama" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"]["name"], "Melodrama");

    let (status, _) = send(&app, Method::DELETE, &format!("/admin/genre/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, &format!("/admin/genre/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn errors_carry_their_kind() {
    let app = app().await;

    let (status, body) =
        send(&app, Method::POST, "/admin/genre", Some(json!({ "data": {} }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let user = json!({ "data": { "username": "ripley", "email": "r@example.com", "password": "x" } });
    let (status, _) = send(&app, Method::POST, "/admin/user", Some(user.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, Method::POST, "/admin/user", Some(user)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "integrity");

    let (status, body) = send(&app, Method::GET, "/admin/director", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn actions_and_autocomplete_are_routed() {
    let app = app().await;
    send(&app, Method::POST, "/admin/genre", Some(json!({ "data": { "name": "Horror" } }))).await;

    let (status, body) =
        send(&app, Method::GET, "/admin/genre_movie/autocomplete/genre?term=hor", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["label"], "Horror");

    let (status, body) = send(
        &app,
        Method::POST,
        "/admin/comment/actions/delete_selected",
        Some(json!({ "ids": [41, 42] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["affected"], 0);
    assert_eq!(body["message"], "0 comment(s) deleted successfully.");

    let (status, body) = send(&app, Method::GET, "/admin/user_movie/filters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[2]["parameter"], "watched_status");
    assert_eq!(body[2]["choices"][0]["label"], "Yes");
}

async fn send_raw(
    app: &Router,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        request = request.header("content-type", content_type);
    }
    let response =
        app.clone().oneshot(request.body(Body::from(body.to_string())).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/admin/comment/actions/delete_selected",
        Some(json!({ "ids": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert!(body["message"].is_string());

    let (status, body) =
        send_raw(&app, "/admin/genre", Some("application/json"), "{\"data\": {").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, body) = send_raw(&app, "/admin/genre", None, "{\"data\": {}}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn misspelled_request_keys_change_nothing() {
    let app = app().await;
    let (_, body) =
        send(&app, Method::POST, "/admin/genre", Some(json!({ "data": { "name": "Drama" } })))
            .await;
    let id = body["object"]["id"].as_i64().unwrap();

    let (status, body) =
        send(&app, Method::PUT, &format!("/admin/genre/{id}"), Some(json!({ "name": "Crime" })))
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/admin/genre/{id}"),
        Some(json!({ "inlines": { "genre_movie": { "adds": [] } } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (_, body) = send(&app, Method::GET, &format!("/admin/genre/{id}"), None).await;
    assert_eq!(body["object"]["name"], "Drama");
}
