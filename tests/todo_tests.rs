//! Todos CRUD, pagination, soft-delete and txid coupling tests.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tasker::api::AppState;
use tasker::config::Config;
use tower::ServiceExt;

async fn spawn_app() -> (Arc<AppState>, Router, String) {
    spawn_app_with_config(Config::default()).await
}

/// Build an app against a throwaway sqlite database and register a user so
/// the returned cookie can drive the protected routes.
async fn spawn_app_with_config(mut config: Config) -> (Arc<AppState>, Router, String) {
    let db_path = std::env::temp_dir().join(format!("tasker-todo-test-{}.db", uuid::Uuid::new_v4()));
    config.database_url = format!("sqlite:{}", db_path.display());

    let state = tasker::api::create_app_state(config)
        .await
        .expect("failed to create app state");
    let router = tasker::api::router(state.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            serde_json::json!({
                "name": "Test User",
                "email": "user@example.com",
                "password": "hunter2",
            }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("registration must set the session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    (state, router, cookie)
}

fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_todo(app: &Router, cookie: &str, title: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/todos",
            serde_json::json!({ "title": title }),
            Some(cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn todos_require_a_session() {
    let (_state, app, _cookie) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(bare_request("GET", "/api/todos", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["cause"], "missing_token");
}

#[tokio::test]
async fn create_and_fetch_round_trip() {
    let (_state, app, cookie) = spawn_app().await;

    let created = create_todo(&app, &cookie, "Write the fellowship invite").await;

    assert!(created["txid"].is_i64());
    let todo = &created["todo"];
    assert_eq!(todo["title"], "Write the fellowship invite");
    assert!(todo["completed_at"].is_null());
    assert!(todo["deleted_at"].is_null());

    let id = todo["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            &format!("/api/todos/{id}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let fetched = body_json(response).await;
    assert_eq!(fetched["id"], todo["id"]);
    assert_eq!(
        fetched["url"],
        format!("http://localhost:3000/api/todos/{id}")
    );
}

#[tokio::test]
async fn update_patches_fields_and_returns_new_txid() {
    let (_state, app, cookie) = spawn_app().await;

    let created = create_todo(&app, &cookie, "Polish sword").await;
    let id = created["todo"]["id"].as_str().unwrap().to_string();
    let first_txid = created["txid"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/todos/{id}"),
            serde_json::json!({ "title": "Polish Anduril", "description": "flame of the west" }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["todo"]["title"], "Polish Anduril");
    assert_eq!(body["todo"]["description"], "flame of the west");
    assert!(body["txid"].as_i64().unwrap() > first_txid);
    assert_ne!(body["todo"]["updated_at"], created["todo"]["updated_at"]);
}

#[tokio::test]
async fn mutations_on_missing_ids_are_not_found_without_txid() {
    let (_state, app, cookie) = spawn_app().await;

    let ghost = uuid::Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/todos/{ghost}"),
            serde_json::json!({ "title": "nope" }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert!(body.get("txid").is_none());

    let response = app
        .clone()
        .oneshot(bare_request(
            "DELETE",
            &format!("/api/todos/{ghost}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            &format!("/api/todos/{ghost}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Not found");
}

#[tokio::test]
async fn create_rejects_blank_titles() {
    let (_state, app, cookie) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/todos",
            serde_json::json!({ "title": "   " }),
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn soft_delete_hides_from_lists_but_not_direct_fetch() {
    let (_state, app, cookie) = spawn_app().await;

    let created = create_todo(&app, &cookie, "Visit Mordor").await;
    let id = created["todo"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(bare_request(
            "DELETE",
            &format!("/api/todos/{id}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let deleted = body_json(response).await;
    assert!(deleted["txid"].is_i64());
    let deleted_at = deleted["todo"]["deleted_at"].clone();
    assert!(!deleted_at.is_null());

    // Direct fetch is unfiltered.
    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            &format!("/api/todos/{id}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // List reads are filtered.
    let response = app
        .clone()
        .oneshot(bare_request("GET", "/api/todos", Some(&cookie)))
        .await
        .unwrap();
    let list = body_json(response).await;
    assert_eq!(list["info"]["count"], 0);
    assert_eq!(list["results"].as_array().unwrap().len(), 0);

    // Repeat delete is an idempotent no-op preserving the first timestamp.
    let response = app
        .clone()
        .oneshot(bare_request(
            "DELETE",
            &format!("/api/todos/{id}"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let repeated = body_json(response).await;
    assert_eq!(repeated["todo"]["deleted_at"], deleted_at);
}

#[tokio::test]
async fn toggle_completed_round_trips() {
    let (_state, app, cookie) = spawn_app().await;

    let created = create_todo(&app, &cookie, "Second breakfast").await;
    let id = created["todo"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(bare_request(
            "PATCH",
            &format!("/api/todos/{id}/toggle-completed"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let toggled = body_json(response).await;
    assert!(!toggled["completed_at"].is_null());

    let response = app
        .clone()
        .oneshot(bare_request(
            "PATCH",
            &format!("/api/todos/{id}/toggle-completed"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let untoggled = body_json(response).await;
    assert!(untoggled["completed_at"].is_null());
}

#[tokio::test]
async fn pagination_info_matches_spec_arithmetic() {
    let (_state, app, cookie) = spawn_app().await;

    for i in 0..25 {
        create_todo(&app, &cookie, &format!("todo {i}")).await;
    }

    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            "/api/todos?page=1&limit=10",
            Some(&cookie),
        ))
        .await
        .unwrap();
    let page1 = body_json(response).await;
    assert_eq!(page1["info"]["count"], 25);
    assert_eq!(page1["info"]["pages"], 3);
    assert!(page1["info"]["prev"].is_null());
    assert_eq!(
        page1["info"]["next"],
        "http://localhost:3000/api/todos?page=2&limit=10"
    );
    assert_eq!(page1["results"].as_array().unwrap().len(), 10);

    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            "/api/todos?page=3&limit=10",
            Some(&cookie),
        ))
        .await
        .unwrap();
    let page3 = body_json(response).await;
    assert!(page3["info"]["next"].is_null());
    assert_eq!(
        page3["info"]["prev"],
        "http://localhost:3000/api/todos?page=2&limit=10"
    );
    assert_eq!(page3["results"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn list_orders_incomplete_before_completed() {
    let (_state, app, cookie) = spawn_app().await;

    let open = create_todo(&app, &cookie, "still open").await;
    let done = create_todo(&app, &cookie, "already done").await;
    let done_id = done["todo"]["id"].as_str().unwrap().to_string();

    // Completing the second todo also makes it the most recently updated;
    // null completion timestamps must still sort first.
    let response = app
        .clone()
        .oneshot(bare_request(
            "PATCH",
            &format!("/api/todos/{done_id}/toggle-completed"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(bare_request("GET", "/api/todos", Some(&cookie)))
        .await
        .unwrap();
    let list = body_json(response).await;
    let results = list["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], open["todo"]["id"]);
    assert_eq!(results[1]["id"], done["todo"]["id"]);
}

#[tokio::test]
async fn invalid_pagination_is_rejected() {
    let (_state, app, cookie) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            "/api/todos?page=0&limit=10",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            "/api/todos?page=1&limit=0",
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn huge_page_numbers_yield_an_empty_page() {
    let (_state, app, cookie) = spawn_app().await;

    create_todo(&app, &cookie, "lonely").await;

    // page is unbounded; the offset arithmetic has to saturate instead of
    // overflowing at u64::MAX * limit.
    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            &format!("/api/todos?page={}&limit=100", u64::MAX),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list = body_json(response).await;
    assert_eq!(list["info"]["count"], 1);
    assert_eq!(list["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn txids_increase_across_committed_mutations() {
    let (_state, app, cookie) = spawn_app().await;

    let first = create_todo(&app, &cookie, "one").await;
    let second = create_todo(&app, &cookie, "two").await;

    let a = first["txid"].as_i64().unwrap();
    let b = second["txid"].as_i64().unwrap();
    assert!(b > a, "txids must be monotonically comparable: {a} vs {b}");
}

#[tokio::test]
async fn shape_proxy_reports_upstream_unavailable() {
    // Point the change-feed URL at a closed port: the passthrough must fail
    // as a bad gateway, not an internal error.
    let (_state, app, cookie) = spawn_app_with_config(Config {
        electric_url: "http://127.0.0.1:9".to_string(),
        ..Config::default()
    })
    .await;

    let response = app
        .clone()
        .oneshot(bare_request(
            "GET",
            "/api/todos/shape?offset=-1",
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn api_index_links_to_todos() {
    let (_state, app, cookie) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(bare_request("GET", "/api", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["todos"], "http://localhost:3000/api/todos");
}
