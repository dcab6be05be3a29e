use axum::{
    Json,
    body::Body,
    extract::{Path, Query, RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::api::validation::{validate_pagination, validate_title};
use crate::db::{NewTodo, TodoChanges, Txid};
use crate::entities::todos;

/// Query parameters the change-feed protocol owns; everything else from the
/// client is dropped before proxying.
const ELECTRIC_PROTOCOL_PARAMS: &[&str] = &["offset", "handle", "live", "cursor", "replica"];

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Todo row plus its self link.
#[derive(Serialize)]
pub struct TodoWithUrl {
    #[serde(flatten)]
    pub todo: todos::Model,
    pub url: String,
}

impl TodoWithUrl {
    fn new(todo: todos::Model, api_url: &str) -> Self {
        let url = format!("{}/todos/{}", api_url, todo.id);
        Self { todo, url }
    }
}

#[derive(Serialize)]
pub struct PageInfo {
    pub count: u64,
    pub pages: u64,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub info: PageInfo,
    pub results: Vec<TodoWithUrl>,
}

/// Mutation result: the committed row together with the transaction id that
/// produced its change-feed entry.
#[derive(Serialize)]
pub struct MutationResponse {
    pub txid: Txid,
    pub todo: todos::Model,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/todos
pub async fn list_todos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let (page, limit) = validate_pagination(query.page.unwrap_or(1), query.limit.unwrap_or(10))?;

    let todo_page = state.store.list_todos(page, limit).await?;

    let info = build_page_info(todo_page.count, page, limit, &state.config.api_url);
    let results = todo_page
        .results
        .into_iter()
        .map(|todo| TodoWithUrl::new(todo, &state.config.api_url))
        .collect();

    Ok(Json(ListResponse { info, results }))
}

/// GET /api/todos/{id}
/// Unfiltered by soft delete: a deleted row is still directly addressable.
pub async fn get_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TodoWithUrl>, ApiError> {
    let todo = state
        .store
        .get_todo(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not found".to_string()))?;

    Ok(Json(TodoWithUrl::new(todo, &state.config.api_url)))
}

/// POST /api/todos
pub async fn create_todo(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTodoRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    validate_title(&payload.title)?;

    let (txid, todo) = state
        .store
        .create_todo(NewTodo {
            title: payload.title,
            description: payload.description,
        })
        .await?;

    Ok(Json(MutationResponse { txid, todo }))
}

/// PATCH /api/todos/{id}
pub async fn update_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTodoRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    if let Some(title) = &payload.title {
        validate_title(title)?;
    }

    let (txid, todo) = state
        .store
        .update_todo(
            id,
            TodoChanges {
                title: payload.title,
                description: payload.description,
                completed_at: payload.completed_at,
            },
        )
        .await?;

    Ok(Json(MutationResponse { txid, todo }))
}

/// PATCH /api/todos/{id}/toggle-completed
pub async fn toggle_completed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<todos::Model>, ApiError> {
    let (_txid, todo) = state.store.toggle_todo_completed(id).await?;

    Ok(Json(todo))
}

/// DELETE /api/todos/{id}
pub async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MutationResponse>, ApiError> {
    let (txid, todo) = state.store.soft_delete_todo(id).await?;

    Ok(Json(MutationResponse { txid, todo }))
}

/// GET /api/todos/shape
/// Pure passthrough to the external change-feed service: allow-listed
/// protocol params forwarded, table pinned, hop-by-hop headers stripped.
pub async fn shape_proxy(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let upstream = build_shape_url(&state.config.electric_url, query.as_deref())
        .map_err(|e| ApiError::internal(format!("Invalid ELECTRIC_URL: {e}")))?;

    let response = state
        .http
        .get(upstream.as_str())
        .send()
        .await
        .map_err(|e| ApiError::electric_error(e.to_string()))?;

    let status = response.status();
    let mut headers = response.headers().clone();

    // The body is relayed decoded; stale encoding/length headers from the
    // upstream would corrupt the relayed response.
    headers.remove(header::CONTENT_ENCODING);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);

    // Streamed, not buffered: live mode holds the upstream response open
    // until a change arrives, so the body must flow through as it comes.
    let mut relayed = Response::new(Body::from_stream(response.bytes_stream()));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;

    Ok(relayed)
}

/// GET /api
pub async fn api_index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "todos": format!("{}/todos", state.config.api_url),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn build_page_info(count: u64, page: u64, limit: u64, api_url: &str) -> PageInfo {
    let pages = count.div_ceil(limit);

    let link = |target: u64| format!("{api_url}/todos?page={target}&limit={limit}");
    let next = (page < pages).then(|| link(page + 1));
    let prev = (page > 1).then(|| link(page - 1));

    PageInfo {
        count,
        pages,
        next,
        prev,
    }
}

fn build_shape_url(electric_url: &str, query: Option<&str>) -> Result<Url, url::ParseError> {
    let mut upstream = Url::parse(&format!("{electric_url}/v1/shape"))?;

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if ELECTRIC_PROTOCOL_PARAMS.contains(&key.as_ref()) {
                upstream.query_pairs_mut().append_pair(&key, &value);
            }
        }
    }

    upstream.query_pairs_mut().append_pair("table", "todos");

    Ok(upstream)
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: &str = "http://localhost:3000/api";

    #[test]
    fn page_info_middle_page() {
        let info = build_page_info(25, 2, 10, API);
        assert_eq!(info.count, 25);
        assert_eq!(info.pages, 3);
        assert_eq!(
            info.next.as_deref(),
            Some("http://localhost:3000/api/todos?page=3&limit=10")
        );
        assert_eq!(
            info.prev.as_deref(),
            Some("http://localhost:3000/api/todos?page=1&limit=10")
        );
    }

    #[test]
    fn page_info_bounds() {
        let first = build_page_info(25, 1, 10, API);
        assert!(first.prev.is_none());
        assert!(first.next.is_some());

        let last = build_page_info(25, 3, 10, API);
        assert!(last.next.is_none());
        assert!(last.prev.is_some());

        let empty = build_page_info(0, 1, 10, API);
        assert_eq!(empty.pages, 0);
        assert!(empty.next.is_none());
        assert!(empty.prev.is_none());
    }

    #[test]
    fn shape_url_allow_lists_params() {
        let url = build_shape_url(
            "http://localhost:3333",
            Some("offset=-1&live=true&evil=1&api_secret=x"),
        )
        .unwrap();

        assert_eq!(url.path(), "/v1/shape");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(pairs.contains(&("offset".to_string(), "-1".to_string())));
        assert!(pairs.contains(&("live".to_string(), "true".to_string())));
        assert!(pairs.contains(&("table".to_string(), "todos".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "evil" || k == "api_secret"));
    }

    #[test]
    fn shape_url_pins_table_without_query() {
        let url = build_shape_url("http://localhost:3333", None).unwrap();
        assert_eq!(url.query(), Some("table=todos"));
    }
}
