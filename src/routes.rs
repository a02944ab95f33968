use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{FromRequest, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    admin::{ActionOutcome, ChangeView, FilterChoices, ModelAdmin, SaveRequest},
    error::{AppError, AppResult},
    repository::{Choice, Page},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin", get(index))
        .route("/admin/{model}", get(list).post(create))
        .route("/admin/{model}/filters", get(filters))
        .route("/admin/{model}/autocomplete/{field}", get(autocomplete))
        .route("/admin/{model}/actions/{action}", post(run_action))
        .route("/admin/{model}/{id}", get(change_view).put(update).delete(delete))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
}

/// JSON request body whose rejections answer like every other [`AppError`].
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub models: Vec<&'static ModelAdmin>,
}

pub async fn index(State(state): State<Arc<AppState>>) -> Json<IndexResponse> {
    Json(IndexResponse { models: state.site.index() })
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Page>> {
    Ok(Json(state.site.list(&state.db, &model, &params).await?))
}

pub async fn filters(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> AppResult<Json<Vec<FilterChoices>>> {
    Ok(Json(state.site.filters(&state.db, &model).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    term: String,
}

pub async fn autocomplete(
    State(state): State<Arc<AppState>>,
    Path((model, field)): Path<(String, String)>,
    Query(q): Query<AutocompleteQuery>,
) -> AppResult<Json<Vec<Choice>>> {
    Ok(Json(state.site.autocomplete(&state.db, &model, &field, q.term.trim()).await?))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRequest {
    #[serde(default)]
    ids: Vec<i32>,
}

pub async fn run_action(
    State(state): State<Arc<AppState>>,
    Path((model, action)): Path<(String, String)>,
    JsonBody(req): JsonBody<ActionRequest>,
) -> AppResult<Json<ActionOutcome>> {
    Ok(Json(state.site.run_action(&state.db, &model, &action, &req.ids).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
    JsonBody(req): JsonBody<SaveRequest>,
) -> AppResult<(StatusCode, Json<ChangeView>)> {
    let view = state.site.create(&state.db, &model, req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn change_view(
    State(state): State<Arc<AppState>>,
    Path((model, id)): Path<(String, String)>,
) -> AppResult<Json<ChangeView>> {
    let id = parse_id(&model, &id)?;
    Ok(Json(state.site.change_view(&state.db, &model, id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((model, id)): Path<(String, String)>,
    JsonBody(req): JsonBody<SaveRequest>,
) -> AppResult<Json<ChangeView>> {
    let id = parse_id(&model, &id)?;
    Ok(Json(state.site.update(&state.db, &model, id, req).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((model, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let id = parse_id(&model, &id)?;
    state.site.delete(&state.db, &model, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_id(model: &str, raw: &str) -> AppResult<i32> {
    raw.parse().map_err(|_| AppError::NotFound(format!("{model} with id {raw:?} does not exist")))
}
