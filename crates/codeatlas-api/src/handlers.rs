use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use codeatlas_core::{CodeGraph, CreateGraphRequest, GraphFile, MetaIndex, MetaMatch, SearchIndex};
use codeatlas_vector::EmbeddingProvider;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_graph(
    State(state): State<AppState>,
    Json(request): Json<CreateGraphRequest>,
) -> ApiResult<Json<CodeGraph>> {
    let graph = state.coordinator.create_graph(request).await?;
    Ok(Json(graph))
}

pub async fn list_graphs(State(state): State<AppState>) -> ApiResult<Json<Vec<CodeGraph>>> {
    Ok(Json(state.coordinator.list_graphs().await?))
}

pub async fn graph_files(
    State(state): State<AppState>,
    Path(graph_id): Path<Uuid>,
) -> ApiResult<Json<Vec<GraphFile>>> {
    state
        .coordinator
        .get_graph(graph_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("code graph {}", graph_id)))?;
    Ok(Json(state.coordinator.graph_files(graph_id).await?))
}

pub async fn delete_graph(
    State(state): State<AppState>,
    Path(graph_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.coordinator.delete_graph(graph_id).await?;
    Ok(Json(json!({ "message": "Operation succeed." })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub index: String,
    pub query: String,
    #[serde(default = "SearchParams::default_k")]
    pub k: usize,
}

impl SearchParams {
    fn default_k() -> usize {
        5
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<MetaMatch>>> {
    let index: MetaIndex = params
        .index
        .parse()
        .map_err(ApiError::Validation)?;
    if params.query.trim().is_empty() {
        return Err(ApiError::Validation("query must not be empty".to_string()));
    }

    let embedding = state.embeddings.embed(&params.query).await?;
    let matches = state.search_index.query(index, &embedding, params.k).await?;
    Ok(Json(matches))
}
