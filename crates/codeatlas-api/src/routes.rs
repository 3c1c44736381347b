use crate::{handlers, AppState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Graph lifecycle
        .route("/graphs", post(handlers::create_graph))
        .route("/graphs", get(handlers::list_graphs))
        .route("/graphs/{id}/files", get(handlers::graph_files))
        .route("/graphs/{id}", delete(handlers::delete_graph))
        // Semantic query over the meta indexes
        .route("/search", get(handlers::search))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http())
}
