use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::{Repository, Stats};
use crate::error::Result;
use crate::interests::InterestStore;

use super::{articles, auth, feeds, interests, scores};

#[derive(Clone)]
pub struct ApiState {
    pub repo: Arc<Repository>,
    pub interests: Arc<InterestStore>,
    /// Bearer token; None means the API is open (dev mode).
    pub token: Option<String>,
}

fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/articles", get(articles::list_articles))
        .route("/api/articles/:id", get(articles::get_article))
        .route("/api/articles/:id/read", post(articles::mark_read))
        .route("/api/articles/:id/star", post(articles::toggle_starred))
        .route("/api/feeds", get(feeds::list_feeds).post(feeds::create_feed))
        .route("/api/feeds/:id", axum::routing::delete(feeds::delete_feed))
        .route("/api/scores", post(scores::write_scores))
        .route("/api/feedback", post(scores::create_feedback))
        .route(
            "/api/interests",
            get(interests::get_interests).put(interests::put_interests),
        )
        .route("/api/stats", get(stats_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::verify_token,
        ))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn stats_handler(State(state): State<ApiState>) -> Result<Json<Stats>> {
    Ok(Json(state.repo.stats().await?))
}

pub async fn serve(state: ApiState, addr: SocketAddr) -> Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
