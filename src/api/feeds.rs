use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::feed::FeedFetcher;
use crate::models::{Feed, NewFeed};

use super::ApiState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListFeedsParams {
    enabled_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct FeedCreate {
    url: String,
    #[serde(default)]
    category: String,
}

pub async fn list_feeds(
    State(state): State<ApiState>,
    Query(params): Query<ListFeedsParams>,
) -> Result<Json<Vec<Feed>>> {
    Ok(Json(state.repo.get_all_feeds(params.enabled_only).await?))
}

pub async fn create_feed(
    State(state): State<ApiState>,
    Json(body): Json<FeedCreate>,
) -> Result<(StatusCode, Json<Feed>)> {
    // Probe the URL for feed metadata; an unreachable or odd feed
    // still gets added with just its URL.
    let mut new_feed = FeedFetcher::new()
        .discover_feed(&body.url)
        .await
        .unwrap_or(NewFeed {
            url: body.url.clone(),
            title: String::new(),
            site_url: String::new(),
            category: String::new(),
        });
    new_feed.category = body.category;

    let feed = state
        .repo
        .insert_feed(new_feed)
        .await?
        .ok_or_else(|| AppError::Duplicate(format!("Feed already exists: {}", body.url)))?;
    Ok((StatusCode::CREATED, Json(feed)))
}

pub async fn delete_feed(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if !state.repo.delete_feed(id).await? {
        return Err(AppError::NotFound("Feed not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}
