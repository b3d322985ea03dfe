use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{FeedbackAction, ScoreItem};

use super::ApiState;

/// Batch write scores, the external oracle's write-back path.
pub async fn write_scores(
    State(state): State<ApiState>,
    Json(items): Json<Vec<ScoreItem>>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let written = state.repo.upsert_scores(items, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "written": written })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackCreate {
    article_id: i64,
    /// like, dislike, save, skip
    action: String,
}

pub async fn create_feedback(
    State(state): State<ApiState>,
    Json(body): Json<FeedbackCreate>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let action: FeedbackAction = body.action.parse()?;

    if !state
        .repo
        .insert_feedback(body.article_id, action, Utc::now())
        .await?
    {
        return Err(AppError::NotFound("Article not found".into()));
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "ok",
            "article_id": body.article_id,
            "action": action.as_str(),
        })),
    ))
}
