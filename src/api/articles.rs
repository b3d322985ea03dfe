use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Article, ArticleQuery, Score};
use crate::ranking::assemble_page;

use super::ApiState;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// "foryou" for the personalized view, empty for the flat listing.
    view: String,
    min_score: f64,
    topic: String,
    feed_id: Option<i64>,
    scored_only: bool,
    include_archived: bool,
    limit: usize,
    offset: i64,
    cursor: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            view: String::new(),
            min_score: 0.0,
            topic: String::new(),
            feed_id: None,
            scored_only: false,
            include_archived: false,
            limit: 20,
            offset: 0,
            cursor: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScoreOut {
    relevance: f64,
    significance: f64,
    confidence: f64,
    summary: String,
    topics: Vec<String>,
    reason: String,
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    id: i64,
    feed_id: i64,
    feed_title: String,
    feed_category: String,
    url: String,
    title: String,
    author: String,
    summary: String,
    published_at: Option<String>,
    is_read: bool,
    is_starred: bool,
    is_archived: bool,
    score: Option<ScoreOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rank: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ForYouResponse {
    articles: Vec<ArticleResponse>,
    next_cursor: Option<String>,
}

fn article_response(article: Article, score: Option<Score>, rank: Option<f64>) -> ArticleResponse {
    ArticleResponse {
        id: article.id,
        feed_id: article.feed_id,
        feed_title: article.feed_title,
        feed_category: article.feed_category,
        url: article.url,
        title: article.title,
        author: article.author,
        summary: article.summary,
        published_at: article.published_at.map(|dt| dt.to_rfc3339()),
        is_read: article.is_read,
        is_starred: article.is_starred,
        is_archived: article.is_archived,
        score: score.map(|s| ScoreOut {
            relevance: s.relevance,
            significance: s.significance,
            confidence: s.confidence,
            summary: s.summary,
            topics: s.topics,
            reason: s.reason,
        }),
        rank,
    }
}

pub async fn list_articles(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Result<Response> {
    let limit = params.limit.clamp(1, 100);

    if params.view == "foryou" {
        let candidates = state.repo.foryou_candidates().await?;
        let interests = state.interests.load()?;
        let page = assemble_page(
            candidates,
            &interests,
            limit,
            params.cursor.as_deref(),
            Utc::now(),
        );

        let articles = page
            .items
            .into_iter()
            .map(|item| {
                article_response(item.entry.article, Some(item.entry.score), Some(item.rank))
            })
            .collect();
        return Ok(Json(ForYouResponse {
            articles,
            next_cursor: page.next_cursor,
        })
        .into_response());
    }

    let rows = state
        .repo
        .list_articles(ArticleQuery {
            min_score: params.min_score,
            topic: params.topic,
            feed_id: params.feed_id,
            scored_only: params.scored_only,
            include_archived: params.include_archived,
            limit: limit as i64,
            offset: params.offset.max(0),
        })
        .await?;

    let articles: Vec<ArticleResponse> = rows
        .into_iter()
        .map(|(article, score)| article_response(article, score, None))
        .collect();
    Ok(Json(articles).into_response())
}

pub async fn get_article(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<ArticleResponse>> {
    let (article, score) = state
        .repo
        .get_article(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Article not found".into()))?;
    Ok(Json(article_response(article, score, None)))
}

#[derive(Debug, Deserialize)]
pub struct ReadBody {
    pub is_read: bool,
}

pub async fn mark_read(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<ReadBody>,
) -> Result<Json<serde_json::Value>> {
    if !state.repo.mark_read(id, body.is_read).await? {
        return Err(AppError::NotFound("Article not found".into()));
    }
    Ok(Json(serde_json::json!({ "id": id, "is_read": body.is_read })))
}

pub async fn toggle_starred(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    if !state.repo.toggle_starred(id).await? {
        return Err(AppError::NotFound("Article not found".into()));
    }
    Ok(Json(serde_json::json!({ "id": id, "status": "ok" })))
}
