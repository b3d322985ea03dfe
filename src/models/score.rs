use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Article;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: i64,
    pub article_id: i64,
    pub relevance: f64,
    pub significance: f64,
    pub confidence: f64,
    pub summary: String,
    pub topics: Vec<String>,
    pub reason: String,
    pub scored_at: DateTime<Utc>,
}

/// One element of the scoring oracle's JSON array, parsed leniently:
/// missing fields take defaults, `id` is accepted for `article_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreItem {
    #[serde(alias = "id")]
    pub article_id: i64,
    #[serde(default)]
    pub relevance: f64,
    #[serde(default)]
    pub significance: f64,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

fn default_confidence() -> f64 {
    1.0
}

/// An article together with its score, eligible for the ranked feed.
#[derive(Debug, Clone)]
pub struct ScoredArticle {
    pub article: Article,
    pub score: Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Like,
    Dislike,
    Save,
    Skip,
}

impl FeedbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::Like => "like",
            FeedbackAction::Dislike => "dislike",
            FeedbackAction::Save => "save",
            FeedbackAction::Skip => "skip",
        }
    }
}

impl fmt::Display for FeedbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(FeedbackAction::Like),
            "dislike" => Ok(FeedbackAction::Dislike),
            "save" => Ok(FeedbackAction::Save),
            "skip" => Ok(FeedbackAction::Skip),
            other => Err(AppError::InvalidInput(format!(
                "action must be one of like, dislike, save, skip (got '{other}')"
            ))),
        }
    }
}
