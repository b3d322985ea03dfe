use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub url: String,
    pub title: String,
    pub author: String,
    pub summary: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_archived: bool,
    pub feed_title: String,
    pub feed_category: String,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub feed_id: i64,
    pub url: String,
    pub title: String,
    pub author: String,
    pub summary: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Filters for the flat (non-personalized) article listing.
#[derive(Debug, Clone)]
pub struct ArticleQuery {
    pub min_score: f64,
    pub topic: String,
    pub feed_id: Option<i64>,
    pub scored_only: bool,
    pub include_archived: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            topic: String::new(),
            feed_id: None,
            scored_only: false,
            include_archived: false,
            limit: 20,
            offset: 0,
        }
    }
}
