use serde::Serialize;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{Article, InterestProfile};

const EXCERPT_MAX_CHARS: usize = 1000;

#[derive(Debug, Serialize)]
struct ArticleExcerpt {
    id: i64,
    title: String,
    url: String,
    author: String,
    text: String,
    published_at: Option<String>,
    feed_id: i64,
}

#[derive(Debug, Serialize)]
struct ScoringBatch<'a> {
    interests: &'a InterestProfile,
    articles: Vec<ArticleExcerpt>,
    count: usize,
    instructions: &'static str,
}

/// Build the scoring context for the oracle: interests plus unscored
/// article excerpts as pretty JSON. None when nothing is unscored.
pub async fn prepare_batch(
    repo: &Repository,
    interests: &InterestProfile,
    limit: usize,
) -> Result<Option<String>> {
    let articles = repo.unscored_articles(limit).await?;
    if articles.is_empty() {
        return Ok(None);
    }

    let excerpts: Vec<ArticleExcerpt> = articles.into_iter().map(excerpt).collect();
    let batch = ScoringBatch {
        interests,
        count: excerpts.len(),
        articles: excerpts,
        instructions: "Score each article. For each, return: article_id, relevance (0-10), \
                       significance (0-10), confidence (0.0-1.0, how confident you are in the \
                       topic tags), summary (1-2 sentences), topics (list of tags), \
                       reason (why this score). Output as a JSON array.",
    };

    Ok(Some(serde_json::to_string_pretty(&batch)?))
}

fn excerpt(article: Article) -> ArticleExcerpt {
    // Prefer the feed-provided summary; fall back to the article body
    // flattened to plain text.
    let text = if !article.summary.is_empty() {
        article.summary.clone()
    } else {
        html2text::from_read(article.content.as_bytes(), 80).unwrap_or_default()
    };

    ArticleExcerpt {
        id: article.id,
        title: article.title,
        url: article.url,
        author: article.author,
        text: truncate_chars(&text, EXCERPT_MAX_CHARS),
        published_at: article.published_at.map(|dt| dt.to_rfc3339()),
        feed_id: article.feed_id,
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
