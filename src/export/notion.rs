use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Article, Score};

const NOTION_API_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion rich_text content limit.
const TEXT_LIMIT: usize = 2000;

#[derive(Debug, Default)]
pub struct ExportStats {
    pub exported: usize,
    pub skipped_duplicate: usize,
    pub errors: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<serde_json::Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

pub struct NotionExporter {
    client: Client,
    token: String,
    database_id: String,
}

impl NotionExporter {
    pub fn new(token: String, database_id: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            token,
            database_id,
        }
    }

    /// Push scored articles above `min_score` into the Notion
    /// database, skipping URLs already present there.
    pub async fn export(
        &self,
        repo: &Repository,
        min_score: f64,
        limit: usize,
    ) -> Result<ExportStats> {
        let mut existing = self.existing_urls().await?;
        tracing::info!("Found {} existing articles in Notion", existing.len());

        let rows = repo.scored_for_export(min_score, limit).await?;
        let mut stats = ExportStats::default();

        for (article, score) in rows {
            if existing.contains(&article.url) {
                stats.skipped_duplicate += 1;
                continue;
            }

            let url = article.url.clone();
            match self.create_page(&article, &score).await {
                Ok(()) => {
                    stats.exported += 1;
                    existing.insert(url);
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::warn!("Failed to export '{}': {}", article.title, e);
                }
            }

            // Notion allows ~3 requests per second.
            tokio::time::sleep(Duration::from_millis(350)).await;
        }

        Ok(stats)
    }

    /// All article URLs already in the database, via paginated query.
    async fn existing_urls(&self) -> Result<HashSet<String>> {
        let mut urls = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": 100 });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let response = self
                .client
                .post(format!(
                    "{}/databases/{}/query",
                    NOTION_API_URL, self.database_id
                ))
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION)
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let error_text = response.text().await?;
                return Err(AppError::NotionApi(format!("query failed: {error_text}")));
            }

            let page: QueryResponse = response.json().await?;
            for result in &page.results {
                if let Some(url) = result
                    .pointer("/properties/URL/url")
                    .and_then(|v| v.as_str())
                {
                    urls.insert(url.to_string());
                }
            }

            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        Ok(urls)
    }

    async fn create_page(&self, article: &Article, score: &Score) -> Result<()> {
        let payload = build_page(&self.database_id, article, score);

        let response = self
            .client
            .post(format!("{NOTION_API_URL}/pages"))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::NotionApi(format!(
                "page create failed: {error_text}"
            )));
        }
        Ok(())
    }
}

fn build_page(database_id: &str, article: &Article, score: &Score) -> serde_json::Value {
    let title = if article.title.is_empty() {
        "Untitled"
    } else {
        article.title.as_str()
    };
    let summary = truncate(&score.summary, TEXT_LIMIT);
    let reason = truncate(&score.reason, TEXT_LIMIT);

    let mut properties = json!({
        "Title": { "title": [{ "text": { "content": truncate(title, TEXT_LIMIT) } }] },
        "URL": { "url": article.url },
        "Relevance": { "number": score.relevance },
        "Significance": { "number": score.significance },
        "Summary": { "rich_text": rich_text(&summary) },
        "Topics": { "multi_select": score.topics.iter().take(10)
            .map(|t| json!({ "name": truncate(t, 100) })).collect::<Vec<_>>() },
        "Source": { "select": { "name": truncate(source_name(article), 100) } },
        "Reason": { "rich_text": rich_text(&reason) },
    });

    if let Some(published) = article.published_at {
        properties["Published"] = json!({
            "date": { "start": published.format("%Y-%m-%d").to_string() }
        });
    }

    json!({ "parent": { "database_id": database_id }, "properties": properties })
}

fn source_name(article: &Article) -> &str {
    if article.feed_title.is_empty() {
        "Unknown"
    } else {
        &article.feed_title
    }
}

fn rich_text(content: &str) -> serde_json::Value {
    if content.is_empty() {
        json!([])
    } else {
        json!([{ "text": { "content": content } }])
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
