use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    Article, ArticleQuery, Feed, FeedbackAction, NewArticle, NewFeed, RescoreState, Score,
    ScoreItem, ScoredArticle,
};

use super::schema::SCHEMA;

const RESCORE_FLAG_KEY: &str = "needs_rescore";

/// A stale article candidate for the retention pass.
#[derive(Debug, Clone)]
pub struct StaleArticle {
    pub id: i64,
    /// relevance + significance, None when unscored.
    pub combined_score: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub feeds: i64,
    pub feeds_enabled: i64,
    pub articles: i64,
    pub scored: i64,
    pub feedback: i64,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            // WAL + busy timeout so HTTP reads tolerate the background
            // cycle holding a write transaction.
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Feed operations

    /// Insert a feed. Returns None when a feed with the same URL exists.
    pub async fn insert_feed(&self, feed: NewFeed) -> Result<Option<Feed>> {
        let inserted = self
            .conn
            .call(move |conn| {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM feeds WHERE url = ?1",
                        params![feed.url],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_some() {
                    return Ok(None);
                }
                conn.execute(
                    "INSERT INTO feeds (url, title, site_url, category) VALUES (?1, ?2, ?3, ?4)",
                    params![feed.url, feed.title, feed.site_url, feed.category],
                )?;
                let id = conn.last_insert_rowid();
                let feed = conn.query_row(
                    "SELECT id, url, title, site_url, category, enabled, last_fetched_at, created_at
                     FROM feeds WHERE id = ?1",
                    params![id],
                    |row| Ok(feed_from_row(row)),
                )?;
                Ok(Some(feed))
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_all_feeds(&self, enabled_only: bool) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(move |conn| {
                let sql = if enabled_only {
                    "SELECT id, url, title, site_url, category, enabled, last_fetched_at, created_at
                     FROM feeds WHERE enabled = 1 ORDER BY id"
                } else {
                    "SELECT id, url, title, site_url, category, enabled, last_fetched_at, created_at
                     FROM feeds ORDER BY id"
                };
                let mut stmt = conn.prepare(sql)?;
                let feeds = stmt
                    .query_map([], |row| Ok(feed_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        let feed = self
            .conn
            .call(move |conn| {
                let feed = conn
                    .query_row(
                        "SELECT id, url, title, site_url, category, enabled, last_fetched_at, created_at
                         FROM feeds WHERE id = ?1",
                        params![id],
                        |row| Ok(feed_from_row(row)),
                    )
                    .optional()?;
                Ok(feed)
            })
            .await?;
        Ok(feed)
    }

    /// Delete a feed; its articles cascade. Returns false when missing.
    pub async fn delete_feed(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
                Ok(n > 0)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn update_feed_last_fetched(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        let ts = fmt_db(now);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feeds SET last_fetched_at = ?1 WHERE id = ?2",
                    params![ts, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Article operations

    /// Insert an article, deduplicated by URL. Returns true when the
    /// row is new; duplicates are silently skipped.
    pub async fn insert_article(
        &self,
        article: NewArticle,
        fetched_at: DateTime<Utc>,
    ) -> Result<bool> {
        let fetched = fmt_db(fetched_at);
        let inserted = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "INSERT OR IGNORE INTO articles
                         (feed_id, url, title, author, summary, content, published_at, fetched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        article.feed_id,
                        article.url,
                        article.title,
                        article.author,
                        article.summary,
                        article.content,
                        article.published_at.map(fmt_db),
                        fetched,
                    ],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<(Article, Option<Score>)>> {
        let row = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{ARTICLE_SELECT} WHERE a.id = ?1"
                ))?;
                let row = stmt
                    .query_row(params![id], |row| {
                        Ok((article_from_row(row), optional_score_from_row(row)))
                    })
                    .optional()?;
                Ok(row)
            })
            .await?;
        Ok(row)
    }

    /// Flat listing with filters; orders scored-first by relevance,
    /// then by published date.
    pub async fn list_articles(&self, q: ArticleQuery) -> Result<Vec<(Article, Option<Score>)>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut sql = String::from(ARTICLE_SELECT);
                let mut clauses: Vec<&str> = Vec::new();
                let mut values: Vec<Value> = Vec::new();

                if !q.include_archived {
                    clauses.push("a.is_archived = 0");
                }
                if q.scored_only || q.min_score > 0.0 {
                    clauses.push("s.id IS NOT NULL");
                }
                if q.min_score > 0.0 {
                    values.push(Value::from(q.min_score));
                    clauses.push("s.relevance >= ?");
                }
                if !q.topic.is_empty() {
                    values.push(Value::from(format!("%{}%", q.topic)));
                    clauses.push("s.topics LIKE ?");
                }
                if let Some(feed_id) = q.feed_id {
                    values.push(Value::from(feed_id));
                    clauses.push("a.feed_id = ?");
                }

                if !clauses.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&clauses.join(" AND "));
                }
                sql.push_str(
                    " ORDER BY s.relevance DESC NULLS LAST, a.published_at DESC NULLS LAST
                      LIMIT ? OFFSET ?",
                );
                values.push(Value::from(q.limit));
                values.push(Value::from(q.offset));

                // Positional '?' binds in clause order.
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(values.iter()), |row| {
                        Ok((article_from_row(row), optional_score_from_row(row)))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// All scored, non-archived articles: the eligible set for the
    /// personalized feed. Recomputed fresh per request.
    pub async fn foryou_candidates(&self) -> Result<Vec<ScoredArticle>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "{ARTICLE_SELECT_INNER} WHERE a.is_archived = 0"
                ))?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(ScoredArticle {
                            article: article_from_row(row),
                            score: score_from_row(row, SCORE_COL_OFFSET),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn mark_read(&self, id: i64, is_read: bool) -> Result<bool> {
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE articles SET is_read = ?1 WHERE id = ?2",
                    params![is_read, id],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(updated)
    }

    pub async fn toggle_starred(&self, id: i64) -> Result<bool> {
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE articles SET is_starred = NOT is_starred WHERE id = ?1",
                    params![id],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(updated)
    }

    // Scoring operations

    pub async fn unscored_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{ARTICLE_SELECT}
                     WHERE a.id NOT IN (SELECT article_id FROM scores)
                     ORDER BY a.published_at DESC NULLS LAST
                     LIMIT ?1"
                ))?;
                let rows = stmt
                    .query_map(params![limit as i64], |row| Ok(article_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Batch-upsert scores in one transaction. Items referencing
    /// unknown articles are skipped. Returns the count written.
    pub async fn upsert_scores(&self, items: Vec<ScoreItem>, now: DateTime<Utc>) -> Result<usize> {
        let scored_at = fmt_db(now);
        let written = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut written = 0usize;
                {
                    let mut exists_stmt =
                        tx.prepare("SELECT 1 FROM articles WHERE id = ?1")?;
                    let mut upsert_stmt = tx.prepare(
                        "INSERT INTO scores
                             (article_id, relevance, significance, confidence, summary, topics, reason, scored_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                         ON CONFLICT(article_id) DO UPDATE SET
                             relevance = excluded.relevance,
                             significance = excluded.significance,
                             confidence = excluded.confidence,
                             summary = excluded.summary,
                             topics = excluded.topics,
                             reason = excluded.reason,
                             scored_at = excluded.scored_at",
                    )?;
                    for item in &items {
                        let exists: Option<i64> = exists_stmt
                            .query_row(params![item.article_id], |row| row.get(0))
                            .optional()?;
                        if exists.is_none() {
                            continue;
                        }
                        let topics =
                            serde_json::to_string(&item.topics).unwrap_or_else(|_| "[]".into());
                        upsert_stmt.execute(params![
                            item.article_id,
                            item.relevance,
                            item.significance,
                            item.confidence,
                            item.summary,
                            topics,
                            item.reason,
                            scored_at,
                        ])?;
                        written += 1;
                    }
                }
                tx.commit()?;
                Ok(written)
            })
            .await?;
        Ok(written)
    }

    pub async fn get_score(&self, article_id: i64) -> Result<Option<Score>> {
        let score = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, article_id, relevance, significance, confidence, summary, topics, reason, scored_at
                     FROM scores WHERE article_id = ?1",
                )?;
                let score = stmt
                    .query_row(params![article_id], |row| Ok(score_from_row(row, 0)))
                    .optional()?;
                Ok(score)
            })
            .await?;
        Ok(score)
    }

    /// Delete scores for articles fetched strictly after `cutoff`.
    /// Articles fetched exactly at the cutoff keep their score.
    pub async fn delete_recent_scores(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = fmt_db(cutoff);
        let deleted = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM scores WHERE article_id IN
                         (SELECT id FROM articles WHERE fetched_at > ?1)",
                    params![cutoff],
                )?;
                Ok(n)
            })
            .await?;
        Ok(deleted)
    }

    // Retention operations

    /// Unarchived articles fetched before `cutoff`, with their
    /// combined score when present.
    pub async fn stale_unarchived(&self, cutoff: DateTime<Utc>) -> Result<Vec<StaleArticle>> {
        let cutoff = fmt_db(cutoff);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT a.id, s.relevance + s.significance
                     FROM articles a
                     LEFT JOIN scores s ON s.article_id = a.id
                     WHERE a.fetched_at < ?1 AND a.is_archived = 0",
                )?;
                let rows = stmt
                    .query_map(params![cutoff], |row| {
                        Ok(StaleArticle {
                            id: row.get(0)?,
                            combined_score: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Article ids with at least one save/like feedback entry.
    pub async fn exempt_article_ids(&self) -> Result<HashSet<i64>> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT article_id FROM feedback WHERE action IN ('save', 'like')",
                )?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<std::result::Result<HashSet<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Flip the archived flag for all given ids in one transaction.
    /// Already-archived rows are untouched.
    pub async fn archive_articles(&self, ids: Vec<i64>) -> Result<usize> {
        let archived = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut archived = 0usize;
                {
                    let mut stmt = tx.prepare(
                        "UPDATE articles SET is_archived = 1 WHERE id = ?1 AND is_archived = 0",
                    )?;
                    for id in &ids {
                        archived += stmt.execute(params![id])?;
                    }
                }
                tx.commit()?;
                Ok(archived)
            })
            .await?;
        Ok(archived)
    }

    // Feedback operations

    /// Append a feedback entry. Returns false when the article does
    /// not exist.
    pub async fn insert_feedback(
        &self,
        article_id: i64,
        action: FeedbackAction,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let created_at = fmt_db(now);
        let action = action.as_str();
        let inserted = self
            .conn
            .call(move |conn| {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM articles WHERE id = ?1",
                        params![article_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO feedback (article_id, action, created_at) VALUES (?1, ?2, ?3)",
                    params![article_id, action, created_at],
                )?;
                Ok(true)
            })
            .await?;
        Ok(inserted)
    }

    // Preferences / rescore flag

    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let value: Option<String> = conn
                    .query_row(
                        "SELECT value FROM preferences WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    pub async fn set_preference(&self, key: &str, value: String, now: DateTime<Utc>) -> Result<()> {
        let key = key.to_string();
        let updated_at = fmt_db(now);
        self.conn
            .call(move |conn| {
                // Single-statement upsert keeps the read-modify-write atomic.
                conn.execute(
                    "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Missing flag or unparseable value reads as Clean.
    pub async fn rescore_state(&self) -> Result<RescoreState> {
        let raw = self.get_preference(RESCORE_FLAG_KEY).await?;
        let state = match raw.as_deref().map(serde_json::from_str::<String>) {
            Some(Ok(v)) if v == "true" => RescoreState::PendingRescore,
            _ => RescoreState::Clean,
        };
        Ok(state)
    }

    pub async fn set_rescore_state(&self, state: RescoreState, now: DateTime<Utc>) -> Result<()> {
        let value = match state {
            RescoreState::PendingRescore => "\"true\"",
            RescoreState::Clean => "\"false\"",
        };
        self.set_preference(RESCORE_FLAG_KEY, value.to_string(), now)
            .await
    }

    // Export / stats

    pub async fn scored_for_export(
        &self,
        min_score: f64,
        limit: usize,
    ) -> Result<Vec<(Article, Score)>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{ARTICLE_SELECT_INNER}
                     WHERE s.relevance >= ?1
                     ORDER BY s.relevance DESC
                     LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![min_score, limit as i64], |row| {
                        Ok((article_from_row(row), score_from_row(row, SCORE_COL_OFFSET)))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn stats(&self) -> Result<Stats> {
        let stats = self
            .conn
            .call(|conn| {
                let count = |sql: &str| -> std::result::Result<i64, rusqlite::Error> {
                    conn.query_row(sql, [], |row| row.get(0))
                };
                Ok(Stats {
                    feeds: count("SELECT COUNT(*) FROM feeds")?,
                    feeds_enabled: count("SELECT COUNT(*) FROM feeds WHERE enabled = 1")?,
                    articles: count("SELECT COUNT(*) FROM articles")?,
                    scored: count("SELECT COUNT(*) FROM scores")?,
                    feedback: count("SELECT COUNT(*) FROM feedback")?,
                })
            })
            .await?;
        Ok(stats)
    }
}

// Shared SELECT fragments. LEFT JOIN keeps unscored articles, the
// INNER variant is the scored-only eligible set.
const ARTICLE_SELECT: &str = "SELECT a.id, a.feed_id, a.url, a.title, a.author, a.summary, a.content,
        a.published_at, a.fetched_at, a.is_read, a.is_starred, a.is_archived,
        f.title AS feed_title, f.category AS feed_category,
        s.id, s.article_id, s.relevance, s.significance, s.confidence, s.summary, s.topics, s.reason, s.scored_at
 FROM articles a
 JOIN feeds f ON a.feed_id = f.id
 LEFT JOIN scores s ON s.article_id = a.id";

const ARTICLE_SELECT_INNER: &str = "SELECT a.id, a.feed_id, a.url, a.title, a.author, a.summary, a.content,
        a.published_at, a.fetched_at, a.is_read, a.is_starred, a.is_archived,
        f.title AS feed_title, f.category AS feed_category,
        s.id, s.article_id, s.relevance, s.significance, s.confidence, s.summary, s.topics, s.reason, s.scored_at
 FROM articles a
 JOIN feeds f ON a.feed_id = f.id
 JOIN scores s ON s.article_id = a.id";

const SCORE_COL_OFFSET: usize = 14;

/// Timestamps are stored as RFC3339 UTC with fixed precision so that
/// string comparison matches chronological order.
fn fmt_db(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 first (e.g., "2026-01-11T12:34:56Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn feed_from_row(row: &Row) -> Feed {
    Feed {
        id: row.get(0).unwrap(),
        url: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        site_url: row.get(3).unwrap(),
        category: row.get(4).unwrap(),
        enabled: row.get::<_, i64>(5).unwrap() != 0,
        last_fetched_at: row
            .get::<_, Option<String>>(6)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        created_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn article_from_row(row: &Row) -> Article {
    Article {
        id: row.get(0).unwrap(),
        feed_id: row.get(1).unwrap(),
        url: row.get(2).unwrap(),
        title: row.get(3).unwrap(),
        author: row.get(4).unwrap(),
        summary: row.get(5).unwrap(),
        content: row.get(6).unwrap(),
        published_at: row
            .get::<_, Option<String>>(7)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        fetched_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        is_read: row.get::<_, i64>(9).unwrap() != 0,
        is_starred: row.get::<_, i64>(10).unwrap() != 0,
        is_archived: row.get::<_, i64>(11).unwrap() != 0,
        feed_title: row.get(12).unwrap(),
        feed_category: row.get(13).unwrap(),
    }
}

fn score_from_row(row: &Row, offset: usize) -> Score {
    let topics: Vec<String> = row
        .get::<_, String>(offset + 6)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    Score {
        id: row.get(offset).unwrap(),
        article_id: row.get(offset + 1).unwrap(),
        relevance: row.get(offset + 2).unwrap(),
        significance: row.get(offset + 3).unwrap(),
        confidence: row.get(offset + 4).unwrap(),
        summary: row.get(offset + 5).unwrap(),
        topics,
        reason: row.get(offset + 7).unwrap(),
        scored_at: row
            .get::<_, String>(offset + 8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn optional_score_from_row(row: &Row) -> Option<Score> {
    row.get::<_, Option<i64>>(SCORE_COL_OFFSET)
        .ok()
        .flatten()
        .map(|_| score_from_row(row, SCORE_COL_OFFSET))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_repo() -> (Repository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (repo, dir)
    }

    async fn seed_feed(repo: &Repository) -> Feed {
        repo.insert_feed(NewFeed {
            url: "https://example.com/feed".into(),
            title: "Test Feed".into(),
            site_url: "https://example.com".into(),
            category: "tech".into(),
        })
        .await
        .unwrap()
        .unwrap()
    }

    fn new_article(feed_id: i64, url_suffix: &str) -> NewArticle {
        NewArticle {
            feed_id,
            url: format!("https://example.com/{url_suffix}"),
            title: "Test Article".into(),
            author: "".into(),
            summary: "".into(),
            content: "".into(),
            published_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn duplicate_article_url_is_skipped() {
        let (repo, _dir) = test_repo().await;
        let feed = seed_feed(&repo).await;

        assert!(repo
            .insert_article(new_article(feed.id, "a"), Utc::now())
            .await
            .unwrap());
        assert!(!repo
            .insert_article(new_article(feed.id, "a"), Utc::now())
            .await
            .unwrap());

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.articles, 1);
    }

    #[tokio::test]
    async fn duplicate_feed_url_returns_none() {
        let (repo, _dir) = test_repo().await;
        seed_feed(&repo).await;

        let dup = repo
            .insert_feed(NewFeed {
                url: "https://example.com/feed".into(),
                title: "Other".into(),
                site_url: "".into(),
                category: "".into(),
            })
            .await
            .unwrap();
        assert!(dup.is_none());
    }

    #[tokio::test]
    async fn upsert_scores_replaces_prior_score() {
        let (repo, _dir) = test_repo().await;
        let feed = seed_feed(&repo).await;
        repo.insert_article(new_article(feed.id, "a"), Utc::now())
            .await
            .unwrap();
        let (article, _) = repo
            .list_articles(ArticleQuery::default())
            .await
            .unwrap()
            .remove(0);

        let item = ScoreItem {
            article_id: article.id,
            relevance: 4.0,
            significance: 2.0,
            confidence: 0.8,
            summary: "first".into(),
            topics: vec!["rust".into()],
            reason: "".into(),
        };
        assert_eq!(repo.upsert_scores(vec![item.clone()], Utc::now()).await.unwrap(), 1);

        let replacement = ScoreItem {
            relevance: 9.0,
            summary: "second".into(),
            ..item
        };
        assert_eq!(
            repo.upsert_scores(vec![replacement], Utc::now()).await.unwrap(),
            1
        );

        let score = repo.get_score(article.id).await.unwrap().unwrap();
        assert_eq!(score.relevance, 9.0);
        assert_eq!(score.summary, "second");
        assert_eq!(repo.stats().await.unwrap().scored, 1);
    }

    #[tokio::test]
    async fn upsert_scores_skips_unknown_articles() {
        let (repo, _dir) = test_repo().await;
        let written = repo
            .upsert_scores(
                vec![ScoreItem {
                    article_id: 999,
                    relevance: 5.0,
                    significance: 5.0,
                    confidence: 1.0,
                    summary: "".into(),
                    topics: vec![],
                    reason: "".into(),
                }],
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn delete_recent_scores_uses_strict_cutoff() {
        let (repo, _dir) = test_repo().await;
        let feed = seed_feed(&repo).await;
        let now = Utc::now();
        let cutoff = now - Duration::days(7);

        // One article exactly at the cutoff, one inside the window.
        repo.insert_article(new_article(feed.id, "boundary"), cutoff)
            .await
            .unwrap();
        repo.insert_article(new_article(feed.id, "recent"), now - Duration::days(1))
            .await
            .unwrap();

        let articles = repo.list_articles(ArticleQuery::default()).await.unwrap();
        let items: Vec<ScoreItem> = articles
            .iter()
            .map(|(a, _)| ScoreItem {
                article_id: a.id,
                relevance: 5.0,
                significance: 5.0,
                confidence: 1.0,
                summary: "".into(),
                topics: vec![],
                reason: "".into(),
            })
            .collect();
        repo.upsert_scores(items, now).await.unwrap();

        let deleted = repo.delete_recent_scores(cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.stats().await.unwrap().scored, 1);
    }

    #[tokio::test]
    async fn rescore_state_defaults_to_clean() {
        let (repo, _dir) = test_repo().await;
        assert_eq!(repo.rescore_state().await.unwrap(), RescoreState::Clean);

        repo.set_rescore_state(RescoreState::PendingRescore, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            repo.rescore_state().await.unwrap(),
            RescoreState::PendingRescore
        );

        repo.set_rescore_state(RescoreState::Clean, Utc::now())
            .await
            .unwrap();
        assert_eq!(repo.rescore_state().await.unwrap(), RescoreState::Clean);
    }

    #[tokio::test]
    async fn feedback_requires_existing_article() {
        let (repo, _dir) = test_repo().await;
        let ok = repo
            .insert_feedback(42, FeedbackAction::Like, Utc::now())
            .await
            .unwrap();
        assert!(!ok);
    }
}
