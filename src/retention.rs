//! Age/score-based archival.
//!
//! An article is archived when it is older than the retention window
//! and nothing marks it as worth keeping: no save/like feedback, and
//! either no score or a combined score below the threshold. Archival
//! is a soft flag, never a deletion, so feedback history survives.

use chrono::{DateTime, Duration, Utc};

use crate::db::Repository;
use crate::error::Result;

pub const RETENTION_DAYS: i64 = 7;
pub const LOW_VALUE_THRESHOLD: f64 = 3.0;

/// Run one archival pass. Idempotent: a second pass over the same
/// dataset archives nothing. All flips commit in a single transaction.
pub async fn archive_stale(repo: &Repository, now: DateTime<Utc>) -> Result<usize> {
    let cutoff = now - Duration::days(RETENTION_DAYS);

    let exempt = repo.exempt_article_ids().await?;
    let stale = repo.stale_unarchived(cutoff).await?;

    let ids: Vec<i64> = stale
        .into_iter()
        .filter(|candidate| {
            !exempt.contains(&candidate.id) && is_low_value(candidate.combined_score)
        })
        .map(|candidate| candidate.id)
        .collect();

    if ids.is_empty() {
        return Ok(0);
    }

    let archived = repo.archive_articles(ids).await?;
    if archived > 0 {
        tracing::info!("Archived {} stale articles", archived);
    }
    Ok(archived)
}

/// Unscored, or combined relevance + significance below threshold.
fn is_low_value(combined_score: Option<f64>) -> bool {
    match combined_score {
        None => true,
        Some(combined) => combined < LOW_VALUE_THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleQuery, FeedbackAction, NewArticle, NewFeed, ScoreItem};

    #[test]
    fn unscored_is_low_value() {
        assert!(is_low_value(None));
    }

    #[test]
    fn threshold_is_strict() {
        assert!(is_low_value(Some(2.9)));
        assert!(!is_low_value(Some(3.0)));
        assert!(!is_low_value(Some(8.5)));
    }

    async fn test_repo() -> (Repository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (repo, dir)
    }

    async fn seed(repo: &Repository, url: &str, fetched_at: DateTime<Utc>) -> i64 {
        let feed = match repo
            .insert_feed(NewFeed {
                url: "https://example.com/feed".into(),
                title: "f".into(),
                site_url: "".into(),
                category: "".into(),
            })
            .await
            .unwrap()
        {
            Some(feed) => feed,
            None => repo.get_feed(1).await.unwrap().unwrap(),
        };
        repo.insert_article(
            NewArticle {
                feed_id: feed.id,
                url: url.to_string(),
                title: "a".into(),
                author: "".into(),
                summary: "".into(),
                content: "".into(),
                published_at: None,
            },
            fetched_at,
        )
        .await
        .unwrap();
        let articles = repo
            .list_articles(ArticleQuery {
                include_archived: true,
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        articles
            .iter()
            .find(|(a, _)| a.url == url)
            .map(|(a, _)| a.id)
            .unwrap()
    }

    async fn score(repo: &Repository, article_id: i64, relevance: f64, significance: f64) {
        repo.upsert_scores(
            vec![ScoreItem {
                article_id,
                relevance,
                significance,
                confidence: 1.0,
                summary: "".into(),
                topics: vec![],
                reason: "".into(),
            }],
            Utc::now(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn archives_old_unscored_and_low_value_articles() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        let old = now - Duration::days(8);

        let unscored = seed(&repo, "https://example.com/unscored", old).await;
        let low = seed(&repo, "https://example.com/low", old).await;
        score(&repo, low, 1.0, 1.0).await;
        let high = seed(&repo, "https://example.com/high", old).await;
        score(&repo, high, 5.0, 5.0).await;
        let fresh = seed(&repo, "https://example.com/fresh", now).await;

        let archived = archive_stale(&repo, now).await.unwrap();
        assert_eq!(archived, 2);

        let all = repo
            .list_articles(ArticleQuery {
                include_archived: true,
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        let archived_of = |id: i64| all.iter().find(|(a, _)| a.id == id).unwrap().0.is_archived;
        assert!(archived_of(unscored));
        assert!(archived_of(low));
        assert!(!archived_of(high));
        assert!(!archived_of(fresh));
    }

    #[tokio::test]
    async fn save_or_like_feedback_exempts_permanently() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        let old = now - Duration::days(30);

        let saved = seed(&repo, "https://example.com/saved", old).await;
        let liked = seed(&repo, "https://example.com/liked", old).await;
        let skipped = seed(&repo, "https://example.com/skipped", old).await;
        repo.insert_feedback(saved, FeedbackAction::Save, now)
            .await
            .unwrap();
        repo.insert_feedback(liked, FeedbackAction::Like, now)
            .await
            .unwrap();
        repo.insert_feedback(skipped, FeedbackAction::Skip, now)
            .await
            .unwrap();

        let archived = archive_stale(&repo, now).await.unwrap();
        assert_eq!(archived, 1);

        let all = repo
            .list_articles(ArticleQuery {
                include_archived: true,
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        let archived_of = |id: i64| all.iter().find(|(a, _)| a.id == id).unwrap().0.is_archived;
        assert!(!archived_of(saved));
        assert!(!archived_of(liked));
        assert!(archived_of(skipped));
    }

    #[tokio::test]
    async fn second_pass_archives_nothing() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        let old = now - Duration::days(10);

        seed(&repo, "https://example.com/one", old).await;
        seed(&repo, "https://example.com/two", old).await;

        assert_eq!(archive_stale(&repo, now).await.unwrap(), 2);
        assert_eq!(archive_stale(&repo, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn age_boundary_is_exclusive() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();

        // Exactly 7 days old: not strictly older than the cutoff.
        seed(
            &repo,
            "https://example.com/boundary",
            now - Duration::days(RETENTION_DAYS),
        )
        .await;

        assert_eq!(archive_stale(&repo, now).await.unwrap(), 0);
    }
}
