//! Rescore coordinator.
//!
//! A structural profile change (topic added or removed) sets a durable
//! flag; the next cycle deletes recent scores and re-runs scoring.
//! The flag clears even when scoring fails: affected articles are
//! unscored at that point and ordinary unscored-article scoring picks
//! them up next cycle, so a broken scorer never causes a retry loop.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use crate::db::Repository;
use crate::error::Result;
use crate::models::RescoreState;

/// Only articles fetched strictly within this window lose their score;
/// older articles keep stale scores to bound re-scoring cost.
pub const RESCORE_WINDOW_DAYS: i64 = 7;

/// Check the rescore flag and, when pending, invalidate recent scores
/// and invoke `rescore` for the now-unscored articles.
pub async fn check_rescore<F, Fut>(repo: &Repository, now: DateTime<Utc>, rescore: F) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<usize>>,
{
    if repo.rescore_state().await? != RescoreState::PendingRescore {
        return Ok(());
    }

    tracing::info!("needs_rescore flag set, re-scoring recent articles");

    let cutoff = now - Duration::days(RESCORE_WINDOW_DAYS);
    let deleted = repo.delete_recent_scores(cutoff).await?;
    if deleted > 0 {
        tracing::info!("Deleted {} scores for re-scoring", deleted);
    }

    if let Err(e) = rescore().await {
        tracing::error!(
            "Re-scoring failed, articles will be scored in the next normal cycle: {}",
            e
        );
    }

    // Clear unconditionally, even on scoring failure.
    repo.set_rescore_state(RescoreState::Clean, now).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ArticleQuery, NewArticle, NewFeed, ScoreItem};

    async fn test_repo() -> (Repository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (repo, dir)
    }

    async fn seed_scored(repo: &Repository, url: &str, fetched_at: DateTime<Utc>) -> i64 {
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
        let id = repo
            .list_articles(ArticleQuery {
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap()
            .iter()
            .find(|(a, _)| a.url == url)
            .map(|(a, _)| a.id)
            .unwrap();
        repo.upsert_scores(
            vec![ScoreItem {
                article_id: id,
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
        id
    }

    #[tokio::test]
    async fn clean_state_is_a_no_op() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();
        let recent = seed_scored(&repo, "https://example.com/a", now - Duration::days(1)).await;

        check_rescore(&repo, now, || async { panic!("should not be called") })
            .await
            .unwrap();

        assert!(repo.get_score(recent).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pending_deletes_only_recent_scores() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();

        let recent = seed_scored(&repo, "https://example.com/recent", now - Duration::days(1)).await;
        let boundary = seed_scored(
            &repo,
            "https://example.com/boundary",
            now - Duration::days(RESCORE_WINDOW_DAYS),
        )
        .await;
        let old = seed_scored(&repo, "https://example.com/old", now - Duration::days(30)).await;

        repo.set_rescore_state(RescoreState::PendingRescore, now)
            .await
            .unwrap();
        check_rescore(&repo, now, || async { Ok(0) }).await.unwrap();

        assert!(repo.get_score(recent).await.unwrap().is_none());
        // Exactly 7 days old sits on the boundary and keeps its score.
        assert!(repo.get_score(boundary).await.unwrap().is_some());
        assert!(repo.get_score(old).await.unwrap().is_some());
        assert_eq!(repo.rescore_state().await.unwrap(), RescoreState::Clean);
    }

    #[tokio::test]
    async fn flag_clears_even_when_scoring_fails() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();

        repo.set_rescore_state(RescoreState::PendingRescore, now)
            .await
            .unwrap();
        check_rescore(&repo, now, || async {
            Err(AppError::Scoring("oracle unavailable".into()))
        })
        .await
        .unwrap();

        assert_eq!(repo.rescore_state().await.unwrap(), RescoreState::Clean);
    }
}
