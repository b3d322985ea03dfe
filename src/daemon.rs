//! Background cycle: fetch, score, retention, rescore check.
//!
//! Pre-compute everything in the background so the feed endpoint only
//! has to rank. Each phase fails independently: an unreachable feed or
//! a dead scoring oracle never stops the rest of the cycle.

use std::time::Duration;

use chrono::Utc;

use crate::db::Repository;
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::interests::InterestStore;
use crate::models::InterestProfile;
use crate::rescore;
use crate::retention;
use crate::scoring;

const RESCORE_BATCH_LIMIT: usize = 50;

#[derive(Debug, Default)]
pub struct CycleStats {
    pub fetched: usize,
    pub scored: usize,
    pub archived: usize,
}

/// Execute one cycle. Never returns an error: phase failures are
/// logged and the cycle continues.
pub async fn run_cycle(
    repo: &Repository,
    interests: &InterestStore,
    fetcher: &FeedFetcher,
    scoring_limit: usize,
) -> CycleStats {
    let mut stats = CycleStats::default();

    match fetch_phase(repo, fetcher).await {
        Ok(fetched) => stats.fetched = fetched,
        Err(e) => tracing::error!("Fetch phase failed: {}", e),
    }

    let profile = interests.load().unwrap_or_else(|e| {
        tracing::error!("Failed to load interest profile: {}", e);
        InterestProfile::default()
    });

    match scoring::score_unscored(repo, &profile, scoring_limit).await {
        Ok(scored) => stats.scored = scored,
        Err(e) => tracing::error!("Score phase failed: {}", e),
    }

    match retention::archive_stale(repo, Utc::now()).await {
        Ok(archived) => stats.archived = archived,
        Err(e) => tracing::error!("Retention phase failed: {}", e),
    }

    if let Err(e) = rescore::check_rescore(repo, Utc::now(), || {
        scoring::score_unscored(repo, &profile, RESCORE_BATCH_LIMIT)
    })
    .await
    {
        tracing::error!("Rescore check failed: {}", e);
    }

    tracing::info!(
        "Cycle complete: fetched {}, scored {}, archived {}",
        stats.fetched,
        stats.scored,
        stats.archived
    );

    stats
}

/// Refresh all enabled feeds and insert new articles. Returns the
/// number of new (non-duplicate) articles.
async fn fetch_phase(repo: &Repository, fetcher: &FeedFetcher) -> Result<usize> {
    let feeds = repo.get_all_feeds(true).await?;
    let results = fetcher.refresh_all(feeds).await;

    let mut fetched = 0usize;
    for (feed_id, articles) in results {
        let mut new_count = 0usize;
        for article in articles {
            if repo.insert_article(article, Utc::now()).await? {
                new_count += 1;
            }
        }
        repo.update_feed_last_fetched(feed_id, Utc::now()).await?;
        tracing::info!("Feed #{}: {} new articles", feed_id, new_count);
        fetched += new_count;
    }
    Ok(fetched)
}

/// Run the cycle on a fixed interval, forever.
pub async fn run_daemon(
    repo: &Repository,
    interests: &InterestStore,
    interval: Duration,
    scoring_limit: usize,
) {
    let fetcher = FeedFetcher::new();
    tracing::info!("Daemon started (interval={}s)", interval.as_secs());

    loop {
        tracing::info!("Starting cycle at {}", Utc::now().to_rfc3339());
        run_cycle(repo, interests, &fetcher, scoring_limit).await;
        tokio::time::sleep(interval).await;
    }
}
