//! Composite ranker.
//!
//! Formula:
//!     rank = (relevance × max_topic_weight / 10) + (significance × 0.3) + recency_bonus
//!     recency_bonus = 2 × exp(-age_hours / 48)
//!
//! Read articles get rank × 0.3. Multi-topic articles use the highest
//! matching topic weight. With no match, max_topic_weight floors at 1.0.

use chrono::{DateTime, Utc};

use crate::models::{Article, InterestProfile, Score};

const READ_PENALTY: f64 = 0.3;
const SIGNIFICANCE_FACTOR: f64 = 0.3;
const RECENCY_HALF_SCALE_HOURS: f64 = 48.0;

/// Compute the composite rank for an article. Pure: `now` is passed in
/// so callers and tests control the clock.
pub fn compute_rank(
    article: &Article,
    score: &Score,
    interests: &InterestProfile,
    now: DateTime<Utc>,
) -> f64 {
    let max_weight = max_topic_weight(&score.topics, interests);

    let relevance_component = score.relevance * max_weight / 10.0;
    let significance_component = score.significance * SIGNIFICANCE_FACTOR;

    let mut rank = relevance_component + significance_component + recency_bonus(article, now);

    if article.is_read {
        rank *= READ_PENALTY;
    }

    rank
}

/// Highest matching topic weight from the interest profile, floor 1.0.
///
/// Matching is case-insensitive substring containment in either
/// direction, against both topic names and keywords. The 1.0 floor is
/// also the sentinel that classifies an article as exploration
/// content downstream.
pub fn max_topic_weight(score_topics: &[String], interests: &InterestProfile) -> f64 {
    if score_topics.is_empty() || interests.topics.is_empty() {
        return 1.0;
    }

    let tags: Vec<String> = score_topics.iter().map(|t| t.to_lowercase()).collect();
    let mut max_weight = 0.0f64;

    for topic in &interests.topics {
        let name = topic.name.to_lowercase();
        let keywords: Vec<String> = topic.keywords.iter().map(|k| k.to_lowercase()).collect();

        for tag in &tags {
            if tag == &name || name.contains(tag.as_str()) || tag.contains(name.as_str()) {
                max_weight = max_weight.max(topic.weight);
                break;
            }
            if keywords
                .iter()
                .any(|kw| kw.contains(tag.as_str()) || tag.contains(kw.as_str()))
            {
                max_weight = max_weight.max(topic.weight);
                break;
            }
        }
    }

    if max_weight > 0.0 {
        max_weight
    } else {
        1.0
    }
}

/// 2 × exp(-age_hours / 48), age from published_at with fetched_at as
/// fallback. Future-dated articles clamp to age 0 (bonus 2.0).
fn recency_bonus(article: &Article, now: DateTime<Utc>) -> f64 {
    let published = article.published_at.unwrap_or(article.fetched_at);
    let age_hours = ((now - published).num_seconds() as f64 / 3600.0).max(0.0);
    2.0 * (-age_hours / RECENCY_HALF_SCALE_HOURS).exp()
}
