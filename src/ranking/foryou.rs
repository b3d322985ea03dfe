//! "For you" feed assembly: pool split, interleaving, opaque cursor.
//!
//! The whole page is a pure function of the eligible set, the interest
//! profile, and the cursor. Ranks are recomputed from scratch on every
//! request so profile or read-state edits show up immediately.

use std::cmp::Ordering;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::models::{InterestProfile, ScoredArticle};
use crate::ranking::{compute_rank, max_topic_weight};

/// Every position that is a multiple of this draws from the explore
/// pool, giving ~10% exploration density.
const EXPLORE_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct RankedArticle {
    pub entry: ScoredArticle,
    /// Rounded to 4 decimals, the precision the cursor round-trips.
    pub rank: f64,
}

#[derive(Debug, Clone)]
pub struct ForYouPage {
    pub items: Vec<RankedArticle>,
    pub next_cursor: Option<String>,
}

/// Build one page of the personalized feed.
pub fn assemble_page(
    candidates: Vec<ScoredArticle>,
    interests: &InterestProfile,
    limit: usize,
    cursor: Option<&str>,
    now: DateTime<Utc>,
) -> ForYouPage {
    if candidates.is_empty() {
        return ForYouPage {
            items: Vec::new(),
            next_cursor: None,
        };
    }

    // Split into the main pool (matched a weighted topic) and the
    // exploration pool (floor weight only).
    let mut main_pool: Vec<(ScoredArticle, f64)> = Vec::new();
    let mut explore_pool: Vec<(ScoredArticle, f64)> = Vec::new();
    for entry in candidates {
        let rank = compute_rank(&entry.article, &entry.score, interests, now);
        let weight = max_topic_weight(&entry.score.topics, interests);
        if weight <= 1.0 {
            explore_pool.push((entry, rank));
        } else {
            main_pool.push((entry, rank));
        }
    }

    sort_pool(&mut main_pool);
    sort_pool(&mut explore_pool);

    let mut merged = interleave(main_pool, explore_pool);

    // Resume from the cursor: prefer locating the exact article, fall
    // back to a rank cut when it vanished (archived or deleted since
    // the last page). A cursor that fails to decode means first page.
    if let Some((cursor_rank, cursor_id)) = cursor.and_then(decode_cursor) {
        if let Some(pos) = merged.iter().position(|(e, _)| e.article.id == cursor_id) {
            merged.drain(..=pos);
        } else {
            merged.retain(|(e, r)| {
                *r < cursor_rank || (*r == cursor_rank && e.article.id < cursor_id)
            });
        }
    }

    let has_more = merged.len() > limit;
    merged.truncate(limit);

    let next_cursor = if has_more {
        merged
            .last()
            .map(|(e, r)| encode_cursor(round4(*r), e.article.id))
    } else {
        None
    };

    let items = merged
        .into_iter()
        .map(|(entry, rank)| RankedArticle {
            entry,
            rank: round4(rank),
        })
        .collect();

    ForYouPage { items, next_cursor }
}

/// Rank descending, id descending on ties. Total order, so pagination
/// is stable for a fixed dataset.
fn sort_pool(pool: &mut [(ScoredArticle, f64)]) {
    pool.sort_by(|(a, ra), (b, rb)| {
        rb.partial_cmp(ra)
            .unwrap_or(Ordering::Equal)
            .then(b.article.id.cmp(&a.article.id))
    });
}

/// Walk a 1-based position counter, drawing from the explore pool at
/// every multiple of [`EXPLORE_EVERY`] while it lasts; an exhausted
/// pool drains the other.
fn interleave(
    main_pool: Vec<(ScoredArticle, f64)>,
    explore_pool: Vec<(ScoredArticle, f64)>,
) -> Vec<(ScoredArticle, f64)> {
    let mut merged = Vec::with_capacity(main_pool.len() + explore_pool.len());
    let mut main = main_pool.into_iter().peekable();
    let mut explore = explore_pool.into_iter().peekable();
    let mut position = 0usize;

    while main.peek().is_some() || explore.peek().is_some() {
        position += 1;
        if position % EXPLORE_EVERY == 0 && explore.peek().is_some() {
            merged.push(explore.next().unwrap());
        } else if let Some(item) = main.next() {
            merged.push(item);
        } else if let Some(item) = explore.next() {
            merged.push(item);
        }
    }

    merged
}

/// Cursor wire format: base64("{rank}:{id}").
pub fn encode_cursor(rank: f64, article_id: i64) -> String {
    URL_SAFE.encode(format!("{rank}:{article_id}"))
}

/// Decode a cursor. Any failure reads as "no cursor", never an error.
pub fn decode_cursor(cursor: &str) -> Option<(f64, i64)> {
    let raw = URL_SAFE.decode(cursor).ok()?;
    let raw = String::from_utf8(raw).ok()?;
    let (rank_str, id_str) = raw.split_once(':')?;
    let rank = rank_str.parse::<f64>().ok()?;
    let id = id_str.parse::<i64>().ok()?;
    Some((rank, id))
}

fn round4(r: f64) -> f64 {
    (r * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, InterestTopic, Score, ScoredArticle};
    use chrono::Duration;

    fn interests() -> InterestProfile {
        InterestProfile {
            description: String::new(),
            topics: vec![
                InterestTopic {
                    name: "rust".into(),
                    weight: 10.0,
                    keywords: vec![],
                },
                InterestTopic {
                    name: "databases".into(),
                    weight: 5.0,
                    keywords: vec![],
                },
            ],
            exclude: vec![],
        }
    }

    fn entry(id: i64, relevance: f64, topics: Vec<&str>, now: DateTime<Utc>) -> ScoredArticle {
        let ts = now - Duration::hours(1);
        ScoredArticle {
            article: Article {
                id,
                feed_id: 1,
                url: format!("https://example.com/{id}"),
                title: format!("article {id}"),
                author: "".into(),
                summary: "".into(),
                content: "".into(),
                published_at: Some(ts),
                fetched_at: ts,
                is_read: false,
                is_starred: false,
                is_archived: false,
                feed_title: "".into(),
                feed_category: "".into(),
            },
            score: Score {
                id,
                article_id: id,
                relevance,
                significance: 0.0,
                confidence: 1.0,
                summary: "".into(),
                topics: topics.into_iter().map(String::from).collect(),
                reason: "".into(),
                scored_at: now,
            },
        }
    }

    /// n main-pool entries (rust) and m explore entries (unmatched).
    fn dataset(n_main: usize, n_explore: usize, now: DateTime<Utc>) -> Vec<ScoredArticle> {
        let mut out = Vec::new();
        for i in 0..n_main {
            out.push(entry(i as i64 + 1, 9.0 - i as f64 * 0.1, vec!["rust"], now));
        }
        for i in 0..n_explore {
            out.push(entry(
                1000 + i as i64,
                8.0 - i as f64 * 0.1,
                vec!["gardening"],
                now,
            ));
        }
        out
    }

    #[test]
    fn cursor_round_trips() {
        let cursor = encode_cursor(11.8, 42);
        assert_eq!(decode_cursor(&cursor), Some((11.8, 42)));

        let cursor = encode_cursor(0.1234, 7);
        assert_eq!(decode_cursor(&cursor), Some((0.1234, 7)));
    }

    #[test]
    fn garbage_cursor_reads_as_first_page() {
        assert_eq!(decode_cursor("not base64!!!"), None);
        let not_a_pair = URL_SAFE.encode("justonefield");
        assert_eq!(decode_cursor(&not_a_pair), None);
        let bad_rank = URL_SAFE.encode("abc:5");
        assert_eq!(decode_cursor(&bad_rank), None);
    }

    #[test]
    fn empty_candidates_yield_empty_page() {
        let page = assemble_page(Vec::new(), &interests(), 20, None, Utc::now());
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn every_tenth_position_is_an_exploration_slot() {
        let now = Utc::now();
        let page = assemble_page(dataset(35, 4, now), &interests(), 50, None, now);
        assert_eq!(page.items.len(), 39);
        // Positions 10, 20, 30 (1-based) come from the explore pool,
        // every other position up there from the main pool.
        for (idx, item) in page.items.iter().take(30).enumerate() {
            let is_explore = item.entry.article.id >= 1000;
            assert_eq!(is_explore, (idx + 1) % 10 == 0, "position {}", idx + 1);
        }
    }

    #[test]
    fn exhausted_main_pool_drains_explore() {
        let now = Utc::now();
        let page = assemble_page(dataset(2, 5, now), &interests(), 20, None, now);
        assert_eq!(page.items.len(), 7);
        let explore_count = page
            .items
            .iter()
            .filter(|i| i.entry.article.id >= 1000)
            .count();
        assert_eq!(explore_count, 5);
    }

    #[test]
    fn paging_visits_every_article_exactly_once() {
        let now = Utc::now();
        let data = dataset(25, 6, now);
        let total = data.len();

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = assemble_page(
                data.clone(),
                &interests(),
                5,
                cursor.as_deref(),
                now,
            );
            for item in &page.items {
                seen.push(item.entry.article.id);
            }
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        assert_eq!(seen.len(), total);
        let mut unique = seen.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), total);
    }

    #[test]
    fn same_cursor_reproduces_same_page() {
        let now = Utc::now();
        let data = dataset(25, 6, now);

        let first = assemble_page(data.clone(), &interests(), 5, None, now);
        let cursor = first.next_cursor.clone().unwrap();

        let a = assemble_page(data.clone(), &interests(), 5, Some(&cursor), now);
        let b = assemble_page(data, &interests(), 5, Some(&cursor), now);
        let ids_a: Vec<i64> = a.items.iter().map(|i| i.entry.article.id).collect();
        let ids_b: Vec<i64> = b.items.iter().map(|i| i.entry.article.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn missing_cursor_article_falls_back_to_rank_cut() {
        let now = Utc::now();
        let mut data = dataset(10, 0, now);

        let first = assemble_page(data.clone(), &interests(), 3, None, now);
        let last_id = first.items.last().unwrap().entry.article.id;
        let cursor = first.next_cursor.clone().unwrap();

        // The cursor article disappears before the next request.
        data.retain(|e| e.article.id != last_id);
        let next = assemble_page(data, &interests(), 3, Some(&cursor), now);

        // Everything returned ranks strictly below the cursor rank.
        let (cursor_rank, _) = decode_cursor(&cursor).unwrap();
        for item in &next.items {
            assert!(item.rank < cursor_rank);
        }
        assert!(!next.items.iter().any(|i| i.entry.article.id == last_id));
    }

    #[test]
    fn pool_order_is_rank_then_id_descending() {
        let now = Utc::now();
        // Two identical ranks, ids 5 and 6: 6 first.
        let data = vec![
            entry(5, 7.0, vec!["rust"], now),
            entry(6, 7.0, vec!["rust"], now),
        ];
        let page = assemble_page(data, &interests(), 10, None, now);
        let ids: Vec<i64> = page.items.iter().map(|i| i.entry.article.id).collect();
        assert_eq!(ids, vec![6, 5]);
    }

    #[test]
    fn no_cursor_when_page_covers_everything() {
        let now = Utc::now();
        let page = assemble_page(dataset(3, 0, now), &interests(), 20, None, now);
        assert_eq!(page.items.len(), 3);
        assert!(page.next_cursor.is_none());
    }
}
