//! Target resolver: match free-form mutation text against stored items.
//!
//! # Responsibility
//! - Find the item a completion/deletion/status phrase refers to.
//! - Distinguish a confident unique match from an ambiguous one.
//!
//! # Invariants
//! - Only the caller's non-completed items are candidates.
//! - A match wins outright only when it clears the score threshold AND
//!   leads the runner-up by the dominance margin; otherwise every
//!   candidate above the threshold is reported for disambiguation.

use crate::model::item::{CapturedItem, Category, ItemId, ItemStatus, UserId};
use crate::repo::item_repo::{
    ItemListQuery, ItemRepository, RepoResult, SqliteItemRepository,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

/// Minimum score for a title to count as a match at all.
const MATCH_THRESHOLD: f64 = 0.5;

/// Lead the best match needs over the runner-up to win outright.
const DOMINANCE_MARGIN: f64 = 0.2;

static BUCKET_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfrom\s+(?:the\s+|my\s+)?(tasks?|projects?|contacts?|people|ideas?)\b")
        .expect("bucket hint pattern must compile")
});

/// A scored candidate surfaced during disambiguation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub id: ItemId,
    pub category: Category,
    pub title: String,
    pub score: f64,
}

/// Outcome of resolving a mutation target.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetMatch {
    /// One candidate clearly wins.
    Unique(CapturedItem),
    /// Several plausible candidates; the user must choose.
    Ambiguous(Vec<MatchCandidate>),
    /// Nothing scored above the threshold.
    None,
}

/// Extracts a bucket hint from phrasing like "from the projects list".
pub fn bucket_hint_from_text(text: &str) -> Option<Category> {
    BUCKET_HINT_RE
        .captures(text)
        .and_then(|caps| Category::parse_label(caps.get(1)?.as_str()))
}

/// Resolves `needle` against the user's open items.
pub fn resolve_target(
    conn: &Connection,
    user_id: UserId,
    needle: &str,
    bucket_hint: Option<Category>,
) -> RepoResult<TargetMatch> {
    let repo = SqliteItemRepository::new(conn);
    let query = ItemListQuery {
        category: bucket_hint,
        statuses: vec![ItemStatus::Active, ItemStatus::Paused, ItemStatus::Someday],
        ..ItemListQuery::default()
    };
    let items = repo.list_items(user_id, &query)?;

    let mut scored: Vec<(f64, CapturedItem)> = items
        .into_iter()
        .filter_map(|item| {
            let score = match_score(&item.title, needle);
            (score >= MATCH_THRESHOLD).then_some((score, item))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    match scored.len() {
        0 => Ok(TargetMatch::None),
        1 => Ok(TargetMatch::Unique(scored.remove(0).1)),
        _ => {
            let lead = scored[0].0 - scored[1].0;
            if lead >= DOMINANCE_MARGIN {
                Ok(TargetMatch::Unique(scored.remove(0).1))
            } else {
                let candidates = scored
                    .into_iter()
                    .map(|(score, item)| MatchCandidate {
                        id: item.id,
                        category: item.category,
                        title: item.title,
                        score,
                    })
                    .collect();
                Ok(TargetMatch::Ambiguous(candidates))
            }
        }
    }
}

/// Similarity between a stored title and the phrase the user typed.
///
/// Exact match scores 1.0, substring containment scores by length
/// ratio, otherwise word overlap relative to the shorter side.
fn match_score(title: &str, needle: &str) -> f64 {
    let title = title.trim().to_lowercase();
    let needle = needle.trim().to_lowercase();
    if title.is_empty() || needle.is_empty() {
        return 0.0;
    }
    if title == needle {
        return 1.0;
    }

    let (shorter, longer) = if title.len() <= needle.len() {
        (&title, &needle)
    } else {
        (&needle, &title)
    };
    // Containment is a strong signal; the length ratio only breaks ties
    // between containing titles. Very short needles are too noisy for it.
    if shorter.len() >= 3 && longer.contains(shorter.as_str()) {
        return 0.5 + 0.5 * (shorter.len() as f64 / longer.len() as f64);
    }

    let title_words: Vec<&str> = title.split_whitespace().collect();
    let needle_words: Vec<&str> = needle.split_whitespace().collect();
    let shared = needle_words
        .iter()
        .filter(|word| title_words.contains(*word))
        .count();
    let denom = title_words.len().min(needle_words.len()).max(1);
    shared as f64 / denom as f64
}

#[cfg(test)]
mod tests {
    use super::{bucket_hint_from_text, match_score, MATCH_THRESHOLD};
    use crate::model::item::Category;

    #[test]
    fn exact_and_containment_scores() {
        assert_eq!(match_score("Call Rachel", "call rachel"), 1.0);
        assert!(match_score("Call Rachel about the deck", "call rachel") > MATCH_THRESHOLD);
        assert_eq!(match_score("", "call rachel"), 0.0);
    }

    #[test]
    fn word_overlap_scores_partial_phrases() {
        let score = match_score("Renew drivers license", "renew the license");
        assert!(score >= MATCH_THRESHOLD, "got {score}");
        assert!(match_score("Buy milk", "call rachel") < MATCH_THRESHOLD);
    }

    #[test]
    fn bucket_hints_are_parsed_from_phrasing() {
        assert_eq!(
            bucket_hint_from_text("delete the patio thing from the projects list"),
            Some(Category::Project)
        );
        assert_eq!(
            bucket_hint_from_text("drop jane from my contacts"),
            Some(Category::Contact)
        );
        assert_eq!(bucket_hint_from_text("just some text"), None);
    }
}
