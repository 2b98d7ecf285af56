use time::OffsetDateTime;

use super::list_key::ListKey;

/// A single movie row extracted from an upstream list page.
///
/// Extraction is best-effort: `imdb_id` may be empty and `year`/`rank`
/// may be unknown when a row was only partially readable. Consumers must
/// tolerate those gaps; nothing here enforces identifier non-emptiness.
/// `rating == 0.0` and `votes == 0` are ambiguous by construction: the
/// source does not distinguish "unknown" from a genuine zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieItem {
    pub imdb_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub rank: Option<u32>,
    pub rating: f32,
    pub votes: u64,
}

/// An immutable capture of one list at one fetch.
///
/// Items keep the source ranking order. A refresh produces a whole new
/// snapshot; readers holding an `Arc` to an old one are never affected.
#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pub key: ListKey,
    pub fetched_at: OffsetDateTime,
    pub items: Vec<MovieItem>,
}

impl ListSnapshot {
    pub fn new(key: ListKey, items: Vec<MovieItem>) -> Self {
        Self {
            key,
            fetched_at: OffsetDateTime::now_utc(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
