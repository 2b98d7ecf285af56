//! List query orchestration and the content-source seam.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::filter::{FilterError, FilterSpec, ListQuery};
use crate::cache::{LoadError, SnapshotCache};
use crate::domain::list_key::{ListKey, ListKeyError};
use crate::domain::movies::{ListSnapshot, MovieItem};

/// List served when a request does not select one explicitly.
pub const DEFAULT_LIST: &str = "popular";

/// Upstream fetch failure, as surfaced by a [`ListSource`].
///
/// Variants carry rendered messages instead of source chains so that
/// load outcomes stay cheap to clone when fanned out to cache waiters.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("upstream document unusable: {0}")]
    Document(String),
}

/// Fetches the ordered items of one list from the content source.
///
/// Implementations issue at most one outbound request per call and fail
/// hard on any non-success response; they never retry.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch_list(&self, key: &ListKey) -> Result<Vec<MovieItem>, SourceError>;
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error(transparent)]
    Key(#[from] ListKeyError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Orchestrates one list request: key resolution, cached snapshot
/// lookup, filter evaluation. Holds no state beyond its collaborators.
#[derive(Clone)]
pub struct ListService {
    cache: SnapshotCache,
    source: Arc<dyn ListSource>,
}

impl ListService {
    pub fn new(cache: SnapshotCache, source: Arc<dyn ListSource>) -> Self {
        Self { cache, source }
    }

    pub async fn query(
        &self,
        query: &ListQuery,
        now: OffsetDateTime,
    ) -> Result<Vec<MovieItem>, ListError> {
        let key: ListKey = query.list.as_deref().unwrap_or(DEFAULT_LIST).parse()?;
        let spec = FilterSpec::from_query(query, now.year())?;

        let source = Arc::clone(&self.source);
        let snapshot = self
            .cache
            .get(key, move |key| async move {
                let items = source.fetch_list(&key).await?;
                Ok(ListSnapshot::new(key, items))
            })
            .await?;

        Ok(spec.evaluate(&snapshot))
    }
}
