use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    extract::{Query, State},
    http::{StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::application::filter::ListQuery;
use crate::application::lists::ListService;
use crate::domain::movies::MovieItem;

use super::{ApiError, log_responses};

/// Matches the upstream refresh economics: clients may serve a stale
/// list for up to an hour while revalidating.
const LIST_CACHE_CONTROL: &str = "public, stale-while-revalidate=3600, max-age=3600";

#[derive(Clone)]
pub struct AppState {
    pub lists: Arc<ListService>,
}

/// Wire representation of one movie row.
///
/// Unknown year and rank are omitted entirely; rating and votes collapse
/// unknown to zero, exactly as the source data does.
#[derive(Debug, Serialize)]
pub struct MovieItemDto {
    pub imdb_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub rating: f32,
    pub votes: u64,
}

impl From<&MovieItem> for MovieItemDto {
    fn from(item: &MovieItem) -> Self {
        Self {
            imdb_id: item.imdb_id.clone(),
            title: item.title.clone(),
            year: item.year,
            rank: item.rank,
            rating: item.rating,
            votes: item.votes,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/list", get(list_movies))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn list_movies(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.lists.query(&query, OffsetDateTime::now_utc()).await {
        Ok(items) => {
            let body: Vec<MovieItemDto> = items.iter().map(MovieItemDto::from).collect();
            ([(CACHE_CONTROL, LIST_CACHE_CONTROL)], Json(body)).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}
