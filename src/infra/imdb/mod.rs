//! IMDb content source adapter.
//!
//! Fetches one chart or user-list page per call and extracts its movie
//! rows. The extraction technique (selector matching over markup) is an
//! internal detail of this module; the rest of the system only sees the
//! [`ListSource`] trait.

mod extract;

use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use reqwest::header::CONNECTION;
use select::document::Document;
use tracing::debug;
use url::Url;

use crate::application::lists::{ListSource, SourceError};
use crate::config::UpstreamSettings;
use crate::domain::list_key::{ChartKind, ListKey};
use crate::domain::movies::MovieItem;

use super::error::InfraError;

const METRIC_UPSTREAM_FETCH_MS: &str = "marquee_upstream_fetch_ms";

/// HTTP adapter for the IMDb list pages.
pub struct ImdbListSource {
    client: Client,
    base_url: Url,
}

impl ImdbListSource {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| InfraError::client(err.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn list_url(&self, key: &ListKey) -> Result<Url, SourceError> {
        let path = match key {
            ListKey::Chart(ChartKind::Popular) => "chart/moviemeter/".to_string(),
            ListKey::Chart(ChartKind::Top) => "chart/top/".to_string(),
            ListKey::User(id) => format!("list/{id}/?mode=simple"),
        };
        self.base_url
            .join(&path)
            .map_err(|err| SourceError::Request(format!("invalid list url: {err}")))
    }
}

#[async_trait]
impl ListSource for ImdbListSource {
    async fn fetch_list(&self, key: &ListKey) -> Result<Vec<MovieItem>, SourceError> {
        let url = self.list_url(key)?;
        let started_at = Instant::now();

        let response = self
            .client
            .get(url)
            .header(CONNECTION, "keep-alive")
            .send()
            .await
            .map_err(|err| SourceError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| SourceError::Document(err.to_string()))?;
        histogram!(METRIC_UPSTREAM_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let document = Document::from(body.as_str());
        let items = if key.is_user_list() {
            extract::user_list(&document)
        } else {
            extract::chart(&document)
        };
        debug!(key = %key, items = items.len(), "fetched list");
        Ok(items)
    }
}
