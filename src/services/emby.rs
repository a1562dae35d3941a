//! Emby API client for catalog listing and metadata refresh
//!
//! Endpoints used:
//! - `GET  {host}emby/Items` with premiere-date filters
//! - `POST {host}emby/Items/{id}/Refresh`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::media_server::MediaServer;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::types::{CatalogItem, ServerTarget};
use crate::pipeline::window::{CatalogQuery, WindowMode};

/// Emby client bound to one configured server
pub struct EmbyClient {
    client: Client,
    target: ServerTarget,
}

/// Envelope returned by `/emby/Items`
#[derive(Debug, Deserialize)]
struct EmbyItemsResponse {
    #[serde(rename = "Items", default)]
    items: Option<Vec<EmbyItem>>,
}

#[derive(Debug, Deserialize)]
struct EmbyItem {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "SeriesName")]
    series_name: Option<String>,
    #[serde(rename = "Path")]
    path: Option<String>,
}

impl From<EmbyItem> for CatalogItem {
    fn from(item: EmbyItem) -> Self {
        Self {
            id: item.id,
            name: item.name.unwrap_or_default(),
            series_name: item.series_name,
            path: item.path,
        }
    }
}

impl EmbyClient {
    /// Build a client whose every request is bounded by `timeout`
    pub fn new(target: ServerTarget, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::connectivity(&target.name, e))?;
        Ok(Self { client, target })
    }

    pub fn target(&self) -> &ServerTarget {
        &self.target
    }

    fn items_url(&self) -> String {
        format!("{}emby/Items", self.target.host)
    }

    fn refresh_url(&self, item_id: &str) -> String {
        format!("{}emby/Items/{}/Refresh", self.target.host, item_id)
    }

    /// Query string for a catalog request
    fn items_params(&self, query: &CatalogQuery) -> Vec<(&'static str, String)> {
        let date_param = match query.window.mode {
            WindowMode::MinDate => "MinPremiereDate",
            WindowMode::MaxDate => "MaxPremiereDate",
        };

        let mut params = vec![
            ("IncludeItemTypes", "Episode".to_string()),
            (date_param, query.window.boundary_param()),
            ("IsMissing", "false".to_string()),
            ("Recursive", "true".to_string()),
        ];
        if query.include_path {
            params.push(("Fields", "Path".to_string()));
        }
        params.push(("api_key", self.target.api_key.clone()));
        params
    }

    fn connectivity(&self, message: impl std::fmt::Display) -> PipelineError {
        PipelineError::connectivity(&self.target.name, message)
    }
}

#[async_trait]
impl MediaServer for EmbyClient {
    async fn list_items(&self, query: &CatalogQuery) -> PipelineResult<Vec<CatalogItem>> {
        debug!(server = %self.target.name, window = %query.window, "Listing Emby items");

        let response = self
            .client
            .get(self.items_url())
            .query(&self.items_params(query))
            .send()
            .await
            .map_err(|e| self.connectivity(e))?;

        if !response.status().is_success() {
            return Err(self.connectivity(format!(
                "item listing failed with status: {}",
                response.status()
            )));
        }

        let body: EmbyItemsResponse = response
            .json()
            .await
            .map_err(|e| self.connectivity(format!("malformed item listing: {}", e)))?;

        let items: Vec<CatalogItem> = body
            .items
            .unwrap_or_default()
            .into_iter()
            .map(CatalogItem::from)
            .collect();

        debug!(server = %self.target.name, count = items.len(), "Emby returned items");
        Ok(items)
    }

    async fn refresh_item(&self, item_id: &str) -> PipelineResult<()> {
        let response = self
            .client
            .post(self.refresh_url(item_id))
            .query(&[
                ("MetadataRefreshMode", "FullRefresh"),
                ("ImageRefreshMode", "FullRefresh"),
                ("ReplaceAllMetadata", "true"),
                ("ReplaceAllImages", "true"),
                ("api_key", self.target.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.connectivity(e))?;

        if !response.status().is_success() {
            return Err(self.connectivity(format!(
                "refresh of item {} failed with status: {}",
                item_id,
                response.status()
            )));
        }

        info!(server = %self.target.name, item_id = %item_id, "Requested metadata refresh");
        Ok(())
    }
}
