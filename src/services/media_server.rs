//! Media-server capability consumed by the pipeline

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::pipeline::types::CatalogItem;
use crate::pipeline::window::CatalogQuery;

/// Catalog listing and per-item refresh on one media server.
///
/// Implementations report transport problems, non-2xx answers and unreadable
/// payloads as [PipelineError::Connectivity](crate::error::PipelineError::Connectivity).
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Episode-like items matching the window filter, recursively, excluding missing items
    async fn list_items(&self, query: &CatalogQuery) -> PipelineResult<Vec<CatalogItem>>;

    /// Full metadata and image refresh, replacing whatever the server has
    async fn refresh_item(&self, item_id: &str) -> PipelineResult<()>;
}
