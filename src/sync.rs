use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::config::{CatalogConfig, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::error::{CatalogError, Result, ValidationError};
use crate::model::{Commodity, Tag};
use crate::remote::{CatalogApi, ItemSummary};

/// Paging limits for item syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub page_size: usize,
    /// Safety cap on pages fetched per tag.
    pub max_pages: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl From<&CatalogConfig> for SyncOptions {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }
}

/// Drives the remote client to build replacement record sets. Never touches storage.
pub struct SyncOrchestrator<'a, C> {
    api: &'a C,
    options: SyncOptions,
}

impl<'a, C: CatalogApi> SyncOrchestrator<'a, C> {
    pub fn new(api: &'a C, options: SyncOptions) -> Self {
        Self { api, options }
    }

    /// Page through one tag until a short page (or the page cap).
    fn fetch_tag_items(&self, tag_id: i64) -> Result<Vec<ItemSummary>> {
        let page_size = self.options.page_size.max(1);
        let mut items = Vec::new();

        for page in 1..=self.options.max_pages {
            let batch = self.api.list_items_by_tag(tag_id, page, page_size)?;
            let last = batch.len() < page_size;
            debug!(tag_id, page, got = batch.len(), "fetched item page");
            items.extend(batch);
            if last {
                return Ok(items);
            }
        }

        warn!(
            tag_id,
            max_pages = self.options.max_pages,
            "page cap reached; remaining items for tag not fetched"
        );
        Ok(items)
    }

    /// Build the full commodity set for `tag_ids`.
    ///
    /// Items are deduplicated by remote id across all tags, first occurrence
    /// wins, and each unique item costs exactly one detail call.
    pub fn sync_commodities(&self, tag_ids: &[i64]) -> Result<Vec<Commodity>> {
        let mut seen_tags = HashSet::new();
        let mut summaries = Vec::new();
        for &tag_id in tag_ids {
            if !seen_tags.insert(tag_id) {
                continue;
            }
            summaries.extend(self.fetch_tag_items(tag_id)?);
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for item in summaries {
            if !seen.insert(item.id) {
                continue;
            }
            let detail = self.api.get_item_detail(item.id)?;
            out.push(Commodity {
                item_id: item.id,
                detail_url: detail.detail_url,
                image: item.image_url,
                price: item.price,
                title: item.title,
            });
        }

        info!(tags = seen_tags.len(), items = out.len(), "commodities fetched");
        Ok(out)
    }

    pub fn sync_tags(&self) -> Result<Vec<Tag>> {
        let tags: Vec<Tag> = self
            .api
            .list_tags()?
            .into_iter()
            .map(|t| Tag {
                tag_id: t.id,
                name: t.name,
            })
            .collect();
        info!(tags = tags.len(), "tags fetched");
        Ok(tags)
    }

    /// Append `local_tag_id` to the item's remote tag list and write it back.
    /// An id already present is appended again.
    pub fn associate_item_with_tag(&self, item_id: i64, local_tag_id: i64) -> Result<()> {
        let mut tag_ids = self.api.get_item_tag_ids(item_id)?;
        tag_ids.push(local_tag_id);
        self.api.update_item_tags(item_id, &tag_ids)?;
        info!(item_id, tag_id = local_tag_id, "item tagged");
        Ok(())
    }

    pub fn create_remote_tag(&self, name: &str) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation(ValidationError::new(
                "tag name must not be empty",
            )));
        }
        Ok(self.api.create_tag(name)?)
    }
}
