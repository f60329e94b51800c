//! Scripted [`CatalogApi`] used by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::error::RemoteApiError;
use crate::remote::{CatalogApi, ItemDetail, ItemSummary, RemoteResult, RemoteTag};

pub fn summary(id: i64) -> ItemSummary {
    ItemSummary {
        id,
        title: format!("item {id}"),
        price: 100 * id + 99,
        image_url: format!("https://img.example/{id}.png"),
    }
}

pub fn detail_url(id: i64) -> String {
    format!("https://shop.example/detail/{id}")
}

fn scripted_failure(endpoint: &str) -> RemoteApiError {
    RemoteApiError::Status {
        endpoint: endpoint.to_string(),
        status: 503,
        body: "scripted failure".to_string(),
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    /// Items per tag, paged by the caller's page size.
    pub items: HashMap<i64, Vec<ItemSummary>>,
    /// When set, every page of every tag is full and made of fresh ids.
    pub endless: bool,
    pub tags: Vec<RemoteTag>,
    pub item_tags: HashMap<i64, Vec<i64>>,
    /// Items the detail call reports as absent.
    pub missing: Vec<i64>,
    /// Fail the Nth remote call (1-based).
    pub fail_on_call: Option<usize>,
    pub calls: Cell<usize>,
    pub page_calls: Cell<usize>,
    pub detail_calls: RefCell<Vec<i64>>,
    pub updates: RefCell<Vec<(i64, Vec<i64>)>>,
    pub next_tag_id: Cell<i64>,
}

impl FakeCatalog {
    pub fn with_items(items: &[(i64, &[i64])]) -> Self {
        Self {
            items: items
                .iter()
                .map(|(tag, ids)| (*tag, ids.iter().copied().map(summary).collect()))
                .collect(),
            ..Self::default()
        }
    }

    fn tick(&self, endpoint: &str) -> RemoteResult<()> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        if self.fail_on_call == Some(n) {
            return Err(scripted_failure(endpoint));
        }
        Ok(())
    }
}

impl CatalogApi for FakeCatalog {
    fn acquire_token(&self) -> RemoteResult<String> {
        Ok("fake-token".to_string())
    }

    fn list_items_by_tag(&self, tag_id: i64, page: u32, page_size: usize) -> RemoteResult<Vec<ItemSummary>> {
        self.tick("list_items_by_tag")?;
        self.page_calls.set(self.page_calls.get() + 1);
        if self.endless {
            let start = (page as i64 - 1) * page_size as i64;
            return Ok((0..page_size as i64).map(|i| summary(tag_id * 1_000_000 + start + i)).collect());
        }
        let all = self.items.get(&tag_id).cloned().unwrap_or_default();
        let start = (page as usize - 1) * page_size;
        Ok(all.into_iter().skip(start).take(page_size).collect())
    }

    fn get_item_detail(&self, item_id: i64) -> RemoteResult<ItemDetail> {
        self.tick("get_item_detail")?;
        self.detail_calls.borrow_mut().push(item_id);
        if self.missing.contains(&item_id) {
            return Err(RemoteApiError::NotFound {
                endpoint: "get_item_detail".to_string(),
                what: format!("item {item_id}"),
                response: "{}".to_string(),
            });
        }
        Ok(ItemDetail {
            detail_url: detail_url(item_id),
            tag_ids: self.item_tags.get(&item_id).cloned().unwrap_or_default(),
        })
    }

    fn list_tags(&self) -> RemoteResult<Vec<RemoteTag>> {
        self.tick("list_tags")?;
        Ok(self.tags.clone())
    }

    fn create_tag(&self, _name: &str) -> RemoteResult<i64> {
        self.tick("create_tag")?;
        let id = self.next_tag_id.get() + 1;
        self.next_tag_id.set(id);
        Ok(id)
    }

    fn update_item_tags(&self, item_id: i64, tag_ids: &[i64]) -> RemoteResult<()> {
        self.tick("update_item_tags")?;
        self.updates.borrow_mut().push((item_id, tag_ids.to_vec()));
        Ok(())
    }
}
