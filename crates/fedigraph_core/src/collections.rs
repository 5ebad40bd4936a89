/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Paging of stored collections and flattening of remote ones.
//!
//! Pages are addressed by item offset (`<collection id>?offset=N`). Items are
//! scanned in order; references to objects we do not hold locally are always
//! accepted, stored objects only when the principal may see them. The `next`
//! cursor is the index of the first item past the page that a later request
//! would accept, so resuming never skips a visible item.

use crate::auth::{AuthorizationChecker, Principal};
use crate::config::{GraphConfig, NormalizeLimits};
use crate::context::{ContextProvider, StaticContext};
use crate::error::{GraphError, Result};
use crate::object_graph::{ApObject, FieldValue};
use crate::object_store::{ObjectStore, Snapshot};
use crate::page_fetch::{HttpPageFetcher, PageFetcher};
use fedigraph_protocol::CollectionKind;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Expansion depth of objects rendered into a page.
const ITEM_RENDER_DEPTH: usize = 1;

pub struct CollectionsService {
    store: ObjectStore,
    page_size: usize,
    auth: Arc<dyn AuthorizationChecker>,
    context: Arc<dyn ContextProvider>,
    fetcher: Arc<dyn PageFetcher>,
    limits: NormalizeLimits,
}

enum Admitted {
    Reference(String),
    Object(ApObject),
}

impl CollectionsService {
    pub fn new(
        store: ObjectStore,
        page_size: usize,
        auth: Arc<dyn AuthorizationChecker>,
        context: Arc<dyn ContextProvider>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            auth,
            context,
            fetcher,
            limits: NormalizeLimits::default(),
        }
    }

    /// Service wired with the HTTP page fetcher and the configured context,
    /// page size and normalization budget.
    pub fn from_config(
        cfg: &GraphConfig,
        store: ObjectStore,
        auth: Arc<dyn AuthorizationChecker>,
    ) -> anyhow::Result<Self> {
        let limits = cfg.normalize.limits();
        let fetcher = HttpPageFetcher::with_timeout(limits.fetch_timeout, cfg.normalize.fetch_attempts)?;
        let context = match &cfg.context {
            Some(ctx) => StaticContext(ctx.clone()),
            None => StaticContext::default(),
        };
        Ok(Self::new(store, cfg.page_size(), auth, Arc::new(context), Arc::new(fetcher)).with_limits(limits))
    }

    pub fn with_limits(mut self, limits: NormalizeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Without an offset: the collection's own fields (items excluded) plus
    /// its first page under `first`. With an offset: just that page.
    pub fn page_and_filter_collection(
        &self,
        principal: &Principal,
        collection: &ApObject,
        offset: Option<usize>,
    ) -> Result<Value> {
        if let Some(offset) = offset {
            return self.get_collection_page(collection, principal, offset, self.page_size);
        }
        let kind = collection_kind(collection)?;
        let summary_fields = collection
            .get_fields()
            .iter()
            .filter(|f| f.name != "items" && f.name != "orderedItems")
            .cloned()
            .collect();
        let summary = ApObject::new(collection.id, collection.created_at_ms, summary_fields);
        let out = self.store.with_snapshot(|snap| {
            let mut out = match snap.render_object(&summary, ITEM_RENDER_DEPTH + 1)? {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let first = self.page_in(snap, collection, principal, 0, self.page_size)?;
            out.insert("first".to_string(), first);
            Ok(out)
        })?;
        debug!(collection = %collection.id, kind = kind.type_name(), "rendered collection summary");
        Ok(Value::Object(out))
    }

    pub fn get_collection_page(
        &self,
        collection: &ApObject,
        principal: &Principal,
        offset: usize,
        page_size: usize,
    ) -> Result<Value> {
        self.store
            .with_snapshot(|snap| self.page_in(snap, collection, principal, offset, page_size))
    }

    fn page_in(
        &self,
        snap: &Snapshot<'_>,
        collection: &ApObject,
        principal: &Principal,
        offset: usize,
        page_size: usize,
    ) -> Result<Value> {
        let kind = collection_kind(collection)?;
        let collection_id = collection
            .literal("id")
            .ok_or_else(|| GraphError::InvalidArgument(format!("{} has no id", collection.id)))?;
        let items_key = kind.items_key();
        // A collection ingested with an empty items array has no items fields.
        let items: Vec<&FieldValue> = collection.field_values(items_key).collect();
        let page_size = page_size.max(1);

        let mut page_items = Vec::new();
        let mut idx = offset;
        while page_items.len() < page_size {
            let Some(item) = items.get(idx) else {
                break;
            };
            match self.admit(snap, principal, item)? {
                Some(Admitted::Reference(r)) => page_items.push(Value::String(r)),
                Some(Admitted::Object(obj)) => {
                    page_items.push(snap.render_object(&obj, ITEM_RENDER_DEPTH)?)
                }
                None => {}
            }
            idx += 1;
        }
        if page_items.is_empty() {
            return Err(GraphError::NotFound(format!("{collection_id}?offset={offset}")));
        }

        let mut page = Map::new();
        page.insert("@context".to_string(), self.context.context());
        page.insert("id".to_string(), Value::String(format!("{collection_id}?offset={offset}")));
        page.insert("type".to_string(), Value::String(kind.page_type().to_string()));
        page.insert(items_key.to_string(), Value::Array(page_items));
        page.insert("partOf".to_string(), Value::String(collection_id.to_string()));
        if let Some(next_idx) = self.next_accepted_index(snap, principal, &items, idx)? {
            page.insert(
                "next".to_string(),
                Value::String(format!("{collection_id}?offset={next_idx}")),
            );
        }
        if kind.is_ordered() {
            page.insert("startIndex".to_string(), Value::from(offset));
        }
        Ok(Value::Object(page))
    }

    fn next_accepted_index(
        &self,
        snap: &Snapshot<'_>,
        principal: &Principal,
        items: &[&FieldValue],
        from: usize,
    ) -> Result<Option<usize>> {
        for (idx, item) in items.iter().enumerate().skip(from) {
            if self.admit(snap, principal, item)?.is_some() {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }

    fn admit(&self, snap: &Snapshot<'_>, principal: &Principal, item: &FieldValue) -> Result<Option<Admitted>> {
        match item {
            FieldValue::Literal(r) => Ok(Some(Admitted::Reference(r.clone()))),
            FieldValue::Object(id) => {
                let Some(obj) = snap.get_object(*id)? else {
                    warn!(item = %id, "collection item points at a missing object");
                    return Ok(None);
                };
                if self.auth.is_authorized(principal, &obj) {
                    Ok(Some(Admitted::Object(obj)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Flattens a paged collection document into a single items array by
    /// following `first` and every `next` link.
    ///
    /// Documents that are not collections, or have no `first`, come back
    /// unchanged. A `first` page that cannot be dereferenced is an error; a
    /// broken `next` link only ends the walk. The walk also ends when the page
    /// or time budget runs out, or when a page id repeats.
    pub async fn normalize_collection(&self, collection: Value) -> Result<Value> {
        let mut map = match collection {
            Value::Object(map) => map,
            other => return Ok(other),
        };
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .and_then(CollectionKind::from_type_name);
        let Some(kind) = kind else {
            return Ok(Value::Object(map));
        };
        let Some(first) = map.remove("first") else {
            return Ok(Value::Object(map));
        };

        let deadline = Instant::now() + self.limits.max_duration;
        let mut seen: HashSet<String> = HashSet::new();
        let mut page = match first {
            Value::String(page_id) => {
                seen.insert(page_id.clone());
                match self.fetch_page(&page_id, deadline).await {
                    Some(page) => page,
                    None => return Err(GraphError::RemoteFetch(page_id)),
                }
            }
            embedded => embedded,
        };

        let mut items = Vec::new();
        let mut pages = 0usize;
        loop {
            pages += 1;
            if let Some(id) = page.get("id").and_then(Value::as_str) {
                seen.insert(id.to_string());
            }
            items.extend(page_items(&page));

            let next = match page.get("next") {
                None | Some(Value::Null) => break,
                Some(next) => next.clone(),
            };
            if pages >= self.limits.max_pages {
                warn!(pages, "collection page budget exhausted, returning partial items");
                break;
            }
            page = match next {
                Value::String(page_id) => {
                    if !seen.insert(page_id.clone()) {
                        warn!(page_id, "collection page chain loops back, stopping");
                        break;
                    }
                    match self.fetch_page(&page_id, deadline).await {
                        Some(page) => page,
                        None => {
                            debug!(page_id, "next page unavailable, ending chain");
                            break;
                        }
                    }
                }
                embedded @ Value::Object(_) => embedded,
                _ => break,
            };
        }

        debug!(pages, items = items.len(), kind = kind.type_name(), "normalized collection");
        map.remove("last");
        map.insert(kind.items_key().to_string(), Value::Array(items));
        Ok(Value::Object(map))
    }

    async fn fetch_page(&self, page_id: &str, deadline: Instant) -> Option<Value> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(page_id, "collection time budget exhausted");
            return None;
        }
        let timeout = remaining.min(self.limits.fetch_timeout);
        match tokio::time::timeout(timeout, self.fetcher.fetch(page_id)).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                warn!(page_id, "page fetch failed: {e:#}");
                None
            }
            Err(_) => {
                warn!(page_id, "page fetch timed out");
                None
            }
        }
    }
}

/// Kind of a stored collection; anything else is rejected.
pub fn collection_kind(collection: &ApObject) -> Result<CollectionKind> {
    collection
        .field_values("type")
        .filter_map(FieldValue::as_literal)
        .find_map(CollectionKind::from_type_name)
        .ok_or_else(|| GraphError::InvalidArgument(format!("{} is not a collection", collection.id)))
}

/// Offset cursor from a request query string (`offset=N`).
pub fn offset_from_query(query: &str) -> Option<usize> {
    query
        .split('&')
        .find(|p| p.starts_with("offset="))
        .and_then(|p| p.split_once('='))
        .and_then(|(_, v)| v.parse::<usize>().ok())
}

fn page_items(page: &Value) -> Vec<Value> {
    let items = page.get("items").or_else(|| page.get("orderedItems"));
    match items {
        Some(Value::Array(list)) => list.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}
