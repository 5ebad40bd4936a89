/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Context;
use fedigraph_core::config::{load_config_file, positional_args};
use fedigraph_core::page_fetch::{HttpPageFetcher, PageFetcher};
use fedigraph_core::{AllowAll, CollectionsService, ObjectStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let url = positional_args().into_iter().next().unwrap_or_default();
    if url.trim().is_empty() {
        anyhow::bail!("usage: dev_normalize_collection [--config <path>] <collection_url>");
    }

    let cfg = load_config_file()?;
    let limits = cfg.normalize.limits();
    let fetcher = HttpPageFetcher::with_timeout(limits.fetch_timeout, cfg.normalize.fetch_attempts)?;
    let collection = fetcher
        .fetch(url.trim())
        .await?
        .with_context(|| format!("collection not available: {url}"))?;

    let store = ObjectStore::open(&cfg.db_path)?;
    let svc = CollectionsService::from_config(&cfg, store, Arc::new(AllowAll))?;
    let normalized = svc.normalize_collection(collection).await?;
    let count = ["items", "orderedItems"]
        .iter()
        .find_map(|k| normalized.get(*k).and_then(|v| v.as_array()).map(|a| a.len()))
        .unwrap_or(0);
    info!("normalized {url}: {count} items");
    println!("{}", serde_json::to_string_pretty(&normalized)?);
    Ok(())
}
