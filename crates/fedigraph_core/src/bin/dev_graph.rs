/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use fedigraph_core::collections::offset_from_query;
use fedigraph_core::config::{load_config_file, positional_args};
use fedigraph_core::{AudienceAuthorizer, CollectionsService, ObjectStore, Principal};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

const USAGE: &str = "usage: dev_graph [--config <path>] ingest <file.json> | query <pattern.json> | page <collection_id[?offset=N]> [offset]";

fn read_json(path: &str) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("parse {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = positional_args();
    let (cmd, arg) = match (args.first(), args.get(1)) {
        (Some(cmd), Some(arg)) => (cmd.clone(), arg.clone()),
        _ => anyhow::bail!(USAGE),
    };

    let cfg = load_config_file()?;
    info!("db: {}", cfg.db_path.display());
    let store = ObjectStore::open(&cfg.db_path)?;

    let out = match cmd.as_str() {
        "ingest" => {
            let doc = read_json(&arg)?;
            tokio::task::spawn_blocking(move || -> Result<Value> {
                let obj = store.create_object(&doc)?;
                info!("created {}", obj.id);
                Ok(store.render_object(&obj, 1)?)
            })
            .await??
        }
        "query" => {
            let pattern = read_json(&arg)?;
            tokio::task::spawn_blocking(move || -> Result<Value> {
                let found = store.query(&pattern)?;
                info!("{} matches", found.len());
                let rendered = found
                    .iter()
                    .map(|o| store.render_object(o, 1))
                    .collect::<fedigraph_core::Result<Vec<_>>>()?;
                Ok(Value::Array(rendered))
            })
            .await??
        }
        "page" => {
            let (collection_id, mut offset) = match arg.split_once('?') {
                Some((id, query)) => (id.to_string(), offset_from_query(query)),
                None => (arg.clone(), None),
            };
            if let Some(raw) = args.get(2) {
                offset = Some(raw.parse().with_context(|| format!("bad offset: {raw}"))?);
            }
            let svc = CollectionsService::from_config(&cfg, store.clone(), Arc::new(AudienceAuthorizer))?;
            tokio::task::spawn_blocking(move || -> Result<Value> {
                let collection = store
                    .query(&json!({ "id": collection_id }))?
                    .into_iter()
                    .next()
                    .with_context(|| format!("no stored object with id {collection_id}"))?;
                Ok(svc.page_and_filter_collection(&Principal::anonymous(), &collection, offset)?)
            })
            .await??
        }
        _ => anyhow::bail!(USAGE),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
