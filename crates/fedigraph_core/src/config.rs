/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub db_path: PathBuf,
    pub page_size: usize,
    /// `@context` for rendered pages; the ActivityStreams context when absent.
    pub context: Option<Value>,
    pub normalize: NormalizeConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("fedigraph.db"),
            page_size: 20,
            context: None,
            normalize: NormalizeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub max_pages: usize,
    pub max_duration_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_attempts: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_duration_secs: 30,
            fetch_timeout_secs: 10,
            fetch_attempts: 3,
        }
    }
}

/// Budget for following remote `next` links while flattening a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeLimits {
    pub max_pages: usize,
    pub max_duration: Duration,
    pub fetch_timeout: Duration,
}

impl Default for NormalizeLimits {
    fn default() -> Self {
        NormalizeConfig::default().limits()
    }
}

impl NormalizeConfig {
    pub fn limits(&self) -> NormalizeLimits {
        NormalizeLimits {
            max_pages: self.max_pages.max(1),
            max_duration: Duration::from_secs(self.max_duration_secs.max(1)),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
        }
    }
}

impl GraphConfig {
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }
}

pub fn load_config(text: &str) -> Result<GraphConfig> {
    let cfg: GraphConfig = serde_json::from_str(text).context("decode GraphConfig")?;
    Ok(cfg)
}

/// `--config <path>`, then `FEDIGRAPH_CONFIG`, then the per-user default.
pub fn config_path() -> Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return Ok(PathBuf::from(path));
            }
            return Err(anyhow::anyhow!("--config requires a path"));
        }
    }
    if let Ok(path) = std::env::var("FEDIGRAPH_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Ok(PathBuf::from(home).join(".config").join("fedigraph").join("config.json"))
}

/// Command line arguments with `--config <path>` removed.
pub fn positional_args() -> Vec<String> {
    let mut out = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            args.next();
            continue;
        }
        out.push(arg);
    }
    out
}

/// Reads the config file, falling back to defaults when it does not exist.
pub fn load_config_file() -> Result<GraphConfig> {
    let path = config_path()?;
    match std::fs::read_to_string(&path) {
        Ok(text) => load_config(&text).with_context(|| format!("config: {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("config missing: {} (using defaults)", path.display());
            Ok(GraphConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("read config: {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = load_config(r#"{"page_size": 5, "normalize": {"max_pages": 3}}"#).unwrap();
        assert_eq!(cfg.page_size(), 5);
        assert_eq!(cfg.db_path, PathBuf::from("fedigraph.db"));
        let limits = cfg.normalize.limits();
        assert_eq!(limits.max_pages, 3);
        assert_eq!(limits.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn zero_bounds_are_clamped() {
        let cfg = load_config(r#"{"page_size": 0, "normalize": {"max_pages": 0, "max_duration_secs": 0}}"#).unwrap();
        assert_eq!(cfg.page_size(), 1);
        assert_eq!(cfg.normalize.limits().max_pages, 1);
        assert_eq!(cfg.normalize.limits().max_duration, Duration::from_secs(1));
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(load_config(r#"{"page_size": "many"}"#).is_err());
    }
}
