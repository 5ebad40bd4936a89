/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::http_retry::{send_with_retry, MAX_ATTEMPTS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fedigraph_protocol::ACTIVITY_ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Dereferences remote collection pages.
///
/// `Ok(None)` means the page is not available (non-success status, empty or
/// non-JSON body). Retry policy belongs to the implementation.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, page_id: &str) -> Result<Option<Value>>;
}

#[derive(Clone)]
pub struct HttpPageFetcher {
    http: reqwest::Client,
    attempts: u32,
}

impl HttpPageFetcher {
    pub fn new(http: reqwest::Client, attempts: u32) -> Self {
        Self { http, attempts }
    }

    /// `timeout` bounds the whole fetch; each attempt gets an even share of
    /// it so a hung attempt still leaves room for a retry.
    pub fn with_timeout(timeout: Duration, attempts: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(attempt_timeout(timeout, attempts))
            .build()
            .context("build http client")?;
        Ok(Self::new(http, attempts))
    }
}

fn attempt_timeout(total: Duration, attempts: u32) -> Duration {
    let share = total / attempts.clamp(1, MAX_ATTEMPTS);
    share.max(Duration::from_millis(100))
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, page_id: &str) -> Result<Option<Value>> {
        let resp = send_with_retry(
            || self.http.get(page_id).header("Accept", ACTIVITY_ACCEPT),
            self.attempts,
        )
        .await
        .with_context(|| format!("GET {page_id}"))?;
        if !resp.status().is_success() {
            debug!(status = %resp.status(), page_id, "page fetch refused");
            return Ok(None);
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                debug!(page_id, "page body is not JSON: {e}");
                Ok(None)
            }
        }
    }
}
