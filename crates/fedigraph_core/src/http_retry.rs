/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use rand::{thread_rng, Rng};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

pub(crate) const MAX_ATTEMPTS: u32 = 5;
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Sends the request built by `build`, retrying transport errors, 429 and 5xx
/// with exponential backoff. The last response (even a failing one) is
/// returned as-is; only a final transport error becomes `Err`.
pub async fn send_with_retry<F>(mut build: F, attempts: u32) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let max_attempts = attempts.clamp(1, MAX_ATTEMPTS);
    let mut backoff = Duration::from_millis(200);
    let mut attempt = 1;
    loop {
        let last = attempt >= max_attempts;
        match build().send().await {
            Ok(resp) if should_retry_status(resp.status()) && !last => {
                debug!(status = %resp.status(), attempt, "retrying request");
            }
            Ok(resp) => return Ok(resp),
            Err(e) if !last => {
                debug!(attempt, "retrying request after transport error: {e}");
            }
            Err(e) => return Err(e.into()),
        }
        sleep_with_jitter(backoff).await;
        backoff = backoff.saturating_mul(2).min(MAX_BACKOFF);
        attempt += 1;
    }
}

fn should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn sleep_with_jitter(base: Duration) {
    let jitter_ms: u64 = thread_rng().gen_range(0..=200);
    tokio::time::sleep(base + Duration::from_millis(jitter_ms)).await;
}
