/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use fedigraph_protocol::AS_CONTEXT;
use serde_json::Value;

/// Supplies the `@context` embedded in rendered page documents.
pub trait ContextProvider: Send + Sync {
    fn context(&self) -> Value;
}

#[derive(Debug, Clone)]
pub struct StaticContext(pub Value);

impl Default for StaticContext {
    fn default() -> Self {
        Self(Value::String(AS_CONTEXT.to_string()))
    }
}

impl ContextProvider for StaticContext {
    fn context(&self) -> Value {
        self.0.clone()
    }
}
