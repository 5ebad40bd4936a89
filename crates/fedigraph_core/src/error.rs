/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

/// Errors surfaced by the object graph, the query engine and the collection pager.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Caller handed in something the operation cannot work with
    /// (a non-object document, a non-collection object, a collection without id).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed query pattern.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Missing field, missing object, or a page with no accepted items.
    #[error("not found: {0}")]
    NotFound(String),

    /// The first page of a remote collection could not be dereferenced.
    #[error("unable to retrieve collection page '{0}'")]
    RemoteFetch(String),

    /// A persisted row violates the graph invariants.
    #[error("corrupt graph: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl GraphError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for the errors an HTTP layer should answer with 400.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::InvalidPattern(_) | Self::RemoteFetch(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
