/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod auth;
pub mod collections;
pub mod config;
pub mod context;
pub mod error;
pub mod http_retry;
pub mod object_graph;
pub mod object_store;
pub mod page_fetch;
pub mod pattern;

pub use auth::{AllowAll, AudienceAuthorizer, AuthorizationChecker, Principal};
pub use collections::CollectionsService;
pub use error::{GraphError, Result};
pub use object_graph::{ApObject, Field, FieldRef, FieldValue, ObjectId};
pub use object_store::ObjectStore;
