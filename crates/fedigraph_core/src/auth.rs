/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::object_graph::ApObject;
use fedigraph_protocol::AS_PUBLIC;

/// The requesting identity. `None` is an anonymous (unsigned) request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub actor_id: Option<String>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self { actor_id: None }
    }

    pub fn actor(actor_id: impl Into<String>) -> Self {
        Self { actor_id: Some(actor_id.into()) }
    }
}

/// Per-item visibility decision used while paging collections.
pub trait AuthorizationChecker: Send + Sync {
    fn is_authorized(&self, principal: &Principal, object: &ApObject) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationChecker for AllowAll {
    fn is_authorized(&self, _principal: &Principal, _object: &ApObject) -> bool {
        true
    }
}

static AUDIENCE_FIELDS: [&str; 5] = ["to", "cc", "bto", "bcc", "audience"];
static OWNER_FIELDS: [&str; 2] = ["attributedTo", "actor"];

/// Addressing-based visibility.
///
/// Objects without any addressing are visible to everyone, as are objects
/// addressed to the Public collection. Otherwise the principal must be one of
/// the literal recipients or the author. Embedded (non-literal) recipients are
/// not resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudienceAuthorizer;

impl AuthorizationChecker for AudienceAuthorizer {
    fn is_authorized(&self, principal: &Principal, object: &ApObject) -> bool {
        let addressed = AUDIENCE_FIELDS.iter().any(|f| object.has_field(f));
        if !addressed {
            return true;
        }
        let recipients = || {
            AUDIENCE_FIELDS
                .iter()
                .flat_map(|f| object.field_values(f))
                .filter_map(|v| v.as_literal())
        };
        if recipients().any(|r| r == AS_PUBLIC || r == "as:Public" || r == "Public") {
            return true;
        }
        let Some(actor) = principal.actor_id.as_deref() else {
            return false;
        };
        recipients().any(|r| r == actor)
            || OWNER_FIELDS
                .iter()
                .flat_map(|f| object.field_values(f))
                .filter_map(|v| v.as_literal())
                .any(|owner| owner == actor)
    }
}
