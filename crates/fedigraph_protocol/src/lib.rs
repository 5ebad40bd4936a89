/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use serde::{Deserialize, Serialize};

pub const AS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
pub const AS_PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Accept header sent when dereferencing remote collection pages.
pub const ACTIVITY_ACCEPT: &str =
    "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";

/// The two ActivityStreams collection flavours. The items key and the page
/// type are derived from the kind and never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    Collection,
    OrderedCollection,
}

impl CollectionKind {
    pub fn from_type_name(ty: &str) -> Option<Self> {
        match ty {
            "Collection" => Some(Self::Collection),
            "OrderedCollection" => Some(Self::OrderedCollection),
            _ => None,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Collection => "Collection",
            Self::OrderedCollection => "OrderedCollection",
        }
    }

    pub fn items_key(self) -> &'static str {
        match self {
            Self::Collection => "items",
            Self::OrderedCollection => "orderedItems",
        }
    }

    pub fn page_type(self) -> &'static str {
        match self {
            Self::Collection => "CollectionPage",
            Self::OrderedCollection => "OrderedCollectionPage",
        }
    }

    pub fn is_ordered(self) -> bool {
        matches!(self, Self::OrderedCollection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_derives_keys_from_type() {
        let ordered = CollectionKind::from_type_name("OrderedCollection").unwrap();
        assert_eq!(ordered.items_key(), "orderedItems");
        assert_eq!(ordered.page_type(), "OrderedCollectionPage");
        assert!(ordered.is_ordered());

        let plain = CollectionKind::from_type_name("Collection").unwrap();
        assert_eq!(plain.items_key(), "items");
        assert_eq!(plain.page_type(), "CollectionPage");
        assert!(!plain.is_ordered());
    }

    #[test]
    fn non_collection_types_are_rejected() {
        assert_eq!(CollectionKind::from_type_name("Note"), None);
        assert_eq!(CollectionKind::from_type_name("CollectionPage"), None);
    }
}
