/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! In-memory view of one stored object and its fields.
//!
//! Objects carry no schema: every property of an ingested document becomes a
//! named [`Field`], and array-valued properties become several fields sharing
//! the same name in source order. A field either holds a literal string or
//! points at another object; referenced objects are not owned and may be
//! shared (and may form cycles).

use crate::error::{GraphError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Literal(String),
    Object(ObjectId),
}

impl FieldValue {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(s) => Some(s),
            Self::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Literal(_) => None,
            Self::Object(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub value: FieldValue,
}

/// One entry of an object's back-reference index: `owner.name` points here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub field_id: FieldId,
    pub owner: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApObject {
    pub id: ObjectId,
    pub created_at_ms: i64,
    pub(crate) fields: Vec<Field>,
}

impl ApObject {
    pub fn new(id: ObjectId, created_at_ms: i64, fields: Vec<Field>) -> Self {
        Self { id, created_at_ms, fields }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// First field named `name`, by insertion order.
    pub fn get_field(&self, name: &str) -> Result<&Field> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| GraphError::NotFound(format!("{} has no field '{name}'", self.id)))
    }

    pub fn get_field_value(&self, name: &str) -> Result<&FieldValue> {
        self.get_field(name).map(|f| &f.value)
    }

    pub fn get_fields(&self) -> &[Field] {
        &self.fields
    }

    /// The `index`-th field of the same-named group.
    pub fn field_at(&self, name: &str, index: usize) -> Option<&Field> {
        self.fields.iter().filter(|f| f.name == name).nth(index)
    }

    pub fn field_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields.iter().filter(move |f| f.name == name).map(|f| &f.value)
    }

    /// First literal value of `name`, skipping object references.
    pub fn literal(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .find_map(|f| f.value.as_literal())
    }

    /// Distinct field names in first-appearance order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for f in &self.fields {
            if !names.contains(&f.name.as_str()) {
                names.push(&f.name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: i64, name: &str, value: FieldValue) -> Field {
        Field { id: FieldId(id), name: name.to_string(), value }
    }

    fn sample() -> ApObject {
        ApObject::new(
            ObjectId(1),
            1_000,
            vec![
                field(1, "type", FieldValue::Literal("Note".into())),
                field(2, "to", FieldValue::Literal("https://a.example/alice".into())),
                field(3, "attachment", FieldValue::Object(ObjectId(7))),
                field(4, "to", FieldValue::Literal("https://b.example/bob".into())),
            ],
        )
    }

    #[test]
    fn get_field_returns_first_by_insertion_order() {
        let obj = sample();
        assert!(obj.has_field("to"));
        assert_eq!(
            obj.get_field_value("to").unwrap().as_literal(),
            Some("https://a.example/alice")
        );
        assert_eq!(obj.get_fields().len(), 4);
    }

    #[test]
    fn missing_field_is_not_found() {
        let obj = sample();
        assert!(!obj.has_field("content"));
        assert!(obj.get_field("content").unwrap_err().is_not_found());
    }

    #[test]
    fn same_named_group_is_indexable() {
        let obj = sample();
        assert_eq!(obj.field_at("to", 1).unwrap().id, FieldId(4));
        assert!(obj.field_at("to", 2).is_none());
        assert_eq!(obj.field_values("to").count(), 2);
        assert_eq!(obj.get_field_value("attachment").unwrap().as_object(), Some(ObjectId(7)));
        assert_eq!(obj.field_names(), vec!["type", "to", "attachment"]);
    }

    #[test]
    fn literal_outlives_the_lookup_key() {
        let obj = sample();
        let found = {
            let key = String::from("to");
            obj.literal(&key)
        };
        assert_eq!(found, Some("https://a.example/alice"));
        assert_eq!(obj.literal("attachment"), None);
    }
}
