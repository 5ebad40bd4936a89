/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Structural query patterns.
//!
//! A pattern looks like an ingested document, but every value is a predicate:
//! a literal must equal one of the same-named fields, a nested mapping must be
//! matched by an object one of the same-named fields points to, and a sequence
//! is satisfied when any of its elements is. Keys of one mapping are ANDed.
//!
//! Patterns are parsed once into [`Pattern`] and compiled into a SQL `WHERE`
//! clause over the `objects`/`fields` tables. Every nesting level gets its own
//! aliases (`o{depth}`, `f{depth}`) through an explicit [`Scope`], so a nested
//! sub-pattern can never bind to the fields of its parent or of a sibling.

use crate::error::{GraphError, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    terms: Vec<(String, Term)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Literal(String),
    Nested(Pattern),
    AnyOf(Vec<Leaf>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    Literal(String),
    Nested(Pattern),
}

impl Pattern {
    pub fn parse(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| GraphError::InvalidPattern("pattern must be a JSON object".to_string()))?;
        let mut terms = Vec::with_capacity(map.len());
        for (name, v) in map {
            let term = match v {
                Value::Array(items) => {
                    let leaves = items
                        .iter()
                        .map(|item| parse_leaf(name, item))
                        .collect::<Result<Vec<_>>>()?;
                    Term::AnyOf(leaves)
                }
                other => match parse_leaf(name, other)? {
                    Leaf::Literal(s) => Term::Literal(s),
                    Leaf::Nested(p) => Term::Nested(p),
                },
            };
            terms.push((name.clone(), term));
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[(String, Term)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn parse_leaf(name: &str, value: &Value) -> Result<Leaf> {
    match value {
        Value::Object(_) => Ok(Leaf::Nested(Pattern::parse(value)?)),
        Value::Array(_) => Err(GraphError::InvalidPattern(format!(
            "'{name}': a sequence may not directly contain another sequence"
        ))),
        other => scalar_literal(other)
            .map(Leaf::Literal)
            .ok_or_else(|| GraphError::InvalidPattern(format!("'{name}': null is not a matchable value"))),
    }
}

/// Literal text of a JSON scalar. Strings are taken verbatim, numbers and
/// booleans by their JSON spelling; `null` and containers have none.
pub(crate) fn scalar_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub where_clause: String,
    pub params: Vec<rusqlite::types::Value>,
}

/// Alias scope of one nesting level.
#[derive(Debug, Clone, Copy)]
struct Scope {
    depth: usize,
}

impl Scope {
    fn root() -> Self {
        Self { depth: 0 }
    }

    fn nested(self) -> Self {
        Self { depth: self.depth + 1 }
    }

    fn object(self) -> String {
        format!("o{}", self.depth)
    }

    fn field(self) -> String {
        format!("f{}", self.depth)
    }
}

/// Root object alias the compiled clause expects to be selected as.
pub const ROOT_ALIAS: &str = "o0";

pub fn compile(pattern: &Pattern) -> CompiledQuery {
    let mut params = Vec::new();
    let where_clause = pattern_expr(pattern, Scope::root(), &mut params);
    CompiledQuery { where_clause, params }
}

fn pattern_expr(pattern: &Pattern, scope: Scope, params: &mut Vec<rusqlite::types::Value>) -> String {
    if pattern.terms.is_empty() {
        return "1".to_string();
    }
    let exprs = pattern
        .terms
        .iter()
        .map(|(name, term)| match term {
            Term::Literal(v) => field_expr(name, FieldMatch::Literal(v), scope, params),
            Term::Nested(p) => field_expr(name, FieldMatch::Nested(p), scope, params),
            Term::AnyOf(leaves) => {
                // An empty sequence stores no fields, so it constrains nothing.
                if leaves.is_empty() {
                    return "1".to_string();
                }
                let alts = leaves
                    .iter()
                    .map(|leaf| field_expr(name, leaf.as_match(), scope, params))
                    .collect::<Vec<_>>();
                format!("({})", alts.join(" OR "))
            }
        })
        .collect::<Vec<_>>();
    format!("({})", exprs.join(" AND "))
}

enum FieldMatch<'a> {
    Literal(&'a str),
    Nested(&'a Pattern),
}

impl Leaf {
    fn as_match(&self) -> FieldMatch<'_> {
        match self {
            Leaf::Literal(s) => FieldMatch::Literal(s),
            Leaf::Nested(p) => FieldMatch::Nested(p),
        }
    }
}

// Parameters are positional: push them in the order their `?` appears.
fn field_expr(
    name: &str,
    m: FieldMatch<'_>,
    scope: Scope,
    params: &mut Vec<rusqlite::types::Value>,
) -> String {
    let (o, f) = (scope.object(), scope.field());
    params.push(name.to_string().into());
    match m {
        FieldMatch::Literal(v) => {
            params.push(v.to_string().into());
            format!(
                "EXISTS (SELECT 1 FROM fields {f} WHERE {f}.object_id = {o}.id AND {f}.name = ? AND {f}.value = ?)"
            )
        }
        FieldMatch::Nested(p) => {
            let inner = scope.nested();
            let io = inner.object();
            let sub = pattern_expr(p, inner, params);
            format!(
                "EXISTS (SELECT 1 FROM fields {f} WHERE {f}.object_id = {o}.id AND {f}.name = ? \
                 AND {f}.target_object_id IN (SELECT {io}.id FROM objects {io} WHERE {sub}))"
            )
        }
    }
}
