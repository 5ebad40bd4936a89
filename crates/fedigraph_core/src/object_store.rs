/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::error::{GraphError, Result};
use crate::object_graph::{ApObject, Field, FieldId, FieldRef, FieldValue, ObjectId};
use crate::pattern::{compile, scalar_literal, Pattern, ROOT_ALIAS};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct ObjectStore {
    path: PathBuf,
}

impl ObjectStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let store = Self { path };
        let conn = store.connect()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS objects (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_objects_created ON objects(created_at_ms DESC, id DESC);

            -- A field holds either a literal or a reference, never both.
            CREATE TABLE IF NOT EXISTS fields (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              object_id INTEGER NOT NULL REFERENCES objects(id) ON DELETE CASCADE,
              name TEXT NOT NULL,
              value TEXT NULL,
              target_object_id INTEGER NULL REFERENCES objects(id),
              CHECK ((value IS NULL) <> (target_object_id IS NULL))
            );
            CREATE INDEX IF NOT EXISTS idx_fields_owner ON fields(object_id, name);
            CREATE INDEX IF NOT EXISTS idx_fields_name_value ON fields(name, value);
            CREATE INDEX IF NOT EXISTS idx_fields_target ON fields(target_object_id);
            "#,
        )?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    pub fn health_check(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Materializes `document` (a JSON object) as a tree of objects.
    ///
    /// Nested mappings become their own objects linked by a reference field;
    /// arrays become one field per element under the same name, in order.
    /// Nothing is deduplicated: ingesting the same `id` twice yields two
    /// objects. The whole tree is committed in one transaction.
    pub fn create_object(&self, document: &Value) -> Result<ApObject> {
        let map = document
            .as_object()
            .ok_or_else(|| GraphError::InvalidArgument("document must be a JSON object".to_string()))?;
        let mut conn = self.connect()?;
        // Immediate: take the write lock before reading the clock.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut clock = Clock::start(&tx)?;
        let id = insert_document(&tx, &mut clock, map)?;
        tx.commit()?;
        debug!(object = %id, "created object tree");
        load_object(&conn, id)?.ok_or_else(|| GraphError::NotFound(format!("{id} vanished after commit")))
    }

    /// Objects matching `pattern`, newest first.
    pub fn query(&self, pattern: &Value) -> Result<Vec<ApObject>> {
        let pattern = Pattern::parse(pattern)?;
        self.query_pattern(&pattern)
    }

    pub fn query_pattern(&self, pattern: &Pattern) -> Result<Vec<ApObject>> {
        let compiled = compile(pattern);
        let sql = format!(
            "SELECT {a}.id FROM objects {a} WHERE {w} ORDER BY {a}.created_at_ms DESC, {a}.id DESC",
            a = ROOT_ALIAS,
            w = compiled.where_clause
        );
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let ids = {
            let mut stmt = tx.prepare(&sql)?;
            // Bound so the row iterator drops before `stmt`.
            let rows = stmt
                .query_map(rusqlite::params_from_iter(compiled.params), |r| r.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(obj) = load_object(&tx, ObjectId(id))? {
                out.push(obj);
            }
        }
        tx.commit()?;
        debug!(matches = out.len(), "pattern query");
        Ok(out)
    }

    pub fn get_object(&self, id: ObjectId) -> Result<Option<ApObject>> {
        self.with_snapshot(|snap| snap.get_object(id))
    }

    /// Runs `f` against one connection inside a read transaction, so every
    /// lookup it makes sees the same state of the store.
    pub fn with_snapshot<T>(&self, f: impl FnOnce(&Snapshot<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let out = f(&Snapshot { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }

    /// Back-reference index: every field (on any owner) pointing at `id`.
    pub fn referencing_fields(&self, id: ObjectId) -> Result<Vec<FieldRef>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, object_id, name FROM fields WHERE target_object_id=?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![id.0], |r| {
                Ok(FieldRef {
                    field_id: FieldId(r.get(0)?),
                    owner: ObjectId(r.get(1)?),
                    name: r.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Renders `obj` as a JSON document, expanding referenced objects at most
    /// `depth` levels deep. References past the limit, or back onto an object
    /// already being rendered, collapse to the target's `id` (or `{}`).
    pub fn render_object(&self, obj: &ApObject, depth: usize) -> Result<Value> {
        self.with_snapshot(|snap| snap.render_object(obj, depth))
    }
}

/// Read view over one open connection. See [`ObjectStore::with_snapshot`].
pub struct Snapshot<'c> {
    conn: &'c Connection,
}

impl Snapshot<'_> {
    pub fn get_object(&self, id: ObjectId) -> Result<Option<ApObject>> {
        load_object(self.conn, id)
    }

    pub fn render_object(&self, obj: &ApObject, depth: usize) -> Result<Value> {
        let mut path = Vec::new();
        render(self.conn, obj, depth, &mut path)
    }
}

/// Strictly increasing creation timestamps, so recency order is total.
struct Clock {
    last: i64,
}

impl Clock {
    fn start(conn: &Connection) -> Result<Self> {
        let last: i64 = conn.query_row(
            "SELECT COALESCE(MAX(created_at_ms), 0) FROM objects",
            [],
            |r| r.get(0),
        )?;
        Ok(Self { last })
    }

    fn tick(&mut self) -> i64 {
        self.last = now_ms().max(self.last.saturating_add(1));
        self.last
    }
}

fn insert_document(conn: &Connection, clock: &mut Clock, map: &Map<String, Value>) -> Result<ObjectId> {
    conn.execute(
        "INSERT INTO objects(created_at_ms) VALUES (?1)",
        params![clock.tick()],
    )?;
    let id = ObjectId(conn.last_insert_rowid());
    for (name, value) in map {
        insert_field(conn, clock, id, name, value)?;
    }
    Ok(id)
}

fn insert_field(conn: &Connection, clock: &mut Clock, owner: ObjectId, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(child) => {
            let target = insert_document(conn, clock, child)?;
            conn.execute(
                "INSERT INTO fields(object_id, name, value, target_object_id) VALUES (?1, ?2, NULL, ?3)",
                params![owner.0, name, target.0],
            )?;
        }
        Value::Array(items) => {
            for item in items {
                insert_field(conn, clock, owner, name, item)?;
            }
        }
        scalar => {
            // null carries nothing to store
            if let Some(lit) = scalar_literal(scalar) {
                conn.execute(
                    "INSERT INTO fields(object_id, name, value, target_object_id) VALUES (?1, ?2, ?3, NULL)",
                    params![owner.0, name, lit],
                )?;
            }
        }
    }
    Ok(())
}

fn load_object(conn: &Connection, id: ObjectId) -> Result<Option<ApObject>> {
    let created_at_ms: Option<i64> = conn
        .query_row(
            "SELECT created_at_ms FROM objects WHERE id=?1",
            params![id.0],
            |r| r.get(0),
        )
        .optional()?;
    let Some(created_at_ms) = created_at_ms else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, name, value, target_object_id FROM fields WHERE object_id=?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![id.0], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Option<i64>>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut fields = Vec::with_capacity(rows.len());
    for (field_id, name, value, target) in rows {
        let value = match (value, target) {
            (Some(v), None) => FieldValue::Literal(v),
            (None, Some(t)) => FieldValue::Object(ObjectId(t)),
            _ => {
                return Err(GraphError::Corrupt(format!(
                    "field {field_id} of {id} must hold exactly one of value/target"
                )))
            }
        };
        fields.push(Field { id: FieldId(field_id), name, value });
    }
    Ok(Some(ApObject::new(id, created_at_ms, fields)))
}

fn render(conn: &Connection, obj: &ApObject, depth: usize, path: &mut Vec<ObjectId>) -> Result<Value> {
    path.push(obj.id);
    let mut out = Map::new();
    for name in obj.field_names() {
        let mut values = Vec::new();
        for v in obj.field_values(name) {
            values.push(render_value(conn, v, depth, path)?);
        }
        let rendered = match values.len() {
            1 => values.remove(0),
            _ => Value::Array(values),
        };
        out.insert(name.to_string(), rendered);
    }
    path.pop();
    Ok(Value::Object(out))
}

fn render_value(conn: &Connection, value: &FieldValue, depth: usize, path: &mut Vec<ObjectId>) -> Result<Value> {
    match value {
        FieldValue::Literal(s) => Ok(Value::String(s.clone())),
        FieldValue::Object(target) => {
            let Some(child) = load_object(conn, *target)? else {
                return Ok(Value::Null);
            };
            if depth == 0 || path.contains(target) {
                return Ok(stub(&child));
            }
            render(conn, &child, depth - 1, path)
        }
    }
}

fn stub(obj: &ApObject) -> Value {
    obj.literal("id")
        .map(|s| Value::String(s.to_string()))
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::open(dir.path().join("graph.db")).unwrap();
        (dir, store)
    }

    fn ids(objs: &[ApObject]) -> Vec<ObjectId> {
        objs.iter().map(|o| o.id).collect()
    }

    #[test]
    fn flat_document_maps_one_field_per_key() {
        let (_dir, store) = temp_store();
        let obj = store
            .create_object(&json!({"id": "https://a.example/notes/1", "type": "Note", "content": "hi"}))
            .unwrap();
        assert_eq!(obj.get_fields().len(), 3);
        assert_eq!(obj.literal("type"), Some("Note"));
        assert_eq!(obj.literal("content"), Some("hi"));
        assert_eq!(store.get_object(obj.id).unwrap(), Some(obj));
    }

    #[test]
    fn arrays_keep_order_and_nested_documents_become_objects() {
        let (_dir, store) = temp_store();
        let actor = store
            .create_object(&json!({
                "id": "https://a.example/alice",
                "to": ["https://x.example/1", "https://x.example/2", "https://x.example/3"],
                "inbox": {"id": "https://a.example/alice/inbox", "type": "OrderedCollection"}
            }))
            .unwrap();
        let to: Vec<_> = actor.field_values("to").filter_map(FieldValue::as_literal).collect();
        assert_eq!(to, vec!["https://x.example/1", "https://x.example/2", "https://x.example/3"]);

        let inbox_id = actor.get_field_value("inbox").unwrap().as_object().unwrap();
        let inbox = store.get_object(inbox_id).unwrap().unwrap();
        assert_eq!(inbox.literal("type"), Some("OrderedCollection"));
        assert!(inbox.created_at_ms > actor.created_at_ms);

        let refs = store.referencing_fields(inbox_id).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].owner, actor.id);
        assert_eq!(refs[0].name, "inbox");
    }

    #[test]
    fn scalars_are_stored_as_literals_and_null_is_skipped() {
        let (_dir, store) = temp_store();
        let obj = store
            .create_object(&json!({"totalItems": 3, "sensitive": false, "summary": null}))
            .unwrap();
        assert_eq!(obj.literal("totalItems"), Some("3"));
        assert_eq!(obj.literal("sensitive"), Some("false"));
        assert!(!obj.has_field("summary"));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let (_dir, store) = temp_store();
        let err = store.create_object(&json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }

    #[test]
    fn same_id_twice_creates_two_objects() {
        let (_dir, store) = temp_store();
        let doc = json!({"id": "https://a.example/notes/1", "type": "Note"});
        let a = store.create_object(&doc).unwrap();
        let b = store.create_object(&doc).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.query(&json!({"id": "https://a.example/notes/1"})).unwrap().len(), 2);
    }

    #[test]
    fn query_finds_what_was_created() {
        let (_dir, store) = temp_store();
        let doc = json!({
            "type": "Create",
            "to": ["https://a.example/alice", "https://b.example/bob"],
            "object": {"type": "Note", "tag": [{"name": "#rust"}, {"name": "#fedi"}]}
        });
        let created = store.create_object(&doc).unwrap();
        let found = store.query(&doc).unwrap();
        assert!(ids(&found).contains(&created.id));
    }

    #[test]
    fn query_finds_documents_with_empty_arrays() {
        let (_dir, store) = temp_store();
        let doc = json!({"id": "https://a.example/alice/outbox", "type": "OrderedCollection", "orderedItems": []});
        let created = store.create_object(&doc).unwrap();
        assert!(!created.has_field("orderedItems"));
        assert_eq!(ids(&store.query(&doc).unwrap()), vec![created.id]);
    }

    #[test]
    fn failed_create_leaves_nothing_behind() {
        let (dir, store) = temp_store();
        let conn = Connection::open(dir.path().join("graph.db")).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER fail_boom BEFORE INSERT ON fields WHEN NEW.name = 'boom'
             BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();

        let err = store
            .create_object(&json!({
                "type": "Create",
                "object": {"type": "Note", "attachment": {"boom": "x"}}
            }))
            .unwrap_err();
        assert!(matches!(err, GraphError::Storage(_)));

        let count = |table: &str| -> i64 {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0)).unwrap()
        };
        assert_eq!(count("objects"), 0);
        assert_eq!(count("fields"), 0);
        assert!(store.query(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn snapshot_does_not_see_later_writes() {
        let (_dir, store) = temp_store();
        let first = store.create_object(&json!({"type": "Note"})).unwrap();
        let later = store
            .with_snapshot(|snap| {
                assert!(snap.get_object(first.id)?.is_some());
                let later = store.create_object(&json!({"type": "Article"}))?;
                assert!(snap.get_object(later.id)?.is_none());
                Ok(later)
            })
            .unwrap();
        assert!(store.get_object(later.id).unwrap().is_some());
    }

    #[test]
    fn results_are_newest_first() {
        let (_dir, store) = temp_store();
        let a = store.create_object(&json!({"type": "Note"})).unwrap();
        let b = store.create_object(&json!({"type": "Note"})).unwrap();
        let c = store.create_object(&json!({"type": "Note"})).unwrap();
        assert_eq!(ids(&store.query(&json!({"type": "Note"})).unwrap()), vec![c.id, b.id, a.id]);
    }

    #[test]
    fn sequence_pattern_is_union_and_mapping_is_intersection() {
        let (_dir, store) = temp_store();
        let a = store.create_object(&json!({"type": "Note", "name": "a"})).unwrap();
        let b = store.create_object(&json!({"type": "Note", "name": "b"})).unwrap();
        let c = store.create_object(&json!({"type": "Article", "name": "a"})).unwrap();

        let union = ids(&store.query(&json!({"name": ["a", "b"]})).unwrap());
        assert_eq!(union, vec![c.id, b.id, a.id]);

        let both = ids(&store.query(&json!({"type": "Note", "name": "a"})).unwrap());
        assert_eq!(both, vec![a.id]);

        assert!(store.query(&json!({"type": "Question"})).unwrap().is_empty());
    }

    #[test]
    fn multi_valued_fields_match_existentially() {
        let (_dir, store) = temp_store();
        let obj = store
            .create_object(&json!({"to": ["https://a.example/alice", "https://b.example/bob"]}))
            .unwrap();
        assert_eq!(ids(&store.query(&json!({"to": "https://b.example/bob"})).unwrap()), vec![obj.id]);
    }

    #[test]
    fn nested_pattern_does_not_bind_to_parent_fields() {
        let (_dir, store) = temp_store();
        let create = store
            .create_object(&json!({"type": "Create", "object": {"type": "Note", "content": "hi"}}))
            .unwrap();

        let hit = store.query(&json!({"type": "Create", "object": {"type": "Note"}})).unwrap();
        assert_eq!(ids(&hit), vec![create.id]);

        assert!(store.query(&json!({"object": {"type": "Create"}})).unwrap().is_empty());
        assert!(store.query(&json!({"object": {"type": "Note", "content": "bye"}})).unwrap().is_empty());
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let (_dir, store) = temp_store();
        let err = store.query(&json!({"to": [["nested"]]})).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPattern(_)));
    }

    #[test]
    fn render_limits_depth() {
        let (_dir, store) = temp_store();
        let obj = store
            .create_object(&json!({
                "type": "Create",
                "actor": {"id": "https://a.example/alice", "inbox": {"id": "https://a.example/alice/inbox"}},
                "to": ["https://x.example/1", "https://x.example/2"],
                "cc": ["https://x.example/3"]
            }))
            .unwrap();
        let shallow = store.render_object(&obj, 0).unwrap();
        assert_eq!(shallow["actor"], json!("https://a.example/alice"));
        assert_eq!(shallow["to"], json!(["https://x.example/1", "https://x.example/2"]));
        assert_eq!(shallow["cc"], json!("https://x.example/3"));

        let one = store.render_object(&obj, 1).unwrap();
        assert_eq!(
            one["actor"],
            json!({"id": "https://a.example/alice", "inbox": "https://a.example/alice/inbox"})
        );
    }

    #[test]
    fn render_breaks_reference_cycles() {
        let (_dir, store) = temp_store();
        let actor = store
            .create_object(&json!({"id": "https://a.example/alice", "inbox": {"type": "OrderedCollection"}}))
            .unwrap();
        let inbox_id = actor.get_field_value("inbox").unwrap().as_object().unwrap();
        store
            .connect()
            .unwrap()
            .execute(
                "INSERT INTO fields(object_id, name, value, target_object_id) VALUES (?1, 'owner', NULL, ?2)",
                params![inbox_id.0, actor.id.0],
            )
            .unwrap();

        let rendered = store.render_object(&actor, 10).unwrap();
        assert_eq!(
            rendered["inbox"],
            json!({"type": "OrderedCollection", "owner": "https://a.example/alice"})
        );
    }
}
