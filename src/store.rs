use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// Key under which every document carries its store-assigned identifier.
pub const ID_FIELD: &str = "_id";

pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored document is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Long-lived handle on the document store. Opened once at startup and shared
/// between request handlers through the router state.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(location: &str) -> anyhow::Result<Self> {
        let conn = if location == ":memory:" {
            Connection::open_in_memory()?
        } else {
            let path = Path::new(location);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        };
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::open(":memory:")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Runs `f` against the connection. Single-statement operations need no
    /// transaction; sqlite serializes each one on its own.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Runs `f` inside one transaction. Any error rolls every step back.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StoreError::from)?;
        let out = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            UNIQUE(collection, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS counters(
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn decode(raw: &str) -> Result<Value, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn with_id(mut doc: Document, id: &str) -> Document {
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    doc
}

pub fn find_all(conn: &Connection, collection: &str) -> Result<Vec<Value>, StoreError> {
    let mut stmt = conn.prepare("SELECT body FROM documents WHERE collection = ? ORDER BY seq")?;
    let rows = stmt
        .query_map([collection], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.iter().map(|raw| decode(raw)).collect()
}

pub fn find_by_id(conn: &Connection, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;
    raw.as_deref().map(decode).transpose()
}

/// First document whose top-level `field` equals `value`, in insertion order.
pub fn find_one(
    conn: &Connection,
    collection: &str,
    field: &str,
    value: &str,
) -> Result<Option<Value>, StoreError> {
    let path = format!("$.\"{}\"", field);
    let raw: Option<String> = conn
        .query_row(
            "SELECT body FROM documents
             WHERE collection = ? AND json_extract(body, ?) = ?
             ORDER BY seq
             LIMIT 1",
            params![collection, path, value],
            |row| row.get(0),
        )
        .optional()?;
    raw.as_deref().map(decode).transpose()
}

pub fn insert_one(conn: &Connection, collection: &str, doc: Document) -> Result<Value, StoreError> {
    let id = new_id();
    let doc = Value::Object(with_id(doc, &id));
    conn.execute(
        "INSERT INTO documents(collection, id, body) VALUES(?, ?, ?)",
        params![collection, id, serde_json::to_string(&doc)?],
    )?;
    Ok(doc)
}

pub fn insert_many(
    conn: &Connection,
    collection: &str,
    docs: Vec<Document>,
) -> Result<Vec<Value>, StoreError> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        out.push(insert_one(conn, collection, doc)?);
    }
    Ok(out)
}

/// Overwrites the body of an existing document. Returns false if no document has `id`.
pub fn replace_one(
    conn: &Connection,
    collection: &str,
    id: &str,
    doc: Document,
) -> Result<bool, StoreError> {
    let doc = Value::Object(with_id(doc, id));
    let changed = conn.execute(
        "UPDATE documents SET body = ? WHERE collection = ? AND id = ?",
        params![serde_json::to_string(&doc)?, collection, id],
    )?;
    Ok(changed > 0)
}

pub fn find_and_replace(
    conn: &Connection,
    collection: &str,
    id: &str,
    doc: Document,
) -> Result<Option<Value>, StoreError> {
    if !replace_one(conn, collection, id, doc)? {
        return Ok(None);
    }
    find_by_id(conn, collection, id)
}

/// Merges `fields` into the document matching `field == value`, inserting a new
/// document when there is none. Returns the stored document.
pub fn upsert_by_field(
    conn: &Connection,
    collection: &str,
    field: &str,
    value: &str,
    fields: Document,
) -> Result<Value, StoreError> {
    match find_one(conn, collection, field, value)? {
        Some(Value::Object(mut existing)) => {
            let id = existing
                .get(ID_FIELD)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(new_id);
            for (k, v) in fields {
                if k != ID_FIELD {
                    existing.insert(k, v);
                }
            }
            existing.insert(field.to_string(), Value::String(value.to_string()));
            replace_one(conn, collection, &id, existing.clone())?;
            Ok(Value::Object(with_id(existing, &id)))
        }
        _ => {
            let mut doc = fields;
            doc.remove(ID_FIELD);
            doc.insert(field.to_string(), Value::String(value.to_string()));
            insert_one(conn, collection, doc)
        }
    }
}

/// Appends `item` to the array at `array_field` of the document matching
/// `field == value`. Returns false when no document matches.
pub fn push_to_array(
    conn: &Connection,
    collection: &str,
    field: &str,
    value: &str,
    array_field: &str,
    item: Value,
) -> Result<bool, StoreError> {
    let Some(Value::Object(mut doc)) = find_one(conn, collection, field, value)? else {
        return Ok(false);
    };
    let Some(id) = doc.get(ID_FIELD).and_then(|v| v.as_str()).map(str::to_string) else {
        return Ok(false);
    };
    match doc.get_mut(array_field) {
        Some(Value::Array(items)) => items.push(item),
        _ => {
            doc.insert(array_field.to_string(), Value::Array(vec![item]));
        }
    }
    replace_one(conn, collection, &id, doc)
}

/// Removes every element of `array_field` whose `key` equals `key_value`, in the
/// document matching `field == value`. Returns the removed elements.
pub fn pull_from_array(
    conn: &Connection,
    collection: &str,
    field: &str,
    value: &str,
    array_field: &str,
    key: &str,
    key_value: &Value,
) -> Result<Vec<Value>, StoreError> {
    let Some(Value::Object(mut doc)) = find_one(conn, collection, field, value)? else {
        return Ok(Vec::new());
    };
    let Some(id) = doc.get(ID_FIELD).and_then(|v| v.as_str()).map(str::to_string) else {
        return Ok(Vec::new());
    };
    let Some(Value::Array(items)) = doc.get_mut(array_field) else {
        return Ok(Vec::new());
    };
    let (removed, kept): (Vec<Value>, Vec<Value>) = std::mem::take(items)
        .into_iter()
        .partition(|item| item.get(key) == Some(key_value));
    *items = kept;
    if !removed.is_empty() {
        replace_one(conn, collection, &id, doc)?;
    }
    Ok(removed)
}

pub fn delete_one(conn: &Connection, collection: &str, id: &str) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        params![collection, id],
    )?;
    Ok(changed > 0)
}

pub fn delete_many(conn: &Connection, collection: &str) -> Result<usize, StoreError> {
    Ok(conn.execute("DELETE FROM documents WHERE collection = ?", [collection])?)
}

/// Returns the next value of a named counter, starting at 1.
pub fn next_counter(conn: &Connection, name: &str) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO counters(name, value) VALUES(?, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
        [name],
    )?;
    Ok(conn.query_row("SELECT value FROM counters WHERE name = ?", [name], |r| r.get(0))?)
}

/// Raises a counter so the next value handed out is greater than `at_least`.
pub fn bump_counter(conn: &Connection, name: &str, at_least: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO counters(name, value) VALUES(?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = MAX(value, ?2)",
        params![name, at_least],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Document {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn insert_and_find_keep_insertion_order() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| -> Result<(), StoreError> {
                insert_one(conn, "things", obj(json!({ "name": "b" })))?;
                insert_one(conn, "things", obj(json!({ "name": "a" })))?;
                insert_one(conn, "other", obj(json!({ "name": "c" })))?;
                let all = find_all(conn, "things")?;
                assert_eq!(all.len(), 2);
                assert_eq!(all[0]["name"], "b");
                assert!(all[0][ID_FIELD].as_str().is_some());
                let found = find_one(conn, "things", "name", "a")?.unwrap();
                assert_eq!(found["name"], "a");
                assert!(find_one(conn, "things", "name", "c")?.is_none());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn push_and_pull_array_elements() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| -> Result<(), StoreError> {
                insert_one(conn, "days", obj(json!({ "date": "2025-09-01", "tasks": [] })))?;
                assert!(push_to_array(conn, "days", "date", "2025-09-01", "tasks", json!({ "id": 1 }))?);
                assert!(push_to_array(conn, "days", "date", "2025-09-01", "tasks", json!({ "id": 2 }))?);
                assert!(!push_to_array(conn, "days", "date", "2025-09-09", "tasks", json!({ "id": 3 }))?);

                let removed = pull_from_array(conn, "days", "date", "2025-09-01", "tasks", "id", &json!(1))?;
                assert_eq!(removed, vec![json!({ "id": 1 })]);
                let again = pull_from_array(conn, "days", "date", "2025-09-01", "tasks", "id", &json!(1))?;
                assert!(again.is_empty());

                let day = find_one(conn, "days", "date", "2025-09-01")?.unwrap();
                assert_eq!(day["tasks"], json!([{ "id": 2 }]));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn upsert_merges_into_existing_document() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| -> Result<(), StoreError> {
                let first = upsert_by_field(conn, "users", "email", "a@x.io", obj(json!({ "name": "A" })))?;
                let second = upsert_by_field(conn, "users", "email", "a@x.io", obj(json!({ "photoURL": "p" })))?;
                assert_eq!(first[ID_FIELD], second[ID_FIELD]);
                assert_eq!(second["name"], "A");
                assert_eq!(second["photoURL"], "p");
                assert_eq!(find_all(conn, "users")?.len(), 1);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = Store::open_in_memory().unwrap();
        let res: Result<(), StoreError> = store.transaction(|tx| {
            insert_one(tx, "things", obj(json!({ "name": "lost" })))?;
            Err(StoreError::Poisoned)
        });
        assert!(res.is_err());
        let all = store.with_conn(|conn| find_all(conn, "things")).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn counters_are_monotonic_and_bumpable() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| -> Result<(), StoreError> {
                assert_eq!(next_counter(conn, "ids")?, 1);
                assert_eq!(next_counter(conn, "ids")?, 2);
                bump_counter(conn, "ids", 40)?;
                assert_eq!(next_counter(conn, "ids")?, 41);
                bump_counter(conn, "ids", 5)?;
                assert_eq!(next_counter(conn, "ids")?, 42);
                Ok(())
            })
            .unwrap();
    }
}
