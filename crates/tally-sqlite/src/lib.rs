//! SQLite implementation of the `RecordStore` port.
//!
//! One `records` table; timestamps are stored as RFC 3339 UTC text.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, ToSql};
use tokio::sync::Mutex;

use tally_core::{
    aggregate::Scope,
    domain::{ChatId, ExpenseRecord, NewRecord, RecordId, UserId},
    errors::Error,
    store::RecordStore,
    Result,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    chat_id     INTEGER NOT NULL,
    username    TEXT    NOT NULL,
    amount      REAL    NOT NULL,
    category    TEXT,
    description TEXT,
    date        TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_chat ON records (chat_id);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, chat_id, username, amount, category, description, date FROM records";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(map_err)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(map_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn map_err(e: rusqlite::Error) -> Error {
    Error::Storage(format!("sqlite: {e}"))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ExpenseRecord> {
    let raw_date: String = row.get(7)?;
    let date = DateTime::parse_from_rfc3339(&raw_date)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ExpenseRecord {
        id: RecordId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        chat_id: ChatId(row.get(2)?),
        username: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        date,
    })
}

/// WHERE clause + params for the user/chat part of a scope. Day filtering
/// depends on the scope's offset and is applied in Rust.
fn where_clause(scope: &Scope) -> (String, Vec<Box<dyn ToSql + Send>>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn ToSql + Send>> = Vec::new();

    if let Some(user_id) = scope.user_id {
        clauses.push("user_id = ?");
        params.push(Box::new(user_id.0));
    }
    if let Some(chat_id) = scope.chat_id {
        clauses.push("chat_id = ?");
        params.push(Box::new(chat_id.0));
    }

    if clauses.is_empty() {
        return (String::new(), params);
    }
    (format!(" WHERE {}", clauses.join(" AND ")), params)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn append(&self, rec: NewRecord) -> Result<ExpenseRecord> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO records (user_id, chat_id, username, amount, category, description, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rec.user_id.0,
                rec.chat_id.0,
                rec.username,
                rec.amount,
                rec.category,
                rec.description,
                rec.date.to_rfc3339(),
            ],
        )
        .map_err(map_err)?;

        let id = RecordId(conn.last_insert_rowid());
        Ok(ExpenseRecord::from_new(id, rec))
    }

    async fn records(&self, scope: &Scope) -> Result<Vec<ExpenseRecord>> {
        let (clause, params) = where_clause(scope);
        let sql = format!("{SELECT_COLUMNS}{clause} ORDER BY id ASC");

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql).map_err(map_err)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
        let records = stmt
            .query_map(param_refs.as_slice(), row_to_record)
            .map_err(map_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_err)?;

        Ok(records.into_iter().filter(|r| scope.matches(r)).collect())
    }

    async fn clear_chat(&self, chat_id: ChatId) -> Result<usize> {
        let conn = self.conn.lock().await;
        let removed = conn
            .execute("DELETE FROM records WHERE chat_id = ?1", params![chat_id.0])
            .map_err(map_err)?;
        tracing::debug!(chat_id = chat_id.0, removed, "deleted records");
        Ok(removed)
    }
}
