//! SQLite-backed store
//!
//! The connection sits behind a mutex and every call runs on tokio's blocking
//! pool. Each `atomically` unit is an `IMMEDIATE` transaction: the write lock is
//! taken before the neighbor reads, so two resolutions in the same database
//! cannot interleave their read and write halves. `read` units are deferred
//! and never take the write lock.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use ordinal_api::{OrderedRecord, Scope};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::storage::backend::{OrderStore, ScopeTxn};
use crate::storage::sql_utils::{Statements, TableLayout};
use crate::storage::types::{Result, StoreError};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    sql: Arc<Statements>,
    layout: TableLayout,
}

impl SqliteStore {
    pub fn open(path: &Path, layout: TableLayout) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, layout)
    }

    pub fn open_in_memory(layout: TableLayout) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, layout)
    }

    pub fn from_connection(conn: Connection, layout: TableLayout) -> Result<Self> {
        let sql = Statements::new(&layout)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        tracing::debug!("[SqliteStore] opened store for table {}", layout.table);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            sql: Arc::new(sql),
            layout,
        })
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        lock(&self.conn)?.busy_timeout(timeout)?;
        Ok(())
    }

    /// Create the records table and its `(scope, key)` index if missing.
    ///
    /// Tables owned by another layer only need the columns named in the layout.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute(&self.sql.create_table, [])?;
        conn.execute(&self.sql.create_index, [])?;
        Ok(())
    }

    /// Insert a row without touching ordering (seeding legacy data)
    pub fn insert_raw(&self, scope: &Scope, id: &str, key: Option<&str>) -> Result<()> {
        let conn = lock(&self.conn)?;
        SqliteTxn {
            conn: &conn,
            sql: &self.sql,
            scope: scope.as_str(),
        }
        .insert(id, key)
    }

    /// One transaction on the blocking pool.
    ///
    /// A `Deferred` transaction only takes the write lock if `f` writes, and
    /// with `commit = false` it is always rolled back.
    async fn run_unit<R, E, F>(
        &self,
        scope: &Scope,
        behavior: TransactionBehavior,
        commit: bool,
        f: F,
    ) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut dyn ScopeTxn) -> std::result::Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let sql = Arc::clone(&self.sql);
        let scope = scope.as_str().to_string();

        tokio::task::spawn_blocking(move || -> std::result::Result<R, E> {
            let mut conn = lock(&conn)?;
            let tx = conn
                .transaction_with_behavior(behavior)
                .map_err(StoreError::from)?;

            let result = {
                let mut txn = SqliteTxn {
                    conn: &tx,
                    sql: &sql,
                    scope: &scope,
                };
                f(&mut txn)
            };

            match result {
                Ok(value) if commit => {
                    tx.commit().map_err(StoreError::from)?;
                    Ok(value)
                }
                // dropping `tx` rolls back
                other => other,
            }
        })
        .await
        .map_err(StoreError::from)?
    }

    pub fn delete(&self, scope: &Scope, id: &str) -> Result<bool> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
            self.layout.table, self.layout.scope_column, self.layout.id_column
        );
        Ok(conn.execute(&sql, params![scope.as_str(), id])? > 0)
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<OrderedRecord> {
    Ok(OrderedRecord {
        id: row.get(0)?,
        sort_key: row.get(1)?,
    })
}

struct SqliteTxn<'a> {
    conn: &'a Connection,
    sql: &'a Statements,
    scope: &'a str,
}

impl ScopeTxn for SqliteTxn<'_> {
    fn find_min_key(&mut self, exclude_id: Option<&str>) -> Result<Option<OrderedRecord>> {
        let mut stmt = self.conn.prepare_cached(&self.sql.min_key)?;
        Ok(stmt
            .query_row(params![self.scope, exclude_id], read_record)
            .optional()?)
    }

    fn find_max_key(&mut self, exclude_id: Option<&str>) -> Result<Option<OrderedRecord>> {
        let mut stmt = self.conn.prepare_cached(&self.sql.max_key)?;
        Ok(stmt
            .query_row(params![self.scope, exclude_id], read_record)
            .optional()?)
    }

    fn find_by_key_greater_than(
        &mut self,
        key: &str,
        exclude_id: Option<&str>,
    ) -> Result<Option<OrderedRecord>> {
        let mut stmt = self.conn.prepare_cached(&self.sql.successor)?;
        Ok(stmt
            .query_row(params![self.scope, key, exclude_id], read_record)
            .optional()?)
    }

    fn find_by_id(&mut self, id: &str) -> Result<Option<OrderedRecord>> {
        let mut stmt = self.conn.prepare_cached(&self.sql.by_id)?;
        Ok(stmt
            .query_row(params![self.scope, id], read_record)
            .optional()?)
    }

    fn find_unkeyed(&mut self) -> Result<Vec<OrderedRecord>> {
        let mut stmt = self.conn.prepare_cached(&self.sql.unkeyed)?;
        let rows = stmt
            .query_map(params![self.scope], read_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn write_key(&mut self, id: &str, key: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(&self.sql.write_key)?;
        let changed = stmt.execute(params![self.scope, id, key])?;
        Ok(changed > 0)
    }

    fn insert(&mut self, id: &str, key: Option<&str>) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(&self.sql.insert)?;
        match stmt.execute(params![self.scope, id, key]) {
            Ok(_) => Ok(()),
            Err(e) if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) => {
                Err(StoreError::DuplicateId {
                    scope: self.scope.to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl OrderStore for SqliteStore {
    async fn atomically<R, E, F>(&self, scope: &Scope, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut dyn ScopeTxn) -> std::result::Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        self.run_unit(scope, TransactionBehavior::Immediate, true, f)
            .await
    }

    async fn read<R, E, F>(&self, scope: &Scope, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut dyn ScopeTxn) -> std::result::Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        self.run_unit(scope, TransactionBehavior::Deferred, false, f)
            .await
    }

    async fn list_ordered(&self, scope: &Scope) -> Result<Vec<OrderedRecord>> {
        let conn = Arc::clone(&self.conn);
        let sql = Arc::clone(&self.sql);
        let scope = scope.as_str().to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<OrderedRecord>> {
            let conn = lock(&conn)?;
            let mut stmt = conn.prepare_cached(&sql.list)?;
            let rows = stmt
                .query_map(params![scope], read_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }
}
