//! Table layout of sortable records and the SQL generated from it

use crate::storage::types::{Result, StoreError};

/// Where the ordering columns live in an existing table.
///
/// Identifiers are interpolated into SQL, so they are restricted to
/// `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub table: String,
    pub scope_column: String,
    pub id_column: String,
    pub key_column: String,
    /// Column giving the stable order used to backfill unkeyed rows
    pub fallback_order_column: String,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table: "sortable_records".to_string(),
            scope_column: "scope".to_string(),
            id_column: "id".to_string(),
            key_column: "sort_key".to_string(),
            fallback_order_column: "rowid".to_string(),
        }
    }
}

impl TableLayout {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_scope_column(mut self, column: impl Into<String>) -> Self {
        self.scope_column = column.into();
        self
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    pub fn with_fallback_order_column(mut self, column: impl Into<String>) -> Self {
        self.fallback_order_column = column.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        for ident in [
            &self.table,
            &self.scope_column,
            &self.id_column,
            &self.key_column,
            &self.fallback_order_column,
        ] {
            validate_identifier(ident)?;
        }
        Ok(())
    }
}

pub fn validate_identifier(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidLayout(format!(
            "'{}' is not a plain SQL identifier",
            ident
        )))
    }
}

/// SQL statements for one layout, built once per store.
///
/// Positional parameters: `?1` is always the scope.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub create_table: String,
    pub create_index: String,
    pub min_key: String,
    pub max_key: String,
    pub successor: String,
    pub by_id: String,
    pub unkeyed: String,
    pub write_key: String,
    pub insert: String,
    pub list: String,
}

impl Statements {
    pub fn new(layout: &TableLayout) -> Result<Self> {
        layout.validate()?;
        let TableLayout {
            table: t,
            scope_column: s,
            id_column: id,
            key_column: k,
            fallback_order_column: fb,
        } = layout;

        Ok(Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {t} (\
                 {s} TEXT NOT NULL, \
                 {id} TEXT NOT NULL, \
                 {k} TEXT, \
                 PRIMARY KEY ({s}, {id}))"
            ),
            create_index: format!("CREATE INDEX IF NOT EXISTS {t}_{k}_idx ON {t} ({s}, {k})"),
            min_key: format!(
                "SELECT {id}, {k} FROM {t} \
                 WHERE {s} = ?1 AND {k} IS NOT NULL AND (?2 IS NULL OR {id} <> ?2) \
                 ORDER BY {k} ASC, {id} ASC LIMIT 1"
            ),
            max_key: format!(
                "SELECT {id}, {k} FROM {t} \
                 WHERE {s} = ?1 AND {k} IS NOT NULL AND (?2 IS NULL OR {id} <> ?2) \
                 ORDER BY {k} DESC, {id} DESC LIMIT 1"
            ),
            successor: format!(
                "SELECT {id}, {k} FROM {t} \
                 WHERE {s} = ?1 AND {k} > ?2 AND (?3 IS NULL OR {id} <> ?3) \
                 ORDER BY {k} ASC, {id} ASC LIMIT 1"
            ),
            by_id: format!("SELECT {id}, {k} FROM {t} WHERE {s} = ?1 AND {id} = ?2"),
            unkeyed: format!(
                "SELECT {id}, {k} FROM {t} WHERE {s} = ?1 AND {k} IS NULL ORDER BY {fb} ASC, {id} ASC"
            ),
            write_key: format!("UPDATE {t} SET {k} = ?3 WHERE {s} = ?1 AND {id} = ?2"),
            insert: format!("INSERT INTO {t} ({s}, {id}, {k}) VALUES (?1, ?2, ?3)"),
            list: format!(
                "SELECT {id}, {k} FROM {t} WHERE {s} = ?1 ORDER BY {k} IS NULL, {k} ASC, {id} ASC"
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_validated() {
        assert!(validate_identifier("sort_key").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("key; DROP TABLE x").is_err());
        assert!(validate_identifier("\"quoted\"").is_err());
    }

    #[test]
    fn test_statements_use_layout_columns() {
        let layout = TableLayout::new("tasks")
            .with_scope_column("project_id")
            .with_key_column("position")
            .with_fallback_order_column("created_at");
        let sql = Statements::new(&layout).unwrap();
        assert!(sql.successor.contains("FROM tasks"));
        assert!(sql.successor.contains("position > ?2"));
        assert!(sql.unkeyed.contains("ORDER BY created_at ASC"));
        assert!(sql.write_key.starts_with("UPDATE tasks SET position = ?3"));
    }

    #[test]
    fn test_bad_layout_is_rejected() {
        let layout = TableLayout::new("tasks").with_key_column("pos ition");
        assert!(matches!(
            Statements::new(&layout),
            Err(StoreError::InvalidLayout(_))
        ));
    }
}
