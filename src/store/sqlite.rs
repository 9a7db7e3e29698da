use super::{Embed, Filter, Query, RecordStore, Row, Selection, StoreError, Table};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS citizens (
        citizen_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL CHECK (age >= 0),
        address TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS nurses (
        nurse_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        specialization TEXT
    );

    CREATE TABLE IF NOT EXISTS medical_visits (
        visit_id INTEGER PRIMARY KEY AUTOINCREMENT,
        citizen_id INTEGER NOT NULL REFERENCES citizens(citizen_id),
        nurse_id INTEGER NOT NULL REFERENCES nurses(nurse_id),
        visit_date TEXT NOT NULL,
        symptoms TEXT,
        diagnosis TEXT,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_citizens_name ON citizens(name);
    CREATE INDEX IF NOT EXISTS idx_nurses_name ON nurses(name);
    CREATE INDEX IF NOT EXISTS idx_visits_date ON medical_visits(visit_date, created_at);
    CREATE INDEX IF NOT EXISTS idx_visits_citizen ON medical_visits(citizen_id);
    CREATE INDEX IF NOT EXISTS idx_visits_nurse ON medical_visits(nurse_id);
";

/// Record store backed by a local SQLite database
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file with WAL journaling
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        let store = SqliteStore { conn };
        store.setup()?;

        info!(path = %path.display(), journal_mode = %mode, "opened clinic database");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = SqliteStore {
            conn: Connection::open_in_memory()?,
        };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<(), StoreError> {
        self.conn.pragma_update(None, "foreign_keys", true)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn query_rows(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut out = Row::new();
                for (i, name) in names.iter().enumerate() {
                    out.insert(name.clone(), from_sql(row.get_ref(i)?));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn ids_matching(
        &self,
        table: Table,
        where_sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<i64>, StoreError> {
        let sql = format!("SELECT {} FROM {}{}", table.primary_key(), table.name(), where_sql);
        let mut stmt = self.conn.prepare(&sql)?;

        let ids = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    fn rows_by_ids(&self, table: Table, ids: &[i64]) -> Result<Vec<Row>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY {}",
            table.columns().join(", "),
            table.name(),
            table.primary_key(),
            placeholders,
            table.primary_key()
        );
        let params: Vec<SqlValue> = ids.iter().map(|id| SqlValue::Integer(*id)).collect();

        self.query_rows(&sql, &params)
    }
}

impl RecordStore for SqliteStore {
    fn select(&self, query: &Query) -> Result<Selection, StoreError> {
        let table = query.table;

        let columns: Vec<&str> = match &query.columns {
            Some(columns) => columns.iter().map(String::as_str).collect(),
            None => table.columns().to_vec(),
        };

        let mut select_list = Vec::new();
        for column in &columns {
            check_column(table, column)?;
            select_list.push(format!("t.{column}"));
        }

        let mut joins = String::new();
        for (i, embed) in query.embeds.iter().enumerate() {
            let fk = table
                .reference_to(embed.table)
                .ok_or(StoreError::NoRelationship {
                    table,
                    embedded: embed.table,
                })?;
            let alias = format!("e{i}");

            for column in &embed.columns {
                check_column(embed.table, column)?;
                select_list.push(format!("{alias}.{column} AS \"{}.{column}\"", embed.table));
            }

            joins.push_str(&format!(
                " LEFT JOIN {} {alias} ON {alias}.{} = t.{fk}",
                embed.table,
                embed.table.primary_key()
            ));
        }

        if select_list.is_empty() {
            select_list.push(format!("t.{}", table.primary_key()));
        }

        let mut params = Vec::new();
        let where_sql = where_clause(table, "t.", &query.filters, &mut params)?;

        let mut sql = format!(
            "SELECT {} FROM {} t{}{}",
            select_list.join(", "),
            table,
            joins,
            where_sql
        );

        if !query.order.is_empty() {
            let mut terms = Vec::new();
            for order in &query.order {
                check_column(table, &order.column)?;
                let direction = if order.ascending { "ASC" } else { "DESC" };
                terms.push(format!("t.{} {}", order.column, direction));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some((start, end)) = query.range {
            let limit = if end >= start {
                (end - start).saturating_add(1).min(i64::MAX as usize)
            } else {
                0
            };
            sql.push_str(&format!(" LIMIT {limit} OFFSET {start}"));
        }

        debug!(%sql, "select");

        let rows = self
            .query_rows(&sql, &params)?
            .into_iter()
            .map(|row| nest_embeds(row, &query.embeds))
            .collect();

        let count = if query.count {
            Some(self.count(table, &query.filters)?)
        } else {
            None
        };

        Ok(Selection { rows, count })
    }

    fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(rows.len());

        for row in &rows {
            let mut columns = Vec::new();
            let mut params = Vec::new();

            for (column, value) in row {
                check_column(table, column)?;
                columns.push(column.as_str());
                params.push(to_sql(column, value)?);
            }

            let sql = if columns.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", table)
            } else {
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    columns.join(", "),
                    vec!["?"; columns.len()].join(", ")
                )
            };

            debug!(%sql, "insert");
            tx.execute(&sql, params_from_iter(params.iter()))?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;

        let inserted = self.rows_by_ids(table, &ids)?;
        info!(table = %table, count = inserted.len(), "inserted rows");

        Ok(inserted)
    }

    fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        if filters.is_empty() {
            return Err(StoreError::Unfiltered("update", table));
        }

        let mut where_params = Vec::new();
        let where_sql = where_clause(table, "", filters, &mut where_params)?;

        // Capture the ids first: the patch may change the filtered columns
        let ids = self.ids_matching(table, &where_sql, &where_params)?;

        if !patch.is_empty() {
            let mut sets = Vec::new();
            let mut params = Vec::new();

            for (column, value) in &patch {
                check_column(table, column)?;
                sets.push(format!("{column} = ?"));
                params.push(to_sql(column, value)?);
            }
            params.extend(where_params);

            let sql = format!("UPDATE {} SET {}{}", table, sets.join(", "), where_sql);
            debug!(%sql, "update");

            let changed = self.conn.execute(&sql, params_from_iter(params.iter()))?;
            info!(table = %table, changed, "updated rows");
        }

        self.rows_by_ids(table, &ids)
    }

    fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError> {
        if filters.is_empty() {
            return Err(StoreError::Unfiltered("delete", table));
        }

        let mut params = Vec::new();
        let where_sql = where_clause(table, "", filters, &mut params)?;

        let sql = format!("DELETE FROM {}{}", table, where_sql);
        debug!(%sql, "delete");

        let deleted = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        info!(table = %table, deleted, "deleted rows");

        Ok(())
    }

    fn count(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError> {
        let mut params = Vec::new();
        let where_sql = where_clause(table, "t.", filters, &mut params)?;

        let sql = format!("SELECT COUNT(*) FROM {} t{}", table, where_sql);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;

        Ok(count.max(0) as usize)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn check_column(table: Table, column: &str) -> Result<(), StoreError> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(StoreError::UnknownColumn {
            table,
            column: column.to_string(),
        })
    }
}

fn where_clause(
    table: Table,
    prefix: &str,
    filters: &[Filter],
    params: &mut Vec<SqlValue>,
) -> Result<String, StoreError> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut terms = Vec::with_capacity(filters.len());
    for filter in filters {
        check_column(table, filter.column())?;
        terms.push(format!("{prefix}{} {} ?", filter.column(), filter.operator()));
        params.push(to_sql(filter.column(), filter.value())?);
    }

    Ok(format!(" WHERE {}", terms.join(" AND ")))
}

fn to_sql(column: &str, value: &Value) -> Result<SqlValue, StoreError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => n
                .as_f64()
                .map(SqlValue::Real)
                .ok_or_else(|| StoreError::UnsupportedValue(column.to_string())),
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(StoreError::UnsupportedValue(column.to_string())),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
    }
}

/// Fold `"citizens.name"`-style columns into a nested object per embed.
/// A join that found no row becomes `null`.
fn nest_embeds(mut row: Row, embeds: &[Embed]) -> Row {
    for embed in embeds {
        let name = embed.table.name();
        let mut nested = Row::new();

        for column in &embed.columns {
            if let Some(value) = row.remove(&format!("{name}.{column}")) {
                nested.insert(column.clone(), value);
            }
        }

        let value = if nested.values().all(Value::is_null) {
            Value::Null
        } else {
            Value::Object(nested)
        };
        row.insert(name.to_string(), value);
    }

    row
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert(
                Table::Citizens,
                vec![
                    row(json!({"name": "Ana Reyes", "age": 30, "address": "Rizal St"})),
                    row(json!({"name": "Ben Santos", "age": 41, "address": "Mabini Ave"})),
                ],
            )
            .unwrap();
        store
            .insert(Table::Nurses, vec![row(json!({"name": "Juan Dela Cruz"}))])
            .unwrap();
        store
    }

    #[test]
    fn test_insert_returns_rows_with_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let inserted = store
            .insert(
                Table::Citizens,
                vec![row(json!({"name": "Ana Reyes", "age": 30, "address": "Rizal St"}))],
            )
            .unwrap();

        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0]["citizen_id"], json!(1));
        assert_eq!(inserted[0]["name"], json!("Ana Reyes"));
        assert_eq!(inserted[0]["age"], json!(30));
    }

    #[test]
    fn test_insert_explicit_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let inserted = store
            .insert(Table::Nurses, vec![row(json!({"nurse_id": 9, "name": "Juan"}))])
            .unwrap();

        assert_eq!(inserted[0]["nurse_id"], json!(9));
        assert_eq!(inserted[0]["specialization"], Value::Null);
    }

    #[test]
    fn test_select_filter_order_range_count() {
        let store = seeded();
        store
            .insert(
                Table::Citizens,
                vec![row(json!({"name": "Carla Diaz", "age": 30, "address": "Luna St"}))],
            )
            .unwrap();

        let query = Query::from(Table::Citizens)
            .select(&["citizen_id", "name"])
            .eq("age", 30)
            .order("name", false)
            .range(0, 0)
            .with_count();
        let selection = store.select(&query).unwrap();

        assert_eq!(selection.count, Some(2));
        assert_eq!(selection.rows.len(), 1);
        assert_eq!(selection.rows[0]["name"], json!("Carla Diaz"));
        assert!(!selection.rows[0].contains_key("address"));
    }

    #[test]
    fn test_range_is_inclusive() {
        let store = seeded();
        let query = Query::from(Table::Citizens).order("citizen_id", true).range(1, 5);
        let selection = store.select(&query).unwrap();

        assert_eq!(selection.rows.len(), 1);
        assert_eq!(selection.rows[0]["name"], json!("Ben Santos"));
        assert_eq!(selection.count, None);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let store = seeded();

        let err = store
            .select(&Query::from(Table::Citizens).select(&["name; DROP TABLE citizens"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));

        let err = store
            .insert(Table::Nurses, vec![row(json!({"name": "X", "ward": "B"}))])
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[test]
    fn test_update_returns_updated_rows() {
        let store = seeded();
        let updated = store
            .update(
                Table::Citizens,
                row(json!({"address": "New Address", "age": 31})),
                &[Filter::eq("citizen_id", 1)],
            )
            .unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["address"], json!("New Address"));
        assert_eq!(updated[0]["age"], json!(31));
        assert_eq!(updated[0]["name"], json!("Ana Reyes"));
    }

    #[test]
    fn test_update_no_match_returns_empty() {
        let store = seeded();
        let updated = store
            .update(Table::Citizens, row(json!({"age": 1})), &[Filter::eq("citizen_id", 99)])
            .unwrap();
        assert!(updated.is_empty());
    }

    #[test]
    fn test_unfiltered_writes_refused() {
        let store = seeded();

        assert!(matches!(
            store.delete(Table::Citizens, &[]),
            Err(StoreError::Unfiltered("delete", Table::Citizens))
        ));
        assert!(matches!(
            store.update(Table::Citizens, row(json!({"age": 1})), &[]),
            Err(StoreError::Unfiltered("update", Table::Citizens))
        ));
    }

    #[test]
    fn test_visit_embeds_and_foreign_keys() {
        let store = seeded();
        store
            .insert(
                Table::MedicalVisits,
                vec![row(json!({
                    "citizen_id": 1,
                    "nurse_id": 1,
                    "visit_date": "2024-03-01",
                    "diagnosis": "Flu"
                }))],
            )
            .unwrap();

        let query = Query::from(Table::MedicalVisits)
            .embed(Table::Citizens, &["name", "age"])
            .embed(Table::Nurses, &["name"]);
        let selection = store.select(&query).unwrap();
        let visit = &selection.rows[0];

        assert_eq!(visit["citizens"]["name"], json!("Ana Reyes"));
        assert_eq!(visit["citizens"]["age"], json!(30));
        assert_eq!(visit["nurses"]["name"], json!("Juan Dela Cruz"));
        assert!(visit["created_at"].as_str().unwrap().ends_with('Z'));

        // Dangling citizen reference is rejected by the store
        let err = store
            .insert(
                Table::MedicalVisits,
                vec![row(json!({"citizen_id": 42, "nurse_id": 1, "visit_date": "2024-03-02"}))],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert_eq!(store.count(Table::MedicalVisits, &[]).unwrap(), 1);
    }

    #[test]
    fn test_embed_requires_relationship() {
        let store = seeded();
        let err = store
            .select(&Query::from(Table::Citizens).embed(Table::Nurses, &["name"]))
            .unwrap_err();
        assert!(matches!(err, StoreError::NoRelationship { .. }));
    }

    #[test]
    fn test_delete_and_count() {
        let store = seeded();
        assert_eq!(store.count(Table::Citizens, &[]).unwrap(), 2);

        store.delete(Table::Citizens, &[Filter::eq("citizen_id", 2)]).unwrap();

        assert_eq!(store.count(Table::Citizens, &[]).unwrap(), 1);
        assert_eq!(
            store.count(Table::Citizens, &[Filter::gte("age", 31)]).unwrap(),
            0
        );
    }

    #[test]
    fn test_open_file_database_is_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert(Table::Nurses, vec![row(json!({"name": "Juan Dela Cruz"}))])
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count(Table::Nurses, &[]).unwrap(), 1);
    }
}
