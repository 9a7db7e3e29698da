// 🗄️ Record Store - query interface over the clinic tables
//
// Mirrors the shape of a hosted table API: filtered selects with ordering,
// inclusive range pagination and exact counts, plus insert / update / delete
// that hand back the affected rows. Rows travel as JSON objects so callers
// decode them into typed models with serde.

pub mod sqlite;

pub use sqlite::SqliteStore;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A single row: column name → value
pub type Row = serde_json::Map<String, Value>;

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Citizens,
    Nurses,
    MedicalVisits,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Citizens => "citizens",
            Table::Nurses => "nurses",
            Table::MedicalVisits => "medical_visits",
        }
    }

    pub fn primary_key(&self) -> &'static str {
        match self {
            Table::Citizens => "citizen_id",
            Table::Nurses => "nurse_id",
            Table::MedicalVisits => "visit_id",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Citizens => &["citizen_id", "name", "age", "address"],
            Table::Nurses => &["nurse_id", "name", "specialization"],
            Table::MedicalVisits => &[
                "visit_id",
                "citizen_id",
                "nurse_id",
                "visit_date",
                "symptoms",
                "diagnosis",
                "notes",
                "created_at",
            ],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Column of `self` holding a foreign key into `other`, if any
    pub fn reference_to(&self, other: Table) -> Option<&'static str> {
        match (self, other) {
            (Table::MedicalVisits, Table::Citizens) => Some("citizen_id"),
            (Table::MedicalVisits, Table::Nurses) => Some("nurse_id"),
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// QUERY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(column.to_string(), value.into())
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Filter::Lte(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) => c,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Filter::Eq(_, v) | Filter::Gte(_, v) | Filter::Lte(_, v) => v,
        }
    }

    pub fn operator(&self) -> &'static str {
        match self {
            Filter::Eq(..) => "=",
            Filter::Gte(..) => ">=",
            Filter::Lte(..) => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A related table embedded into each result row under its table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub table: Table,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    /// None selects every column
    pub columns: Option<Vec<String>>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    /// Inclusive row range (start, end)
    pub range: Option<(usize, usize)>,
    pub count: bool,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Query {
            table,
            columns: None,
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            count: false,
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn embed(mut self, table: Table, columns: &[&str]) -> Self {
        self.embeds.push(Embed {
            table,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn range(mut self, start: usize, end: usize) -> Self {
        self.range = Some((start, end));
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// Rows returned by a select, plus the exact count when requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub rows: Vec<Row>,
    pub count: Option<usize>,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown column {column:?} on table {table}")]
    UnknownColumn { table: Table, column: String },

    #[error("{table} cannot embed {embedded}")]
    NoRelationship { table: Table, embedded: Table },

    #[error("unsupported value for column {0:?}")]
    UnsupportedValue(String),

    #[error("row serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("insert into {0} returned no row")]
    NothingInserted(Table),

    #[error("refusing to {0} every row of {1} without a filter")]
    Unfiltered(&'static str, Table),
}

// ============================================================================
// RECORD STORE
// ============================================================================

pub trait RecordStore {
    fn select(&self, query: &Query) -> Result<Selection, StoreError>;

    fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;

    fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), StoreError>;

    fn count(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError>;
}

/// Serialize a model into a row
pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::UnsupportedValue("<row>".to_string())),
    }
}

/// Decode a row into a model
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(row))
}
