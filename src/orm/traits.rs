//! Core traits for the model layer.
//!
//! A [`Model`] describes one SQLite table: its name, its columns and how a
//! row decodes into the Rust type. Everything the resolver helpers need to
//! build SQL is derived from that metadata, so column names coming from
//! GraphQL arguments can be checked against it before they reach a query.

use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Sqlite, SqlitePool};

use crate::error::{ResolverError, Result};

/// Column definition for schema generation and identifier validation.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// SQLite column type (TEXT, INTEGER, REAL, BLOB)
    pub sql_type: &'static str,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub is_primary_key: bool,
    /// Default value expression (e.g., "(datetime('now'))")
    pub default: Option<&'static str>,
    /// Foreign key target (e.g., "posts(id) ON DELETE CASCADE")
    pub references: Option<&'static str>,
}

impl ColumnDef {
    /// A nullable column of the given SQLite type.
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            nullable: true,
            is_primary_key: false,
            default: None,
            references: None,
        }
    }

    /// An `INTEGER PRIMARY KEY` column (a SQLite rowid alias).
    pub const fn primary_key(name: &'static str) -> Self {
        Self {
            name,
            sql_type: "INTEGER",
            nullable: false,
            is_primary_key: true,
            default: None,
            references: None,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn default_expr(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    pub const fn references(mut self, target: &'static str) -> Self {
        self.references = Some(target);
        self
    }

    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);

        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }

        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        if let Some(target) = self.references {
            sql.push_str(&format!(" REFERENCES {}", target));
        }

        sql
    }
}

/// Decode a SQLite row into an entity.
///
/// Blanket-implemented for every `sqlx::FromRow` type, so models only need
/// `#[derive(sqlx::FromRow)]`.
pub trait FromSqlRow: Sized {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

impl<T> FromSqlRow for T
where
    T: for<'r> sqlx::FromRow<'r, SqliteRow>,
{
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        <T as sqlx::FromRow<'_, SqliteRow>>::from_row(row)
    }
}

/// Metadata about a database-backed entity (table).
pub trait Model: FromSqlRow + Clone + Send + Sync + Unpin + 'static {
    /// The SQL table name (e.g., "posts")
    const TABLE_NAME: &'static str;

    /// Singular display name, used in error messages (e.g., "Post")
    const ENTITY_NAME: &'static str;

    /// The primary key column name
    const PRIMARY_KEY: &'static str = "id";

    /// All columns of the table, primary key included.
    fn columns() -> &'static [ColumnDef];

    /// Primary key value of this row.
    fn id(&self) -> i64;

    /// List of all column names in the table
    fn column_names() -> Vec<&'static str> {
        Self::columns().iter().map(|c| c.name).collect()
    }

    /// Resolve a caller-supplied identifier to a known column.
    fn column(name: &str) -> Option<&'static ColumnDef> {
        Self::columns().iter().find(|c| c.name == name)
    }

    /// Build a SELECT query for all columns
    fn select_sql() -> String {
        format!(
            "SELECT {} FROM {}",
            Self::column_names().join(", "),
            Self::TABLE_NAME
        )
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    fn create_table_sql() -> String {
        let column_defs: Vec<String> = Self::columns().iter().map(ColumnDef::to_sql).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            Self::TABLE_NAME,
            column_defs.join(",\n  ")
        )
    }
}

/// Models that reference a parent through a foreign key column.
///
/// Used by the batch loaders to group children under their parent id.
pub trait HasForeignKey {
    /// Value of a foreign key column, `None` if the column is unknown or NULL.
    fn foreign_key(&self, column: &str) -> Option<i64>;
}

/// Sort direction for ORDER BY clauses.
#[derive(async_graphql::Enum, Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
    /// Ascending order (A-Z, 1-9, oldest-newest)
    #[default]
    Asc,
    /// Descending order (Z-A, 9-1, newest-oldest)
    Desc,
}

impl OrderDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Represents a SQL value that can be bound to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;
type SqliteScalar<'q, O> = sqlx::query::QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>;

impl SqlValue {
    /// Convert a JSON scalar into a bindable value.
    ///
    /// Arrays and objects have no column representation and are rejected.
    pub fn from_json(field: &str, value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Null => Ok(SqlValue::Null),
            JsonValue::Bool(b) => Ok(SqlValue::Bool(*b)),
            JsonValue::String(s) => Ok(SqlValue::String(s.clone())),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(SqlValue::Int(i)),
                None => n.as_f64().map(SqlValue::Float).ok_or_else(|| {
                    ResolverError::Validation(format!("{field}: number out of range"))
                }),
            },
            JsonValue::Array(_) | JsonValue::Object(_) => Err(ResolverError::Validation(format!(
                "{field}: expected a scalar value"
            ))),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Bind this value to a sqlx query
    pub fn bind_to_query<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    /// Bind this value to a scalar query (e.g. COUNT)
    pub fn bind_to_scalar<'q, O>(&'q self, query: SqliteScalar<'q, O>) -> SqliteScalar<'q, O> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::String(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

/// Pagination metadata of a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Rows matching the query, ignoring limit/offset.
    pub row_count: i64,
    pub offset: i64,
    pub limit: i64,
}

/// One page of models plus its pagination metadata.
#[derive(Debug, Clone)]
pub struct Page<M> {
    pub models: Vec<M>,
    pub pagination: Pagination,
}

/// Executes a SELECT and decodes every row.
pub(crate) async fn fetch_rows<M: FromSqlRow>(
    pool: &SqlitePool,
    sql: &str,
    values: &[SqlValue],
) -> Result<Vec<M>> {
    let mut query = sqlx::query(sql);
    for value in values {
        query = value.bind_to_query(query);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter()
        .map(|row| M::from_row(row).map_err(ResolverError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_column_sql() {
        assert_eq!(ColumnDef::primary_key("id").to_sql(), "id INTEGER PRIMARY KEY");
        assert_eq!(
            ColumnDef::new("title", "TEXT").not_null().to_sql(),
            "title TEXT NOT NULL"
        );
        assert_eq!(
            ColumnDef::new("created_at", "TEXT")
                .default_expr("(datetime('now'))")
                .to_sql(),
            "created_at TEXT DEFAULT (datetime('now'))"
        );
        assert_eq!(
            ColumnDef::new("post_id", "INTEGER")
                .not_null()
                .references("posts(id)")
                .to_sql(),
            "post_id INTEGER NOT NULL REFERENCES posts(id)"
        );
    }

    #[test]
    fn test_sql_value_from_json() {
        assert_eq!(SqlValue::from_json("a", &json!(3)).unwrap(), SqlValue::Int(3));
        assert_eq!(
            SqlValue::from_json("a", &json!(1.5)).unwrap(),
            SqlValue::Float(1.5)
        );
        assert_eq!(
            SqlValue::from_json("a", &json!("x")).unwrap(),
            SqlValue::String("x".into())
        );
        assert_eq!(SqlValue::from_json("a", &json!(null)).unwrap(), SqlValue::Null);
        assert_matches!(
            SqlValue::from_json("tags", &json!(["a"])),
            Err(ResolverError::Validation(msg)) if msg.contains("tags")
        );
    }

    #[test]
    fn test_order_direction_sql() {
        assert_eq!(OrderDirection::Asc.to_sql(), "ASC");
        assert_eq!(OrderDirection::Desc.to_sql(), "DESC");
    }
}
