//! SQL Query Builder for the model layer
//!
//! Builds parameterized SELECT/COUNT/DELETE statements for a [`Model`].
//! Column identifiers supplied by callers are checked against the model's
//! column list; the first unknown identifier is remembered and reported as a
//! [`ResolverError::Query`] when the query executes, so builder calls can be
//! chained without intermediate `?`.

use sqlx::SqlitePool;

use super::traits::{Model, OrderDirection, Page, Pagination, SqlValue, fetch_rows};
use crate::error::{ResolverError, Result};

/// A query builder for database entities.
pub struct EntityQuery<M: Model> {
    _phantom: std::marker::PhantomData<M>,
    where_clauses: Vec<String>,
    values: Vec<SqlValue>,
    order_clauses: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    invalid: Option<String>,
}

impl<M: Model> EntityQuery<M> {
    /// Create a new query builder for the entity type.
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
            where_clauses: Vec::new(),
            values: Vec::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
            invalid: None,
        }
    }

    fn checked_column(&mut self, name: &str) -> Option<&'static str> {
        match M::column(name) {
            Some(col) => Some(col.name),
            None => {
                if self.invalid.is_none() {
                    self.invalid = Some(format!(
                        "unknown column '{}' on {}",
                        name,
                        M::TABLE_NAME
                    ));
                }
                None
            }
        }
    }

    /// `column = value` (or `column IS NULL` for [`SqlValue::Null`]).
    pub fn where_eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        if let Some(col) = self.checked_column(column) {
            let value = value.into();
            if value.is_null() {
                self.where_clauses.push(format!("{} IS NULL", col));
            } else {
                self.where_clauses.push(format!("{} = ?", col));
                self.values.push(value);
            }
        }
        self
    }

    /// `column IN (values...)`. An empty list matches nothing.
    pub fn where_in(mut self, column: &str, values: Vec<SqlValue>) -> Self {
        if let Some(col) = self.checked_column(column) {
            if values.is_empty() {
                self.where_clauses.push("1 = 0".to_string());
            } else {
                let placeholders = vec!["?"; values.len()].join(", ");
                self.where_clauses
                    .push(format!("{} IN ({})", col, placeholders));
                self.values.extend(values);
            }
        }
        self
    }

    /// Substring match on any of `columns` (OR-combined).
    ///
    /// Uses SQLite `LIKE`, which folds ASCII case only; other characters
    /// must match exactly. `%`, `_` and `\` in `needle` match literally.
    pub fn where_any_like(mut self, columns: &[&str], needle: &str) -> Self {
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            if let Some(col) = self.checked_column(column) {
                parts.push(format!("{} LIKE ? ESCAPE '\\'", col));
            }
        }
        if parts.is_empty() {
            return self;
        }

        let pattern = format!("%{}%", escape_like(needle));
        for _ in 0..parts.len() {
            self.values.push(SqlValue::String(pattern.clone()));
        }
        self.where_clauses.push(format!("({})", parts.join(" OR ")));
        self
    }

    /// Add a sort key. Later calls add lower-priority keys.
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        if let Some(col) = self.checked_column(column) {
            self.order_clauses
                .push(format!("{} {}", col, direction.to_sql()));
        }
        self
    }

    /// Add the primary key as a final sort key unless it is already present.
    pub fn order_by_primary_key(mut self, direction: OrderDirection) -> Self {
        let pk = M::PRIMARY_KEY;
        let already = self
            .order_clauses
            .iter()
            .any(|c| c.split_whitespace().next() == Some(pk));
        if !already {
            self.order_clauses
                .push(format!("{} {}", pk, direction.to_sql()));
        }
        self
    }

    pub fn has_order(&self) -> bool {
        !self.order_clauses.is_empty()
    }

    /// Set limit directly.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set offset directly.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn ensure_valid(&self) -> Result<()> {
        match &self.invalid {
            Some(reason) => Err(ResolverError::Query(reason.clone())),
            None => Ok(()),
        }
    }

    fn where_sql(&self) -> String {
        if self.where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clauses.join(" AND "))
        }
    }

    /// Build the SQL query string.
    pub fn build_sql(&self) -> String {
        let mut sql = M::select_sql();
        sql.push_str(&self.where_sql());

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
            }
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) if offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset));
            }
            _ => {}
        }

        sql
    }

    /// Build a COUNT query string.
    pub fn build_count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}{}", M::TABLE_NAME, self.where_sql())
    }

    /// Build a DELETE query string for the current filters.
    pub fn build_delete_sql(&self) -> String {
        format!("DELETE FROM {}{}", M::TABLE_NAME, self.where_sql())
    }

    /// Execute the query and return all matching entities.
    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<M>> {
        self.ensure_valid()?;
        let sql = self.build_sql();
        tracing::debug!(sql = %sql, "Executing entity query");

        fetch_rows(pool, &sql, &self.values).await
    }

    /// Execute a COUNT query (ignores limit/offset).
    pub async fn count(&self, pool: &SqlitePool) -> Result<i64> {
        self.ensure_valid()?;
        let sql = self.build_count_sql();
        tracing::debug!(sql = %sql, "Executing count query");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &self.values {
            query = value.bind_to_scalar(query);
        }

        Ok(query.fetch_one(pool).await?)
    }

    /// Fetch one page plus the total row count of the unpaged query.
    pub async fn fetch_page(self, pool: &SqlitePool, limit: i64, offset: i64) -> Result<Page<M>> {
        let row_count = self.count(pool).await?;
        let models = self.limit(limit).offset(offset).fetch_all(pool).await?;

        Ok(Page {
            models,
            pagination: Pagination {
                row_count,
                offset,
                limit,
            },
        })
    }

    /// Fetch the single matching row.
    ///
    /// More than one match is always an error. With `require`, zero matches
    /// is a [`ResolverError::NotFound`] too; without it the result is `None`.
    pub async fn fetch_one(self, pool: &SqlitePool, require: bool) -> Result<Option<M>> {
        let detail = self.describe();
        let mut rows = self.limit(2).fetch_all(pool).await?;

        match rows.len() {
            0 if require => Err(ResolverError::not_found(M::ENTITY_NAME, detail)),
            0 => Ok(None),
            1 => Ok(rows.pop()),
            _ => Err(ResolverError::not_found(
                M::ENTITY_NAME,
                format!("expected exactly one row where {}", detail),
            )),
        }
    }

    /// Delete every row matching the current filters; returns rows affected.
    pub async fn delete(self, pool: &SqlitePool) -> Result<u64> {
        self.ensure_valid()?;
        let sql = self.build_delete_sql();
        tracing::debug!(sql = %sql, "Executing delete");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }

        Ok(query.execute(pool).await?.rows_affected())
    }

    /// Human readable form of the WHERE clause, for error messages.
    fn describe(&self) -> String {
        if self.where_clauses.is_empty() {
            return "no conditions".to_string();
        }
        let template = self.where_clauses.join(" AND ");
        let mut values = self.values.iter();
        let mut rendered = String::with_capacity(template.len());
        for c in template.chars() {
            if c == '?'
                && let Some(value) = values.next()
            {
                match value {
                    SqlValue::String(s) => rendered.push_str(&format!("'{}'", s)),
                    SqlValue::Int(i) => rendered.push_str(&i.to_string()),
                    SqlValue::Float(f) => rendered.push_str(&f.to_string()),
                    SqlValue::Bool(b) => rendered.push_str(&b.to_string()),
                    SqlValue::Null => rendered.push_str("NULL"),
                }
            } else {
                rendered.push(c);
            }
        }
        rendered
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl<M: Model> Default for EntityQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::ColumnDef;

    #[derive(Debug, Clone, sqlx::FromRow)]
    struct Note {
        id: i64,
        #[allow(dead_code)]
        body: String,
    }

    impl Model for Note {
        const TABLE_NAME: &'static str = "notes";
        const ENTITY_NAME: &'static str = "Note";

        fn columns() -> &'static [ColumnDef] {
            const COLUMNS: &[ColumnDef] = &[
                ColumnDef::primary_key("id"),
                ColumnDef::new("body", "TEXT").not_null(),
            ];
            COLUMNS
        }

        fn id(&self) -> i64 {
            self.id
        }
    }

    #[test]
    fn test_build_sql_with_filters_order_and_page() {
        let query = EntityQuery::<Note>::new()
            .where_eq("id", 3)
            .where_any_like(&["body"], "Hello")
            .order_by("body", OrderDirection::Desc)
            .order_by_primary_key(OrderDirection::Asc)
            .limit(10)
            .offset(20);

        assert_eq!(
            query.build_sql(),
            "SELECT id, body FROM notes WHERE id = ? AND (body LIKE ? ESCAPE '\\') \
             ORDER BY body DESC, id ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            query.values,
            vec![SqlValue::Int(3), SqlValue::String("%Hello%".into())]
        );
        assert_eq!(
            query.build_count_sql(),
            "SELECT COUNT(*) FROM notes WHERE id = ? AND (body LIKE ? ESCAPE '\\')"
        );
    }

    #[test]
    fn test_where_in_empty_matches_nothing() {
        let query = EntityQuery::<Note>::new().where_in("id", Vec::new());
        assert_eq!(query.build_sql(), "SELECT id, body FROM notes WHERE 1 = 0");
    }

    #[test]
    fn test_primary_key_tiebreak_not_duplicated() {
        let query = EntityQuery::<Note>::new()
            .order_by("id", OrderDirection::Desc)
            .order_by_primary_key(OrderDirection::Asc);
        assert_eq!(query.build_sql(), "SELECT id, body FROM notes ORDER BY id DESC");
    }

    #[test]
    fn test_unknown_column_is_reported() {
        let query = EntityQuery::<Note>::new()
            .where_eq("body; DROP TABLE notes", "x")
            .order_by("nope", OrderDirection::Asc);
        let err = query.ensure_valid().unwrap_err();
        assert!(matches!(err, ResolverError::Query(ref m) if m.contains("body; DROP TABLE notes")));
        // nothing was rendered for the rejected identifiers
        assert_eq!(query.build_sql(), "SELECT id, body FROM notes");
    }

    #[test]
    fn test_describe_inlines_values() {
        let query = EntityQuery::<Note>::new().where_eq("id", 9).where_eq("body", "a");
        assert_eq!(query.describe(), "id = 9 AND body = 'a'");
    }

    #[test]
    fn test_describe_with_question_mark_in_value() {
        let query = EntityQuery::<Note>::new()
            .where_eq("body", "why?")
            .where_eq("id", 4);
        assert_eq!(query.describe(), "body = 'why?' AND id = 4");
    }

    #[test]
    fn test_like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("École"), "École");
    }

    async fn notes(bodies: &[&str]) -> SqlitePool {
        let db = crate::db::Database::connect("sqlite::memory:").await.unwrap();
        crate::db::sync_model::<Note>(db.pool()).await.unwrap();
        for body in bodies {
            sqlx::query("INSERT INTO notes (body) VALUES (?)")
                .bind(body)
                .execute(db.pool())
                .await
                .unwrap();
        }
        db.pool().clone()
    }

    #[tokio::test]
    async fn test_keyword_matching() {
        let pool = notes(&["École d'été", "Hello world", "100% done", "snake_case"]).await;
        let count = |needle: &'static str| {
            let pool = pool.clone();
            async move {
                EntityQuery::<Note>::new()
                    .where_any_like(&["body"], needle)
                    .count(&pool)
                    .await
                    .unwrap()
            }
        };

        assert_eq!(count("École").await, 1);
        assert_eq!(count("cole d").await, 1);
        // ASCII case folds
        assert_eq!(count("HELLO").await, 1);
        // wildcards are literal
        assert_eq!(count("_").await, 1);
        assert_eq!(count("%").await, 1);
        assert_eq!(count("e_c").await, 1);
        assert_eq!(count("o%d").await, 0);
    }

    #[test]
    fn test_null_equality_uses_is_null() {
        let query = EntityQuery::<Note>::new().where_eq("body", SqlValue::Null);
        assert_eq!(query.build_sql(), "SELECT id, body FROM notes WHERE body IS NULL");
        assert!(query.values.is_empty());
    }
}
