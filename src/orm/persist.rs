//! Write path: INSERT and partial UPDATE from JSON attribute maps.
//!
//! Attribute keys are validated against the model's columns; values must be
//! JSON scalars. Anything else is a [`ResolverError::Validation`].

use serde_json::{Map, Value as JsonValue};
use sqlx::SqlitePool;

use super::builder::EntityQuery;
use super::traits::{Model, SqlValue};
use crate::error::{ResolverError, Result};

/// Arbitrary JSON-shaped attributes, keyed by column name.
pub type Attributes = Map<String, JsonValue>;

/// Validate attributes and turn them into `(column, value)` pairs.
pub fn column_values<M: Model>(
    attributes: &Attributes,
    allow_primary_key: bool,
) -> Result<Vec<(&'static str, SqlValue)>> {
    let mut pairs = Vec::with_capacity(attributes.len());
    for (key, value) in attributes {
        let column = M::column(key).ok_or_else(|| {
            ResolverError::Validation(format!(
                "unknown attribute '{}' for {}",
                key,
                M::ENTITY_NAME
            ))
        })?;
        if column.is_primary_key && !allow_primary_key {
            return Err(ResolverError::Validation(format!(
                "{} cannot be changed on {}",
                column.name,
                M::ENTITY_NAME
            )));
        }
        pairs.push((column.name, SqlValue::from_json(key, value)?));
    }
    Ok(pairs)
}

/// Look a row up by primary key.
pub async fn find_by_id<M: Model>(pool: &SqlitePool, id: i64) -> Result<M> {
    EntityQuery::<M>::new()
        .where_eq(M::PRIMARY_KEY, id)
        .fetch_one(pool, true)
        .await?
        .ok_or_else(|| ResolverError::not_found(M::ENTITY_NAME, format!("{} = {}", M::PRIMARY_KEY, id)))
}

/// Insert a row and return it as stored (defaults applied).
pub async fn insert<M: Model>(pool: &SqlitePool, attributes: &Attributes) -> Result<M> {
    let pairs = column_values::<M>(attributes, true)?;

    let sql = if pairs.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", M::TABLE_NAME)
    } else {
        let columns: Vec<&str> = pairs.iter().map(|(c, _)| *c).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            M::TABLE_NAME,
            columns.join(", "),
            vec!["?"; pairs.len()].join(", ")
        )
    };
    tracing::debug!(sql = %sql, "Executing insert");

    let mut query = sqlx::query(&sql);
    for (_, value) in &pairs {
        query = value.bind_to_query(query);
    }
    let id = query.execute(pool).await?.last_insert_rowid();

    find_by_id(pool, id).await
}

/// Apply a partial patch to the row with the given primary key.
///
/// Returns the number of rows changed; an empty patch touches nothing.
pub async fn update<M: Model>(pool: &SqlitePool, id: i64, attributes: &Attributes) -> Result<u64> {
    let pairs = column_values::<M>(attributes, false)?;
    if pairs.is_empty() {
        return Ok(0);
    }

    let assignments: Vec<String> = pairs.iter().map(|(c, _)| format!("{} = ?", c)).collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        M::TABLE_NAME,
        assignments.join(", "),
        M::PRIMARY_KEY
    );
    tracing::debug!(sql = %sql, "Executing update");

    let key = SqlValue::Int(id);
    let mut query = sqlx::query(&sql);
    for (_, value) in &pairs {
        query = value.bind_to_query(query);
    }
    query = key.bind_to_query(query);

    Ok(query.execute(pool).await?.rows_affected())
}
