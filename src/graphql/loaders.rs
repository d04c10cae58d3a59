//! GraphQL DataLoaders for batching relation queries
//!
//! DataLoaders solve the N+1 problem by collecting multiple requests
//! for related entities and executing them in a single batch query.
//!
//! The pattern works as follows:
//! 1. When GraphQL resolves `posts { comments { ... } }`, each Post's
//!    comments resolver calls `loader.load_one(post_id)`
//! 2. DataLoader batches these calls within the same request tick
//! 3. A single SQL query fetches all comments for all posts:
//!    `SELECT ... FROM comments WHERE post_id IN (...)`
//! 4. Results are grouped by post_id and returned to each resolver
//!
//! # Adding a New Relation
//!
//! 1. Implement `HasForeignKey` for the child model
//! 2. Register a `DataLoader<HasManyLoader<Child>>` (or `BelongsToLoader`)
//!    in the schema data
//! 3. Call `load_one` from the parent's `ComplexObject` resolver

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::Loader;

use crate::db::Database;
use crate::error::ResolverError;
use crate::orm::{EntityQuery, HasForeignKey, Model, OrderDirection, SqlValue};

/// Loads the children of many parents at once (one-to-many).
///
/// Keys are parent ids; every requested key is present in the result, with
/// an empty list when the parent has no children.
///
/// ```ignore
/// let comments = DataLoader::new(
///     HasManyLoader::<Comment>::new(db.clone(), "post_id"),
///     tokio::spawn,
/// );
/// ```
pub struct HasManyLoader<M: Model + HasForeignKey> {
    db: Database,
    fk_column: &'static str,
    _phantom: std::marker::PhantomData<M>,
}

impl<M: Model + HasForeignKey> HasManyLoader<M> {
    pub fn new(db: Database, fk_column: &'static str) -> Self {
        Self {
            db,
            fk_column,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<M: Model + HasForeignKey> Loader<i64> for HasManyLoader<M> {
    type Value = Vec<M>;
    type Error = Arc<ResolverError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::debug!(
            entity = M::TABLE_NAME,
            fk_column = self.fk_column,
            parent_count = keys.len(),
            "Batch loading children"
        );

        let rows = EntityQuery::<M>::new()
            .where_in(self.fk_column, keys.iter().copied().map(SqlValue::Int).collect())
            .order_by_primary_key(OrderDirection::Asc)
            .fetch_all(self.db.pool())
            .await
            .map_err(Arc::new)?;
        let total_loaded = rows.len();

        let mut result: HashMap<i64, Vec<M>> = keys.iter().map(|k| (*k, Vec::new())).collect();
        for row in rows {
            if let Some(parent_id) = row.foreign_key(self.fk_column)
                && let Some(children) = result.get_mut(&parent_id)
            {
                children.push(row);
            }
        }

        tracing::debug!(entity = M::TABLE_NAME, total_loaded, "Batch load complete");
        Ok(result)
    }
}

/// Loads parents by primary key (many-to-one).
///
/// Keys missing from the table are absent from the result, so `load_one`
/// yields `None` for them.
pub struct BelongsToLoader<M: Model> {
    db: Database,
    _phantom: std::marker::PhantomData<M>,
}

impl<M: Model> BelongsToLoader<M> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<M: Model> Loader<i64> for BelongsToLoader<M> {
    type Value = M;
    type Error = Arc<ResolverError>;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        tracing::debug!(entity = M::TABLE_NAME, key_count = keys.len(), "Batch loading by id");

        let rows = EntityQuery::<M>::new()
            .where_in(M::PRIMARY_KEY, keys.iter().copied().map(SqlValue::Int).collect())
            .fetch_all(self.db.pool())
            .await
            .map_err(Arc::new)?;

        Ok(rows.into_iter().map(|row| (row.id(), row)).collect())
    }
}
