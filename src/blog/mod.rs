//! Sample blog: posts with comments, wired through every resolver helper.

pub mod models;
pub mod mutations;
pub mod queries;
pub mod schema;
pub mod seed;

use sqlx::SqlitePool;

use crate::db::{SchemaSyncResult, sync_model};

pub use models::{BlogSearchType, BlogSearchableItem, Comment, Post};
pub use schema::{BlogSchema, build_schema};
pub use seed::{SeedResult, seed};

/// Create or extend the blog tables.
pub async fn migrate(pool: &SqlitePool) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = sync_model::<Post>(pool).await?;
    result.merge(sync_model::<Comment>(pool).await?);
    Ok(result)
}
