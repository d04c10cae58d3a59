//! Sample rows for a fresh database.
//!
//! Inserts the posts and comments only when the posts table is empty, so
//! re-runs leave existing data untouched.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::models::Post;
use crate::orm::{EntityQuery, Model};

/// Result of running seed operations.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub posts: u64,
    pub comments: u64,
}

/// (title, content, comments)
const SAMPLE_POSTS: &[(&str, &str, &[&str])] = &[
    (
        "Hello relay",
        "Offset cursors in practice",
        &["First!", "Nice write-up"],
    ),
    ("Filtering connections", "filterBy and allow-lists", &["Useful"]),
    ("Sorting", "orderBy with a leading dash", &[]),
    ("Search", "One connection, many sources", &["Union types", "Enums"]),
    ("Mutations", "create, update and destroy", &["Ship it"]),
];

/// Insert the sample posts and comments if there are no posts yet.
pub async fn seed(pool: &SqlitePool) -> Result<SeedResult, sqlx::Error> {
    let existing = sqlx::query_scalar::<_, i64>(&EntityQuery::<Post>::new().build_count_sql())
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        debug!(existing, "Posts present, skipping seed");
        return Ok(SeedResult::default());
    }

    let mut result = SeedResult::default();
    let mut tx = pool.begin().await?;
    for &(title, content, comments) in SAMPLE_POSTS {
        let post_id = sqlx::query(&format!(
            "INSERT INTO {} (title, content) VALUES (?, ?)",
            Post::TABLE_NAME
        ))
        .bind(title)
        .bind(content)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        result.posts += 1;

        for &comment in comments {
            sqlx::query("INSERT INTO comments (post_id, title, content) VALUES (?, ?, ?)")
                .bind(post_id)
                .bind(comment)
                .bind(format!("Re: {}", title))
                .execute(&mut *tx)
                .await?;
            result.comments += 1;
        }
    }
    tx.commit().await?;

    info!(posts = result.posts, comments = result.comments, "Seeded sample data");
    Ok(result)
}
