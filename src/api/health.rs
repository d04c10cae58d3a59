//! Liveness and readiness probes
//!
//! `/readyz` answers 503 until the database responds and every blog table
//! exists, so a server started against an unmigrated file is not routed to.

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::blog::{Comment, Post};
use crate::orm::Model;

#[derive(Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub database: bool,
    /// table name → present
    pub tables: BTreeMap<&'static str, bool>,
}

async fn healthz() -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool, sqlx::Error> {
    let found: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(pool)
            .await?;
    Ok(found > 0)
}

async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let pool = state.db.pool();
    let mut database = true;
    let mut tables = BTreeMap::new();

    for table in [Post::TABLE_NAME, Comment::TABLE_NAME] {
        let present = match table_exists(pool, table).await {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(table, error = %e, "Readiness check failed");
                database = false;
                false
            }
        };
        tables.insert(table, present);
    }

    let ready = database && tables.values().all(|present| *present);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(Readiness {
            ready,
            database,
            tables,
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
