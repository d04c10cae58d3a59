//! HTTP route definitions
//!
//! The primary API is GraphQL at /graphql. Every blog model is also exposed
//! as a plain REST resource under /api.

pub mod health;
pub mod resources;

use axum::Router;

use crate::app::AppState;
use crate::blog::{Comment, Post};

pub use resources::ApiError;

/// REST resources, to be nested under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/posts", resources::router::<Post, AppState>())
        .nest("/comments", resources::router::<Comment, AppState>())
}
