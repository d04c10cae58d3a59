//! Generic CRUD endpoints for a model
//!
//! | Method | Path    | Success             |
//! |--------|---------|---------------------|
//! | POST   | `/`     | 201 + created row   |
//! | GET    | `/`     | 200 + array         |
//! | GET    | `/{id}` | 200 + row           |
//! | PATCH  | `/{id}` | 202 + patched row   |
//! | DELETE | `/{id}` | 204                 |
//!
//! Writes go through [`MutationFactory`], so they follow the same validation
//! and lookup rules as the GraphQL mutations.

use axum::{
    Json, Router,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::ResolverError;
use crate::graphql::{MutationCall, MutationFactory, MutationOptions};
use crate::orm::{Attributes, EntityQuery, Model, OrderDirection, persist};

/// Error body: `{"error": "...", "code": "NOT_FOUND"}`
#[derive(Debug)]
pub struct ApiError(pub ResolverError);

impl From<ResolverError> for ApiError {
    fn from(err: ResolverError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ResolverError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResolverError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ResolverError::Query(_) | ResolverError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ResolverError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::warn!(error = %self.0, code = self.0.code(), "Request rejected");
        }
        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "code": self.0.code(),
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub first: Option<i64>,
    pub after: Option<i64>,
}

/// Build the CRUD router for `M`. Nest it under the resource path.
pub fn router<M, S>() -> Router<S>
where
    M: Model + Serialize,
    S: Clone + Send + Sync + 'static,
    Database: FromRef<S>,
{
    Router::new()
        .route("/", get(list::<M>).post(create::<M>))
        .route(
            "/{id}",
            get(read::<M>).patch(update::<M>).delete(destroy::<M>),
        )
}

fn mutations<M: Model>(db: Database) -> MutationFactory<M> {
    MutationFactory::new(db, MutationOptions::for_model::<M>())
}

async fn list<M: Model + Serialize>(
    State(db): State<Database>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<M>>> {
    if params.first.is_some_and(|f| f < 0) || params.after.is_some_and(|a| a < 0) {
        return Err(
            ResolverError::InvalidArgument("first and after must not be negative".into()).into(),
        );
    }

    let mut query = EntityQuery::<M>::new().order_by_primary_key(OrderDirection::Asc);
    if let Some(first) = params.first {
        query = query.limit(first);
    }
    if let Some(after) = params.after {
        query = query.offset(after);
    }
    Ok(Json(query.fetch_all(db.pool()).await?))
}

async fn read<M: Model + Serialize>(
    State(db): State<Database>,
    Path(id): Path<i64>,
) -> ApiResult<Json<M>> {
    Ok(Json(persist::find_by_id::<M>(db.pool(), id).await?))
}

async fn create<M: Model + Serialize>(
    State(db): State<Database>,
    Json(attributes): Json<Attributes>,
) -> ApiResult<(StatusCode, Json<M>)> {
    let row = mutations::<M>(db)
        .create(attributes, &MutationCall::default())
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn update<M: Model + Serialize>(
    State(db): State<Database>,
    Path(id): Path<i64>,
    Json(attributes): Json<Attributes>,
) -> ApiResult<(StatusCode, Json<M>)> {
    let row = mutations::<M>(db)
        .update(id, attributes, &MutationCall::default())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(row)))
}

async fn destroy<M: Model>(State(db): State<Database>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    mutations::<M>(db).destroy(id, &MutationCall::default()).await?;
    Ok(StatusCode::NO_CONTENT)
}
