use async_graphql::{Context, Json, Object, Result};
use serde_json::{Map, Value as JsonValue};

use super::models::*;
use crate::db::Database;
use crate::error::ResolverError;
use crate::graphql::helpers::{GqlResultExt, connection_args};
use crate::graphql::{ConnectionResolver, ConnectionScope, SearchAggregator};
use crate::orm::{EntityQuery, Model, OrderDirection, persist};

pub type BlogSearch = SearchAggregator<BlogSearchType, BlogSearchableItem>;

/// Plain list of rows ordered by id, capped at `first`.
async fn list<M: Model>(db: &Database, first: Option<i64>, after: Option<i64>) -> Result<Vec<M>> {
    let mut query = EntityQuery::<M>::new().order_by_primary_key(OrderDirection::Asc);
    if let Some(first) = first {
        query = query.limit(first.max(0));
    }
    if let Some(after) = after {
        query = query.offset(after.max(0));
    }
    query.fetch_all(db.pool()).await.gql()
}

/// Row by id, `None` when it does not exist.
async fn get<M: Model>(db: &Database, id: i64) -> Result<Option<M>> {
    match persist::find_by_id::<M>(db.pool(), id).await {
        Ok(row) => Ok(Some(row)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e).gql(),
    }
}

#[derive(Default)]
pub struct PostQueries;

#[Object]
impl PostQueries {
    /// All posts
    async fn posts(
        &self,
        ctx: &Context<'_>,
        first: Option<i64>,
        after: Option<i64>,
    ) -> Result<Vec<Post>> {
        list(ctx.data_unchecked::<Database>(), first, after).await
    }

    /// Get a post by ID
    async fn post(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Post>> {
        get(ctx.data_unchecked::<Database>(), id).await
    }

    /// Posts with offset pagination, keyword search, sorting and filtering
    async fn post_connection(
        &self,
        ctx: &Context<'_>,
        first: Option<i64>,
        after: Option<i64>,
        keyword: Option<String>,
        order_by: Option<String>,
        filter_by: Option<Json<Map<String, JsonValue>>>,
    ) -> Result<PostConnection> {
        let db = ctx.data_unchecked::<Database>();
        let posts = ctx.data_unchecked::<ConnectionResolver<Post>>();
        let args = connection_args(first, after, keyword, order_by, filter_by);

        let conn = posts
            .resolve(db, &args, &ConnectionScope::default())
            .await
            .gql()?;
        Ok(conn.into())
    }
}

#[derive(Default)]
pub struct CommentQueries;

#[Object]
impl CommentQueries {
    /// All comments
    async fn comments(
        &self,
        ctx: &Context<'_>,
        first: Option<i64>,
        after: Option<i64>,
    ) -> Result<Vec<Comment>> {
        list(ctx.data_unchecked::<Database>(), first, after).await
    }

    async fn comment(&self, ctx: &Context<'_>, id: i64) -> Result<Option<Comment>> {
        get(ctx.data_unchecked::<Database>(), id).await
    }

    async fn comment_connection(
        &self,
        ctx: &Context<'_>,
        first: Option<i64>,
        after: Option<i64>,
        keyword: Option<String>,
        order_by: Option<String>,
        filter_by: Option<Json<Map<String, JsonValue>>>,
    ) -> Result<CommentConnection> {
        let db = ctx.data_unchecked::<Database>();
        let comments = ctx.data_unchecked::<ConnectionResolver<Comment>>();
        let args = connection_args(first, after, keyword, order_by, filter_by);

        let conn = comments
            .resolve(db, &args, &ConnectionScope::default())
            .await
            .gql()?;
        Ok(conn.into())
    }
}

#[derive(Default)]
pub struct SearchQueries;

#[Object]
impl SearchQueries {
    /// Page through one kind of searchable entity
    async fn search(
        &self,
        ctx: &Context<'_>,
        r#type: BlogSearchType,
        first: Option<i64>,
        after: Option<i64>,
    ) -> Result<SearchConnection> {
        let search = ctx.data_unchecked::<BlogSearch>();
        let conn = search.resolve(r#type, first, after, None).await.gql()?;
        Ok(conn.into())
    }

    /// Fetch any searchable entity by ID and type
    async fn fetch(
        &self,
        ctx: &Context<'_>,
        id: i64,
        r#type: BlogSearchType,
    ) -> Result<BlogSearchableItem> {
        let db = ctx.data_unchecked::<Database>();
        let item = match r#type {
            BlogSearchType::Post => persist::find_by_id::<Post>(db.pool(), id)
                .await
                .map(BlogSearchableItem::Post),
            BlogSearchType::Comment => persist::find_by_id::<Comment>(db.pool(), id)
                .await
                .map(BlogSearchableItem::Comment),
        };
        item.map_err(|e: ResolverError| {
            tracing::debug!(id, kind = ?r#type, error = %e, "Fetch failed");
            e
        })
        .gql()
    }
}
