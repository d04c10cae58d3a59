//! Post and Comment models.

use async_graphql::dataloader::DataLoader;
use async_graphql::{ComplexObject, Context, Enum, Json, Result, SimpleObject, Union};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::db::Database;
use crate::define_connection;
use crate::graphql::helpers::{GqlResultExt, connection_args};
use crate::graphql::{BelongsToLoader, ConnectionResolver, ConnectionScope, HasManyLoader};
use crate::orm::{ColumnDef, HasForeignKey, Model};

/// Blog post
#[derive(Debug, Clone, PartialEq, SimpleObject, Serialize, Deserialize, sqlx::FromRow)]
#[graphql(complex)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub created_at: String,
}

impl Model for Post {
    const TABLE_NAME: &'static str = "posts";
    const ENTITY_NAME: &'static str = "Post";

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::primary_key("id"),
            ColumnDef::new("title", "TEXT").not_null(),
            ColumnDef::new("content", "TEXT"),
            ColumnDef::new("created_at", "TEXT")
                .not_null()
                .default_expr("(datetime('now'))"),
        ];
        COLUMNS
    }

    fn id(&self) -> i64 {
        self.id
    }
}

#[ComplexObject]
impl Post {
    /// Comments on this post, batched across posts
    async fn comments(&self, ctx: &Context<'_>) -> Result<Vec<Comment>> {
        let loader = ctx.data_unchecked::<DataLoader<HasManyLoader<Comment>>>();
        Ok(loader.load_one(self.id).await.gql()?.unwrap_or_default())
    }

    /// Comments on this post as a connection
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
            .resolve(db, &args, &ConnectionScope::relation("post_id", self.id))
            .await
            .gql()?;
        Ok(conn.into())
    }
}

/// Comment on a post
#[derive(Debug, Clone, PartialEq, SimpleObject, Serialize, Deserialize, sqlx::FromRow)]
#[graphql(complex)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    pub content: Option<String>,
}

impl Model for Comment {
    const TABLE_NAME: &'static str = "comments";
    const ENTITY_NAME: &'static str = "Comment";

    fn columns() -> &'static [ColumnDef] {
        const COLUMNS: &[ColumnDef] = &[
            ColumnDef::primary_key("id"),
            ColumnDef::new("post_id", "INTEGER")
                .not_null()
                .references("posts(id) ON DELETE CASCADE"),
            ColumnDef::new("title", "TEXT").not_null(),
            ColumnDef::new("content", "TEXT"),
        ];
        COLUMNS
    }

    fn id(&self) -> i64 {
        self.id
    }
}

impl HasForeignKey for Comment {
    fn foreign_key(&self, column: &str) -> Option<i64> {
        match column {
            "post_id" => Some(self.post_id),
            _ => None,
        }
    }
}

#[ComplexObject]
impl Comment {
    /// The post this comment belongs to
    async fn post(&self, ctx: &Context<'_>) -> Result<Option<Post>> {
        let loader = ctx.data_unchecked::<DataLoader<BelongsToLoader<Post>>>();
        loader.load_one(self.post_id).await.gql()
    }
}

/// Kinds of searchable entities
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[graphql(name = "BlogSearchType")]
pub enum BlogSearchType {
    Post,
    Comment,
}

/// A search hit, tagged with the entity type it came from
#[derive(Union, Debug, Clone, PartialEq)]
#[graphql(name = "BlogSearchableItem")]
pub enum BlogSearchableItem {
    Post(Post),
    Comment(Comment),
}

impl BlogSearchableItem {
    pub fn kind(&self) -> BlogSearchType {
        match self {
            BlogSearchableItem::Post(_) => BlogSearchType::Post,
            BlogSearchableItem::Comment(_) => BlogSearchType::Comment,
        }
    }
}

define_connection!(PostConnection, PostEdge, Post);
define_connection!(CommentConnection, CommentEdge, Comment);
define_connection!(SearchConnection, SearchEdge, BlogSearchableItem);
