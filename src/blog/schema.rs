//! Blog GraphQL schema: query and mutation roots plus the resolver helpers
//! they pull from schema data.

use async_graphql::dataloader::DataLoader;
use async_graphql::extensions::Tracing;
use async_graphql::{EmptySubscription, MergedObject, Schema};

use super::models::{BlogSearchType, BlogSearchableItem, Comment, Post};
use super::mutations::{CommentMutations, PostMutations};
use super::queries::{BlogSearch, CommentQueries, PostQueries, SearchQueries};
use crate::db::Database;
use crate::graphql::{
    BelongsToLoader, ConnectionOptions, ConnectionResolver, HasManyLoader, MutationFactory,
    MutationOptions, SearchSource,
};

#[derive(MergedObject, Default)]
pub struct QueryRoot(PostQueries, CommentQueries, SearchQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(PostMutations, CommentMutations);

/// The GraphQL schema type
pub type BlogSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Search sources, one per searchable model.
pub fn blog_search(db: &Database, page_limit: i64) -> BlogSearch {
    BlogSearch::new("Blog")
        .with_limit(page_limit)
        .register(SearchSource::model::<Post>(
            "post",
            BlogSearchType::Post,
            db.clone(),
            BlogSearchableItem::Post,
        ))
        .register(SearchSource::model::<Comment>(
            "comment",
            BlogSearchType::Comment,
            db.clone(),
            BlogSearchableItem::Comment,
        ))
}

/// Build the GraphQL schema with all resolvers
pub fn build_schema(db: Database, page_limit: i64) -> BlogSchema {
    let posts = ConnectionResolver::<Post>::new(
        ConnectionOptions::default()
            .searchable(["title", "content"])
            .sortable(["id", "title", "created_at"])
            .filterable(["title"])
            .limit(page_limit),
    );
    let comments = ConnectionResolver::<Comment>::new(
        ConnectionOptions::default()
            .searchable(["title", "content"])
            .sortable(["id", "title"])
            .filterable(["post_id", "title"])
            .limit(page_limit),
    );

    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .extension(Tracing)
        .data(posts)
        .data(comments)
        .data(blog_search(&db, page_limit))
        .data(MutationFactory::<Post>::new(
            db.clone(),
            MutationOptions::for_model::<Post>(),
        ))
        .data(MutationFactory::<Comment>::new(
            db.clone(),
            MutationOptions::for_model::<Comment>(),
        ))
        .data(DataLoader::new(
            HasManyLoader::<Comment>::new(db.clone(), "post_id"),
            tokio::spawn,
        ))
        .data(DataLoader::new(
            BelongsToLoader::<Post>::new(db.clone()),
            tokio::spawn,
        ))
        .data(db)
        .finish()
}
