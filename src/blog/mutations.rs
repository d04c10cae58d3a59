use async_graphql::{Context, Json, Object, Result};
use serde_json::{Map, Value as JsonValue};

use super::models::{Comment, Post};
use crate::graphql::helpers::GqlResultExt;
use crate::graphql::{MutationCall, MutationFactory};

type Attributes = Json<Map<String, JsonValue>>;

#[derive(Default)]
pub struct PostMutations;

#[Object]
impl PostMutations {
    /// Create a post from a JSON attribute map
    async fn create_post(&self, ctx: &Context<'_>, attributes: Attributes) -> Result<Post> {
        let posts = ctx.data_unchecked::<MutationFactory<Post>>();
        posts.create(attributes.0, &MutationCall::default()).await.gql()
    }

    /// Patch a post
    async fn update_post(
        &self,
        ctx: &Context<'_>,
        id: i64,
        attributes: Attributes,
    ) -> Result<Post> {
        let posts = ctx.data_unchecked::<MutationFactory<Post>>();
        posts
            .update(id, attributes.0, &MutationCall::default())
            .await
            .gql()
    }

    /// Delete a post and its comments
    async fn destroy_post(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let posts = ctx.data_unchecked::<MutationFactory<Post>>();
        posts.destroy(id, &MutationCall::default()).await.gql()
    }
}

#[derive(Default)]
pub struct CommentMutations;

#[Object]
impl CommentMutations {
    async fn create_comment(&self, ctx: &Context<'_>, attributes: Attributes) -> Result<Comment> {
        let comments = ctx.data_unchecked::<MutationFactory<Comment>>();
        comments
            .create(attributes.0, &MutationCall::default())
            .await
            .gql()
    }

    async fn update_comment(
        &self,
        ctx: &Context<'_>,
        id: i64,
        attributes: Attributes,
    ) -> Result<Comment> {
        let comments = ctx.data_unchecked::<MutationFactory<Comment>>();
        comments
            .update(id, attributes.0, &MutationCall::default())
            .await
            .gql()
    }

    async fn destroy_comment(&self, ctx: &Context<'_>, id: i64) -> Result<bool> {
        let comments = ctx.data_unchecked::<MutationFactory<Comment>>();
        comments.destroy(id, &MutationCall::default()).await.gql()
    }
}
