//! GraphQL resolver helpers
//!
//! Building blocks for resolvers over the model layer:
//!
//! - [`connection`]: relay-style connection fields (`first`, `after`,
//!   `keyword`, `orderBy`, `filterBy`)
//! - [`search`]: several typed sources behind one polymorphic connection
//! - [`mutation`]: create/update/destroy resolvers for a model
//! - [`loaders`]: DataLoaders for has-many and belongs-to relations
//! - [`compose`]: sequential resolver pipelines
//!
//! ## Resolver pattern
//! ```rust,ignore
//! #[Object]
//! impl PostQueries {
//!     async fn post_connection(&self, ctx: &Context<'_>, first: Option<i64>, ...) -> Result<PostConnection> {
//!         let db = ctx.data_unchecked::<Database>();
//!         let posts = ctx.data_unchecked::<ConnectionResolver<Post>>();
//!         let args = connection_args(first, after, keyword, order_by, filter_by);
//!         Ok(posts.resolve(db, &args, &ConnectionScope::default()).await.gql()?.into())
//!     }
//! }
//! ```

pub mod compose;
pub mod connection;
pub(crate) mod helpers;
pub mod loaders;
pub mod mutation;
pub mod pagination;
pub mod search;

pub use compose::Pipeline;
pub use connection::{
    ConnectionArgs, ConnectionOptions, ConnectionResolver, ConnectionScope, Filterable,
};
pub use loaders::{BelongsToLoader, HasManyLoader};
pub use mutation::{
    DestroyOptions, MutationAction, MutationCall, MutationFactory, MutationOptions,
    MutationOutcome, MutationRequest, MutationWrapper, Passthrough, SaveOptions,
};
pub use pagination::{
    Connection, CursorInput, CursorStrategy, Edge, OffsetCursor, PageInfo, PageMeta,
};
pub use search::{SearchAggregator, SearchMeta, SearchPage, SearchRequest, SearchSource};
