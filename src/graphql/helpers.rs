// Helper functions shared across GraphQL query/mutation modules.

use std::sync::Arc;

use async_graphql::{ErrorExtensions, Json};
use serde_json::{Map, Value as JsonValue};

use super::connection::ConnectionArgs;
use crate::error::ResolverError;

/// Convert resolver results into GraphQL results carrying `extensions.code`.
pub(crate) trait GqlResultExt<T> {
    fn gql(self) -> async_graphql::Result<T>;
}

impl<T> GqlResultExt<T> for Result<T, ResolverError> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.extend())
    }
}

impl<T> GqlResultExt<T> for Result<T, Arc<ResolverError>> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.as_ref().extend())
    }
}

/// Collect the relay field arguments into [`ConnectionArgs`].
pub(crate) fn connection_args(
    first: Option<i64>,
    after: Option<i64>,
    keyword: Option<String>,
    order_by: Option<String>,
    filter_by: Option<Json<Map<String, JsonValue>>>,
) -> ConnectionArgs {
    ConnectionArgs {
        first,
        after,
        keyword,
        order_by,
        filter_by: filter_by.map(|Json(map)| map),
    }
}
