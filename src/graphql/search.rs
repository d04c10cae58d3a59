//! Search aggregator
//!
//! Exposes several registered sources as one polymorphic connection. Every
//! source carries a `kind` (a variant of the schema's search-type enum) and a
//! handler that pages its own rows. Nodes come back already wrapped in the
//! searchable union, so the GraphQL type of each node is fixed by the source
//! that produced it.

use std::fmt::Debug;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::connection::DEFAULT_PAGE_LIMIT;
use super::pagination::{Connection, CursorStrategy, OffsetCursor, PageMeta};
use crate::db::Database;
use crate::error::{ResolverError, Result};
use crate::orm::{EntityQuery, Model, OrderDirection};

/// Page arguments handed to a source handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest {
    pub first: i64,
    pub after: i64,
}

/// Totals reported by a source handler.
pub type SearchMeta = PageMeta;

/// One page returned by a source handler.
#[derive(Debug, Clone)]
pub struct SearchPage<N> {
    pub meta: SearchMeta,
    pub nodes: Vec<N>,
}

pub type SearchHandler<N> =
    Arc<dyn Fn(SearchRequest) -> BoxFuture<'static, Result<SearchPage<N>>> + Send + Sync>;

/// A registered search source.
pub struct SearchSource<K, N> {
    pub name: String,
    pub kind: K,
    handler: SearchHandler<N>,
}

impl<K: Clone, N> Clone for SearchSource<K, N> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<K: Debug, N> Debug for SearchSource<K, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSource")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<K, N: Send + 'static> SearchSource<K, N> {
    /// A source backed by a custom handler.
    pub fn new<F>(name: impl Into<String>, kind: K, handler: F) -> Self
    where
        F: Fn(SearchRequest) -> BoxFuture<'static, Result<SearchPage<N>>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind,
            handler: Arc::new(handler),
        }
    }

    /// A source that pages a whole model table, wrapping every row with `wrap`.
    pub fn model<M: Model>(name: impl Into<String>, kind: K, db: Database, wrap: fn(M) -> N) -> Self {
        Self::new(name, kind, move |request: SearchRequest| {
            let db = db.clone();
            let fut: BoxFuture<'static, Result<SearchPage<N>>> = Box::pin(async move {
                let page = EntityQuery::<M>::new()
                    .order_by_primary_key(OrderDirection::Asc)
                    .fetch_page(db.pool(), request.first, request.after)
                    .await?;
                Ok(SearchPage {
                    meta: SearchMeta {
                        count: page.pagination.row_count,
                        offset: page.pagination.offset,
                        limit: page.pagination.limit,
                    },
                    nodes: page.models.into_iter().map(wrap).collect(),
                })
            });
            fut
        })
    }
}

/// Dispatches search requests to the source registered for a kind.
pub struct SearchAggregator<K, N> {
    name: String,
    sources: Vec<SearchSource<K, N>>,
    cursor: Arc<dyn CursorStrategy<N>>,
    limit: i64,
}

impl<K, N> SearchAggregator<K, N>
where
    K: Copy + Eq + Debug + Send + Sync + 'static,
    N: Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            cursor: Arc::new(OffsetCursor),
            limit: DEFAULT_PAGE_LIMIT,
        }
    }

    /// Register a source. A kind that is already registered keeps its
    /// first source.
    pub fn register(mut self, source: SearchSource<K, N>) -> Self {
        if self.sources.iter().any(|s| s.kind == source.kind) {
            tracing::warn!(
                search = %self.name,
                source = %source.name,
                kind = ?source.kind,
                "Search kind already registered, ignoring"
            );
            return self;
        }
        self.sources.push(source);
        self
    }

    /// Replace the default offset cursor strategy.
    pub fn with_cursor(mut self, cursor: impl CursorStrategy<N> + 'static) -> Self {
        self.cursor = Arc::new(cursor);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// GraphQL name of the search-type enum.
    pub fn type_enum_name(&self) -> String {
        format!("{}SearchType", self.name)
    }

    /// GraphQL name of the searchable union.
    pub fn union_name(&self) -> String {
        format!("{}SearchableItem", self.name)
    }

    /// Registered sources, in registration order.
    pub fn sources(&self) -> &[SearchSource<K, N>] {
        &self.sources
    }

    pub fn source(&self, kind: K) -> Option<&SearchSource<K, N>> {
        self.sources.iter().find(|s| s.kind == kind)
    }

    /// Run the source registered for `kind` and wrap its page as a connection.
    pub async fn resolve(
        &self,
        kind: K,
        first: Option<i64>,
        after: Option<i64>,
        cursor: Option<&dyn CursorStrategy<N>>,
    ) -> Result<Connection<N>> {
        let source = self.source(kind).ok_or_else(|| {
            ResolverError::InvalidArgument(format!(
                "no {} source registered for {:?}",
                self.type_enum_name(),
                kind
            ))
        })?;

        let first = first.unwrap_or(self.limit);
        let after = after.unwrap_or(0);
        if first < 0 || after < 0 {
            return Err(ResolverError::InvalidArgument(format!(
                "first and after must not be negative (got first={}, after={})",
                first, after
            )));
        }
        if after.checked_add(first).is_none() {
            return Err(ResolverError::InvalidArgument(format!(
                "after + first is out of range (got first={}, after={})",
                first, after
            )));
        }

        let page = (source.handler)(SearchRequest { first, after }).await?;
        tracing::debug!(
            search = %self.name,
            source = %source.name,
            count = page.meta.count,
            returned = page.nodes.len(),
            "Resolved search"
        );

        let strategy = cursor.unwrap_or(self.cursor.as_ref());
        Ok(Connection::from_page_with(
            page.nodes,
            after,
            first,
            page.meta,
            strategy,
        ))
    }

    /// Resolve by registration name instead of kind.
    pub async fn resolve_by_name(
        &self,
        name: &str,
        first: Option<i64>,
        after: Option<i64>,
    ) -> Result<Connection<N>> {
        let kind = self
            .sources
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.kind)
            .ok_or_else(|| {
                ResolverError::InvalidArgument(format!("unknown search source '{}'", name))
            })?;
        self.resolve(kind, first, after, None).await
    }
}
