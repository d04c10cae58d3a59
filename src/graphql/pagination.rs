//! Relay-style connection envelope
//!
//! Cursors are plain numeric offsets: `edges[i].cursor = after + i`. They are
//! only stable while the ordering and filters of the underlying query stay
//! the same between requests; rows inserted or deleted in between shift them.
//!
//! Usage: Use the `define_connection!` macro to create type-specific
//! GraphQL connection objects.

use async_graphql::SimpleObject;

/// Information about pagination in a connection
#[derive(SimpleObject, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// Offset the page starts at
    pub start_cursor: i64,
    /// Offset the next page starts at
    pub end_cursor: i64,
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
}

/// An edge in a connection, containing a node and cursor (internal use)
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    /// The item at the end of the edge
    pub node: T,
    /// A cursor for pagination
    pub cursor: i64,
}

/// A paginated connection result (internal use)
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    /// Total rows matching the query, ignoring pagination
    pub total_count: i64,
    /// The edges in this connection
    pub edges: Vec<Edge<T>>,
    /// Pagination information
    pub page_info: PageInfo,
}

/// Totals reported alongside a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    /// Total rows matching the query
    pub count: i64,
    /// Offset the page was fetched at
    pub offset: i64,
    /// Page size the page was fetched with
    pub limit: i64,
}

/// What a cursor strategy sees when computing a cursor.
#[derive(Debug)]
pub struct CursorInput<'a, T> {
    /// Nodes of the fetched page
    pub nodes: &'a [T],
    /// Totals as reported by whoever fetched the page
    pub meta: PageMeta,
    /// Total rows matching the query
    pub total_count: i64,
    pub after: i64,
    pub first: i64,
    /// Position of the node inside the page (only for [`CursorStrategy::node`])
    pub index: Option<usize>,
}

/// How cursors and `hasNextPage` are derived from a fetched page.
pub trait CursorStrategy<T>: Send + Sync {
    fn node(&self, input: &CursorInput<'_, T>) -> i64;
    fn start(&self, input: &CursorInput<'_, T>) -> i64;
    fn end(&self, input: &CursorInput<'_, T>) -> i64;
    fn has_next(&self, input: &CursorInput<'_, T>) -> bool;
}

/// Default offset strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetCursor;

impl<T> CursorStrategy<T> for OffsetCursor {
    fn node(&self, input: &CursorInput<'_, T>) -> i64 {
        input.after.saturating_add(input.index.unwrap_or(0) as i64)
    }

    fn start(&self, input: &CursorInput<'_, T>) -> i64 {
        input.after
    }

    fn end(&self, input: &CursorInput<'_, T>) -> i64 {
        input.after.saturating_add(input.first)
    }

    fn has_next(&self, input: &CursorInput<'_, T>) -> bool {
        input.after < input.total_count.saturating_sub(input.first)
    }
}

impl<T> Connection<T> {
    /// Create an empty connection
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    /// Build a connection from one fetched page using the offset strategy.
    pub fn from_page(nodes: Vec<T>, after: i64, first: i64, total_count: i64) -> Self {
        let meta = PageMeta {
            count: total_count,
            offset: after,
            limit: first,
        };
        Self::from_page_with(nodes, after, first, meta, &OffsetCursor)
    }

    /// Build a connection from one fetched page with a custom cursor strategy.
    pub fn from_page_with(
        nodes: Vec<T>,
        after: i64,
        first: i64,
        meta: PageMeta,
        strategy: &dyn CursorStrategy<T>,
    ) -> Self {
        let total_count = meta.count;
        let page_input = CursorInput {
            nodes: &nodes,
            meta,
            total_count,
            after,
            first,
            index: None,
        };
        let page_info = PageInfo {
            start_cursor: strategy.start(&page_input),
            end_cursor: strategy.end(&page_input),
            has_next_page: strategy.has_next(&page_input),
        };
        let cursors: Vec<i64> = (0..nodes.len())
            .map(|index| {
                strategy.node(&CursorInput {
                    index: Some(index),
                    ..page_input
                })
            })
            .collect();

        let edges = nodes
            .into_iter()
            .zip(cursors)
            .map(|(node, cursor)| Edge { node, cursor })
            .collect();

        Self {
            total_count,
            edges,
            page_info,
        }
    }

    /// Transform every node, keeping cursors and page info.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Connection<U> {
        Connection {
            total_count: self.total_count,
            edges: self
                .edges
                .into_iter()
                .map(|e| Edge {
                    node: f(e.node),
                    cursor: e.cursor,
                })
                .collect(),
            page_info: self.page_info,
        }
    }
}

/// Macro to define a GraphQL connection type for a specific node type
///
/// Usage:
/// ```ignore
/// define_connection!(PostConnection, PostEdge, Post);
/// ```
#[macro_export]
macro_rules! define_connection {
    ($conn_name:ident, $edge_name:ident, $node_type:ty) => {
        /// Edge containing a node and cursor
        #[derive(async_graphql::SimpleObject, Debug, Clone)]
        pub struct $edge_name {
            /// The item at the end of the edge
            pub node: $node_type,
            /// A cursor for pagination
            pub cursor: i64,
        }

        /// Connection containing edges and page info
        #[derive(async_graphql::SimpleObject, Debug, Clone)]
        pub struct $conn_name {
            /// Total rows matching the query, ignoring pagination
            pub total_count: i64,
            /// The edges in this connection
            pub edges: Vec<$edge_name>,
            /// Pagination information
            pub page_info: $crate::graphql::pagination::PageInfo,
        }

        impl From<$crate::graphql::pagination::Connection<$node_type>> for $conn_name {
            fn from(conn: $crate::graphql::pagination::Connection<$node_type>) -> Self {
                Self {
                    total_count: conn.total_count,
                    edges: conn
                        .edges
                        .into_iter()
                        .map(|e| $edge_name {
                            node: e.node,
                            cursor: e.cursor,
                        })
                        .collect(),
                    page_info: conn.page_info,
                }
            }
        }
    };
}
