//! Connection resolver
//!
//! Turns relay-style field arguments (`first`, `after`, `keyword`,
//! `orderBy`, `filterBy`) into a filtered, sorted and paged [`EntityQuery`],
//! runs it and wraps the page into a [`Connection`].
//!
//! ```rust,ignore
//! let posts = ConnectionResolver::<Post>::new(
//!     ConnectionOptions::default()
//!         .searchable(["title", "content"])
//!         .sortable(["id", "title"])
//!         .filterable(["title"]),
//! );
//! let page = posts.resolve(&db, &args, &ConnectionScope::default()).await?;
//! ```

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use super::pagination::Connection;
use crate::db::Database;
use crate::error::{ResolverError, Result};
use crate::orm::{EntityQuery, Model, OrderDirection, SqlValue};

/// Page size used when neither the caller nor the options set one.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Field arguments of a connection field.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub first: Option<i64>,
    pub after: Option<i64>,
    pub keyword: Option<String>,
    pub order_by: Option<String>,
    pub filter_by: Option<Map<String, JsonValue>>,
}

impl ConnectionArgs {
    pub fn first(mut self, first: i64) -> Self {
        self.first = Some(first);
        self
    }

    pub fn after(mut self, after: i64) -> Self {
        self.after = Some(after);
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn filter_by(mut self, filter_by: Map<String, JsonValue>) -> Self {
        self.filter_by = Some(filter_by);
        self
    }
}

/// Callback that takes over filter application entirely.
pub type FilterFn<M> =
    Arc<dyn Fn(EntityQuery<M>, &Map<String, JsonValue>) -> Result<EntityQuery<M>> + Send + Sync>;

/// Which `filterBy` entries are honoured.
pub enum Filterable<M: Model> {
    /// Only these fields apply, AND-combined as equalities.
    Fields(Vec<&'static str>),
    /// A custom callback receives the query and the whole `filterBy` map.
    Custom(FilterFn<M>),
}

impl<M: Model> Clone for Filterable<M> {
    fn clone(&self) -> Self {
        match self {
            Filterable::Fields(fields) => Filterable::Fields(fields.clone()),
            Filterable::Custom(f) => Filterable::Custom(Arc::clone(f)),
        }
    }
}

impl<M: Model> Default for Filterable<M> {
    fn default() -> Self {
        Filterable::Fields(Vec::new())
    }
}

/// Static configuration of a connection field.
pub struct ConnectionOptions<M: Model> {
    pub searchable: Vec<&'static str>,
    pub sortable: Vec<&'static str>,
    pub filterable: Filterable<M>,
    pub limit: i64,
}

impl<M: Model> Default for ConnectionOptions<M> {
    fn default() -> Self {
        Self {
            searchable: Vec::new(),
            sortable: Vec::new(),
            filterable: Filterable::default(),
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl<M: Model> Clone for ConnectionOptions<M> {
    fn clone(&self) -> Self {
        Self {
            searchable: self.searchable.clone(),
            sortable: self.sortable.clone(),
            filterable: self.filterable.clone(),
            limit: self.limit,
        }
    }
}

impl<M: Model> ConnectionOptions<M> {
    pub fn searchable(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.searchable = fields.into_iter().collect();
        self
    }

    pub fn sortable(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.sortable = fields.into_iter().collect();
        self
    }

    pub fn filterable(mut self, fields: impl IntoIterator<Item = &'static str>) -> Self {
        self.filterable = Filterable::Fields(fields.into_iter().collect());
        self
    }

    pub fn filter_with<F>(mut self, f: F) -> Self
    where
        F: Fn(EntityQuery<M>, &Map<String, JsonValue>) -> Result<EntityQuery<M>>
            + Send
            + Sync
            + 'static,
    {
        self.filterable = Filterable::Custom(Arc::new(f));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Parent constraint applied when a connection is resolved as a relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub foreign_key: &'static str,
    pub parent_id: i64,
}

/// Per-call restriction of the base collection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionScope {
    pub relation: Option<Relation>,
    /// Extra equality constraints, applied after the relation.
    pub conditions: Vec<(&'static str, SqlValue)>,
}

impl ConnectionScope {
    /// Scope to the children of one parent row.
    pub fn relation(foreign_key: &'static str, parent_id: i64) -> Self {
        Self {
            relation: Some(Relation {
                foreign_key,
                parent_id,
            }),
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.conditions.push((column, value.into()));
        self
    }

    /// Apply the relation and conditions to a query.
    pub fn apply<M: Model>(&self, mut query: EntityQuery<M>) -> EntityQuery<M> {
        if let Some(relation) = &self.relation {
            query = query.where_eq(relation.foreign_key, relation.parent_id);
        }
        for (column, value) in &self.conditions {
            query = query.where_eq(column, value.clone());
        }
        query
    }
}

/// Parse `orderBy`: `-field` sorts descending, `field` ascending.
pub fn parse_order_by(order_by: &str) -> (&str, OrderDirection) {
    let order_by = order_by.trim();
    match order_by.strip_prefix('-') {
        Some(field) => (field, OrderDirection::Desc),
        None => (order_by, OrderDirection::Asc),
    }
}

/// Resolves connection fields for one model.
pub struct ConnectionResolver<M: Model> {
    options: ConnectionOptions<M>,
}

impl<M: Model> Clone for ConnectionResolver<M> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
        }
    }
}

impl<M: Model> ConnectionResolver<M> {
    pub fn new(options: ConnectionOptions<M>) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConnectionOptions<M> {
        &self.options
    }

    /// Build the unpaged query for the given arguments and scope.
    pub fn build_query(&self, args: &ConnectionArgs, scope: &ConnectionScope) -> Result<EntityQuery<M>> {
        let mut query = scope.apply(EntityQuery::<M>::new());

        if let Some(filter_by) = args.filter_by.as_ref().filter(|f| !f.is_empty()) {
            query = self.apply_filters(query, filter_by)?;
        }

        if let Some(keyword) = args.keyword.as_deref().filter(|k| !k.is_empty())
            && !self.options.searchable.is_empty()
        {
            query = query.where_any_like(&self.options.searchable, keyword);
        }

        let sort = match args.order_by.as_deref().filter(|o| !o.trim().is_empty()) {
            Some(order_by) => Some(parse_order_by(order_by)),
            None => self
                .options
                .sortable
                .first()
                .map(|field| (*field, OrderDirection::Desc)),
        };
        if let Some((field, direction)) = sort {
            query = query
                .order_by(field, direction)
                .order_by_primary_key(direction);
        }

        Ok(query)
    }

    fn apply_filters(
        &self,
        mut query: EntityQuery<M>,
        filter_by: &Map<String, JsonValue>,
    ) -> Result<EntityQuery<M>> {
        match &self.options.filterable {
            Filterable::Custom(apply) => apply(query, filter_by),
            Filterable::Fields(fields) => {
                for field in fields {
                    match filter_by.get(*field) {
                        None | Some(JsonValue::Null) => {}
                        Some(value) => {
                            query = query.where_eq(field, SqlValue::from_json(field, value)?);
                        }
                    }
                }
                Ok(query)
            }
        }
    }

    /// Resolve one page of the connection.
    pub async fn resolve(
        &self,
        db: &Database,
        args: &ConnectionArgs,
        scope: &ConnectionScope,
    ) -> Result<Connection<M>> {
        let first = args.first.unwrap_or(self.options.limit);
        let after = args.after.unwrap_or(0);
        if first < 0 {
            return Err(ResolverError::InvalidArgument(format!(
                "first must not be negative (got {})",
                first
            )));
        }
        if after < 0 {
            return Err(ResolverError::InvalidArgument(format!(
                "after must not be negative (got {})",
                after
            )));
        }
        if after.checked_add(first).is_none() {
            return Err(ResolverError::InvalidArgument(format!(
                "after + first is out of range (got first={}, after={})",
                first, after
            )));
        }

        let query = self.build_query(args, scope)?;
        let page = query.fetch_page(db.pool(), first, after).await?;

        tracing::debug!(
            table = M::TABLE_NAME,
            first,
            after,
            returned = page.models.len(),
            total = page.pagination.row_count,
            "Resolved connection"
        );

        Ok(Connection::from_page(
            page.models,
            after,
            first,
            page.pagination.row_count,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::ColumnDef;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug, Clone, sqlx::FromRow)]
    struct Item {
        id: i64,
        name: String,
        kind: Option<String>,
    }

    impl Model for Item {
        const TABLE_NAME: &'static str = "items";
        const ENTITY_NAME: &'static str = "Item";

        fn columns() -> &'static [ColumnDef] {
            const COLUMNS: &[ColumnDef] = &[
                ColumnDef::primary_key("id"),
                ColumnDef::new("name", "TEXT").not_null(),
                ColumnDef::new("kind", "TEXT"),
            ];
            COLUMNS
        }

        fn id(&self) -> i64 {
            self.id
        }
    }

    fn resolver() -> ConnectionResolver<Item> {
        ConnectionResolver::new(
            ConnectionOptions::default()
                .searchable(["name"])
                .sortable(["id", "name"])
                .filterable(["kind"]),
        )
    }

    async fn seeded() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        crate::db::sync_model::<Item>(db.pool()).await.unwrap();
        for (name, kind) in [
            ("apple", "fruit"),
            ("Banana", "fruit"),
            ("carrot", "vegetable"),
            ("date", "fruit"),
            ("eggplant", "vegetable"),
        ] {
            sqlx::query("INSERT INTO items (name, kind) VALUES (?, ?)")
                .bind(name)
                .bind(kind)
                .execute(db.pool())
                .await
                .unwrap();
        }
        db
    }

    #[test]
    fn test_parse_order_by() {
        assert_eq!(parse_order_by("-name"), ("name", OrderDirection::Desc));
        assert_eq!(parse_order_by("name"), ("name", OrderDirection::Asc));
    }

    #[test]
    fn test_default_sort_is_first_sortable_desc() {
        let query = resolver()
            .build_query(&ConnectionArgs::default(), &ConnectionScope::default())
            .unwrap();
        assert_eq!(
            query.build_sql(),
            "SELECT id, name, kind FROM items ORDER BY id DESC"
        );
    }

    #[test]
    fn test_relation_applied_before_filters() {
        let args = ConnectionArgs::default().filter_by(json!({"kind": "fruit"}).as_object().unwrap().clone());
        let query = resolver()
            .build_query(&args, &ConnectionScope::relation("id", 3))
            .unwrap();
        assert_eq!(
            query.build_sql(),
            "SELECT id, name, kind FROM items WHERE id = ? AND kind = ? ORDER BY id DESC"
        );
    }

    #[tokio::test]
    async fn test_first_page() {
        let db = seeded().await;
        let conn = resolver()
            .resolve(
                &db,
                &ConnectionArgs::default().first(1).after(0),
                &ConnectionScope::default(),
            )
            .await
            .unwrap();

        assert_eq!(conn.total_count, 5);
        assert_eq!(conn.edges.len(), 1);
        assert_eq!(conn.edges[0].node.name, "eggplant");
        assert!(conn.page_info.has_next_page);
        assert_eq!(conn.page_info.start_cursor, 0);
        assert_eq!(conn.page_info.end_cursor, 1);
    }

    #[tokio::test]
    async fn test_out_of_range_offset_is_rejected() {
        let db = seeded().await;
        let err = resolver()
            .resolve(
                &db,
                &ConnectionArgs::default().first(10).after(i64::MAX),
                &ConnectionScope::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidArgument(_)));

        // the largest offset that still fits is a valid, empty page
        let conn = resolver()
            .resolve(
                &db,
                &ConnectionArgs::default().first(10).after(i64::MAX - 10),
                &ConnectionScope::default(),
            )
            .await
            .unwrap();
        assert!(conn.edges.is_empty());
        assert_eq!(conn.total_count, 5);
        assert!(!conn.page_info.has_next_page);
    }

    #[tokio::test]
    async fn test_page_sizes_and_cursors() {
        let db = seeded().await;
        let r = resolver();
        for after in 0..=5i64 {
            for first in 0..=(5 - after) {
                let conn = r
                    .resolve(
                        &db,
                        &ConnectionArgs::default().first(first).after(after),
                        &ConnectionScope::default(),
                    )
                    .await
                    .unwrap();
                assert_eq!(conn.edges.len() as i64, first);
                assert_eq!(conn.page_info.has_next_page, after + first < 5);
                for (i, edge) in conn.edges.iter().enumerate() {
                    assert_eq!(edge.cursor, after + i as i64);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_keyword_is_case_insensitive() {
        let db = seeded().await;
        let conn = resolver()
            .resolve(
                &db,
                &ConnectionArgs::default().keyword("BAN"),
                &ConnectionScope::default(),
            )
            .await
            .unwrap();
        assert_eq!(conn.total_count, 1);
        assert_eq!(conn.edges[0].node.name, "Banana");
    }

    #[tokio::test]
    async fn test_keyword_without_match() {
        let db = seeded().await;
        let conn = resolver()
            .resolve(
                &db,
                &ConnectionArgs::default().keyword("Notexists"),
                &ConnectionScope::default(),
            )
            .await
            .unwrap();
        assert!(conn.edges.is_empty());
        assert_eq!(conn.total_count, 0);
        assert!(!conn.page_info.has_next_page);
    }

    #[tokio::test]
    async fn test_filter_allow_list() {
        let db = seeded().await;
        let filter = json!({"kind": "vegetable", "name": "apple"});
        let conn = resolver()
            .resolve(
                &db,
                &ConnectionArgs::default()
                    .order_by("name")
                    .filter_by(filter.as_object().unwrap().clone()),
                &ConnectionScope::default(),
            )
            .await
            .unwrap();
        // `name` is not filterable, so only `kind` applies
        let names: Vec<&str> = conn.edges.iter().map(|e| e.node.name.as_str()).collect();
        assert_eq!(names, vec!["carrot", "eggplant"]);
        assert!(conn.edges.iter().all(|e| e.node.kind.as_deref() == Some("vegetable")));
    }

    #[tokio::test]
    async fn test_custom_filter_callback() {
        let db = seeded().await;
        let r = ConnectionResolver::<Item>::new(ConnectionOptions::default().filter_with(
            |query, filter_by| {
                let prefix = filter_by
                    .get("prefix")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default();
                Ok(query.where_any_like(&["name"], prefix))
            },
        ));
        let filter = json!({"prefix": "an"});
        let conn = r
            .resolve(
                &db,
                &ConnectionArgs::default().filter_by(filter.as_object().unwrap().clone()),
                &ConnectionScope::default(),
            )
            .await
            .unwrap();
        assert_eq!(conn.total_count, 2); // Banana, eggplant
    }

    #[tokio::test]
    async fn test_unknown_order_field_is_query_error() {
        let db = seeded().await;
        let err = resolver()
            .resolve(
                &db,
                &ConnectionArgs::default().order_by("-missing"),
                &ConnectionScope::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "QUERY_ERROR");
    }

    #[tokio::test]
    async fn test_negative_first_rejected() {
        let db = seeded().await;
        let err = resolver()
            .resolve(&db, &ConnectionArgs::default().first(-1), &ConnectionScope::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_repeated_query_is_stable() {
        let db = seeded().await;
        let args = ConnectionArgs::default().first(2).after(1).order_by("-name");
        let a = resolver().resolve(&db, &args, &ConnectionScope::default()).await.unwrap();
        let b = resolver().resolve(&db, &args, &ConnectionScope::default()).await.unwrap();
        let ids = |c: &Connection<Item>| c.edges.iter().map(|e| (e.node.id, e.cursor)).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }
}
