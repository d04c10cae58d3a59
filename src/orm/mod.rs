//! Model layer
//!
//! Provides the query-builder capability the resolver helpers are written
//! against:
//! - [`Model`]: table metadata and row decoding (via `sqlx::FromRow`)
//! - [`EntityQuery`]: parameterised filters, ordering and paging
//! - [`persist`]: INSERT / partial UPDATE from JSON attributes
//!
//! ```rust,ignore
//! let page = EntityQuery::<Post>::new()
//!     .where_eq("published", true)
//!     .order_by("created_at", OrderDirection::Desc)
//!     .fetch_page(db.pool(), 10, 0)
//!     .await?;
//! ```

mod builder;
pub mod persist;
mod traits;

pub use builder::*;
pub use persist::Attributes;
pub use traits::*;
