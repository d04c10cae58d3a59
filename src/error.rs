//! Error taxonomy shared by the resolver helpers.
//!
//! Resolvers never recover locally: every error bubbles up to async-graphql,
//! which turns it into an entry of the response `errors` array. Use
//! [`ErrorExtensions::extend`] to attach the machine-readable `code`.

use async_graphql::ErrorExtensions;
use sqlx::error::ErrorKind;

/// Result alias used throughout the crate.
pub type Result<T, E = ResolverError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// Zero (or more than one) row matched a single-entity lookup.
    #[error("{entity} not found: {detail}")]
    NotFound { entity: &'static str, detail: String },

    /// Malformed attributes, or a constraint rejected by the database.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Malformed filter/order field names.
    #[error("invalid query: {0}")]
    Query(String),

    /// A caller-supplied argument that cannot be honoured.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl ResolverError {
    pub fn not_found(entity: &'static str, detail: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            detail: detail.into(),
        }
    }

    /// Stable code exposed under `extensions.code`.
    pub fn code(&self) -> &'static str {
        match self {
            ResolverError::NotFound { .. } => "NOT_FOUND",
            ResolverError::Validation(_) => "VALIDATION_ERROR",
            ResolverError::Query(_) => "QUERY_ERROR",
            ResolverError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ResolverError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolverError::NotFound { .. })
    }
}

impl From<sqlx::Error> for ResolverError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err
            && matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            )
        {
            return Self::Validation(db.message().to_string());
        }

        match err {
            sqlx::Error::RowNotFound => Self::not_found("row", "no rows returned"),
            other => Self::Database(other),
        }
    }
}

impl ErrorExtensions for ResolverError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ResolverError::not_found("Post", "id = 1").code(), "NOT_FOUND");
        assert_eq!(ResolverError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(ResolverError::Query("x".into()).code(), "QUERY_ERROR");
        assert_eq!(
            ResolverError::InvalidArgument("x".into()).code(),
            "INVALID_ARGUMENT"
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: ResolverError = sqlx::Error::RowNotFound.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_extend_sets_code() {
        let err = ResolverError::not_found("Post", "id = 7").extend();
        assert_eq!(err.message, "Post not found: id = 7");
        let extensions = err.extensions.expect("extensions set");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("NOT_FOUND"))
        );
    }
}
