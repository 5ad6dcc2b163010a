//! Database error type shared by every repository.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("query failed: {message}")]
    Query { message: String },
}

impl DatabaseError {
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Map a raw sqlx error into the repository taxonomy.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            },
            sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::Conflict {
                message: db.message().to_string(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::Connection {
                    message: err.to_string(),
                }
            }
            _ => DatabaseError::Query {
                message: err.to_string(),
            },
        }
    }

    /// Connection-level failures are worth retrying; the rest are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn pool_errors_are_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
    }
}
