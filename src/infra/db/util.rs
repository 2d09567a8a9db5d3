use crate::application::repos::RepoError;

/// Maps driver errors onto repository errors using the Postgres SQLSTATE.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // unique_violation
            Some("23505") => RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            },
            // foreign_key_violation, invalid_text_representation
            Some("23503") | Some("22P02") => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            // check_violation, not_null_violation
            Some("23514") | Some("23502") => RepoError::Integrity {
                message: db.message().to_string(),
            },
            // query_canceled
            Some("57014") => RepoError::Timeout,
            _ => RepoError::from_persistence(db),
        },
        other => RepoError::from_persistence(other),
    }
}
