//! Classification of sqlx failures for the store gateway.

use domain::StoreError;

/// Maps a driver error to the domain's transient/terminal taxonomy.
pub fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_) => StoreError::Transient(err.to_string()),
        sqlx::Error::Database(ref db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            match classify_sqlstate(&code) {
                SqlStateClass::Transient => StoreError::Transient(err.to_string()),
                SqlStateClass::UniqueViolation => StoreError::Conflict(err.to_string()),
                SqlStateClass::Terminal => {
                    tracing::error!(sqlstate = %code, "Database rejected statement: {}", err);
                    StoreError::Terminal(err.to_string())
                }
            }
        }
        other => {
            tracing::error!("Database driver error: {}", other);
            StoreError::Terminal(other.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlStateClass {
    Transient,
    UniqueViolation,
    Terminal,
}

/// Postgres SQLSTATE codes worth retrying: connection exceptions (08),
/// serialization failures and deadlocks, insufficient resources (53) and
/// server shutdown (57P01..57P03).
fn classify_sqlstate(code: &str) -> SqlStateClass {
    match code {
        "23505" => SqlStateClass::UniqueViolation,
        "40001" | "40P01" | "57P01" | "57P02" | "57P03" => SqlStateClass::Transient,
        c if c.starts_with("08") || c.starts_with("53") => SqlStateClass::Transient,
        _ => SqlStateClass::Terminal,
    }
}
