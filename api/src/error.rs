use std::{fmt, num::ParseIntError, str::Utf8Error};

use http::header::ToStrError;

/// Failures while loading settings or building the connection source.
/// Any of these prevents the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("database url must not be blank")]
    BlankDatabaseUrl,
    #[error("database url is invalid: {0}")]
    InvalidDatabaseUrl(#[source] sqlx::Error),
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Outcome of a repository operation that did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("nickname is already registered")]
    Conflict,
    #[error("person not found")]
    NotFound,
    #[error("datastore unreachable after {attempts} attempts: {source}")]
    ConnectionUnavailable {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },
    #[error("expected exactly one affected row, got {0}")]
    UnexpectedRowCount(u64),
    #[error("datastore failure: {0}")]
    Database(#[from] sqlx::Error),
}

/// Unique constraint guarding `people.nickname`.
pub const NICKNAME_CONSTRAINT: &str = "people_nickname_key";

impl StoreError {
    /// Classifies an insert failure. Only a violation of the nickname
    /// constraint is a conflict; any other unique violation is a failure.
    pub fn from_insert(err: sqlx::Error) -> Self {
        let is_conflict = err
            .as_database_error()
            .is_some_and(|err| is_nickname_conflict(err.is_unique_violation(), err.constraint()));

        if is_conflict {
            Self::Conflict
        } else {
            Self::Database(err)
        }
    }
}

fn is_nickname_conflict(unique_violation: bool, constraint: Option<&str>) -> bool {
    unique_violation && constraint == Some(NICKNAME_CONSTRAINT)
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed request")]
    InvalidFormat,
    #[error("unsupported http version")]
    UnsupportedVersion,
    #[error("request body of {0} bytes exceeds the limit")]
    BodyTooLarge(usize),
    #[error("request head exceeds the limit")]
    HeadTooLarge,
    #[error("invalid utf-8 in request head: {0}")]
    Utf8(#[from] Utf8Error),
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] ToStrError),
    #[error("invalid content-length: {0}")]
    ContentLength(#[from] ParseIntError),
    #[error("http error: {0}")]
    HttpError(#[from] http::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write response: {0}")]
    Fmt(#[from] fmt::Error),
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] ToStrError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_insert_errors_are_generic_failures() {
        let err = StoreError::from_insert(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn only_nickname_unique_violations_conflict() {
        assert!(is_nickname_conflict(true, Some("people_nickname_key")));
        assert!(!is_nickname_conflict(true, Some("people_pkey")));
        assert!(!is_nickname_conflict(true, None));
        assert!(!is_nickname_conflict(false, Some("people_nickname_key")));
    }
}
