//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided a username and password combination that does not
    /// match a registered user.
    ///
    /// An unknown username and a wrong password both produce this error so
    /// that the response cannot be used to enumerate usernames.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The bearer token was missing, malformed, not signed with the server's
    /// key, or past its expiry.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The token was valid but its subject does not refer to a registered
    /// user.
    #[error("the token subject is not a registered user")]
    Unauthorized,

    /// The username chosen at registration is already taken.
    #[error("the username is already registered")]
    DuplicateUsername,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// A transaction was submitted with a zero or negative amount.
    ///
    /// The transaction direction (credit or debit) carries the sign, so
    /// amounts must be strictly positive.
    #[error("transaction amount must be positive, got {0}")]
    NonPositiveAmount(f64),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The signing library failed to encode a token.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Error::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid credentials".to_owned())
            }
            // Token problems and missing subjects share one message so the
            // client cannot tell which check failed.
            Error::InvalidToken | Error::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "could not validate credentials".to_owned(),
            ),
            Error::DuplicateUsername => (
                StatusCode::BAD_REQUEST,
                "username already registered".to_owned(),
            ),
            Error::TooWeak(feedback) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("password is too weak: {feedback}"),
            ),
            Error::NonPositiveAmount(amount) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("amount must be positive, got {amount}"),
            ),
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                "the requested resource could not be found".to_owned(),
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    #[test]
    fn token_errors_are_indistinguishable() {
        let invalid_token = Error::InvalidToken.into_response();
        let unauthorized = Error::Unauthorized.into_response();

        assert_eq!(invalid_token.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn duplicate_username_maps_to_bad_request() {
        let response = Error::DuplicateUsername.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn sql_unique_violation_on_username_becomes_duplicate_username() {
        let error = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            Some("UNIQUE constraint failed: user.username".to_owned()),
        );

        assert_eq!(Error::from(error), Error::DuplicateUsername);
    }

    #[test]
    fn sql_no_rows_becomes_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
