//! Miscellaneous protected routes.

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::{
    Error,
    auth::{Claims, resolve_subject},
    state::UserState,
};

/// A route handler that greets the authenticated user by name.
///
/// Mostly useful as the smallest possible end-to-end check that a bearer
/// token works.
///
/// # Errors
///
/// This function will return an error if the token is invalid or its subject
/// is not a registered user.
pub async fn get_hello(
    State(state): State<UserState>,
    claims: Claims,
) -> Result<impl IntoResponse, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let user = resolve_subject(&claims, &connection)?;

    Ok(Json(json!({
        "message": format!("Hello, {}", user.username),
    })))
}
