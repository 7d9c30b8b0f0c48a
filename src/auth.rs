//! Issuing and validation of the bearer tokens that protect the API.
//!
//! Tokens are stateless signed JWTs carrying the username as their subject.
//! There is no revocation: logging out is the client discarding its token,
//! and an issued token stays valid until its embedded expiry.

// The extractor pattern in this module follows the axum JWT example:
// https://github.com/tokio-rs/axum/blob/main/examples/jwt/src/main.rs

use axum::{
    Form, Json, RequestPartsExt,
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    state::{AuthState, TokenState},
    user::{User, get_user_by_username},
};

/// How long a bearer token remains valid after being issued.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::minutes(30);

/// The contents of a bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The username the token was issued to.
    pub sub: String,
    /// The expiry time of the token as a unix timestamp.
    pub exp: usize,
    /// The time the token was issued as a unix timestamp.
    pub iat: usize,
}

impl<S> FromRequestParts<S> for Claims
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::InvalidToken)?;

        let auth_state = AuthState::from_ref(state);
        let token_data = decode_token(bearer.token(), &auth_state.decoding_key)?;

        Ok(token_data.claims)
    }
}

/// The credentials submitted to the login endpoint.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    /// Username entered during sign-in.
    pub username: String,
    /// Password entered during sign-in.
    pub password: String,
}

/// The response body for a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed bearer token.
    pub access_token: String,
    /// The token scheme, always `"bearer"`.
    pub token_type: String,
}

/// A route handler for logging in and issuing a bearer token.
///
/// Accepts a form-encoded body with `username` and `password` fields and
/// responds with a token valid for [DEFAULT_TOKEN_DURATION].
///
/// # Errors
///
/// This function will return [Error::InvalidCredentials] if the username is
/// unknown or the password does not match. The two cases are deliberately
/// not distinguished.
pub async fn post_token(
    State(state): State<TokenState>,
    Form(credentials): Form<Credentials>,
) -> Result<Json<TokenResponse>, Error> {
    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        get_user_by_username(&credentials.username, &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            other => other,
        })?
    };

    // The database lock is released before the deliberately slow hash check.
    let password_is_correct = user
        .password_hash
        .verify(&credentials.password)
        .map_err(|e| {
            tracing::error!("Error verifying password: {e}");
            Error::HashingError(e.to_string())
        })?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let access_token = encode_token(&user.username, state.token_duration, &state.encoding_key)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_owned(),
    }))
}

/// Create a signed token asserting `sub = username` that expires after
/// `token_duration`.
///
/// # Errors
///
/// This function will return an error if the signing library fails to encode
/// the claims, e.g. on an invalid key.
pub fn encode_token(
    username: &str,
    token_duration: Duration,
    encoding_key: &EncodingKey,
) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: username.to_owned(),
        exp: (now + token_duration).unix_timestamp() as usize,
        iat: now.unix_timestamp() as usize,
    };

    encode(&Header::default(), &claims, encoding_key)
        .map_err(|e| Error::TokenCreation(e.to_string()))
}

fn decode_token(token: &str, decoding_key: &DecodingKey) -> Result<TokenData<Claims>, Error> {
    decode(token, decoding_key, &Validation::default()).map_err(|_| Error::InvalidToken)
}

/// Look up the user a validated token was issued to.
///
/// Protected handlers call this after token validation so that a token whose
/// subject no longer exists in the database is rejected the same way as a
/// bad token.
///
/// # Errors
///
/// Returns [Error::Unauthorized] if the subject is not a registered user.
pub fn resolve_subject(claims: &Claims, connection: &Connection) -> Result<User, Error> {
    get_user_by_username(&claims.sub, connection).map_err(|error| match error {
        Error::NotFound => Error::Unauthorized,
        other => other,
    })
}
