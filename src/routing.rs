//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    AppState,
    auth::post_token,
    endpoints,
    logging::logging_middleware,
    services::get_hello,
    summary::get_summary_endpoint,
    transaction::{create_transaction_endpoint, get_transactions_endpoint},
    user::register_user,
};

/// Return a router with all the app's routes.
///
/// Registration and login are open; every other route requires a valid
/// bearer token, enforced by the claims extractor in the handlers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::TOKEN, post(post_token))
        .route(endpoints::HELLO, get(get_hello))
        .route(
            endpoints::TRANSACTIONS,
            post(create_transaction_endpoint).get(get_transactions_endpoint),
        )
        .route(endpoints::TRANSACTIONS_SUMMARY, get(get_summary_endpoint))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}
