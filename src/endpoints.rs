//! The API endpoint URIs.

/// The route for logging in and being issued a bearer token.
pub const TOKEN: &str = "/token";
/// The route for registering a new user.
pub const USERS: &str = "/users/";
/// The route for creating and listing transactions.
pub const TRANSACTIONS: &str = "/transactions/";
/// The route for the transaction summary.
pub const TRANSACTIONS_SUMMARY: &str = "/transactions/summary/";
/// The route that greets the authenticated user.
pub const HELLO: &str = "/hello";
