//! Transaction management for the finance tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the `TransactionData` transfer struct
//! - Database functions for storing and querying transactions
//! - Route handlers for creating and listing transactions
//!
//! Transactions are append-only: once recorded they are never updated or
//! deleted, and every query is scoped to the owner that created them.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::{Connection, Row, params_from_iter, types::Type, types::Value};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    auth::{Claims, resolve_subject},
    database_id::DatabaseID,
    state::TransactionState,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction increases or decreases the owner's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Money flowing in, e.g. salary.
    Credit,
    /// Money flowing out, e.g. groceries.
    Debit,
}

impl Direction {
    /// The canonical string stored in the database for this direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "Credit",
            Direction::Debit => "Debit",
        }
    }
}

/// The error returned when a string is not a valid transaction direction.
#[derive(Debug, thiserror::Error)]
#[error("\"{0}\" is not a valid transaction direction")]
pub struct ParseDirectionError(String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "Credit" => Ok(Direction::Credit),
            "Debit" => Ok(Direction::Debit),
            other => Err(ParseDirectionError(other.to_owned())),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// The username of the user that recorded this transaction.
    pub owner: String,
    /// The name of the counterparty, e.g. the shop or employer.
    pub name: String,
    /// The amount of money spent or earned in this transaction.
    ///
    /// Always positive, [Direction] carries the sign.
    pub amount: f64,
    /// Whether this transaction is income or an expense.
    #[serde(rename = "type")]
    pub direction: Direction,
    /// A free-form label used to group expenses, e.g. "Food".
    pub category: String,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
}

/// The data for creating a new transaction.
///
/// The owner is deliberately absent: it always comes from the authenticated
/// caller, never the request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    /// The name of the counterparty.
    pub name: String,
    /// The amount of money spent or earned, must be positive.
    pub amount: f64,
    /// Whether this transaction is income or an expense.
    #[serde(rename = "type")]
    pub direction: Direction,
    /// A free-form label used to group expenses.
    pub category: String,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// A route handler for recording a new transaction.
///
/// Echoes the created transaction with its server-assigned ID and owner.
///
/// # Errors
///
/// This function will return an error if the amount is not positive, the
/// token is invalid, or the database could not be accessed.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    claims: Claims,
    Json(data): Json<TransactionData>,
) -> Result<impl IntoResponse, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let user = resolve_subject(&claims, &connection)?;

    let transaction = create_transaction(&user.username, data, &connection)?;

    Ok((StatusCode::OK, Json(transaction)))
}

/// The query parameters for listing transactions.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// The number of transactions to skip from the top of the list.
    #[serde(default)]
    pub skip: u64,
    /// The maximum number of transactions to return.
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    100
}

/// A route handler for listing the caller's transactions, newest date first.
///
/// # Errors
///
/// This function will return an error if the token is invalid or the
/// database could not be accessed.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    claims: Claims,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let user = resolve_subject(&claims, &connection)?;

    let transactions = list_transactions(&user.username, params.skip, params.limit, &connection)?;

    Ok(Json(transactions))
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                direction TEXT NOT NULL,
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                description TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str = "id, owner, name, amount, direction, category, date, description";

/// Create a new transaction owned by `owner` in the database.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NonPositiveAmount] if `data.amount` is zero or negative,
/// - or [Error::SqlError] if there is an SQL error.
pub fn create_transaction(
    owner: &str,
    data: TransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if data.amount <= 0.0 {
        return Err(Error::NonPositiveAmount(data.amount));
    }

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\" (owner, name, amount, direction, category, date, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {TRANSACTION_COLUMNS}",
        ))?
        .query_row(
            (
                owner,
                &data.name,
                data.amount,
                data.direction.as_str(),
                &data.category,
                data.date,
                &data.description,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Get a page of `owner`'s transactions ordered by date descending.
///
/// Transactions on the same date are returned in insertion order.
///
/// # Errors
///
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transactions(
    owner: &str,
    skip: u64,
    limit: u64,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE owner = :owner
             ORDER BY date DESC, id ASC
             LIMIT :limit OFFSET :skip",
        ))?
        .query_map(
            rusqlite::named_params! {
                ":owner": owner,
                ":limit": limit as i64,
                ":skip": skip as i64,
            },
            map_transaction_row,
        )?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Defines which of an owner's transactions [query_transactions] returns.
///
/// A bound that is `None` is unconstrained on that side. Both bounds are
/// inclusive, and a start date after the end date simply matches nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateRangeFilter {
    /// Include transactions dated on or after this date.
    pub start_date: Option<Date>,
    /// Include transactions dated on or before this date.
    pub end_date: Option<Date>,
}

/// Get all of `owner`'s transactions with dates inside `filter`.
///
/// Results are ordered by date descending with ties in insertion order, the
/// same order the list endpoint uses.
///
/// # Errors
///
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn query_transactions(
    owner: &str,
    filter: DateRangeFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut query_string_parts = vec![format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE owner = ?1"
    )];
    let mut query_parameters = vec![Value::Text(owner.to_owned())];

    if let Some(start_date) = filter.start_date {
        query_string_parts.push(format!("AND date >= ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Text(start_date.to_string()));
    }

    if let Some(end_date) = filter.end_date {
        query_string_parts.push(format!("AND date <= ?{}", query_parameters.len() + 1));
        query_parameters.push(Value::Text(end_date.to_string()));
    }

    query_string_parts.push("ORDER BY date DESC, id ASC".to_string());

    let query_string = query_string_parts.join(" ");
    let params = params_from_iter(query_parameters.iter());

    connection
        .prepare(&query_string)?
        .query_map(params, map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let direction_text: String = row.get(4)?;
    let direction = direction_text
        .parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error)))?;

    Ok(Transaction {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        amount: row.get(3)?,
        direction,
        category: row.get(5)?,
        date: row.get(6)?,
        description: row.get(7)?,
    })
}

#[cfg(test)]
mod transaction_tests {
    use rusqlite::Connection;
    use time::{Date, macros::date};

    use crate::{
        Error,
        transaction::{
            DateRangeFilter, Direction, TransactionData, create_transaction,
            create_transaction_table, list_transactions, query_transactions,
        },
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_transaction_table(&conn).expect("Could not create transaction table");

        conn
    }

    fn sample_transaction(name: &str, amount: f64, direction: Direction, date: Date) -> TransactionData {
        TransactionData {
            name: name.to_owned(),
            amount,
            direction,
            category: "Misc".to_owned(),
            date,
            description: String::new(),
        }
    }

    #[test]
    fn insert_transaction_assigns_id_and_owner() {
        let conn = get_db_connection();
        let data = sample_transaction("Bakery", 12.5, Direction::Debit, date!(2024 - 01 - 10));

        let transaction = create_transaction("alice", data.clone(), &conn).unwrap();

        assert!(transaction.id > 0);
        assert_eq!(transaction.owner, "alice");
        assert_eq!(transaction.name, data.name);
        assert_eq!(transaction.amount, data.amount);
        assert_eq!(transaction.direction, data.direction);
        assert_eq!(transaction.category, data.category);
        assert_eq!(transaction.date, data.date);
        assert_eq!(transaction.description, data.description);
    }

    #[test]
    fn insert_transaction_rejects_zero_amount() {
        let conn = get_db_connection();
        let data = sample_transaction("Bakery", 0.0, Direction::Debit, date!(2024 - 01 - 10));

        let result = create_transaction("alice", data, &conn);

        assert_eq!(result, Err(Error::NonPositiveAmount(0.0)));
    }

    #[test]
    fn insert_transaction_rejects_negative_amount() {
        let conn = get_db_connection();
        let data = sample_transaction("Bakery", -9.99, Direction::Debit, date!(2024 - 01 - 10));

        let result = create_transaction("alice", data, &conn);

        assert_eq!(result, Err(Error::NonPositiveAmount(-9.99)));
    }

    #[test]
    fn insert_transaction_round_trips_through_select() {
        let conn = get_db_connection();
        let data = sample_transaction("Salary", 1000.0, Direction::Credit, date!(2024 - 01 - 15));

        let inserted = create_transaction("alice", data, &conn).unwrap();
        let listed = list_transactions("alice", 0, 100, &conn).unwrap();

        assert_eq!(listed, vec![inserted]);
    }

    #[test]
    fn list_orders_by_date_descending_with_insertion_order_ties() {
        let conn = get_db_connection();
        let first = create_transaction(
            "alice",
            sample_transaction("Cafe", 4.5, Direction::Debit, date!(2024 - 01 - 10)),
            &conn,
        )
        .unwrap();
        let second = create_transaction(
            "alice",
            sample_transaction("Bakery", 8.0, Direction::Debit, date!(2024 - 01 - 12)),
            &conn,
        )
        .unwrap();
        let third = create_transaction(
            "alice",
            sample_transaction("Grocer", 30.0, Direction::Debit, date!(2024 - 01 - 10)),
            &conn,
        )
        .unwrap();

        let listed = list_transactions("alice", 0, 100, &conn).unwrap();

        // Newest date first, then insertion order for the tied date.
        assert_eq!(listed, vec![second, first, third]);
    }

    #[test]
    fn list_applies_skip_and_limit() {
        let conn = get_db_connection();
        for day in 1..=5 {
            let transaction_date = Date::from_calendar_date(2024, time::Month::March, day).unwrap();
            create_transaction(
                "alice",
                sample_transaction("Cafe", day as f64, Direction::Debit, transaction_date),
                &conn,
            )
            .unwrap();
        }

        let page = list_transactions("alice", 1, 2, &conn).unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].date, date!(2024 - 03 - 04));
        assert_eq!(page[1].date, date!(2024 - 03 - 03));
    }

    #[test]
    fn list_is_scoped_to_owner() {
        let conn = get_db_connection();
        create_transaction(
            "alice",
            sample_transaction("Cafe", 4.5, Direction::Debit, date!(2024 - 01 - 10)),
            &conn,
        )
        .unwrap();
        let bobs = create_transaction(
            "bob",
            sample_transaction("Cinema", 15.0, Direction::Debit, date!(2024 - 01 - 11)),
            &conn,
        )
        .unwrap();

        let listed = list_transactions("bob", 0, 100, &conn).unwrap();

        assert_eq!(listed, vec![bobs]);
    }

    #[test]
    fn query_applies_inclusive_date_bounds() {
        let conn = get_db_connection();
        let dates = [
            date!(2024 - 01 - 01),
            date!(2024 - 01 - 10),
            date!(2024 - 01 - 20),
            date!(2024 - 02 - 01),
        ];
        for transaction_date in dates {
            create_transaction(
                "alice",
                sample_transaction("Cafe", 5.0, Direction::Debit, transaction_date),
                &conn,
            )
            .unwrap();
        }

        let filter = DateRangeFilter {
            start_date: Some(date!(2024 - 01 - 10)),
            end_date: Some(date!(2024 - 01 - 20)),
        };
        let results = query_transactions("alice", filter, &conn).unwrap();

        let result_dates: Vec<Date> = results.iter().map(|t| t.date).collect();
        assert_eq!(result_dates, vec![date!(2024 - 01 - 20), date!(2024 - 01 - 10)]);
    }

    #[test]
    fn query_with_open_bounds_returns_everything() {
        let conn = get_db_connection();
        for transaction_date in [date!(2023 - 12 - 31), date!(2024 - 06 - 15)] {
            create_transaction(
                "alice",
                sample_transaction("Cafe", 5.0, Direction::Debit, transaction_date),
                &conn,
            )
            .unwrap();
        }

        let results = query_transactions("alice", DateRangeFilter::default(), &conn).unwrap();

        assert_eq!(results.len(), 2);
    }

    #[test]
    fn query_with_only_start_date_is_unbounded_above() {
        let conn = get_db_connection();
        for transaction_date in [date!(2024 - 01 - 01), date!(2024 - 06 - 15)] {
            create_transaction(
                "alice",
                sample_transaction("Cafe", 5.0, Direction::Debit, transaction_date),
                &conn,
            )
            .unwrap();
        }

        let filter = DateRangeFilter {
            start_date: Some(date!(2024 - 02 - 01)),
            end_date: None,
        };
        let results = query_transactions("alice", filter, &conn).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].date, date!(2024 - 06 - 15));
    }

    #[test]
    fn query_with_inverted_range_returns_empty_set() {
        let conn = get_db_connection();
        create_transaction(
            "alice",
            sample_transaction("Cafe", 5.0, Direction::Debit, date!(2024 - 01 - 10)),
            &conn,
        )
        .unwrap();

        let filter = DateRangeFilter {
            start_date: Some(date!(2024 - 02 - 01)),
            end_date: Some(date!(2024 - 01 - 01)),
        };
        let results = query_transactions("alice", filter, &conn).unwrap();

        assert!(results.is_empty());
    }

    #[test]
    fn query_is_scoped_to_owner() {
        let conn = get_db_connection();
        create_transaction(
            "alice",
            sample_transaction("Cafe", 5.0, Direction::Debit, date!(2024 - 01 - 10)),
            &conn,
        )
        .unwrap();

        let results = query_transactions("bob", DateRangeFilter::default(), &conn).unwrap();

        assert!(results.is_empty());
    }

    #[test]
    fn direction_parses_canonical_strings_only() {
        assert_eq!("Credit".parse::<Direction>().unwrap(), Direction::Credit);
        assert_eq!("Debit".parse::<Direction>().unwrap(), Direction::Debit);
        assert!("credit".parse::<Direction>().is_err());
        assert!("Withdrawal".parse::<Direction>().is_err());
    }
}
