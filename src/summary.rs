//! Summary computation over a user's transactions.
//!
//! Provides a pure reduction over a slice of transactions producing income
//! and expense totals, a per-category expense breakdown, month-by-month
//! trends, and the largest transactions, plus the route handler that serves
//! the result.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::{
    Error,
    auth::{Claims, resolve_subject},
    state::TransactionState,
    transaction::{DateRangeFilter, Direction, Transaction, query_transactions},
};

/// The number of top transactions included in a summary when the client does
/// not ask for a specific count.
pub const DEFAULT_TOP_COUNT: usize = 5;

// ============================================================================
// MODELS
// ============================================================================

/// The total amount spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// The category label.
    pub category: String,
    /// The summed amount of the category's debit transactions.
    pub amount: f64,
}

/// The income and expenses recorded for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// The full English month name, e.g. "January".
    ///
    /// The year is not part of the key, so a date range spanning multiple
    /// years folds the same month of each year into one bucket.
    pub month: String,
    /// The summed amount of the month's credit transactions.
    pub income: f64,
    /// The summed amount of the month's debit transactions.
    pub expense: f64,
}

/// A projection of a transaction for the top-transactions list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTransaction {
    /// The name of the counterparty.
    pub name: String,
    /// The amount of money spent or earned.
    pub amount: f64,
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub direction: Direction,
    /// The category label.
    pub category: String,
    /// When the transaction happened.
    pub date: Date,
}

impl From<&Transaction> for TopTransaction {
    fn from(transaction: &Transaction) -> Self {
        Self {
            name: transaction.name.clone(),
            amount: transaction.amount,
            direction: transaction.direction,
            category: transaction.category.clone(),
            date: transaction.date,
        }
    }
}

/// An aggregate view over a set of transactions.
///
/// Computed fresh per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The summed amount of all credit transactions.
    pub total_income: f64,
    /// The summed amount of all debit transactions.
    pub total_expense: f64,
    /// `total_income - total_expense`.
    pub net_balance: f64,
    /// Expense totals per category, in first-seen order.
    pub category_breakdown: Vec<CategoryTotal>,
    /// Income and expense totals per month, in first-seen order.
    pub monthly_trends: Vec<MonthlyTrend>,
    /// The largest transactions by amount.
    pub top_transactions: Vec<TopTransaction>,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The query parameters accepted by the summary endpoint.
#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    /// Only include transactions dated on or after this date.
    pub start_date: Option<Date>,
    /// Only include transactions dated on or before this date.
    pub end_date: Option<Date>,
    /// How many of the largest transactions to include.
    #[serde(default = "default_top_count")]
    pub top_count: usize,
}

fn default_top_count() -> usize {
    DEFAULT_TOP_COUNT
}

/// A route handler for summarizing the caller's transactions.
///
/// The optional date range restricts every part of the summary to the same
/// filtered set. A start date after the end date yields an empty summary,
/// not an error.
///
/// # Errors
///
/// This function will return an error if the token is invalid or the
/// database could not be accessed.
pub async fn get_summary_endpoint(
    State(state): State<TransactionState>,
    claims: Claims,
    Query(params): Query<SummaryParams>,
) -> Result<Json<Summary>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let user = resolve_subject(&claims, &connection)?;

    let filter = DateRangeFilter {
        start_date: params.start_date,
        end_date: params.end_date,
    };
    let transactions = query_transactions(&user.username, filter, &connection)?;

    Ok(Json(compute_summary(&transactions, params.top_count)))
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Reduce `transactions` to an aggregate [Summary].
///
/// This is a pure function: the output depends only on the input slice.
/// Grouped outputs (categories and months) appear in first-seen order, and
/// `top_count` larger than the slice simply returns every transaction.
pub fn compute_summary(transactions: &[Transaction], top_count: usize) -> Summary {
    let total_income = sum_amounts(transactions, Direction::Credit);
    let total_expense = sum_amounts(transactions, Direction::Debit);

    Summary {
        total_income,
        total_expense,
        net_balance: total_income - total_expense,
        category_breakdown: expense_breakdown_by_category(transactions),
        monthly_trends: trends_by_month(transactions),
        top_transactions: top_transactions_by_amount(transactions, top_count),
    }
}

fn sum_amounts(transactions: &[Transaction], direction: Direction) -> f64 {
    transactions
        .iter()
        .filter(|transaction| transaction.direction == direction)
        .map(|transaction| transaction.amount)
        .sum()
}

/// Groups debit transactions by category and sums the amount per group.
///
/// Credit transactions do not contribute. Categories appear in the order
/// they are first seen in `transactions`.
fn expense_breakdown_by_category(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut breakdown: Vec<CategoryTotal> = Vec::new();
    let mut index_by_category: HashMap<&str, usize> = HashMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.direction == Direction::Debit)
    {
        match index_by_category.get(transaction.category.as_str()) {
            Some(&index) => breakdown[index].amount += transaction.amount,
            None => {
                index_by_category.insert(&transaction.category, breakdown.len());
                breakdown.push(CategoryTotal {
                    category: transaction.category.clone(),
                    amount: transaction.amount,
                });
            }
        }
    }

    breakdown
}

/// Accumulates income and expense per calendar month name.
///
/// Months appear in the order they are first seen in `transactions`. The
/// bucket key is the month name only, so the same month of different years
/// shares one bucket.
fn trends_by_month(transactions: &[Transaction]) -> Vec<MonthlyTrend> {
    let mut trends: Vec<MonthlyTrend> = Vec::new();
    let mut index_by_month: HashMap<&'static str, usize> = HashMap::new();

    for transaction in transactions {
        let month = month_name(transaction.date.month());
        let index = *index_by_month.entry(month).or_insert_with(|| {
            trends.push(MonthlyTrend {
                month: month.to_owned(),
                income: 0.0,
                expense: 0.0,
            });
            trends.len() - 1
        });

        match transaction.direction {
            Direction::Credit => trends[index].income += transaction.amount,
            Direction::Debit => trends[index].expense += transaction.amount,
        }
    }

    trends
}

/// The full English name for `month`.
fn month_name(month: Month) -> &'static str {
    match month {
        Month::January => "January",
        Month::February => "February",
        Month::March => "March",
        Month::April => "April",
        Month::May => "May",
        Month::June => "June",
        Month::July => "July",
        Month::August => "August",
        Month::September => "September",
        Month::October => "October",
        Month::November => "November",
        Month::December => "December",
    }
}

/// Selects the `top_count` transactions with the largest amounts.
///
/// The sort is stable, so transactions with equal amounts keep the order
/// they arrived in.
fn top_transactions_by_amount(
    transactions: &[Transaction],
    top_count: usize,
) -> Vec<TopTransaction> {
    let mut by_amount: Vec<&Transaction> = transactions.iter().collect();
    by_amount.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    by_amount.truncate(top_count);

    by_amount.into_iter().map(TopTransaction::from).collect()
}
