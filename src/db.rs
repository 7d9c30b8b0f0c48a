//! Database schema creation.

use rusqlite::Connection;

use crate::{transaction::create_transaction_table, user::create_user_table};

/// Create the application's tables if they do not already exist.
///
/// # Errors
///
/// This function will return an error if any SQL query failed.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    create_user_table(&sql_transaction)?;
    create_transaction_table(&sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::db::initialize;

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).expect("First initialization failed");
        initialize(&connection).expect("Second initialization failed");
    }
}
