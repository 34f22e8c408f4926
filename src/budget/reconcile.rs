//! Keeps the spent amount of budgets in step with expense transactions.
//!
//! The spent amount of a budget is the sum of the user's expenses in the
//! budget's category and month. It is updated incrementally as transactions
//! are created, changed and deleted, and recomputed from scratch when a budget
//! is created or moved to another category or month.

use rusqlite::Connection;
use time::{Date, Month, OffsetDateTime};

use crate::{
    Error,
    auth::UserID,
    database_id::{BudgetId, CategoryId},
    transaction::TransactionType,
};

/// The part of a transaction that counts towards a budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetImpact {
    /// The category of the expense.
    pub category_id: CategoryId,
    /// When the expense happened, which picks the budget month.
    pub date: Date,
    /// The amount spent.
    pub amount: f64,
}

impl BudgetImpact {
    /// The impact of a transaction on budgets, `None` for income.
    pub fn of(
        transaction_type: TransactionType,
        category_id: CategoryId,
        date: Date,
        amount: f64,
    ) -> Option<Self> {
        match transaction_type {
            TransactionType::Expense => Some(Self {
                category_id,
                date,
                amount,
            }),
            TransactionType::Income => None,
        }
    }
}

/// Add an expense to the budget for its category and month, if there is one.
pub fn apply_budget_impact(
    user_id: UserID,
    impact: &BudgetImpact,
    connection: &Connection,
) -> Result<(), Error> {
    adjust_spent_amount(user_id, impact, impact.amount, connection)
}

/// Remove an expense from the budget for its category and month, if there is one.
pub fn revert_budget_impact(
    user_id: UserID,
    impact: &BudgetImpact,
    connection: &Connection,
) -> Result<(), Error> {
    adjust_spent_amount(user_id, impact, -impact.amount, connection)
}

fn adjust_spent_amount(
    user_id: UserID,
    impact: &BudgetImpact,
    delta: f64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE budget SET spent_amount = ROUND(spent_amount + ?1, 2), updated_at = ?2
         WHERE user_id = ?3 AND category_id = ?4 AND month = ?5 AND year = ?6",
        (
            delta,
            OffsetDateTime::now_utc(),
            user_id.as_i64(),
            impact.category_id,
            u8::from(impact.date.month()),
            impact.date.year(),
        ),
    )?;

    if rows_affected > 0 {
        tracing::debug!(
            "adjusted budget for category {} in {}/{} by {delta}",
            impact.category_id,
            u8::from(impact.date.month()),
            impact.date.year()
        );
    }

    Ok(())
}

/// The first and last day of a month, `None` if the month or year is out of range.
pub fn month_date_range(month: u8, year: i32) -> Option<(Date, Date)> {
    let month = Month::try_from(month).ok()?;
    let start = Date::from_calendar_date(year, month, 1).ok()?;
    let next_month_start = match month {
        Month::December => Date::from_calendar_date(year.checked_add(1)?, Month::January, 1),
        month => Date::from_calendar_date(year, month.next(), 1),
    }
    .ok()?;

    Some((start, next_month_start.previous_day()?))
}

/// Sum the user's expenses in a category and month.
pub fn sum_expenses(
    user_id: UserID,
    category_id: CategoryId,
    month: u8,
    year: i32,
    connection: &Connection,
) -> Result<f64, Error> {
    let Some((start, end)) = month_date_range(month, year) else {
        return Ok(0.0);
    };

    connection
        .query_row(
            "SELECT ROUND(COALESCE(SUM(amount), 0), 2) FROM \"transaction\"
             WHERE user_id = ?1 AND category_id = ?2 AND type = ?3 AND date BETWEEN ?4 AND ?5",
            (
                user_id.as_i64(),
                category_id,
                TransactionType::Expense,
                start,
                end,
            ),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Set the spent amount of a budget to the sum of the matching expenses.
///
/// Returns the new spent amount.
pub fn recompute_spent_amount(
    budget_id: BudgetId,
    user_id: UserID,
    connection: &Connection,
) -> Result<f64, Error> {
    let (category_id, month, year): (CategoryId, u8, i32) = connection
        .query_row(
            "SELECT category_id, month, year FROM budget WHERE id = ?1 AND user_id = ?2",
            (budget_id, user_id.as_i64()),
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::BudgetNotFound(budget_id),
            error => error.into(),
        })?;

    let spent_amount = sum_expenses(user_id, category_id, month, year, connection)?;

    connection.execute(
        "UPDATE budget SET spent_amount = ?1, updated_at = ?2 WHERE id = ?3",
        (spent_amount, OffsetDateTime::now_utc(), budget_id),
    )?;

    Ok(spent_amount)
}
