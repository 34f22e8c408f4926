//! Core budget domain types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    database_id::{BudgetId, CategoryId},
    validation::{ValidationErrors, check_amount, round_to_cents},
};

/// The earliest year a budget may be set for.
pub const MIN_BUDGET_YEAR: i64 = 2000;
/// The latest year a budget may be set for.
pub const MAX_BUDGET_YEAR: i64 = 2100;

/// A limit on how much a user wants to spend in a category in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// How much the user plans to spend.
    pub amount: f64,
    /// How much the user has spent so far, the sum of matching expenses.
    pub spent_amount: f64,
    /// The month of the budget, 1 to 12.
    pub month: u8,
    /// The year of the budget.
    pub year: i32,
    /// The category the budget applies to.
    pub category_id: CategoryId,
    /// The name of the category.
    pub category_name: String,
    /// The colour of the category.
    pub category_color: String,
    /// The user that owns the budget.
    pub user_id: UserID,
    /// When the budget was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the budget was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Budget {
    /// How much is left to spend, negative when over budget.
    pub fn remaining_amount(&self) -> f64 {
        round_to_cents(self.amount - self.spent_amount)
    }

    /// The spent amount as a percentage of the budget amount, or zero for
    /// non-positive budget amounts.
    pub fn percentage_used(&self) -> f64 {
        if self.amount <= 0.0 {
            0.0
        } else {
            round_to_cents(self.spent_amount / self.amount * 100.0)
        }
    }
}

/// A budget plus the amounts derived from it, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetResponse {
    #[serde(flatten)]
    pub budget: Budget,
    pub remaining_amount: f64,
    pub percentage_used: f64,
}

impl From<Budget> for BudgetResponse {
    fn from(budget: Budget) -> Self {
        Self {
            remaining_amount: budget.remaining_amount(),
            percentage_used: budget.percentage_used(),
            budget,
        }
    }
}

/// The request body for creating or updating a budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetForm {
    pub amount: f64,
    pub category_id: CategoryId,
    pub month: i64,
    pub year: i64,
}

/// A budget that has passed validation and is ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetData {
    /// The amount rounded to cents.
    pub amount: f64,
    /// The category the budget applies to.
    pub category_id: CategoryId,
    /// The month of the budget, 1 to 12.
    pub month: u8,
    /// The year of the budget.
    pub year: i32,
}

impl BudgetForm {
    /// Check the form and convert it into [BudgetData].
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] listing every field that failed.
    pub fn validate(self) -> Result<BudgetData, Error> {
        let mut errors = ValidationErrors::new();

        check_amount(&mut errors, "amount", self.amount);
        check_month(&mut errors, self.month);
        check_year(&mut errors, self.year);
        errors.check(
            self.category_id <= 0,
            "categoryId",
            "Category is required.",
        );

        errors.into_result()?;

        Ok(BudgetData {
            amount: round_to_cents(self.amount),
            category_id: self.category_id,
            // Both are in range after validation.
            month: self.month as u8,
            year: self.year as i32,
        })
    }
}

/// Optional month and year filters for listing budgets.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BudgetQuery {
    pub month: Option<i64>,
    pub year: Option<i64>,
}

impl BudgetQuery {
    /// Check the filters and narrow them to the stored types.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] if the month or year is out of range.
    pub fn validate(self) -> Result<(Option<u8>, Option<i32>), Error> {
        let mut errors = ValidationErrors::new();

        if let Some(month) = self.month {
            check_month(&mut errors, month);
        }

        if let Some(year) = self.year {
            check_year(&mut errors, year);
        }

        errors.into_result()?;

        Ok((
            self.month.map(|month| month as u8),
            self.year.map(|year| year as i32),
        ))
    }
}

/// Check that `month` is between 1 and 12.
pub fn check_month(errors: &mut ValidationErrors, month: i64) {
    errors.check(
        !(1..=12).contains(&month),
        "month",
        "Month must be between 1 and 12.",
    );
}

/// Check that `year` is between [MIN_BUDGET_YEAR] and [MAX_BUDGET_YEAR].
pub fn check_year(errors: &mut ValidationErrors, year: i64) {
    errors.check(
        !(MIN_BUDGET_YEAR..=MAX_BUDGET_YEAR).contains(&year),
        "year",
        format!("Year must be between {MIN_BUDGET_YEAR} and {MAX_BUDGET_YEAR}."),
    );
}
