//! Defines the core data models for transactions.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    auth::UserID,
    database_id::{CategoryId, TransactionId},
    validation::{ValidationErrors, check_amount, check_required_text, round_to_cents},
};

/// The most characters a transaction description may have.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Money earned, e.g. wages.
    Income,
    /// Money spent. Expenses count towards budgets.
    Expense,
}

impl TransactionType {
    /// The name stored in the database and used in JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Expense => "Expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Income" => Ok(TransactionType::Income),
            "Expense" => Ok(TransactionType::Expense),
            other => Err(FromSqlError::Other(
                format!("invalid transaction type \"{other}\"").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
    /// Whether money was earned or spent.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The category of the transaction.
    pub category_id: CategoryId,
    /// The name of the category of the transaction.
    pub category_name: String,
    /// The colour of the category of the transaction.
    pub category_color: String,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The request body for creating or updating a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionForm {
    pub amount: f64,
    pub description: String,
    pub date: Date,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category_id: CategoryId,
}

/// A transaction that has passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionData {
    /// The amount rounded to cents.
    pub amount: f64,
    /// The trimmed description.
    pub description: String,
    /// When the transaction happened, no later than today.
    pub date: Date,
    /// Whether money was earned or spent.
    pub transaction_type: TransactionType,
    /// The category of the transaction.
    pub category_id: CategoryId,
}

impl TransactionForm {
    /// Check the form and convert it into [TransactionData].
    ///
    /// Transactions record events that have already happened, so dates after
    /// `today` are rejected.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] listing every field that failed.
    pub fn validate(self, today: Date) -> Result<TransactionData, Error> {
        let mut errors = ValidationErrors::new();

        check_amount(&mut errors, "amount", self.amount);
        check_required_text(
            &mut errors,
            "description",
            "Description",
            &self.description,
            MAX_DESCRIPTION_LENGTH,
        );
        errors.check(
            self.date > today,
            "date",
            "Date cannot be in the future.",
        );
        errors.check(
            self.category_id <= 0,
            "categoryId",
            "Category is required.",
        );

        errors.into_result()?;

        Ok(TransactionData {
            amount: round_to_cents(self.amount),
            description: self.description.trim().to_owned(),
            date: self.date,
            transaction_type: self.transaction_type,
            category_id: self.category_id,
        })
    }
}

/// The filters and page for listing transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub category_id: Option<CategoryId>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub search: Option<String>,
}

/// The validated filters for listing transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Only include transactions on or after this date.
    pub start_date: Option<Date>,
    /// Only include transactions on or before this date.
    pub end_date: Option<Date>,
    /// Only include transactions in this category.
    pub category_id: Option<CategoryId>,
    /// Only include income or only include expenses.
    pub transaction_type: Option<TransactionType>,
    /// Only include transactions whose description contains this text, ignoring case.
    pub search: Option<String>,
}

impl TransactionQuery {
    /// Extract the filters from the query.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] if the start date is after the end date.
    pub fn filter(&self) -> Result<TransactionFilter, Error> {
        let mut errors = ValidationErrors::new();

        if let (Some(start_date), Some(end_date)) = (self.start_date, self.end_date) {
            errors.check(
                start_date > end_date,
                "startDate",
                "Start date must not be after end date.",
            );
        }

        errors.into_result()?;

        Ok(TransactionFilter {
            start_date: self.start_date,
            end_date: self.end_date,
            category_id: self.category_id,
            transaction_type: self.transaction_type,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|search| !search.is_empty())
                .map(str::to_owned),
        })
    }
}
