//! The report endpoints: monthly summary, trend and spending per category.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::AuthenticatedUser,
    budget::{check_month, check_year, month_date_range},
    extract::ApiQuery,
    report::{
        CategorySpending, MonthlySummary, TrendBucket, months_before, monthly_trend,
        spending_by_category, summarize_month,
    },
    transaction::{TransactionType, get_transactions_in_date_range},
    validation::ValidationErrors,
};

/// The number of months in a trend when not specified.
pub const DEFAULT_TREND_MONTHS: i64 = 6;
/// The most months a trend may cover.
pub const MAX_TREND_MONTHS: i64 = 24;

/// The state needed for the report endpoints.
#[derive(Debug, Clone)]
pub struct ReportState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The month to summarize, the current month when not given.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub month: Option<i64>,
    pub year: Option<i64>,
}

/// How many months the trend should cover.
#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub months: Option<i64>,
}

/// The period and transaction type for the category breakdown.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpendingQuery {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
}

/// Total income, expenses and net amount for one month.
pub async fn get_summary_endpoint(
    State(state): State<ReportState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Result<Json<MonthlySummary>, Error> {
    let today = OffsetDateTime::now_utc().date();
    let month = query.month.unwrap_or(i64::from(u8::from(today.month())));
    let year = query.year.unwrap_or(i64::from(today.year()));

    let mut errors = ValidationErrors::new();
    check_month(&mut errors, month);
    check_year(&mut errors, year);
    errors.into_result()?;

    let (month, year) = (month as u8, year as i32);
    let (start, end) = month_date_range(month, year).ok_or_else(|| {
        let mut errors = ValidationErrors::new();
        errors.add("month", "Month must be between 1 and 12.");
        Error::Validation(errors)
    })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = get_transactions_in_date_range(user.user_id, start, end, &connection)?;

    Ok(Json(summarize_month(month, year, &transactions)))
}

/// Income and expenses per month for the last few months, oldest first.
pub async fn get_trend_endpoint(
    State(state): State<ReportState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<TrendQuery>,
) -> Result<Json<Vec<TrendBucket>>, Error> {
    let months = query.months.unwrap_or(DEFAULT_TREND_MONTHS);

    let mut errors = ValidationErrors::new();
    errors.check(
        !(1..=MAX_TREND_MONTHS).contains(&months),
        "months",
        format!("Months must be between 1 and {MAX_TREND_MONTHS}."),
    );
    errors.into_result()?;

    let months = months as u32;
    let today = OffsetDateTime::now_utc().date();
    let start = months_before(today, months - 1).ok_or(Error::MalformedRequest(
        "the trend start date is out of range".to_owned(),
    ))?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = get_transactions_in_date_range(user.user_id, start, today, &connection)?;

    Ok(Json(monthly_trend(today, months, &transactions)))
}

/// How much went through each category in a period, largest first.
///
/// Defaults to the expenses of the current month.
pub async fn get_category_spending_endpoint(
    State(state): State<ReportState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<CategorySpendingQuery>,
) -> Result<Json<Vec<CategorySpending>>, Error> {
    let today = OffsetDateTime::now_utc().date();
    let (month_start, month_end) = month_date_range(u8::from(today.month()), today.year())
        .ok_or(Error::MalformedRequest(
            "the current month is out of range".to_owned(),
        ))?;
    let start = query.start_date.unwrap_or(month_start);
    let end = query.end_date.unwrap_or(month_end);

    let mut errors = ValidationErrors::new();
    errors.check(
        start > end,
        "startDate",
        "Start date must not be after end date.",
    );
    errors.into_result()?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let transactions = get_transactions_in_date_range(user.user_id, start, end, &connection)?;
    let transaction_type = query.transaction_type.unwrap_or(TransactionType::Expense);

    Ok(Json(spending_by_category(&transactions, transaction_type)))
}
