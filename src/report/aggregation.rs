//! Sums and groupings of transactions for the report endpoints.
//!
//! These functions work on transactions already loaded for a date range and
//! do not touch the database.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::{
    database_id::CategoryId,
    transaction::{Transaction, TransactionType},
    validation::round_to_cents,
};

/// Income and expense totals for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: u8,
    pub year: i32,
    pub total_income: f64,
    pub total_expenses: f64,
    /// Income minus expenses.
    pub net_amount: f64,
    pub transaction_count: usize,
}

/// Income and expense totals for one month of a trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    pub year: i32,
    pub month: u8,
    /// The month and year for display, e.g. "Jan 2025".
    pub label: String,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
}

/// How much went through one category in a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpending {
    pub category_id: CategoryId,
    pub category_name: String,
    pub color: String,
    pub amount: f64,
    pub transaction_count: usize,
    /// The share of the period total, 0 to 100.
    pub percentage: f64,
}

/// Total the income and expenses of `transactions`.
///
/// The caller is expected to pass only the transactions of the given month.
pub fn summarize_month(month: u8, year: i32, transactions: &[Transaction]) -> MonthlySummary {
    let (income, expenses) = sum_by_type(transactions.iter());

    MonthlySummary {
        month,
        year,
        total_income: income,
        total_expenses: expenses,
        net_amount: round_to_cents(income - expenses),
        transaction_count: transactions.len(),
    }
}

/// The first day of the month `months_back` months before `date`'s month.
pub fn months_before(date: Date, months_back: u32) -> Option<Date> {
    let index = date.year() * 12 + i32::from(u8::from(date.month())) - 1;
    let target = index.checked_sub(i32::try_from(months_back).ok()?)?;
    let year = target.div_euclid(12);
    let month = Month::try_from(u8::try_from(target.rem_euclid(12) + 1).ok()?).ok()?;

    Date::from_calendar_date(year, month, 1).ok()
}

/// Bucket `transactions` by calendar month.
///
/// There is one bucket for each of the `months` months ending with the month
/// of `today`, oldest first. Months without transactions have zero totals.
pub fn monthly_trend(today: Date, months: u32, transactions: &[Transaction]) -> Vec<TrendBucket> {
    let mut by_month: HashMap<(i32, Month), Vec<&Transaction>> = HashMap::new();

    for transaction in transactions {
        by_month
            .entry((transaction.date.year(), transaction.date.month()))
            .or_default()
            .push(transaction);
    }

    (0..months)
        .rev()
        .filter_map(|months_back| months_before(today, months_back))
        .map(|month_start| {
            let in_month = by_month
                .get(&(month_start.year(), month_start.month()))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let (income, expenses) = sum_by_type(in_month.iter().copied());

            TrendBucket {
                year: month_start.year(),
                month: u8::from(month_start.month()),
                label: format!("{} {}", month_abbreviation(month_start.month()), month_start.year()),
                income,
                expenses,
                net: round_to_cents(income - expenses),
            }
        })
        .collect()
}

/// Group the transactions of one type by category, largest amount first.
pub fn spending_by_category(
    transactions: &[Transaction],
    transaction_type: TransactionType,
) -> Vec<CategorySpending> {
    let mut by_category: HashMap<CategoryId, CategorySpending> = HashMap::new();
    let mut total = 0.0;

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.transaction_type == transaction_type)
    {
        total += transaction.amount;

        let entry = by_category
            .entry(transaction.category_id)
            .or_insert_with(|| CategorySpending {
                category_id: transaction.category_id,
                category_name: transaction.category_name.clone(),
                color: transaction.category_color.clone(),
                amount: 0.0,
                transaction_count: 0,
                percentage: 0.0,
            });
        entry.amount += transaction.amount;
        entry.transaction_count += 1;
    }

    let mut spending: Vec<CategorySpending> = by_category
        .into_values()
        .map(|mut category| {
            category.percentage = if total > 0.0 {
                round_to_cents(category.amount / total * 100.0)
            } else {
                0.0
            };
            category.amount = round_to_cents(category.amount);
            category
        })
        .collect();

    spending.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category_name.cmp(&b.category_name))
    });

    spending
}

fn sum_by_type<'a>(transactions: impl Iterator<Item = &'a Transaction>) -> (f64, f64) {
    let (income, expenses) =
        transactions.fold((0.0, 0.0), |(income, expenses), transaction| {
            match transaction.transaction_type {
                TransactionType::Income => (income + transaction.amount, expenses),
                TransactionType::Expense => (income, expenses + transaction.amount),
            }
        });

    (round_to_cents(income), round_to_cents(expenses))
}

fn month_abbreviation(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

#[cfg(test)]
mod aggregation_tests {
    use time::{Date, OffsetDateTime, macros::date};

    use crate::{
        auth::UserID,
        transaction::{Transaction, TransactionType},
    };

    use super::{months_before, monthly_trend, spending_by_category, summarize_month};

    fn transaction(
        amount: f64,
        date: Date,
        transaction_type: TransactionType,
        category: (i64, &str),
    ) -> Transaction {
        let now = OffsetDateTime::now_utc();

        Transaction {
            id: 0,
            amount,
            description: String::new(),
            date,
            transaction_type,
            category_id: category.0,
            category_name: category.1.to_owned(),
            category_color: "#000000".to_owned(),
            user_id: UserID::new(1),
            created_at: now,
            updated_at: now,
        }
    }

    const FOOD: (i64, &str) = (1, "Food");
    const RENT: (i64, &str) = (2, "Rent");
    const PAY: (i64, &str) = (3, "Salary");

    #[test]
    fn summary_nets_income_and_expenses() {
        let transactions = [
            transaction(1000.0, date!(2025 - 03 - 01), TransactionType::Income, PAY),
            transaction(0.1, date!(2025 - 03 - 02), TransactionType::Expense, FOOD),
            transaction(0.2, date!(2025 - 03 - 03), TransactionType::Expense, FOOD),
        ];

        let summary = summarize_month(3, 2025, &transactions);

        assert_eq!(summary.total_income, 1000.0);
        assert_eq!(summary.total_expenses, 0.3);
        assert_eq!(summary.net_amount, 999.7);
        assert_eq!(summary.transaction_count, 3);
    }

    #[test]
    fn summary_of_empty_month_is_zero() {
        let summary = summarize_month(2, 2024, &[]);

        assert_eq!(summary.total_income, 0.0);
        assert_eq!(summary.total_expenses, 0.0);
        assert_eq!(summary.net_amount, 0.0);
        assert_eq!(summary.transaction_count, 0);
    }

    #[test]
    fn months_before_crosses_years() {
        assert_eq!(
            months_before(date!(2025 - 02 - 15), 0),
            Some(date!(2025 - 02 - 01))
        );
        assert_eq!(
            months_before(date!(2025 - 02 - 15), 2),
            Some(date!(2024 - 12 - 01))
        );
        assert_eq!(
            months_before(date!(2025 - 02 - 15), 14),
            Some(date!(2023 - 12 - 01))
        );
    }

    #[test]
    fn trend_fills_empty_months() {
        let transactions = [
            transaction(500.0, date!(2024 - 12 - 20), TransactionType::Income, PAY),
            transaction(120.0, date!(2024 - 12 - 21), TransactionType::Expense, RENT),
            transaction(30.0, date!(2025 - 02 - 01), TransactionType::Expense, FOOD),
        ];

        let trend = monthly_trend(date!(2025 - 02 - 10), 3, &transactions);

        let labels: Vec<&str> = trend.iter().map(|bucket| bucket.label.as_str()).collect();
        assert_eq!(labels, vec!["Dec 2024", "Jan 2025", "Feb 2025"]);
        assert_eq!((trend[0].income, trend[0].expenses, trend[0].net), (500.0, 120.0, 380.0));
        assert_eq!((trend[1].income, trend[1].expenses, trend[1].net), (0.0, 0.0, 0.0));
        assert_eq!((trend[2].income, trend[2].expenses, trend[2].net), (0.0, 30.0, -30.0));
        assert_eq!((trend[2].year, trend[2].month), (2025, 2));
    }

    #[test]
    fn category_spending_is_sorted_with_percentages() {
        let transactions = [
            transaction(25.0, date!(2025 - 03 - 01), TransactionType::Expense, FOOD),
            transaction(50.0, date!(2025 - 03 - 02), TransactionType::Expense, FOOD),
            transaction(225.0, date!(2025 - 03 - 03), TransactionType::Expense, RENT),
            transaction(1000.0, date!(2025 - 03 - 04), TransactionType::Income, PAY),
        ];

        let spending = spending_by_category(&transactions, TransactionType::Expense);

        assert_eq!(spending.len(), 2);
        assert_eq!(spending[0].category_name, "Rent");
        assert_eq!(spending[0].amount, 225.0);
        assert_eq!(spending[0].percentage, 75.0);
        assert_eq!(spending[1].category_name, "Food");
        assert_eq!(spending[1].transaction_count, 2);
        assert_eq!(spending[1].percentage, 25.0);
    }

    #[test]
    fn category_spending_of_nothing_is_empty() {
        let transactions = [transaction(
            1000.0,
            date!(2025 - 03 - 04),
            TransactionType::Income,
            PAY,
        )];

        assert!(spending_by_category(&transactions, TransactionType::Expense).is_empty());
    }
}
