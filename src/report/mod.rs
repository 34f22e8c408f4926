//! Reports over a user's transactions.

mod aggregation;
mod endpoints;

pub use aggregation::{
    CategorySpending, MonthlySummary, TrendBucket, months_before, monthly_trend,
    spending_by_category, summarize_month,
};
pub use endpoints::{
    get_category_spending_endpoint, get_summary_endpoint, get_trend_endpoint,
};
