//! Monthly spending limits per category and the bookkeeping that keeps their
//! spent amounts in step with expenses.

mod create;
mod db;
mod delete;
mod domain;
mod edit;
mod list;
mod reconcile;

pub use create::create_budget_endpoint;
pub use db::{
    create_budget, create_budget_table, delete_budget, get_budget, get_budgets, update_budget,
};
pub use delete::delete_budget_endpoint;
pub use domain::{
    Budget, BudgetData, BudgetForm, BudgetQuery, BudgetResponse, MAX_BUDGET_YEAR, MIN_BUDGET_YEAR,
    check_month, check_year,
};
pub use edit::update_budget_endpoint;
pub use list::{get_budget_endpoint, list_budgets_endpoint};
pub use reconcile::{
    BudgetImpact, apply_budget_impact, month_date_range, recompute_spent_amount,
    revert_budget_impact, sum_expenses,
};
