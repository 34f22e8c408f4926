//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/categories/{category_id}', use [format_endpoint].

/// The route for checking that the server is up.
pub const HEALTH: &str = "/api/health";

/// The route for registering a new user.
pub const REGISTER: &str = "/api/auth/register";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/auth/login";
/// The route for getting the user that owns the bearer token.
pub const CURRENT_USER: &str = "/api/auth/me";

/// The route to list and create categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to get, update and delete a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route to get, update and delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route for the income/expense summary of a single month.
pub const TRANSACTION_SUMMARY: &str = "/api/transactions/summary";
/// The route for income and expenses bucketed by month.
pub const TRANSACTION_TREND: &str = "/api/transactions/trend";
/// The route for the per-category spending breakdown.
pub const CATEGORY_SPENDING: &str = "/api/transactions/category-spending";

/// The route to list and create budgets.
pub const BUDGETS: &str = "/api/budgets";
/// The route to get, update and delete a single budget.
pub const BUDGET: &str = "/api/budgets/{budget_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// Only the first parameter is replaced. If there is no parameter, the path is returned as is.
///
/// # Examples
///
/// ```
/// use finance_tracker::endpoints::{CATEGORY, format_endpoint};
///
/// assert_eq!(format_endpoint(CATEGORY, 42), "/api/categories/42");
/// ```
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know the formatted endpoints are valid URIs.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::HEALTH);
        assert_endpoint_is_valid_uri(endpoints::REGISTER);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN);
        assert_endpoint_is_valid_uri(endpoints::CURRENT_USER);
        assert_endpoint_is_valid_uri(endpoints::CATEGORIES);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::CATEGORY, 1));
        assert_endpoint_is_valid_uri(endpoints::TRANSACTIONS);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::TRANSACTION, 1));
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION_SUMMARY);
        assert_endpoint_is_valid_uri(endpoints::TRANSACTION_TREND);
        assert_endpoint_is_valid_uri(endpoints::CATEGORY_SPENDING);
        assert_endpoint_is_valid_uri(endpoints::BUDGETS);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::BUDGET, 1));
    }

    #[test]
    fn format_endpoint_replaces_parameter() {
        assert_eq!(
            format_endpoint(endpoints::TRANSACTION, 123),
            "/api/transactions/123"
        );
    }

    #[test]
    fn format_endpoint_without_parameter_is_unchanged() {
        assert_eq!(
            format_endpoint(endpoints::BUDGETS, 123),
            endpoints::BUDGETS
        );
    }
}
