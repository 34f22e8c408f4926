//! Per-field validation of request payloads.
//!
//! Validators collect every failing rule instead of stopping at the first one,
//! so that the client can show all of the problems with a form at once.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::Error;

/// The failed validation rules of a request, keyed by the (camelCase) field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    /// Create an empty set of errors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `field` failed a rule.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    /// Record `message` against `field` when `failed` is true.
    pub fn check(&mut self, failed: bool, field: &str, message: impl Into<String>) {
        if failed {
            self.add(field, message);
        }
    }

    /// Whether no rule has failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The messages recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// The messages for every field.
    pub fn as_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    /// Convert into a result, returning [Error::Validation] if any rule failed.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

/// Check that `value` is not blank and at most `max_length` characters.
pub fn check_required_text(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: &str,
    max_length: usize,
) {
    if value.trim().is_empty() {
        errors.add(field, format!("{label} is required."));
    } else {
        check_max_length(errors, field, label, value, max_length);
    }
}

/// Check that `value` is at most `max_length` characters.
pub fn check_max_length(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: &str,
    max_length: usize,
) {
    errors.check(
        value.chars().count() > max_length,
        field,
        format!("{label} must not exceed {max_length} characters."),
    );
}

/// The largest amount of money accepted for transactions and budgets.
pub const MAX_AMOUNT: f64 = 1_000_000_000.0;

/// Check that `amount` is finite, at least one cent once rounded and no larger than [MAX_AMOUNT].
pub fn check_amount(errors: &mut ValidationErrors, field: &str, amount: f64) {
    if !amount.is_finite() || round_to_cents(amount) < 0.01 {
        errors.add(field, "Amount must be greater than zero.");
    } else if amount > MAX_AMOUNT {
        errors.add(field, "Amount must not exceed 1,000,000,000.");
    }
}

/// Round a monetary amount to whole cents.
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod validation_errors_tests {
    use crate::{Error, validation::ValidationErrors};

    use super::{check_amount, check_required_text, round_to_cents};

    #[test]
    fn empty_errors_are_ok() {
        assert_eq!(ValidationErrors::new().into_result(), Ok(()));
    }

    #[test]
    fn errors_are_grouped_by_field() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "first");
        errors.add("name", "second");
        errors.add("color", "third");

        assert_eq!(
            errors.get("name"),
            Some(["first".to_owned(), "second".to_owned()].as_slice())
        );
        assert_eq!(errors.get("color"), Some(["third".to_owned()].as_slice()));
        assert!(matches!(errors.into_result(), Err(Error::Validation(_))));
    }

    #[test]
    fn required_text_rejects_whitespace() {
        let mut errors = ValidationErrors::new();

        check_required_text(&mut errors, "name", "Name", " \t\n", 50);

        assert_eq!(
            errors.get("name"),
            Some(["Name is required.".to_owned()].as_slice())
        );
    }

    #[test]
    fn required_text_counts_characters_not_bytes() {
        let mut errors = ValidationErrors::new();

        check_required_text(&mut errors, "name", "Name", &"🔥".repeat(50), 50);

        assert!(errors.is_empty());
    }

    #[test]
    fn amount_must_be_positive_and_bounded() {
        for bad_amount in [
            0.0,
            -1.0,
            0.004,
            f64::NAN,
            f64::INFINITY,
            1_000_000_000.01,
        ] {
            let mut errors = ValidationErrors::new();
            check_amount(&mut errors, "amount", bad_amount);
            assert!(!errors.is_empty(), "{bad_amount} should be rejected");
        }

        for good_amount in [0.005, 0.01, 1_000_000_000.0] {
            let mut errors = ValidationErrors::new();
            check_amount(&mut errors, "amount", good_amount);
            assert!(errors.is_empty(), "{good_amount} should be accepted");
        }
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_to_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_to_cents(10.005_1), 10.01);
    }
}
