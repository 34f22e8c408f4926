//! This file defines types that handle password validation and hashing.
//! `ValidatedPassword` wraps a string and ensure it meets the password policy.
//! `PasswordHash` converts a `ValidatedPassword` into a salted and hashed password.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};

use crate::{Error, validation::ValidationErrors};

/// The fewest characters a password may have.
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// The most characters a password may have.
pub const MAX_PASSWORD_LENGTH: usize = 100;

/// Check `raw_password` against the password policy and record any failures against `field`.
///
/// A password must be 8 to 100 characters long and contain at least one
/// upper-case letter, one lower-case letter and one digit.
pub fn check_password(errors: &mut ValidationErrors, field: &str, raw_password: &str) {
    if raw_password.is_empty() {
        errors.add(field, "Password is required.");
        return;
    }

    let length = raw_password.chars().count();

    errors.check(
        length < MIN_PASSWORD_LENGTH,
        field,
        format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long."),
    );
    errors.check(
        length > MAX_PASSWORD_LENGTH,
        field,
        format!("Password must not exceed {MAX_PASSWORD_LENGTH} characters."),
    );
    errors.check(
        !raw_password.chars().any(char::is_uppercase),
        field,
        "Password must contain at least one upper-case letter.",
    );
    errors.check(
        !raw_password.chars().any(char::is_lowercase),
        field,
        "Password must contain at least one lower-case letter.",
    );
    errors.check(
        !raw_password.chars().any(|c| c.is_ascii_digit()),
        field,
        "Password must contain at least one digit.",
    );
}

/// A password that has been validated, but not yet hashed.
///
/// This struct can be used to construct a [PasswordHash].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Create and validate a new password from a string.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] listing every rule of the password policy the password breaks.
    pub fn new(raw_password_string: &str) -> Result<Self, Error> {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "password", raw_password_string);
        errors.into_result()?;

        Ok(Self(raw_password_string.to_owned()))
    }

    /// Create a new `ValidatedPassword` without any validation.
    ///
    /// The caller should ensure that `raw_password_string` meets the password policy.
    pub fn new_unchecked(raw_password_string: &str) -> Self {
        Self(raw_password_string.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Create a hashed password from a validated password with the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed to verify a password.
    /// A value of at least 12 is recommended. Pass in [PasswordHash::DEFAULT_COST] to use the recommended cost.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        match hash(&password.0, cost) {
            Ok(password_hash) => Ok(Self(password_hash)),
            Err(e) => Err(Error::HashingError(e.to_string())),
        }
    }

    /// Create a new `PasswordHash` without any validation.
    ///
    /// The caller should ensure that `raw_password_hash` is a valid password hash.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}


#[cfg(test)]
mod password_hash_tests {
    use crate::auth::{PasswordHash, ValidatedPassword};

    #[test]
    fn verify_password_succeeds_for_valid_password() {
        let password = "Okaythen123";
        let hash = PasswordHash::new(ValidatedPassword::new_unchecked(password), 4).unwrap();

        assert!(hash.verify(password).unwrap());
    }

    #[test]
    fn verify_password_fails_for_invalid_password() {
        let hash = PasswordHash::new(ValidatedPassword::new_unchecked("Okaythen123"), 4).unwrap();

        assert!(!hash.verify("Okaythen124").unwrap());
    }
}
