//! Core category domain types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    database_id::CategoryId,
    validation::{ValidationErrors, check_max_length, check_required_text},
};

/// The most characters a category name may have.
pub const MAX_CATEGORY_NAME_LENGTH: usize = 50;
/// The most characters a category description may have.
pub const MAX_CATEGORY_DESCRIPTION_LENGTH: usize = 200;
/// The colour given to categories created without one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#6B7280";

/// A user defined grouping of transactions, e.g. 'Groceries' or 'Salary'.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The name of the category, unique per user ignoring case.
    pub name: String,
    /// An optional longer description.
    pub description: Option<String>,
    /// A hex colour used when charting the category.
    pub color: String,
    /// Whether the category was created at registration. Default categories cannot be deleted.
    pub is_default: bool,
    /// The user that owns the category.
    pub user_id: UserID,
    /// When the category was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the category was last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The request body for creating or updating a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryForm {
    /// The name of the category.
    pub name: String,
    /// An optional longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// A hex colour, e.g. `#FF5733`.
    #[serde(default)]
    pub color: Option<String>,
}

/// A category that has passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryData {
    /// The trimmed name.
    pub name: String,
    /// The trimmed description, `None` if blank.
    pub description: Option<String>,
    /// The hex colour.
    pub color: String,
}

impl CategoryForm {
    /// Check the form and convert it into [CategoryData].
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] listing every field that failed.
    pub fn validate(self) -> Result<CategoryData, Error> {
        let mut errors = ValidationErrors::new();

        check_required_text(
            &mut errors,
            "name",
            "Name",
            &self.name,
            MAX_CATEGORY_NAME_LENGTH,
        );

        let description = self
            .description
            .map(|description| description.trim().to_owned())
            .filter(|description| !description.is_empty());

        if let Some(description) = &description {
            check_max_length(
                &mut errors,
                "description",
                "Description",
                description,
                MAX_CATEGORY_DESCRIPTION_LENGTH,
            );
        }

        let color = self
            .color
            .map(|color| color.trim().to_owned())
            .filter(|color| !color.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_owned());

        errors.check(
            !is_hex_color(&color),
            "color",
            "Color must be a hex colour such as #FF5733.",
        );

        errors.into_result()?;

        Ok(CategoryData {
            name: self.name.trim().to_owned(),
            description,
            color,
        })
    }
}

/// Whether `color` is a `#RGB` or `#RRGGBB` hex colour.
pub fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
