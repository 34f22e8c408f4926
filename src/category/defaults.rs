//! The categories every user starts with.

use rusqlite::Connection;

use crate::{
    Error,
    auth::UserID,
    category::{Category, CategoryData, create_category},
};

/// The name, description and colour of each default category.
pub const DEFAULT_CATEGORIES: [(&str, &str, &str); 8] = [
    ("Food & Dining", "Groceries, restaurants and takeaways", "#EF4444"),
    ("Transportation", "Fuel, public transport and parking", "#F59E0B"),
    ("Shopping", "Clothes, electronics and household items", "#8B5CF6"),
    ("Entertainment", "Movies, games and subscriptions", "#EC4899"),
    ("Bills & Utilities", "Rent, power, water and internet", "#3B82F6"),
    ("Healthcare", "Doctor visits, pharmacy and insurance", "#10B981"),
    ("Salary", "Wages and other regular income", "#22C55E"),
    ("Other", "Anything that does not fit elsewhere", "#6B7280"),
];

/// Create the default categories for a newly registered user.
///
/// # Errors
/// Returns an error if any of the categories could not be inserted, e.g. because
/// the user already has a category with the same name.
pub fn seed_default_categories(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(name, description, color)| {
            let data = CategoryData {
                name: (*name).to_owned(),
                description: Some((*description).to_owned()),
                color: (*color).to_owned(),
            };

            create_category(user_id, &data, true, connection)
        })
        .collect()
}
