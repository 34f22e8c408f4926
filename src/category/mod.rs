//! Categories for grouping transactions and budgets.

mod create;
mod db;
mod defaults;
mod delete;
mod domain;
mod edit;
mod list;

pub use create::create_category_endpoint;
pub use db::{
    category_belongs_to_user, create_category, create_category_table, delete_category,
    ensure_category_belongs_to_user, get_categories, get_category, update_category,
};
pub use defaults::{DEFAULT_CATEGORIES, seed_default_categories};
pub use delete::delete_category_endpoint;
pub use domain::{Category, CategoryData, CategoryForm};
pub use edit::update_category_endpoint;
pub use list::{get_category_endpoint, list_categories_endpoint};
