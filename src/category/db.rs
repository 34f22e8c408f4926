//! Database operations for categories.

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    category::{Category, CategoryData},
    database_id::CategoryId,
};

const CATEGORY_COLUMNS: &str =
    "id, name, description, color, is_default, user_id, created_at, updated_at";

/// Initialize the category table and indexes.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            description TEXT,
            color TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, name_key),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_category_user_id ON category(user_id);",
    )?;

    Ok(())
}

/// Create a category for `user_id` and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateCategoryName] if the user already has a category with the name, ignoring case,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_category(
    user_id: UserID,
    data: &CategoryData,
    is_default: bool,
    connection: &Connection,
) -> Result<Category, Error> {
    if category_name_taken(user_id, &data.name, None, connection)? {
        return Err(Error::DuplicateCategoryName(data.name.clone()));
    }

    let now = OffsetDateTime::now_utc();

    connection
        .prepare(&format!(
            "INSERT INTO category (name, name_key, description, color, is_default, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                &data.name,
                name_key(&data.name),
                &data.description,
                &data.color,
                is_default,
                user_id.as_i64(),
                now,
            ),
            map_row,
        )
        .map_err(|error| map_unique_name_error(error, &data.name))
}

/// Retrieve a category owned by `user_id`.
///
/// # Errors
/// Returns [Error::CategoryNotFound] if the category does not exist or belongs to another user.
pub fn get_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = :id AND user_id = :user_id"
        ))?
        .query_row(
            &[(":id", &category_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(category_id),
            error => error.into(),
        })
}

/// Retrieve all of the categories of `user_id` ordered by name.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE user_id = ?1 ORDER BY name_key ASC, id ASC"
        ))?
        .query_map([user_id.as_i64()], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the name, description and colour of a category.
///
/// Whether the category is a default category does not change.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryNotFound] if the category does not exist or belongs to another user,
/// - [Error::DuplicateCategoryName] if another category of the user has the name, ignoring case,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_category(
    category_id: CategoryId,
    user_id: UserID,
    data: &CategoryData,
    connection: &Connection,
) -> Result<Category, Error> {
    if category_name_taken(user_id, &data.name, Some(category_id), connection)? {
        return Err(Error::DuplicateCategoryName(data.name.clone()));
    }

    connection
        .prepare(&format!(
            "UPDATE category SET name = ?1, name_key = ?2, description = ?3, color = ?4, updated_at = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                &data.name,
                name_key(&data.name),
                &data.description,
                &data.color,
                OffsetDateTime::now_utc(),
                category_id,
                user_id.as_i64(),
            ),
            map_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound(category_id),
            error => map_unique_name_error(error, &data.name),
        })
}

/// Delete a category owned by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::CategoryNotFound] if the category does not exist or belongs to another user,
/// - [Error::DefaultCategoryDeletion] if the category is a default category,
/// - [Error::CategoryInUse] if any transactions or budgets use the category,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let category = get_category(category_id, user_id, connection)?;

    if category.is_default {
        return Err(Error::DefaultCategoryDeletion(category_id));
    }

    let (transaction_count, budget_count) = count_category_usage(category_id, connection)?;

    if transaction_count > 0 || budget_count > 0 {
        return Err(Error::CategoryInUse {
            category_id,
            transaction_count,
            budget_count,
        });
    }

    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound(category_id));
    }

    Ok(())
}

/// Check whether `category_id` refers to a category owned by `user_id`.
pub fn category_belongs_to_user(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM category WHERE id = ?1 AND user_id = ?2)",
            (category_id, user_id.as_i64()),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Check that `category_id` refers to a category owned by `user_id`.
///
/// # Errors
/// Returns [Error::InvalidCategory] if it does not.
pub fn ensure_category_belongs_to_user(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    if category_belongs_to_user(category_id, user_id, connection)? {
        Ok(())
    } else {
        Err(Error::InvalidCategory(category_id))
    }
}

fn category_name_taken(
    user_id: UserID,
    name: &str,
    excluding: Option<CategoryId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let existing_id: Option<CategoryId> = connection
        .query_row(
            "SELECT id FROM category WHERE user_id = ?1 AND name_key = ?2",
            (user_id.as_i64(), name_key(name)),
            |row| row.get(0),
        )
        .optional()?;

    Ok(match (existing_id, excluding) {
        (Some(existing_id), Some(excluding)) => existing_id != excluding,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

/// The form of a category name that uniqueness and ordering are based on.
///
/// Unlike SQLite's `NOCASE`, this folds the case of non-ASCII letters too.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Count the transactions and budgets that use a category.
fn count_category_usage(
    category_id: CategoryId,
    connection: &Connection,
) -> Result<(i64, i64), Error> {
    connection
        .query_row(
            "SELECT
                (SELECT COUNT(id) FROM \"transaction\" WHERE category_id = ?1),
                (SELECT COUNT(id) FROM budget WHERE category_id = ?1)",
            [category_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|error| error.into())
}

fn map_unique_name_error(error: rusqlite::Error, name: &str) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            _,
        ) => Error::DuplicateCategoryName(name.to_owned()),
        error => error.into(),
    }
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        is_default: row.get(4)?,
        user_id: UserID::new(row.get(5)?),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
