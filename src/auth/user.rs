//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, auth::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's email address, stored in lower case.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// When the user registered.
    pub created_at: OffsetDateTime,
    /// When the user was last changed.
    pub updated_at: OffsetDateTime,
}

/// The data needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The user's email address, it is normalised to lower case on insert.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
}

/// The public view of a user returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// The user's ID.
    pub id: i64,
    /// The user's email address.
    pub email: String,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// When the user registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.as_i64(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            created_at: user.created_at,
        }
    }
}

/// Normalise an email address for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

const USER_COLUMNS: &str = "id, email, password, first_name, last_name, created_at, updated_at";

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateEmail] if the email is already registered, ignoring case.
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let email = normalize_email(&new_user.email);
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(&format!(
            "INSERT INTO user (email, password, first_name, last_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING {USER_COLUMNS}"
        ))?
        .query_row(
            (
                &email,
                new_user.password_hash.as_ref(),
                new_user.first_name.trim(),
                new_user.last_name.trim(),
                now,
            ),
            map_row,
        )
        .map_err(|error| match error {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail(email.clone())
            }
            error => error.into(),
        })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`, ignoring case.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has registered with the email.
pub fn get_user_by_email(email: &str, db_connection: &Connection) -> Result<User, Error> {
    db_connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE email = :email COLLATE NOCASE"
        ))?
        .query_row(&[(":email", &normalize_email(email))], map_row)
        .map_err(|error| error.into())
}

/// Check whether a user has registered with `email`, ignoring case.
pub fn email_exists(email: &str, db_connection: &Connection) -> Result<bool, Error> {
    db_connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM user WHERE email = ?1 COLLATE NOCASE)",
            [normalize_email(email)],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        email: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
