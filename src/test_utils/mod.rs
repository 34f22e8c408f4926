#![allow(missing_docs)]

use axum::http::StatusCode;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppConfig, AppState, build_router, endpoints, initialize_db,
    auth::{AuthResponse, NewUser, PasswordHash, User, ValidatedPassword, create_user},
};

/// A password that passes the password policy.
pub(crate) const TEST_PASSWORD: &str = "Hunter2Hunter2";

/// The lowest bcrypt cost, to keep tests fast.
pub(crate) const TEST_HASH_COST: u32 = 4;

#[track_caller]
pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize_db(&connection).expect("Could not initialize database.");

    connection
}

#[track_caller]
pub(crate) fn insert_test_user(connection: &Connection, email: &str) -> User {
    create_user(
        NewUser {
            email: email.to_owned(),
            password_hash: PasswordHash::new(
                ValidatedPassword::new_unchecked(TEST_PASSWORD),
                TEST_HASH_COST,
            )
            .expect("Could not hash password"),
            first_name: "Test".to_owned(),
            last_name: "User".to_owned(),
        },
        connection,
    )
    .expect("Could not create test user")
}

/// A server over the full router backed by an in-memory database.
#[track_caller]
pub(crate) fn get_test_server() -> TestServer {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    let config = AppConfig {
        password_hash_cost: TEST_HASH_COST,
        ..Default::default()
    };
    let state = AppState::new(connection, "42", config).expect("Could not create app state.");

    TestServer::try_new(build_router(state, None)).expect("Could not create test server.")
}

/// Register a user with [TEST_PASSWORD] and return their bearer token.
pub(crate) async fn register_test_user(server: &TestServer, email: &str) -> String {
    let response = server
        .post(endpoints::REGISTER)
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "firstName": "Test",
            "lastName": "User",
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    response.json::<AuthResponse>().token
}
