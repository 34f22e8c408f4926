//! The body returned after registering or logging in.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::{IssuedToken, User, UserResponse};

/// An access token and the user it was issued to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// The bearer token to send in the `Authorization` header.
    pub token: String,
    /// When the token stops being accepted.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// The authenticated user.
    pub user: UserResponse,
}

impl AuthResponse {
    /// Combine an issued token with the public view of `user`.
    pub fn new(token: IssuedToken, user: &User) -> Self {
        Self {
            token: token.token,
            expires_at: token.expires_at,
            user: UserResponse::from(user),
        }
    }
}
