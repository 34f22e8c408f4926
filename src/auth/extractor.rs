//! The extractor that authenticates requests with a bearer token.

use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    Error,
    auth::{JwtKeys, UserID, decode_token},
};

/// The user that made the request.
///
/// Handlers that take this extractor reject requests without a valid
/// `Authorization: Bearer <token>` header with a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The ID of the user the token was issued to.
    pub user_id: UserID,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::InvalidToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = decode_token(bearer.token(), &keys)?;

        Ok(Self {
            user_id: claims.user_id(),
        })
    }
}
