//! Issuing and checking the JSON web tokens used as bearer tokens.

use std::fmt::Debug;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{User, UserID},
};

/// The keys used to sign and verify tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    /// Derive the signing and verification keys from a shared secret.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

/// The contents of a JSON Web Token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub sub: i64,
    /// The email of the user the token was issued to.
    pub email: String,
    /// The time the token was issued, in seconds since the Unix epoch.
    pub iat: i64,
    /// The expiry time of the token, in seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    /// The ID of the user the token was issued to.
    pub fn user_id(&self) -> UserID {
        UserID::new(self.sub)
    }
}

/// A signed token and when it expires.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    /// The encoded JWT.
    pub token: String,
    /// When the token stops being accepted.
    pub expires_at: OffsetDateTime,
}

/// Issue a token for `user` that is valid for `duration` from `now`.
///
/// # Errors
///
/// Returns [Error::TokenCreation] if the token could not be signed.
pub fn encode_token(
    user: &User,
    now: OffsetDateTime,
    duration: Duration,
    keys: &JwtKeys,
) -> Result<IssuedToken, Error> {
    let expires_at = now + duration;
    let claims = Claims {
        sub: user.id.as_i64(),
        email: user.email.clone(),
        iat: now.unix_timestamp(),
        exp: expires_at.unix_timestamp(),
    };

    let token = encode(&Header::default(), &claims, &keys.encoding_key)
        .map_err(|error| Error::TokenCreation(error.to_string()))?;

    Ok(IssuedToken { token, expires_at })
}

/// Check the signature and expiry of `token` and return its claims.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the token is malformed, signed with
/// another key or has expired.
pub fn decode_token(token: &str, keys: &JwtKeys) -> Result<Claims, Error> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<Claims>(token, &keys.decoding_key, &validation)
        .map(|token_data| token_data.claims)
        .map_err(|error| {
            tracing::debug!("rejected token: {error}");
            Error::InvalidToken
        })
}
