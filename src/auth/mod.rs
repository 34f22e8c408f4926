//! Registration, log in and bearer token authentication.

mod current_user;
mod extractor;
mod log_in;
mod password;
mod register;
mod response;
mod token;
mod user;

pub use current_user::get_current_user_endpoint;
pub use extractor::AuthenticatedUser;
pub use log_in::log_in_endpoint;
pub use password::{PasswordHash, ValidatedPassword, check_password};
pub use register::{check_email, register_endpoint};
pub use response::AuthResponse;
pub use token::{Claims, IssuedToken, JwtKeys, decode_token, encode_token};
pub use user::{
    NewUser, User, UserID, UserResponse, create_user, create_user_table,
    email_exists, get_user_by_email, get_user_by_id,
};
