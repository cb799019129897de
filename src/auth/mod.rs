//! User accounts, passwords and cookie-based sessions.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod register_user;
mod token;
mod user;

pub use cookie::DEFAULT_COOKIE_DURATION;
pub use log_in::post_log_in;
pub use log_out::get_log_out;
pub use middleware::auth_guard;
pub use password::{PasswordHash, ValidatedPassword};
pub use register_user::register_user;
pub(crate) use token::Token;
pub use user::{User, UserID, create_user_table};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
#[cfg(test)]
pub(crate) use user::create_user;
