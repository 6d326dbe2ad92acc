use serde::Serialize;

use crate::models::role::Role;

/// Represents a back-office account.
#[derive(Clone)]
pub struct User {
    /// The unique identifier for the user.
    pub id: i64,
    /// The user's full name.
    pub name: String,
    /// The user's email address, used to log in.
    pub email: String,
    /// The user's Argon2 password hash.
    pub password: String,
    /// The user's role.
    pub role: Role,
    /// Whether the user is active.
    pub is_active: bool,
}

/// The public view of a user, without credentials.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
        }
    }
}
