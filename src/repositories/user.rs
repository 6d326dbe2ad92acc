use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::{
    error::{AppError, Result},
    models::{role::Role, user::User},
};

/// Maps a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    let role_value: i32 = row
        .try_get("role")
        .map_err(|_| AppError::MissingData("role".to_string()))?;
    let role = Role::try_from(role_value)
        .map_err(|e| AppError::Internal(format!("Stored user has {}", e)))?;

    Ok(User {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        name: row.try_get("name").map_err(|_| AppError::MissingData("name".to_string()))?,
        email: row.try_get("email").map_err(|_| AppError::MissingData("email".to_string()))?,
        password: row
            .try_get("password")
            .map_err(|_| AppError::MissingData("password".to_string()))?,
        role,
        is_active: row
            .try_get("is_active")
            .map_err(|_| AppError::MissingData("is_active".to_string()))?,
    })
}

/// Finds an active user by their email address.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `email` - The email to look up, compared case-insensitively.
///
/// # Returns
///
/// A `Result` containing the `User`, if one is active under that email.
pub async fn find_active_by_email(pool: &Pool, email: &str) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT id, name, email, password, role, is_active
            FROM users
            WHERE lower(email) = lower($1) AND is_active = true
            "#,
            &[&email],
        )
        .await?;
    row.map(|r| row_to_user(&r)).transpose()
}

/// Lists every user, ordered by name.
pub async fn list_users(pool: &Pool) -> Result<Vec<User>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            r#"
            SELECT id, name, email, password, role, is_active
            FROM users
            ORDER BY name
            "#,
            &[],
        )
        .await?;
    rows.iter().map(row_to_user).collect()
}
