use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Authorization level of a back-office account.
///
/// Roles are not ordered: every decision is a membership test against an
/// allow-set, never a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    /// Sentinel for callers without a session. Never embedded in a token.
    NoAutenticado = 0,
    Comercial = 1,
    Directivo = 2,
    Colaborador = 3,
    Admin = 4,
}

/// Every role that can hold a session.
pub const AUTHENTICATED_ROLES: &[Role] = &[
    Role::Admin,
    Role::Directivo,
    Role::Comercial,
    Role::Colaborador,
];

/// A role integer outside the closed enumeration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown role value: {0}")]
pub struct UnknownRole(pub i32);

impl Role {
    /// All roles, sentinel included.
    pub const ALL: [Role; 5] = [
        Role::NoAutenticado,
        Role::Comercial,
        Role::Directivo,
        Role::Colaborador,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::NoAutenticado => "NO_AUTHENTICADO",
            Role::Comercial => "COMERCIAL",
            Role::Directivo => "DIRECTIVO",
            Role::Colaborador => "COLABORADOR",
            Role::Admin => "ADMIN",
        }
    }

    /// Whether this role can be carried by a session.
    pub fn is_authenticated(&self) -> bool {
        *self != Role::NoAutenticado
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role as i32
    }
}

impl TryFrom<i32> for Role {
    type Error = UnknownRole;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Role::ALL
            .into_iter()
            .find(|role| i32::from(*role) == value)
            .ok_or(UnknownRole(value))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
