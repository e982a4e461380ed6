//! Resolving a caller-supplied identity string to a stored [`User`].
//!
//! Deployments identify people either by full name ("Last First Middle") or by
//! a unique username. The rest of the service only sees [`IdentityResolver`].

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, Result, ServiceError};
use crate::model::{FullName, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityScheme {
    #[default]
    FullName,
    Username,
}

pub trait IdentityResolver: Send + Sync {
    fn scheme(&self) -> IdentityScheme;

    /// Finds the user named by `identity`, optionally restricted to one role.
    ///
    /// An identity that matches several users (same name, different roles)
    /// without a role filter is rejected as ambiguous.
    fn resolve_user(&self, conn: &Connection, identity: &str, role: Option<Role>) -> Result<User>;
}

pub fn resolver_for(scheme: IdentityScheme) -> Box<dyn IdentityResolver> {
    match scheme {
        IdentityScheme::FullName => Box::new(FullNameResolver),
        IdentityScheme::Username => Box::new(UsernameResolver),
    }
}

fn user_not_found(identity: &str, role: Option<Role>) -> ServiceError {
    let message = match role {
        Some(Role::Student) => format!("student {identity} not found"),
        Some(Role::Teacher) => format!("teacher {identity} not found"),
        Some(Role::AcademicStaff) => format!("staff member {identity} not found"),
        None => format!("user {identity} not found"),
    };
    ServiceError::not_found(EntityKind::User, message)
}

pub struct FullNameResolver;

impl IdentityResolver for FullNameResolver {
    fn scheme(&self) -> IdentityScheme {
        IdentityScheme::FullName
    }

    fn resolve_user(&self, conn: &Connection, identity: &str, role: Option<Role>) -> Result<User> {
        let name = FullName::parse(identity)?;
        let sql = format!(
            "SELECT {} FROM users
             WHERE last_name = ?1 AND first_name = ?2 AND middle_name = ?3
               AND (?4 IS NULL OR role = ?4)
             LIMIT 2",
            User::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut users = stmt
            .query_map(
                (&name.last_name, &name.first_name, &name.middle_name, role),
                User::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        match users.len() {
            0 => Err(user_not_found(identity, role)),
            1 => Ok(users.remove(0)),
            _ => Err(ServiceError::invalid_with(
                format!("{identity} matches several users; specify a role"),
                serde_json::json!({ "identity": identity }),
            )),
        }
    }
}

pub struct UsernameResolver;

impl IdentityResolver for UsernameResolver {
    fn scheme(&self) -> IdentityScheme {
        IdentityScheme::Username
    }

    fn resolve_user(&self, conn: &Connection, identity: &str, role: Option<Role>) -> Result<User> {
        let username = identity.trim();
        if username.is_empty() {
            return Err(ServiceError::invalid("username must not be empty"));
        }
        let sql = format!(
            "SELECT {} FROM users WHERE username = ?1 AND (?2 IS NULL OR role = ?2)",
            User::COLUMNS
        );
        conn.query_row(&sql, (username, role), User::from_row)
            .optional()?
            .ok_or_else(|| user_not_found(username, role))
    }
}

pub fn user_by_id(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", User::COLUMNS);
    Ok(conn
        .query_row(&sql, [user_id], User::from_row)
        .optional()?)
}
