pub mod gate;
pub mod password;
pub mod token;

use rusqlite::Connection;

use crate::error::{Result, ServiceError};
use crate::identity;
use crate::model::Actor;

/// Turns a bearer token into the acting user.
pub fn authenticate(conn: &Connection, token: Option<&str>) -> Result<Actor> {
    let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
        return Err(ServiceError::Unauthorized("missing token".into()));
    };
    let user_id = token::verify(conn, token)?;
    let user = identity::user_by_id(conn, &user_id)?
        .ok_or_else(|| ServiceError::Unauthorized("token user no longer exists".into()))?;
    Ok(Actor::from(&user))
}
