//! Param extraction and per-request context shared by the handler families.

use rusqlite::Connection;
use serde_json::Value;

use crate::auth::{self, gate};
use crate::error::ServiceError;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::model::{Actor, Role};
use crate::people;

pub fn db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn actor(conn: &Connection, req: &Request) -> Result<Actor, HandlerErr> {
    Ok(auth::authenticate(conn, req.token.as_deref())?)
}

/// Authenticated academic staff with a live admin assignment.
pub fn staff(conn: &Connection, req: &Request, action: gate::Action) -> Result<Actor, HandlerErr> {
    let actor = actor(conn, req)?;
    gate::authorize(&actor, action)?;
    people::require_admin_assignment(conn, &actor.user_id)?;
    Ok(actor)
}

pub fn str_param<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    opt_str_param(req, key)?
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing(key))
}

/// Absent and `null` both read as `None`; a non-string value is rejected.
pub fn opt_str_param<'a>(req: &'a Request, key: &str) -> Result<Option<&'a str>, HandlerErr> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(bad_type(key, "a string")),
    }
}

pub fn i64_param(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    match req.params.get(key) {
        None | Some(Value::Null) => Err(missing(key)),
        Some(v) => v.as_i64().ok_or_else(|| bad_type(key, "an integer")),
    }
}

pub fn opt_bool_param(req: &Request, key: &str) -> Result<Option<bool>, HandlerErr> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(bad_type(key, "a boolean")),
    }
}

pub fn str_array_param(req: &Request, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(items) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(missing(key));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| bad_type(&format!("{key}[{i}]"), "a string"))
        })
        .collect()
}

pub fn i64_array_param(req: &Request, key: &str) -> Result<Vec<i64>, HandlerErr> {
    let Some(items) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(missing(key));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_i64()
                .ok_or_else(|| bad_type(&format!("{key}[{i}]"), "an integer"))
        })
        .collect()
}

pub fn opt_role_param(req: &Request, key: &str) -> Result<Option<Role>, HandlerErr> {
    match opt_str_param(req, key)? {
        Some(raw) => Ok(Some(raw.parse::<Role>()?)),
        None => Ok(None),
    }
}

fn missing(key: &str) -> HandlerErr {
    HandlerErr::from(ServiceError::invalid(format!("missing params.{key}")))
}

fn bad_type(key: &str, expected: &str) -> HandlerErr {
    HandlerErr::from(ServiceError::invalid(format!("params.{key} must be {expected}")))
}
