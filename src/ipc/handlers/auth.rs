use chrono::SecondsFormat;
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{password, token};
use crate::error::ServiceError;
use crate::identity;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{actor, db, opt_role_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::people;

const BAD_CREDENTIALS: &str = "invalid identity or password";

fn handle_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let identity = str_param(req, "identity")?;
    let password = str_param(req, "password")?;
    let role = opt_role_param(req, "role")?;

    // Unknown identity and wrong password look the same to the caller.
    let user = match state.identity.resolve_user(conn, identity, role) {
        Ok(user) => user,
        Err(ServiceError::NotFound { .. }) => {
            warn!("login failed: unknown identity");
            return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()).into());
        }
        Err(e) => return Err(e.into()),
    };
    if !password::verify_password(password, &user.password_hash) {
        warn!(user_id = %user.id, "login failed: wrong password");
        return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.into()).into());
    }

    token::purge_expired(conn)?;
    let issued = token::issue(conn, &user.id, state.config.auth.token_ttl_minutes)?;
    info!(user_id = %user.id, role = %user.role, "login");
    Ok(json!({
        "token": issued.token,
        "tokenType": "bearer",
        "expiresAt": issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "role": user.role,
        "name": user.display_name(),
    }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let raw = req.token.as_deref().unwrap_or_default();
    let revoked = token::revoke(conn, raw)?;
    info!(user_id = %actor.user_id, "logout");
    Ok(json!({ "revoked": revoked }))
}

fn handle_me(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let user = identity::user_by_id(conn, &actor.user_id)?
        .ok_or_else(|| ServiceError::Unauthorized("token user no longer exists".into()))?;

    let mut result = json!({
        "name": user.display_name(),
        "lastName": user.name.last_name,
        "firstName": user.name.first_name,
        "middleName": user.name.middle_name,
        "username": user.username,
        "role": user.role,
    });
    match user.role {
        Role::Student => {
            let group = people::enrollment_of(conn, &user.id)?.map(|(_, group)| group);
            result["group"] = json!(group);
        }
        Role::Teacher => {
            let disciplines: Vec<String> = people::teacher_disciplines(conn, &user.id)?
                .into_iter()
                .map(|d| d.name)
                .collect();
            result["disciplines"] = json!(disciplines);
        }
        Role::AcademicStaff => {
            let assigned = people::require_admin_assignment(conn, &user.id).is_ok();
            result["adminAssigned"] = json!(assigned);
        }
    }
    Ok(result)
}

fn handle_change_password(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let current = str_param(req, "currentPassword")?;
    let new = str_param(req, "newPassword")?;

    let user = identity::user_by_id(conn, &actor.user_id)?
        .ok_or_else(|| ServiceError::Unauthorized("token user no longer exists".into()))?;
    if !password::verify_password(current, &user.password_hash) {
        return Err(ServiceError::Unauthorized("current password is incorrect".into()).into());
    }
    let hash = password::hash_password(new, state.config.auth.hash_cost())?;

    let tx = conn
        .unchecked_transaction()
        .map_err(ServiceError::from)?;
    people::set_password_hash(&tx, &user.id, &hash)?;
    let revoked = token::revoke_others(&tx, &user.id, req.token.as_deref().unwrap_or_default())?;
    tx.commit().map_err(ServiceError::from)?;

    info!(user_id = %user.id, revoked, "password changed");
    Ok(json!({ "changed": true, "sessionsRevoked": revoked }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "auth.login" => handle_login(state, req),
        "auth.logout" => handle_logout(state, req),
        "users.me" => handle_me(state, req),
        "users.changePassword" => handle_change_password(state, req),
        _ => return None,
    };
    Some(respond(&req.method, &req.id, outcome))
}
