use serde_json::json;

use crate::auth::gate::Action;
use crate::catalog::{self, NewSession};
use crate::error::ServiceError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db, opt_bool_param, staff, str_array_param, str_param};
use crate::ipc::types::{AppState, Request};

fn handle_groups_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let group = catalog::create_group(conn, str_param(req, "name")?)?;
    Ok(json!({ "name": group.name }))
}

fn handle_groups_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let groups = catalog::list_groups(conn)?;
    Ok(json!({ "groups": groups }))
}

fn handle_disciplines_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let names = str_array_param(req, "names")?;

    let tx = conn.unchecked_transaction().map_err(ServiceError::from)?;
    let created = catalog::create_disciplines(&tx, &names)?;
    tx.commit().map_err(ServiceError::from)?;

    Ok(json!({
        "created": created.len(),
        "disciplines": created,
    }))
}

fn handle_disciplines_list(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let disciplines = catalog::list_disciplines(conn)?;
    Ok(json!({ "disciplines": disciplines }))
}

fn handle_disciplines_delete(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let name = str_param(req, "name")?;

    let tx = conn.unchecked_transaction().map_err(ServiceError::from)?;
    let removal = catalog::delete_discipline(&tx, name)?;
    tx.commit().map_err(ServiceError::from)?;

    Ok(json!(removal))
}

fn handle_sessions_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let new = NewSession {
        name: str_param(req, "name")?,
        start_date: str_param(req, "startDate")?,
        end_date: str_param(req, "endDate")?,
        active: opt_bool_param(req, "active")?.unwrap_or(false),
    };

    let tx = conn.unchecked_transaction().map_err(ServiceError::from)?;
    let session = catalog::create_session(&tx, &new)?;
    tx.commit().map_err(ServiceError::from)?;

    Ok(json!(session))
}

fn handle_sessions_activate(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let name = str_param(req, "name")?;

    let tx = conn.unchecked_transaction().map_err(ServiceError::from)?;
    let session = catalog::activate_session(&tx, name)?;
    tx.commit().map_err(ServiceError::from)?;

    Ok(json!(session))
}

fn handle_sessions_list(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManageCatalog)?;
    let sessions = catalog::list_sessions(conn)?;
    Ok(json!({ "sessions": sessions }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "groups.create" => handle_groups_create(state, req),
        "groups.list" => handle_groups_list(state, req),
        "disciplines.create" => handle_disciplines_create(state, req),
        "disciplines.list" => handle_disciplines_list(state, req),
        "disciplines.delete" => handle_disciplines_delete(state, req),
        "sessions.create" => handle_sessions_create(state, req),
        "sessions.activate" => handle_sessions_activate(state, req),
        "sessions.list" => handle_sessions_list(state, req),
        _ => return None,
    };
    Some(respond(&req.method, &req.id, outcome))
}
