use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use crate::auth::gate::Action;
use crate::auth::password;
use crate::catalog;
use crate::error::ServiceError;
use crate::identity::IdentityScheme;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db, opt_str_param, staff, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{FullName, Role, User};
use crate::people::{self, NewUser};

/// Reads `lastName`, `firstName`, `middleName?`, `username?` and `password`
/// and hashes the password. Under the username scheme a username is required,
/// otherwise the new account could never be named at login.
fn new_user(state: &AppState, req: &Request, role: Role) -> Result<NewUser, HandlerErr> {
    let name = FullName::from_parts(
        str_param(req, "lastName")?,
        str_param(req, "firstName")?,
        opt_str_param(req, "middleName")?.unwrap_or_default(),
    )?;
    let username = opt_str_param(req, "username")?
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    if username.is_none() && state.identity.scheme() == IdentityScheme::Username {
        return Err(ServiceError::invalid("missing params.username").into());
    }
    let password_hash = password::hash_password(
        str_param(req, "password")?,
        state.config.auth.hash_cost(),
    )?;
    Ok(NewUser {
        name,
        username,
        password_hash,
        role,
    })
}

fn user_json(user: &User) -> serde_json::Value {
    json!({
        "name": user.display_name(),
        "username": user.username,
        "role": user.role,
    })
}

fn begin(conn: &Connection) -> Result<rusqlite::Transaction<'_>, HandlerErr> {
    Ok(conn.unchecked_transaction().map_err(ServiceError::from)?)
}

fn commit(tx: rusqlite::Transaction<'_>) -> Result<(), HandlerErr> {
    Ok(tx.commit().map_err(ServiceError::from)?)
}

fn handle_bootstrap(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let new = new_user(state, req, Role::AcademicStaff)?;

    let tx = begin(conn)?;
    if people::admin_count(&tx)? > 0 {
        return Err(ServiceError::Forbidden(
            "setup already done; ask academic staff to create accounts".into(),
        )
        .into());
    }
    let user = people::create_user(&tx, new)?;
    people::assign_admin(&tx, &user)?;
    commit(tx)?;

    info!(user_id = %user.id, "first academic staff account bootstrapped");
    Ok(user_json(&user))
}

fn handle_staff_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManagePeople)?;
    let new = new_user(state, req, Role::AcademicStaff)?;

    let tx = begin(conn)?;
    let user = people::create_user(&tx, new)?;
    people::assign_admin(&tx, &user)?;
    commit(tx)?;
    Ok(user_json(&user))
}

fn handle_teacher_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManagePeople)?;
    let discipline_name = str_param(req, "discipline")?;
    let new = new_user(state, req, Role::Teacher)?;

    let tx = begin(conn)?;
    let discipline = catalog::discipline_by_name(&tx, discipline_name)?;
    let user = people::create_user(&tx, new)?;
    people::assign_teacher(&tx, &user, &discipline)?;
    commit(tx)?;

    let mut result = user_json(&user);
    result["disciplines"] = json!([discipline.name]);
    Ok(result)
}

fn handle_teacher_assign(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManagePeople)?;
    let teacher = state
        .identity
        .resolve_user(conn, str_param(req, "teacher")?, Some(Role::Teacher))?;
    let discipline = catalog::discipline_by_name(conn, str_param(req, "discipline")?)?;
    people::assign_teacher(conn, &teacher, &discipline)?;

    let disciplines: Vec<String> = people::teacher_disciplines(conn, &teacher.id)?
        .into_iter()
        .map(|d| d.name)
        .collect();
    Ok(json!({
        "teacher": teacher.display_name(),
        "disciplines": disciplines,
    }))
}

fn handle_student_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManagePeople)?;
    let group_name = str_param(req, "group")?;
    let new = new_user(state, req, Role::Student)?;

    let tx = begin(conn)?;
    let group = catalog::group_by_name(&tx, group_name)?;
    let user = people::create_user(&tx, new)?;
    people::enroll(&tx, &user, &group)?;
    commit(tx)?;

    let mut result = user_json(&user);
    result["group"] = json!(group.name);
    Ok(result)
}

fn handle_student_enroll(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    staff(conn, req, Action::ManagePeople)?;
    let student = state
        .identity
        .resolve_user(conn, str_param(req, "student")?, Some(Role::Student))?;
    let group = catalog::group_by_name(conn, str_param(req, "group")?)?;
    let created = people::enroll(conn, &student, &group)?;
    Ok(json!({
        "student": student.display_name(),
        "group": group.name,
        "created": created,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "setup.bootstrap" => handle_bootstrap(state, req),
        "staff.create" => handle_staff_create(state, req),
        "teachers.create" => handle_teacher_create(state, req),
        "teachers.assign" => handle_teacher_assign(state, req),
        "students.create" => handle_student_create(state, req),
        "students.enroll" => handle_student_enroll(state, req),
        _ => return None,
    };
    Some(respond(&req.method, &req.id, outcome))
}
