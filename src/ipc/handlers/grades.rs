use serde_json::json;

use crate::gradebook::{self, BatchRequest, GradeRequest};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    actor, db, i64_array_param, i64_param, opt_str_param, str_array_param, str_param,
};
use crate::ipc::types::{AppState, Request};

fn handle_put(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let request = GradeRequest {
        student: str_param(req, "student")?,
        discipline: str_param(req, "discipline")?,
        session: str_param(req, "session")?,
        group: str_param(req, "group")?,
        value: i64_param(req, "grade")?,
    };
    let write = gradebook::put_grade(conn, state.identity.as_ref(), &actor, &request)?;

    let mut result = json!(write);
    result["message"] = json!(if write.created {
        "grade recorded"
    } else {
        "grade updated"
    });
    Ok(result)
}

fn handle_put_mass(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let students = str_array_param(req, "students")?;
    let values = i64_array_param(req, "grades")?;
    let request = BatchRequest {
        group: str_param(req, "group")?,
        students: &students,
        values: &values,
        discipline: opt_str_param(req, "discipline")?,
    };
    let entries = gradebook::put_grades(conn, state.identity.as_ref(), &actor, &request)?;
    Ok(json!({
        "count": entries.len(),
        "entries": entries,
    }))
}

fn handle_mine(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let own = gradebook::own_grades(conn, &actor)?;

    let mut result = json!(own);
    if own.grades.is_empty() {
        result["message"] = json!("no grades recorded yet");
    }
    Ok(result)
}

fn handle_group(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let groups = gradebook::group_grades(conn, &actor, opt_str_param(req, "group")?)?;

    let mut result = json!({ "groups": groups });
    if groups.iter().all(|g| g.students.is_empty()) {
        result["message"] = json!(if groups.is_empty() {
            "no groups exist yet"
        } else {
            "no students enrolled"
        });
    }
    Ok(result)
}

fn handle_discipline(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = db(state)?;
    let actor = actor(conn, req)?;
    let group = str_param(req, "group")?;
    let rows = gradebook::discipline_grades(conn, &actor, group, opt_str_param(req, "discipline")?)?;

    let mut result = json!({ "group": group.trim(), "rows": rows });
    if rows.is_empty() {
        result["message"] = json!("no students enrolled");
    }
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "grades.put" => handle_put(state, req),
        "grades.putMass" => handle_put_mass(state, req),
        "grades.mine" => handle_mine(state, req),
        "grades.group" => handle_group(state, req),
        "grades.discipline" => handle_discipline(state, req),
        _ => return None,
    };
    Some(respond(&req.method, &req.id, outcome))
}
