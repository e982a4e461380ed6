use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "identityScheme": state.identity.scheme(),
    }))
}

fn handle_workspace_select(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(str_param(req, "path")?);
    let conn = db::open_db(&path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:?}")))?;
    info!(workspace = %path.display(), "workspace selected");
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.method, &req.id, outcome))
}
