mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod gradebook;
mod identity;
mod ipc;
mod ledger;
mod model;
mod people;

use std::io::{self, BufRead, Write};

use tracing::{debug, error, info};

const LOG_ENV: &str = "GRADEBOOKD_LOG";

fn init_tracing() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    // stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn write_line(stdout: &mut io::Stdout, resp: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
    let _ = stdout.flush();
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let config = config::Config::load()?;
    info!(
        identity_scheme = ?config.auth.identity_scheme,
        token_ttl_minutes = config.auth.token_ttl_minutes,
        "gradebookd starting"
    );

    let mut state = ipc::AppState::new(config);
    if let Some(path) = state.config.workspace.clone() {
        match db::open_db(&path) {
            Ok(conn) => {
                info!(workspace = %path.display(), "workspace opened from config");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            // The client can still send workspace.select.
            Err(e) => error!(workspace = %path.display(), error = ?e, "failed to open configured workspace"),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                write_line(
                    &mut stdout,
                    &serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    }),
                );
                continue;
            }
        };

        debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
    }

    info!("stdin closed; shutting down");
    Ok(())
}
