use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::identity::{self, IdentityResolver};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Bearer token from `auth.login`; absent for public methods.
    #[serde(default)]
    pub token: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: Config,
    pub identity: Box<dyn IdentityResolver>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let identity = identity::resolver_for(config.auth.identity_scheme);
        AppState {
            workspace: None,
            db: None,
            config,
            identity,
        }
    }
}
