use serde_json::json;
use tracing::{debug, warn};

use crate::error::ServiceError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failure of one handler call, already shaped for the wire.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ServiceError> for HandlerErr {
    fn from(e: ServiceError) -> Self {
        HandlerErr {
            code: e.code(),
            message: e.message(),
            details: e.details(),
        }
    }
}

/// Projects a handler outcome into the response envelope.
pub fn respond(
    method: &str,
    id: &str,
    outcome: Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match outcome {
        Ok(result) => {
            debug!(method, id, "request ok");
            ok(id, result)
        }
        Err(e) => {
            warn!(method, id, code = e.code, message = %e.message, "request failed");
            e.response(id)
        }
    }
}
