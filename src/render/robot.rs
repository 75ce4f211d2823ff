//! Robot-mode output (JSON).
//!
//! Every command wraps its result in the same envelope so scripts can
//! dispatch on `command` and check `errors` without knowing the payload.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

pub const SCHEMA_VERSION: &str = "autocost.v1";

/// Top-level JSON envelope for robot mode output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,
    pub errors: Vec<String>,
}

impl<T> RobotOutput<T> {
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self::with_errors(command, data, Vec::new())
    }

    pub fn with_errors(command: impl Into<String>, data: T, errors: Vec<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            command: command.into(),
            data,
            errors,
        }
    }
}

/// Serialize an envelope, pretty-printed on request.
pub fn render_json<T: Serialize>(output: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let output = RobotOutput::new("status", vec![1, 2]);
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&output, false).unwrap()).unwrap();
        assert_eq!(json["schemaVersion"], SCHEMA_VERSION);
        assert_eq!(json["command"], "status");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["errors"], serde_json::json!([]));
    }
}
