//! JSON result envelope printed on stdout by every CLI command.
//!
//! Full form:
//!
//! ```json
//! {
//!   "ok": true,
//!   "command": "act",
//!   "code": "ACTION_DONE",
//!   "message": "Automation completed.",
//!   "data": { ... },
//!   "error": null,
//!   "meta": { "duration_ms": 812.4, "timestamp": "...", "version": "0.1.0" }
//! }
//! ```
//!
//! Compact form keeps `ok`, `cmd`, `code` and either `data` or `error`.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Envelope layout selected with `--json`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum JsonMode {
    /// ok / cmd / code / data-or-error
    #[default]
    Compact,
    /// Everything, including message and meta
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    ConfigUpdated,
    StatusReady,
    StatusIncomplete,
    ActionDone,
    AnalysisDone,
    ParseDone,
    ActionFailed,
    ConfigMissing,
    ConfigInvalid,
    ConfigWriteFailed,
    UsageError,
    UnhandledError,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        f.write_str(value.as_str().unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub detail: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub duration_ms: f64,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReport {
    pub ok: bool,
    pub command: String,
    pub code: ResultCode,
    pub message: String,
    pub data: serde_json::Value,
    pub error: Option<ReportError>,
    pub meta: ReportMeta,
}

impl CommandReport {
    pub fn exit_code(&self) -> i32 {
        if self.ok {
            0
        } else {
            2
        }
    }

    pub fn to_compact(&self) -> serde_json::Value {
        let mut out = serde_json::json!({
            "ok": self.ok,
            "cmd": self.command,
            "code": self.code,
        });
        if self.ok {
            out["data"] = self.data.clone();
        } else {
            out["error"] = serde_json::to_value(&self.error).unwrap_or_default();
            if !is_empty(&self.data) {
                out["data"] = self.data.clone();
            }
        }
        out
    }

    /// One line of JSON in the requested layout.
    pub fn render(&self, mode: JsonMode) -> String {
        let value = match mode {
            JsonMode::Full => serde_json::to_value(self).unwrap_or_default(),
            JsonMode::Compact => self.to_compact(),
        };
        value.to_string()
    }
}

fn is_empty(data: &serde_json::Value) -> bool {
    match data {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Started when a command begins so `meta.duration_ms` covers all of it.
pub struct ReportBuilder {
    command: String,
    started: Instant,
}

impl ReportBuilder {
    pub fn start(command: &str) -> Self {
        Self {
            command: command.to_string(),
            started: Instant::now(),
        }
    }

    fn meta(&self) -> ReportMeta {
        let ms = self.started.elapsed().as_secs_f64() * 1000.0;
        ReportMeta {
            duration_ms: (ms * 100.0).round() / 100.0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn ok(&self, code: ResultCode, message: &str, data: serde_json::Value) -> CommandReport {
        CommandReport {
            ok: true,
            command: self.command.clone(),
            code,
            message: message.to_string(),
            data: if data.is_null() { serde_json::json!({}) } else { data },
            error: None,
            meta: self.meta(),
        }
    }

    pub fn fail(&self, code: ResultCode, message: &str, error: ReportError, data: serde_json::Value) -> CommandReport {
        CommandReport {
            ok: false,
            command: self.command.clone(),
            code,
            message: message.to_string(),
            data: if data.is_null() { serde_json::json!({}) } else { data },
            error: Some(error),
            meta: self.meta(),
        }
    }
}

impl ReportError {
    pub fn new(error_type: &str, detail: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            error_type: error_type.to_string(),
            detail: detail.into(),
            hint: hint.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_report_in_both_layouts() {
        let report = ReportBuilder::start("status").ok(ResultCode::StatusReady, "Status collected.", json!({"a": 1}));
        assert_eq!(report.exit_code(), 0);

        let compact: serde_json::Value = serde_json::from_str(&report.render(JsonMode::Compact)).unwrap();
        assert_eq!(compact, json!({"ok": true, "cmd": "status", "code": "STATUS_READY", "data": {"a": 1}}));

        let full: serde_json::Value = serde_json::from_str(&report.render(JsonMode::Full)).unwrap();
        assert_eq!(full["command"], "status");
        assert_eq!(full["message"], "Status collected.");
        assert!(full["error"].is_null());
        assert_eq!(full["meta"]["version"], env!("CARGO_PKG_VERSION"));
        assert!(chrono::DateTime::parse_from_rfc3339(full["meta"]["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn failed_compact_report_keeps_error_and_non_empty_data() {
        let builder = ReportBuilder::start("act");
        let err = ReportError::new("ConfigError", "GUI_VISION_API_KEY is not configured.", Some("Run setup"));

        let bare = builder.fail(ResultCode::ConfigMissing, "Missing api key.", err.clone(), serde_json::Value::Null);
        assert_eq!(bare.exit_code(), 2);
        let compact = bare.to_compact();
        assert_eq!(compact["code"], "CONFIG_MISSING");
        assert_eq!(compact["error"]["type"], "ConfigError");
        assert_eq!(compact["error"]["hint"], "Run setup");
        assert!(compact.get("data").is_none());

        let with_data = builder.fail(ResultCode::ActionFailed, "Automation failed.", err, json!({"result": {}}));
        assert!(with_data.to_compact().get("data").is_some());
    }

    #[test]
    fn codes_display_in_screaming_case() {
        assert_eq!(ResultCode::UnhandledError.to_string(), "UNHANDLED_ERROR");
        assert_eq!(ResultCode::AnalysisDone.to_string(), "ANALYSIS_DONE");
    }
}
