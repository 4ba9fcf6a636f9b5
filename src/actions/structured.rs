//! Structured-output parser backend.
//!
//! This backend is an optional capability: hosts install an implementation of
//! [`StructuredParser`] on the resolver, and selecting the backend without one
//! is a configuration failure. [`JsonActionParser`] is the implementation this
//! crate ships; it reads the `action_type` / `action_inputs` object layout used
//! by structured computer-use models.

use serde_json::Value;
use thiserror::Error;

use crate::actions::grammar::{parse_point_literal, strip_label};
use crate::actions::types::{ArgValue, BoundingBox, CommandKind, ParsedCommand, Point};
use crate::perception::types::ScreenGeometry;

#[derive(Debug, Error)]
pub enum StructuredParseError {
    /// The expression was understood but carried a bad value. The caller skips
    /// the expression and keeps going.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Anything else. Aborts parsing of the whole response.
    #[error("{0}")]
    Failed(String),
}

pub trait StructuredParser: Send + Sync {
    fn name(&self) -> &str;

    /// Parses one labelled expression (`Action: ...`).
    fn parse(
        &self,
        expression: &str,
        geometry: ScreenGeometry,
        scale_factor: u32,
    ) -> Result<Vec<ParsedCommand>, StructuredParseError>;
}

/// Reads `{"action_type": "click", "action_inputs": {"start_box": "[x, y]"}}`
/// objects, or arrays of them. Box arguments are renamed to the argument
/// names the dispatcher uses (`point`, `start_point`, `end_point`).
#[derive(Debug, Default, Clone)]
pub struct JsonActionParser;

impl JsonActionParser {
    pub fn new() -> Self {
        Self
    }
}

impl StructuredParser for JsonActionParser {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(
        &self,
        expression: &str,
        _geometry: ScreenGeometry,
        _scale_factor: u32,
    ) -> Result<Vec<ParsedCommand>, StructuredParseError> {
        let body = strip_label(expression);
        let start = body
            .find(|c: char| c == '{' || c == '[')
            .ok_or_else(|| StructuredParseError::InvalidValue("no JSON payload".into()))?;
        let json: Value = serde_json::from_str(&body[start..])
            .map_err(|e| StructuredParseError::InvalidValue(format!("malformed JSON: {e}")))?;

        match &json {
            Value::Object(_) => Ok(vec![command_from_json(&json)?]),
            // Non-object array items are ignored, matching the tolerant handling
            // of registered parser output.
            Value::Array(items) => items
                .iter()
                .filter(|item| item.is_object())
                .map(command_from_json)
                .collect(),
            other => Err(StructuredParseError::InvalidValue(format!(
                "expected object or array, got {other}"
            ))),
        }
    }
}

fn command_from_json(json: &Value) -> Result<ParsedCommand, StructuredParseError> {
    let action_type = json["action_type"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| StructuredParseError::InvalidValue("missing action_type".into()))?;
    let kind = CommandKind::from(action_type);
    let is_range = matches!(kind, CommandKind::Drag | CommandKind::Select);

    let mut command = ParsedCommand::new(kind);
    let Some(inputs) = json.get("action_inputs") else {
        return Ok(command);
    };
    let inputs = inputs.as_object().ok_or_else(|| {
        StructuredParseError::InvalidValue("action_inputs must be an object".into())
    })?;

    for (key, value) in inputs {
        let name = match key.as_str() {
            "start_box" if is_range => "start_point",
            "start_box" => "point",
            "end_box" => "end_point",
            other => other,
        };
        if let Some(arg) = arg_from_json(name, value)? {
            command.arguments.insert(name.to_string(), arg);
        }
    }
    Ok(command)
}

fn arg_from_json(name: &str, value: &Value) -> Result<Option<ArgValue>, StructuredParseError> {
    let is_coordinate = matches!(name, "point" | "start_point" | "end_point");
    match value {
        Value::Null => Ok(None),
        Value::String(s) if is_coordinate => parse_point_literal(s)
            .map(|c| Some(c.into()))
            .ok_or_else(|| StructuredParseError::InvalidValue(format!("{name}: bad coordinate {s:?}"))),
        Value::String(s) => Ok(Some(ArgValue::Text(s.clone()))),
        Value::Array(items) => {
            let nums: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
            match nums.as_deref() {
                Some([x, y]) => Ok(Some(Point::new(*x, *y).into())),
                Some([x1, y1, x2, y2]) => Ok(Some(BoundingBox::new(*x1, *y1, *x2, *y2).into())),
                _ => Err(StructuredParseError::InvalidValue(format!(
                    "{name}: expected 2 or 4 numbers"
                ))),
            }
        }
        Value::Number(n) if !is_coordinate => Ok(Some(ArgValue::Text(n.to_string()))),
        Value::Bool(b) if !is_coordinate => Ok(Some(ArgValue::Text(b.to_string()))),
        other => Err(StructuredParseError::InvalidValue(format!(
            "{name}: unsupported value {other}"
        ))),
    }
}
