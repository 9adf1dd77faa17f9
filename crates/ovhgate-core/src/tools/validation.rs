//! Tool argument validation
//!
//! Arguments are checked against the tool's parameter list before any
//! network call. Failures are validation errors: status 0, never retried.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::http::error::OvhApiError;
use crate::tools::catalog::{ParamKind, ParamLocation, ParamSpec, ToolDefinition, DUMP_DATES};

fn segment_regex() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]{1,255}$").expect("valid segment regex"))
}

/// A validated tool call, ready to hand to the client
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    /// Path with every placeholder filled
    pub path: String,
    pub body: Option<Value>,
}

/// Check `arguments` against `tool` and build the request path and body
pub fn prepare_call(tool: &ToolDefinition, arguments: &Value) -> Result<PreparedCall, OvhApiError> {
    let empty = Map::new();
    let args = match arguments {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return Err(OvhApiError::validation("Arguments must be a JSON object")),
    };

    if let Some(unknown) = args
        .keys()
        .find(|key| !tool.params.iter().any(|param| param.name == key.as_str()))
    {
        return Err(OvhApiError::validation(format!(
            "Unknown argument '{}' for tool {}",
            unknown, tool.name
        )));
    }

    let mut path = tool.path.to_string();
    let mut body = Map::new();

    for param in tool.params {
        let value = match args.get(param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(OvhApiError::validation(format!("'{}' is required", param.name)))
            }
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };

        let checked = check_value(param, value)?;
        match param.location {
            ParamLocation::Path => {
                let text = match &checked {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                path = path.replace(&format!("{{{}}}", param.name), &text);
            }
            ParamLocation::Body => {
                body.insert(param.name.to_string(), checked);
            }
        }
    }

    Ok(PreparedCall {
        path,
        body: if body.is_empty() { None } else { Some(Value::Object(body)) },
    })
}

fn check_value(param: &ParamSpec, value: &Value) -> Result<Value, OvhApiError> {
    match param.kind {
        ParamKind::Segment => {
            let text = value.as_str().ok_or_else(|| type_error(param, "a string"))?;
            if text.trim().is_empty() {
                return Err(OvhApiError::validation(format!("'{}' must not be empty", param.name)));
            }
            if !segment_regex().is_match(text) || text == "." || text == ".." {
                return Err(OvhApiError::validation(format!(
                    "'{}' must be 1-255 letters, digits, '.', '_' or '-'",
                    param.name
                )));
            }
            Ok(Value::String(text.to_string()))
        }
        ParamKind::PositiveInteger => {
            let number = match value {
                Value::Number(n) => n.as_u64(),
                Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                    s.parse::<u64>().ok()
                }
                _ => None,
            };
            match number {
                Some(n) if n > 0 => Ok(Value::from(n)),
                _ => Err(type_error(param, "a positive integer")),
            }
        }
        ParamKind::DumpDate => {
            let text = value.as_str().ok_or_else(|| type_error(param, "a string"))?;
            if DUMP_DATES.contains(&text) {
                Ok(Value::String(text.to_string()))
            } else {
                Err(OvhApiError::validation(format!(
                    "'{}' must be one of {}",
                    param.name,
                    DUMP_DATES.join(", ")
                )))
            }
        }
        ParamKind::Boolean => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| type_error(param, "a boolean")),
    }
}

fn type_error(param: &ParamSpec, expected: &str) -> OvhApiError {
    OvhApiError::validation(format!("'{}' must be {}", param.name, expected))
}
