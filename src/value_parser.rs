//! Coercion of user-supplied operator values.
//!
//! Each [`ValueKind`](crate::operators::ValueKind) turns the raw text from a
//! wizard entry into two things: the text interpolated into the AQL template
//! and the value carried in the GUI expression.

use serde::Serialize;

use crate::error::WizardError;
use crate::operators::ValueKind;

/// Width each dotted version segment is zero padded to, so padded versions
/// compare correctly as strings.
pub const VERSION_SEGMENT_WIDTH: usize = 8;

/// The value slot of a GUI expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExprValue {
    Str(String),
    Int(i64),
}

/// Parsed value: the AQL interpolation text plus the expression value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    pub aql_value: String,
    pub expr_value: Option<ExprValue>,
}

/// Coerce `value` according to `kind`.
pub fn parse_value(kind: ValueKind, value: &str) -> Result<ParsedValue, WizardError> {
    let value = value.trim();
    match kind {
        ValueKind::NoValue => Ok(ParsedValue {
            aql_value: String::new(),
            expr_value: None,
        }),
        ValueKind::Str => {
            let value = require_value(kind, value)?;
            Ok(ParsedValue {
                aql_value: value.to_string(),
                expr_value: Some(ExprValue::Str(value.to_string())),
            })
        }
        ValueKind::Auto => {
            let value = require_value(kind, value)?;
            if let Ok(number) = value.parse::<i64>() {
                return Ok(ParsedValue {
                    aql_value: number.to_string(),
                    expr_value: Some(ExprValue::Int(number)),
                });
            }
            if value == "true" || value == "false" {
                return Ok(ParsedValue {
                    aql_value: value.to_string(),
                    expr_value: Some(ExprValue::Str(value.to_string())),
                });
            }
            Ok(ParsedValue {
                aql_value: format!("\"{}\"", value.replace('"', "\\\"")),
                expr_value: Some(ExprValue::Str(value.to_string())),
            })
        }
        ValueKind::EscapedRegex => {
            let value = require_value(kind, value)?;
            Ok(ParsedValue {
                aql_value: regex::escape(value),
                expr_value: Some(ExprValue::Str(value.to_string())),
            })
        }
        ValueKind::Int => {
            let value = require_value(kind, value)?;
            let number: i64 = value.parse().map_err(|_| {
                WizardError::new(format!("invalid integer value {value:?}"))
            })?;
            Ok(ParsedValue {
                aql_value: number.to_string(),
                expr_value: Some(ExprValue::Int(number)),
            })
        }
        ValueKind::Csv => {
            let value = require_value(kind, value)?;
            let items: Vec<&str> = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .collect();
            if items.is_empty() {
                return Err(WizardError::new(format!(
                    "no usable items in csv value {value:?}"
                )));
            }
            let aql_value = items
                .iter()
                .map(|item| format!("\"{}\"", item.replace('"', "\\\"")))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(ParsedValue {
                aql_value,
                expr_value: Some(ExprValue::Str(items.join(","))),
            })
        }
        ValueKind::Version => {
            let value = require_value(kind, value)?;
            Ok(ParsedValue {
                aql_value: pad_version(value)?,
                expr_value: Some(ExprValue::Str(value.to_string())),
            })
        }
    }
}

fn require_value(kind: ValueKind, value: &str) -> Result<&str, WizardError> {
    if value.is_empty() {
        return Err(WizardError::new(format!(
            "operator requires a {kind:?} value, none supplied"
        )));
    }
    Ok(value)
}

/// Zero pad each dotted segment so padded versions sort like versions.
/// An optional `name:` prefix is carried through unpadded.
fn pad_version(value: &str) -> Result<String, WizardError> {
    let (prefix, version) = match value.split_once(':') {
        Some((name, version)) => (Some(name), version),
        None => (None, value),
    };
    let mut padded = Vec::new();
    for segment in version.split('.') {
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WizardError::new(format!(
                "invalid version segment {segment:?} in {value:?}"
            )));
        }
        padded.push(format!("{segment:0>VERSION_SEGMENT_WIDTH$}"));
    }
    let padded = padded.concat();
    Ok(match prefix {
        Some(name) => format!("{name}:{padded}"),
        None => padded,
    })
}
