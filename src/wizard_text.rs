//! Line-oriented wizard front end.
//!
//! One entry per line: `type value...` where type is `simple`, `complex` or
//! `complex_sub`. Blank lines and `#` comments are skipped. The value may
//! be wrapped in double quotes.

use crate::catalog::{FieldsApi, FieldsTransport};
use crate::entry::{EntryKind, WizardEntry};
use crate::error::{ApiError, Result, WizardError};
use crate::wizard::{ResolvedQuery, Wizard};

pub struct WizardText<'a, T> {
    wizard: Wizard<'a, T>,
}

impl<'a, T: FieldsTransport> WizardText<'a, T> {
    pub fn new(fields: &'a FieldsApi<T>) -> Self {
        Self {
            wizard: Wizard::new(fields),
        }
    }

    /// Parse a whole document into a query.
    pub fn parse(&self, content: &str) -> Result<ResolvedQuery> {
        self.wizard.parse(lines_to_entries(content)?)
    }
}

/// Lex a text document into wizard entries, tagging each with its line
/// number for error messages.
pub fn lines_to_entries(content: &str) -> Result<Vec<WizardEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let source = format!("text line #{}", idx + 1);
        let (kind_token, value) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| WizardError::new(format!("missing value in line {line:?}")).at(&source))?;
        let kind = EntryKind::parse(kind_token).ok_or_else(|| {
            WizardError::new(format!(
                "invalid type {kind_token:?}, expected simple, complex or complex_sub"
            ))
            .at(&source)
        })?;
        let value = unquote(value.trim());
        entries.push(WizardEntry::new(kind, value).with_source(source));
    }
    if entries.is_empty() {
        return Err(ApiError::new("no entries found in text document").into());
    }
    Ok(entries)
}

/// Strip one pair of surrounding double quotes, if present.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
