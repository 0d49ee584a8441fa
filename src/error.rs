//! Error taxonomy for adapter/field resolution and wizard parsing.
//!
//! Lookup failures carry structured data (the searched value plus the valid
//! alternatives) so callers and tests can act on them without scraping
//! message text. Every error is fatal to the invocation that raised it;
//! there are no partial results.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to fetch field schemas")]
    SchemaFetch(#[source] anyhow::Error),
}

impl Error {
    /// Structured alternatives when this is a lookup failure.
    pub fn candidates(&self) -> Option<&[String]> {
        match self {
            Error::NotFound(err) => Some(&err.candidates),
            _ => None,
        }
    }
}

/// A lookup (adapter, field, sub field, operator) found no exact match.
///
/// `candidates` lists valid alternatives. When `fuzzy` is true the list was
/// narrowed by fuzzy matching against the searched value instead of being
/// the full valid set.
#[derive(Debug, Clone, PartialEq)]
pub struct NotFoundError {
    pub value: String,
    pub kind: &'static str,
    pub candidates: Vec<String>,
    pub fuzzy: bool,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listing = if self.fuzzy {
            "close matches"
        } else {
            "valid values"
        };
        writeln!(
            f,
            "no {} matching {:?}, {}:",
            self.kind, self.value, listing
        )?;
        for candidate in &self.candidates {
            writeln!(f, "  {candidate}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NotFoundError {}

/// A wizard document entry could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardError {
    /// Where the entry came from, e.g. "text line #3" or "csv row #2".
    pub src: Option<String>,
    pub message: String,
}

impl WizardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            src: None,
            message: message.into(),
        }
    }

    /// Attach a source locator if one is not already set.
    pub fn at(mut self, src: impl Into<String>) -> Self {
        if self.src.is_none() {
            self.src = Some(src.into());
        }
        self
    }
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.src {
            Some(src) => write!(f, "error in {}: {}", src, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for WizardError {}

/// Caller misuse of the API surface, e.g. an empty search string.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_not_found_display_lists_candidates() {
        let err = NotFoundError {
            value: "hstname".to_string(),
            kind: "field",
            candidates: vec!["agg:hostname".to_string(), "agg:host_name".to_string()],
            fuzzy: true,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("close matches"));
        assert!(rendered.contains("agg:hostname"));
        assert!(rendered.contains("agg:host_name"));
    }

    #[test]
    fn test_wizard_error_keeps_first_source() {
        let err = WizardError::new("bad entry")
            .at("text line #3")
            .at("text line #9");
        assert_eq!(err.src.as_deref(), Some("text line #3"));
        assert_eq!(err.to_string(), "error in text line #3: bad entry");
    }

    #[test]
    fn test_error_candidates_accessor() {
        let err: Error = NotFoundError {
            value: "x".to_string(),
            kind: "adapter",
            candidates: vec!["agg".to_string()],
            fuzzy: false,
        }
        .into();
        assert_eq!(err.candidates(), Some(&["agg".to_string()][..]));
        let err: Error = ApiError::new("boom").into();
        assert_eq!(err.candidates(), None);
    }
}
