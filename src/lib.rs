//! Query wizard: plain-text query documents resolved against a field
//! schema catalog into AQL filter strings plus the GUI expression nodes
//! that reproduce them in the platform's query wizard.
//!
//! The pipeline: a [`catalog::FieldsApi`] fetches and caches field schemas
//! through a [`catalog::FieldsTransport`]; the [`wizard::Wizard`] resolves
//! entries (fields, operators, values, logic flags) into a
//! [`wizard::ResolvedQuery`]; [`wizard_text`] and [`wizard_csv`] are the
//! document front ends.

pub mod catalog;
pub mod entry;
pub mod error;
pub mod expr;
pub mod fuzzy;
pub mod operators;
pub mod schema;
pub mod value_parser;
pub mod wizard;
pub mod wizard_csv;
pub mod wizard_text;

pub use catalog::{FieldsApi, FieldsTransport};
pub use entry::{EntryKind, WizardEntry};
pub use error::{ApiError, Error, NotFoundError, Result, WizardError};
pub use expr::ExpressionNode;
pub use schema::{FieldSchema, RawFields, SchemaCatalog};
pub use wizard::{ResolvedQuery, Wizard};
pub use wizard_csv::{SavedQueryAction, SavedQueryIntent, SavedQueryLookup, WizardCsv};
pub use wizard_text::WizardText;
