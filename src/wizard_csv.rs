//! CSV wizard front end producing saved-query intents.
//!
//! Header: `type,query,name,description,tags,fields`. Rows with an empty or
//! `#`-prefixed type are skipped. The first data row must be `saved_query`;
//! following `simple`/`complex`/`complex_sub` rows accumulate under it until
//! the next `saved_query` row. Each accumulation flushes into one
//! [`SavedQueryIntent`].

use log::debug;

use crate::catalog::{FieldsApi, FieldsTransport};
use crate::entry::{EntryKind, WizardEntry};
use crate::error::{ApiError, Result, WizardError};
use crate::wizard::{ResolvedQuery, Wizard};

pub const TYPE_COLUMN: &str = "type";
pub const QUERY_COLUMN: &str = "query";
pub const NAME_COLUMN: &str = "name";
pub const DESCRIPTION_COLUMN: &str = "description";
pub const TAGS_COLUMN: &str = "tags";
pub const FIELDS_COLUMN: &str = "fields";
/// Row type opening a saved query.
pub const SAVED_QUERY_TYPE: &str = "saved_query";
/// Sentinel in the fields column expanding to the caller's default fields.
pub const DEFAULT_FIELDS_SENTINEL: &str = "default";

/// Whether a saved query with this name already exists.
pub trait SavedQueryLookup {
    /// The uuid of the existing saved query with this name, if any.
    fn get_by_name(&self, name: &str) -> Option<String>;
}

/// What to do with one parsed saved query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedQueryAction {
    Create,
    /// Replace the existing saved query with this uuid.
    Update(String),
}

/// One saved query parsed from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedQueryIntent {
    pub action: SavedQueryAction,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Qualified names of the columns the saved query selects.
    pub fields: Vec<String>,
    /// The built query, absent when no entry rows followed.
    pub query: Option<ResolvedQuery>,
}

pub struct WizardCsv<'a, T> {
    fields: &'a FieldsApi<T>,
    wizard: Wizard<'a, T>,
    lookup: Option<&'a dyn SavedQueryLookup>,
    default_fields: Vec<String>,
}

impl<'a, T: FieldsTransport> WizardCsv<'a, T> {
    pub fn new(fields: &'a FieldsApi<T>) -> Self {
        Self {
            fields,
            wizard: Wizard::new(fields),
            lookup: None,
            default_fields: Vec::new(),
        }
    }

    pub fn with_lookup(mut self, lookup: &'a dyn SavedQueryLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_default_fields(mut self, fields: Vec<String>) -> Self {
        self.default_fields = fields;
        self
    }

    /// Parse a CSV document into saved-query intents.
    pub fn parse(&self, content: &str) -> Result<Vec<SavedQueryIntent>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .map_err(|err| WizardError::new(format!("invalid csv header: {err}")))?
            .clone();
        let columns = Columns::from_headers(&headers)?;

        let mut intents: Vec<SavedQueryIntent> = Vec::new();
        let mut current: Option<(SavedQueryIntent, Vec<WizardEntry>)> = None;

        for (idx, record) in reader.records().enumerate() {
            // Header is row 1, first data row is row 2.
            let source = format!("csv row #{}", idx + 2);
            let record =
                record.map_err(|err| WizardError::new(format!("invalid row: {err}")).at(&source))?;
            let row_type = columns.get(&record, columns.row_type).trim().to_lowercase();
            if row_type.is_empty() || row_type.starts_with('#') {
                continue;
            }

            if row_type == SAVED_QUERY_TYPE {
                if let Some(group) = current.take() {
                    intents.push(self.flush(group)?);
                }
                current = Some((self.open_intent(&columns, &record, &source)?, Vec::new()));
                continue;
            }

            let kind = EntryKind::parse(&row_type).ok_or_else(|| {
                WizardError::new(format!(
                    "invalid type {row_type:?}, expected {SAVED_QUERY_TYPE}, simple, complex or complex_sub"
                ))
                .at(&source)
            })?;
            let Some((_, entries)) = current.as_mut() else {
                return Err(WizardError::new(format!(
                    "first data row must have type {SAVED_QUERY_TYPE:?}"
                ))
                .at(&source)
                .into());
            };
            let value = columns.get(&record, columns.query).trim().to_string();
            entries.push(WizardEntry::new(kind, value).with_source(source));
        }
        if let Some(group) = current.take() {
            intents.push(self.flush(group)?);
        }
        if intents.is_empty() {
            return Err(ApiError::new("no saved queries found in csv document").into());
        }
        debug!("parsed {} saved query intents", intents.len());
        Ok(intents)
    }

    fn open_intent(
        &self,
        columns: &Columns,
        record: &csv::StringRecord,
        source: &str,
    ) -> Result<SavedQueryIntent> {
        let name = columns.get(record, columns.name).trim().to_string();
        if name.is_empty() {
            return Err(WizardError::new(format!(
                "{SAVED_QUERY_TYPE} row is missing a name"
            ))
            .at(source)
            .into());
        }
        let description = columns.get(record, columns.description).trim().to_string();
        let tags: Vec<String> = columns
            .get(record, columns.tags)
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let fields = self.resolve_fields_cell(columns.get(record, columns.fields))?;
        let action = match self.lookup.and_then(|l| l.get_by_name(&name)) {
            Some(uuid) => SavedQueryAction::Update(uuid),
            None => SavedQueryAction::Create,
        };
        Ok(SavedQueryIntent {
            action,
            name,
            description: (!description.is_empty()).then_some(description),
            tags,
            fields,
            query: None,
        })
    }

    /// Resolve a fields cell into qualified names. The `default` sentinel
    /// expands to the caller's default field list; an empty cell means the
    /// defaults alone.
    fn resolve_fields_cell(&self, cell: &str) -> Result<Vec<String>> {
        let mut resolved: Vec<String> = Vec::new();
        let mut push = |name: String| {
            if !resolved.contains(&name) {
                resolved.push(name);
            }
        };
        let items: Vec<&str> = cell
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            self.default_fields.iter().cloned().for_each(&mut push);
            return Ok(resolved);
        }
        for item in items {
            if item.eq_ignore_ascii_case(DEFAULT_FIELDS_SENTINEL) {
                self.default_fields.iter().cloned().for_each(&mut push);
                continue;
            }
            for schema in self.fields.resolve_fields(item)? {
                push(schema.name_qual);
            }
        }
        Ok(resolved)
    }

    fn flush(&self, group: (SavedQueryIntent, Vec<WizardEntry>)) -> Result<SavedQueryIntent> {
        let (mut intent, entries) = group;
        if !entries.is_empty() {
            intent.query = Some(self.wizard.parse(entries)?);
        }
        Ok(intent)
    }
}

/// Column indexes resolved from the header row.
struct Columns {
    row_type: usize,
    query: Option<usize>,
    name: Option<usize>,
    description: Option<usize>,
    tags: Option<usize>,
    fields: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
        };
        let row_type = find(TYPE_COLUMN).ok_or_else(|| {
            WizardError::new(format!("csv header is missing the {TYPE_COLUMN:?} column"))
        })?;
        let query = find(QUERY_COLUMN);
        if query.is_none() {
            return Err(WizardError::new(format!(
                "csv header is missing the {QUERY_COLUMN:?} column"
            ))
            .into());
        }
        Ok(Self {
            row_type,
            query,
            name: find(NAME_COLUMN),
            description: find(DESCRIPTION_COLUMN),
            tags: find(TAGS_COLUMN),
            fields: find(FIELDS_COLUMN),
        })
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, idx: impl Into<Option<usize>>) -> &'r str {
        idx.into().and_then(|i| record.get(i)).unwrap_or("")
    }
}
