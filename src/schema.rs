//! Raw field documents and the parsed per-adapter schema catalog.
//!
//! The platform returns field schemas as one document with a `generic`
//! section (aggregated fields) and a `specific` map keyed by raw adapter
//! name. Parsing normalizes both into [`FieldSchema`] values grouped by
//! short adapter name, synthesizing the `all` and `raw_data` pseudo fields
//! and a non-selectable `_details` twin for every real field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Short name of the aggregated pseudo adapter.
pub const AGG_ADAPTER_NAME: &str = "agg";
/// Display title of the aggregated pseudo adapter.
pub const AGG_ADAPTER_TITLE: &str = "Aggregated";
/// `fieldType` sentinel used in expressions over aggregated fields.
pub const AGG_EXPR_FIELD_TYPE: &str = "axonius";
/// Aliases users may type for the aggregated adapter.
pub const AGG_ADAPTER_ALTS: [&str; 5] = ["generic", "general", "specific", "agg", "aggregated"];
/// Qualified prefix of aggregated field names.
pub const AGG_ADAPTER_PREFIX: &str = "specific_data.data";
/// Suffix stripped from raw adapter names.
pub const ADAPTER_NAME_SUFFIX: &str = "_adapter";
/// Name of the synthesized whole-adapter field.
pub const ALL_NAME: &str = "all";
/// Name of the synthesized raw-data field on non-aggregated adapters.
pub const RAW_NAME: &str = "raw_data";
/// Suffix of the synthesized detail-column twin of every field.
pub const DETAILS_SUFFIX: &str = "_details";

/// Parsed schemas grouped by short adapter name. Ordered so listings in
/// error messages are stable.
pub type SchemaCatalog = BTreeMap<String, Vec<FieldSchema>>;

/// One field schema as returned by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub items: Option<RawItems>,
}

/// The `items` object of an array-typed raw field. A field is complex when
/// its own type and its items type are both `array`; the sub field schemas
/// then live under `items.items`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItems {
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub items: Vec<RawField>,
}

/// The whole raw fields document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFields {
    pub generic: Vec<RawField>,
    #[serde(default)]
    pub specific: BTreeMap<String, Vec<RawField>>,
}

/// A fully parsed field schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    /// Fully qualified server name, e.g. `specific_data.data.hostname`.
    pub name: String,
    /// Name with the adapter prefix stripped, e.g. `hostname`.
    pub name_base: String,
    /// Qualified name used when selecting the field.
    pub name_qual: String,
    /// Human title from the raw schema.
    pub title: String,
    /// Raw type token (`string`, `array`, ...).
    pub field_type: String,
    /// Short adapter name, e.g. `aws`.
    pub adapter_name: String,
    /// Raw adapter name, e.g. `aws_adapter`.
    pub adapter_name_raw: String,
    /// Adapter display title.
    pub adapter_title: String,
    /// Qualified prefix of this adapter's field names.
    pub adapter_prefix: String,
    /// `"<Adapter Title>: <Field Title>"`, used in listings.
    pub column_title: String,
    /// `fieldType` token emitted in expressions over this field.
    pub expr_field_type: String,
    /// Qualified name of the enclosing complex field, or `root`.
    pub parent: String,
    pub is_complex: bool,
    pub is_list: bool,
    pub is_root: bool,
    pub is_agg: bool,
    pub is_all: bool,
    pub is_details: bool,
    /// Whether the field may be referenced in searches and selections.
    pub selectable: bool,
    /// Sub field schemas of a complex field.
    pub sub_fields: Vec<FieldSchema>,
}

impl FieldSchema {
    /// Lookup key accessor used by the resolver's key-priority scan.
    pub fn key_value(&self, key: &str) -> &str {
        match key {
            "name_base" => &self.name_base,
            "name_qual" => &self.name_qual,
            "name" => &self.name,
            "title" => &self.title,
            _ => "",
        }
    }

    /// `adapter:name_base -> column_title` line for error listings.
    pub fn pretty(&self, width: usize) -> String {
        format!(
            "{}:{:<width$} -> {}",
            self.adapter_name, self.name_base, self.column_title
        )
    }
}

/// Render schemas as aligned `adapter:name -> title` lines.
pub fn pretty_schemas<'a>(schemas: impl IntoIterator<Item = &'a FieldSchema>) -> Vec<String> {
    let schemas: Vec<&FieldSchema> = schemas.into_iter().collect();
    let width = schemas
        .iter()
        .map(|s| s.name_base.len())
        .max()
        .unwrap_or(0);
    schemas.iter().map(|s| s.pretty(width)).collect()
}

struct AdapterCtx {
    name: String,
    name_raw: String,
    title: String,
    prefix: String,
    /// `name_qual` given to the synthesized `all` field.
    all_qual: String,
    expr_field_type: String,
    is_agg: bool,
}

impl AdapterCtx {
    fn agg() -> Self {
        Self {
            name: AGG_ADAPTER_NAME.to_string(),
            name_raw: format!("{AGG_ADAPTER_NAME}{ADAPTER_NAME_SUFFIX}"),
            title: AGG_ADAPTER_TITLE.to_string(),
            prefix: AGG_ADAPTER_PREFIX.to_string(),
            all_qual: "specific_data".to_string(),
            expr_field_type: AGG_EXPR_FIELD_TYPE.to_string(),
            is_agg: true,
        }
    }

    fn specific(raw_name: &str) -> Self {
        let name = strip_right(raw_name, ADAPTER_NAME_SUFFIX).to_string();
        let prefix = format!("adapters_data.{raw_name}");
        Self {
            title: titleize(&name),
            all_qual: prefix.clone(),
            expr_field_type: raw_name.to_string(),
            name,
            name_raw: raw_name.to_string(),
            prefix,
            is_agg: false,
        }
    }
}

/// Parse the raw fields document into a catalog keyed by short adapter name.
pub fn parse_fields(raw: &RawFields) -> SchemaCatalog {
    let mut catalog = SchemaCatalog::new();
    catalog.insert(
        AGG_ADAPTER_NAME.to_string(),
        parse_adapter_schemas(&AdapterCtx::agg(), &raw.generic),
    );
    for (raw_name, fields) in &raw.specific {
        let ctx = AdapterCtx::specific(raw_name);
        let parsed = parse_adapter_schemas(&ctx, fields);
        catalog.insert(ctx.name, parsed);
    }
    catalog
}

fn parse_adapter_schemas(ctx: &AdapterCtx, raw_fields: &[RawField]) -> Vec<FieldSchema> {
    let mut fields = vec![all_schema(ctx)];
    if !ctx.is_agg {
        fields.push(raw_data_schema(ctx));
    }

    let base_names: Vec<String> = raw_fields
        .iter()
        .map(|f| strip_left(&f.name, &ctx.prefix).trim_matches('.').to_string())
        .collect();

    for raw in raw_fields {
        let name_base = strip_left(&raw.name, &ctx.prefix).trim_matches('.').to_string();
        let mut field = FieldSchema {
            name: raw.name.clone(),
            name_qual: raw.name.clone(),
            title: raw.title.clone(),
            field_type: raw.field_type.clone(),
            adapter_name: ctx.name.clone(),
            adapter_name_raw: ctx.name_raw.clone(),
            adapter_title: ctx.title.clone(),
            adapter_prefix: ctx.prefix.clone(),
            column_title: format!("{}: {}", ctx.title, raw.title),
            expr_field_type: ctx.expr_field_type.clone(),
            parent: "root".to_string(),
            is_complex: false,
            is_list: raw.field_type == "array",
            is_root: is_root(&name_base, &base_names),
            is_agg: ctx.is_agg,
            is_all: false,
            is_details: false,
            selectable: true,
            sub_fields: Vec::new(),
            name_base,
        };
        parse_complex(&mut field, raw);
        let details = details_twin(&field);
        fields.push(field);
        fields.push(details);
    }
    fields
}

/// Expand sub field schemas when the raw field is complex.
fn parse_complex(field: &mut FieldSchema, raw: &RawField) {
    let items = match &raw.items {
        Some(items) if raw.field_type == "array" && items.item_type.as_deref() == Some("array") => {
            &items.items
        }
        _ => return,
    };
    field.is_complex = true;

    let sub_names: Vec<String> = items.iter().map(|s| s.name.clone()).collect();
    for raw_sub in items {
        let name_base = format!("{}.{}", field.name_base, raw_sub.name);
        let mut sub = FieldSchema {
            name: raw_sub.name.clone(),
            name_qual: format!("{}.{}", field.adapter_prefix, name_base),
            title: raw_sub.title.clone(),
            field_type: raw_sub.field_type.clone(),
            adapter_name: field.adapter_name.clone(),
            adapter_name_raw: field.adapter_name_raw.clone(),
            adapter_title: field.adapter_title.clone(),
            adapter_prefix: field.adapter_prefix.clone(),
            column_title: format!("{}: {}", field.column_title, raw_sub.title),
            expr_field_type: field.expr_field_type.clone(),
            parent: field.name_qual.clone(),
            is_complex: false,
            is_list: raw_sub.field_type == "array",
            is_root: is_root(&raw_sub.name, &sub_names),
            is_agg: field.is_agg,
            is_all: false,
            is_details: field.is_details,
            selectable: true,
            sub_fields: Vec::new(),
            name_base,
        };
        parse_complex(&mut sub, raw_sub);
        field.sub_fields.push(sub);
    }
}

fn all_schema(ctx: &AdapterCtx) -> FieldSchema {
    FieldSchema {
        name: ALL_NAME.to_string(),
        name_base: ALL_NAME.to_string(),
        name_qual: ctx.all_qual.clone(),
        title: "All Adapter Specific Data".to_string(),
        field_type: "array".to_string(),
        adapter_name: ctx.name.clone(),
        adapter_name_raw: ctx.name_raw.clone(),
        adapter_title: ctx.title.clone(),
        adapter_prefix: ctx.prefix.clone(),
        column_title: format!("All {} Data", ctx.title),
        expr_field_type: AGG_EXPR_FIELD_TYPE.to_string(),
        parent: "root".to_string(),
        is_complex: true,
        is_list: true,
        is_root: false,
        is_agg: ctx.is_agg,
        is_all: true,
        is_details: false,
        selectable: true,
        sub_fields: Vec::new(),
    }
}

fn raw_data_schema(ctx: &AdapterCtx) -> FieldSchema {
    FieldSchema {
        name: format!("{}.{}", ctx.prefix, RAW_NAME),
        name_base: RAW_NAME.to_string(),
        name_qual: format!("{}.{}", ctx.prefix, RAW_NAME),
        title: "Adapter Raw Data".to_string(),
        field_type: "array".to_string(),
        adapter_name: ctx.name.clone(),
        adapter_name_raw: ctx.name_raw.clone(),
        adapter_title: ctx.title.clone(),
        adapter_prefix: ctx.prefix.clone(),
        column_title: format!("{} Raw Data", ctx.title),
        expr_field_type: AGG_EXPR_FIELD_TYPE.to_string(),
        parent: "root".to_string(),
        is_complex: true,
        is_list: true,
        is_root: false,
        is_agg: ctx.is_agg,
        is_all: false,
        is_details: false,
        selectable: true,
        sub_fields: Vec::new(),
    }
}

/// The `<name>_details` companion: same shape, never selectable.
fn details_twin(field: &FieldSchema) -> FieldSchema {
    let mut details = field.clone();
    details.name.push_str(DETAILS_SUFFIX);
    details.name_base.push_str(DETAILS_SUFFIX);
    details.name_qual.push_str(DETAILS_SUFFIX);
    details.column_title.push_str(" Details");
    details.selectable = false;
    details.is_details = true;
    details
}

/// A field is root unless its first dotted segment names another field.
fn is_root(name: &str, names: &[String]) -> bool {
    match name.split_once('.') {
        Some((head, _)) => !names.iter().any(|n| n == head),
        None => true,
    }
}

pub(crate) fn strip_left<'a>(value: &'a str, fix: &str) -> &'a str {
    value.strip_prefix(fix).unwrap_or(value)
}

pub(crate) fn strip_right<'a>(value: &'a str, fix: &str) -> &'a str {
    value.strip_suffix(fix).unwrap_or(value)
}

/// `aws_ec2` -> `Aws Ec2`.
fn titleize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
