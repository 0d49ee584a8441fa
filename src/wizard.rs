//! The core wizard: parsed entries in, AQL filter plus GUI expressions out.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::catalog::{FieldsApi, FieldsTransport};
use crate::entry::{normalize_brackets, split_flags, EntryKind, WizardEntry};
use crate::error::{ApiError, Error, NotFoundError, Result, WizardError};
use crate::expr::{
    build_child, build_expression, complex_query, get_query, ChildExpression, ExpressionNode,
    SUBS_JOINER,
};
use crate::operators::{get_operator, render};
use crate::schema::{pretty_schemas, FieldSchema};
use crate::value_parser::parse_value;

/// Field references: letters first, then letters, digits and `:._-`.
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9:._\-]*$").expect("static pattern compiles"));
/// Operator tokens: letters, digits, `_` and `-`.
static OP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-]+$").expect("static pattern compiles"));

/// A built query: the AQL filter text and the GUI expression nodes that
/// reproduce it in the query wizard UI.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResolvedQuery {
    pub filter: String,
    pub expressions: Vec<ExpressionNode>,
}

/// Turns wizard entries into a [`ResolvedQuery`] against one field catalog.
pub struct Wizard<'a, T> {
    fields: &'a FieldsApi<T>,
}

impl<'a, T: FieldsTransport> Wizard<'a, T> {
    pub fn new(fields: &'a FieldsApi<T>) -> Self {
        Self { fields }
    }

    /// Parse entries into a query. Fatal on the first bad entry.
    pub fn parse(&self, mut entries: Vec<WizardEntry>) -> Result<ResolvedQuery> {
        if entries.is_empty() {
            return Err(ApiError::new("no entries provided").into());
        }
        let count = entries.len();
        for (idx, entry) in entries.iter_mut().enumerate() {
            let source = entry
                .source
                .clone()
                .unwrap_or_else(|| format!("entry #{} of {count}", idx + 1));
            let (flags, value) =
                split_flags(&entry.value).map_err(|err| Error::Wizard(err.at(&source)))?;
            entry.flags.extend(flags);
            entry.value = value;
            entry.source = Some(source);
        }
        normalize_brackets(&mut entries);

        let groups = group_entries(entries)?;
        let mut expressions: Vec<ExpressionNode> = Vec::new();
        for (entry, subs) in &groups {
            let idx = expressions.len();
            let node = match entry.kind {
                EntryKind::Simple => self.parse_simple(entry, idx),
                EntryKind::Complex => self.parse_complex(entry, subs, idx),
                EntryKind::ComplexSub => unreachable!("grouped under a complex entry"),
            }
            .map_err(|err| locate(err, entry))?;
            expressions.push(node);
        }
        let filter = get_query(&expressions);
        debug!("built query from {} entries: {filter}", groups.len());
        Ok(ResolvedQuery {
            filter,
            expressions,
        })
    }

    fn parse_simple(&self, entry: &WizardEntry, idx: usize) -> Result<ExpressionNode> {
        let (field, operator, value) = split_simple(&entry.value)?;
        let schema = self.fields.resolve_field(&field)?;
        check_not_all(&schema)?;
        let operator = get_operator(&operator)?;
        let parsed = parse_value(operator.value_kind, &value)?;
        let query = render(operator.template, &schema.name, &parsed.aql_value);
        Ok(build_expression(
            entry,
            &schema,
            idx,
            query,
            operator.comp_op,
            parsed.expr_value,
            Vec::new(),
            false,
        ))
    }

    fn parse_complex(
        &self,
        entry: &WizardEntry,
        subs: &[WizardEntry],
        idx: usize,
    ) -> Result<ExpressionNode> {
        let field = entry.value.trim();
        if !FIELD_RE.is_match(field) {
            return Err(WizardError::new(format!(
                "invalid characters in field {field:?}"
            ))
            .into());
        }
        let schema = self.fields.resolve_field(field)?;
        check_not_all(&schema)?;
        if !schema.is_complex {
            let catalog = self.fields.get()?;
            let complex: Vec<&FieldSchema> = catalog[&schema.adapter_name]
                .iter()
                .filter(|s| s.is_complex && !s.is_all && !s.is_details)
                .collect();
            return Err(NotFoundError {
                value: entry.value.clone(),
                kind: "complex field",
                candidates: pretty_schemas(complex),
                fuzzy: false,
            }
            .into());
        }
        if subs.is_empty() {
            return Err(WizardError::new(format!(
                "complex entry for {:?} has no complex_sub entries",
                entry.value
            ))
            .into());
        }

        let mut children: Vec<ChildExpression> = Vec::new();
        for sub_entry in subs {
            let child = self
                .parse_complex_sub(&schema, sub_entry, children.len())
                .map_err(|err| locate(err, sub_entry))?;
            children.push(child);
        }
        let sub_queries: Vec<&str> = children.iter().map(|c| c.condition.as_str()).collect();
        let query = complex_query(&schema.name, &sub_queries.join(SUBS_JOINER));
        Ok(build_expression(
            entry,
            &schema,
            idx,
            query,
            "",
            None,
            children,
            true,
        ))
    }

    fn parse_complex_sub(
        &self,
        parent: &FieldSchema,
        entry: &WizardEntry,
        idx: usize,
    ) -> Result<ChildExpression> {
        let (field, operator, value) = split_simple(&entry.value)?;
        let search = field.to_lowercase();
        let sub = parent
            .sub_fields
            .iter()
            .find(|s| s.name.to_lowercase() == search)
            .ok_or_else(|| NotFoundError {
                value: field.clone(),
                kind: "sub field",
                candidates: parent.sub_fields.iter().map(|s| s.name.clone()).collect(),
                fuzzy: false,
            })?;
        let operator = get_operator(&operator)?;
        let parsed = parse_value(operator.value_kind, &value)?;
        let query = render(operator.template, &sub.name, &parsed.aql_value);
        Ok(build_child(
            &sub.name,
            idx,
            operator.comp_op,
            parsed.expr_value,
            query,
        ))
    }
}

/// Group entries into top-level entries with their complex subs attached.
fn group_entries(
    entries: Vec<WizardEntry>,
) -> Result<Vec<(WizardEntry, Vec<WizardEntry>)>> {
    let mut groups: Vec<(WizardEntry, Vec<WizardEntry>)> = Vec::new();
    for entry in entries {
        match entry.kind {
            EntryKind::Simple | EntryKind::Complex => groups.push((entry, Vec::new())),
            EntryKind::ComplexSub => match groups.last_mut() {
                Some((parent, subs)) if parent.kind == EntryKind::Complex => subs.push(entry),
                _ => {
                    let err = WizardError::new(
                        "complex_sub entry without a preceding complex entry",
                    );
                    return Err(locate(err.into(), &entry));
                }
            },
        }
    }
    Ok(groups)
}

/// Split a simple entry value into field, operator and value parts.
fn split_simple(value: &str) -> Result<(String, String, String)> {
    let mut parts = value.splitn(3, ' ');
    let field = parts.next().unwrap_or("").trim().to_string();
    let operator = parts.next().unwrap_or("").trim().to_lowercase();
    let rest = parts.next().unwrap_or("").trim().to_string();

    if field.is_empty() {
        return Err(WizardError::new(format!("missing field in {value:?}")).into());
    }
    if !FIELD_RE.is_match(&field) {
        return Err(WizardError::new(format!(
            "invalid characters in field {field:?} of {value:?}"
        ))
        .into());
    }
    if operator.is_empty() {
        return Err(WizardError::new(format!("missing operator in {value:?}")).into());
    }
    if !OP_RE.is_match(&operator) {
        return Err(WizardError::new(format!(
            "invalid characters in operator {operator:?} of {value:?}"
        ))
        .into());
    }
    Ok((field, operator, rest))
}

/// The synthesized whole-adapter field is not queryable.
fn check_not_all(schema: &FieldSchema) -> Result<()> {
    if schema.is_all {
        return Err(WizardError::new(format!(
            "the {:?} field of adapter {:?} can not be used in queries",
            schema.name_base, schema.adapter_name
        ))
        .into());
    }
    Ok(())
}

/// Attach the entry's source locator to wizard errors.
fn locate(err: Error, entry: &WizardEntry) -> Error {
    match (err, &entry.source) {
        (Error::Wizard(wizard), Some(source)) => Error::Wizard(wizard.at(source)),
        (err, _) => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_transport::CannedTransport;
    use pretty_assertions::assert_eq;

    fn api() -> FieldsApi<CannedTransport> {
        FieldsApi::new(CannedTransport::new())
    }

    fn entry(kind: EntryKind, value: &str) -> WizardEntry {
        WizardEntry::new(kind, value)
    }

    #[test]
    fn test_simple_contains_escapes_value() {
        let api = api();
        let result = Wizard::new(&api)
            .parse(vec![entry(EntryKind::Simple, "hostname contains test.domain")])
            .unwrap();
        assert_eq!(
            result.filter,
            r#"("specific_data.data.hostname" == regex("test\.domain", "i"))"#
        );
        assert_eq!(result.expressions.len(), 1);
        let node = &result.expressions[0];
        assert_eq!(node.comp_op, "contains");
        assert_eq!(node.field, "specific_data.data.hostname");
        assert_eq!(node.field_type, "axonius");
        assert_eq!(
            node.value,
            Some(crate::value_parser::ExprValue::Str("test.domain".to_string()))
        );
        assert!(!node.not_flag);
        assert!(!node.left_bracket);
        assert!(!node.right_bracket);
        assert_eq!(node.logic_op, "");
        assert_eq!(node.i, 0);
    }

    #[test]
    fn test_two_entries_join_with_and() {
        let api = api();
        let result = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Simple, "hostname exists"),
                entry(EntryKind::Simple, "os.type equals windows"),
            ])
            .unwrap();
        assert_eq!(
            result.filter,
            r#"(("specific_data.data.hostname" == ({"$exists":true,"$ne":""}))) and ("specific_data.data.os.type" == "windows")"#
        );
        assert_eq!(result.expressions[1].logic_op, "and");
    }

    #[test]
    fn test_or_not_flags() {
        let api = api();
        let result = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Simple, "hostname exists"),
                entry(EntryKind::Simple, "or not os.type equals windows"),
            ])
            .unwrap();
        assert!(result
            .filter
            .ends_with(r#"or not ("specific_data.data.os.type" == "windows")"#));
        assert_eq!(result.expressions[1].logic_op, "or");
        assert!(result.expressions[1].not_flag);
    }

    #[test]
    fn test_brackets_balance_in_filter() {
        let api = api();
        let result = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Simple, "( hostname exists"),
                entry(EntryKind::Simple, "or os.type equals windows"),
            ])
            .unwrap();
        let opens = result.filter.matches('(').count();
        let closes = result.filter.matches(')').count();
        assert_eq!(opens, closes);
        assert!(result.expressions[0].left_bracket);
        assert!(result.expressions[1].right_bracket);
    }

    #[test]
    fn test_complex_with_subs() {
        let api = api();
        let result = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Complex, "installed_software"),
                entry(EntryKind::ComplexSub, "name contains chrome"),
                entry(EntryKind::ComplexSub, "version earlier_than 99"),
            ])
            .unwrap();
        assert_eq!(
            result.filter,
            r#"("specific_data.data.installed_software" == match([("name" == regex("chrome", "i")) and ("version_raw" < '00000099')]))"#
        );
        let node = &result.expressions[0];
        assert_eq!(node.context.as_deref(), Some("OBJ"));
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].expression.field, "name");
        assert_eq!(node.children[1].i, 1);
    }

    #[test]
    fn test_complex_sub_without_complex_is_fatal() {
        let api = api();
        let err = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Simple, "hostname exists"),
                entry(EntryKind::ComplexSub, "version earlier_than 1"),
            ])
            .unwrap_err();
        let Error::Wizard(wizard) = err else {
            panic!("expected WizardError, got {err:?}");
        };
        assert!(wizard.message.contains("preceding complex"));
        assert_eq!(wizard.src.as_deref(), Some("entry #2 of 2"));
    }

    #[test]
    fn test_complex_on_plain_field_lists_complex_fields() {
        let api = api();
        let err = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Complex, "hostname"),
                entry(EntryKind::ComplexSub, "name exists"),
            ])
            .unwrap_err();
        let candidates = err.candidates().expect("structured candidates");
        assert!(candidates.iter().any(|c| c.contains("installed_software")));
    }

    #[test]
    fn test_complex_without_subs_is_fatal() {
        let api = api();
        let err = Wizard::new(&api)
            .parse(vec![entry(EntryKind::Complex, "installed_software")])
            .unwrap_err();
        assert!(matches!(err, Error::Wizard(_)));
    }

    #[test]
    fn test_unknown_sub_field_lists_sub_names() {
        let api = api();
        let err = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Complex, "installed_software"),
                entry(EntryKind::ComplexSub, "vendor exists"),
            ])
            .unwrap_err();
        assert_eq!(
            err.candidates(),
            Some(&["name".to_string(), "version".to_string()][..])
        );
    }

    #[test]
    fn test_all_field_refused() {
        let api = api();
        let err = Wizard::new(&api)
            .parse(vec![entry(EntryKind::Simple, "all exists")])
            .unwrap_err();
        let Error::Wizard(wizard) = err else {
            panic!("expected WizardError, got {err:?}");
        };
        assert!(wizard.message.contains("can not be used"));
    }

    #[test]
    fn test_invalid_field_characters() {
        let api = api();
        let err = Wizard::new(&api)
            .parse(vec![entry(EntryKind::Simple, "host$name exists")])
            .unwrap_err();
        let Error::Wizard(wizard) = err else {
            panic!("expected WizardError, got {err:?}");
        };
        assert!(wizard.message.contains("invalid characters in field"));
    }

    #[test]
    fn test_invalid_complex_field_characters() {
        let api = api();
        let err = Wizard::new(&api)
            .parse(vec![
                entry(EntryKind::Complex, "installed$software"),
                entry(EntryKind::ComplexSub, "version exists"),
            ])
            .unwrap_err();
        let Error::Wizard(wizard) = err else {
            panic!("expected WizardError, got {err:?}");
        };
        assert!(wizard.message.contains("invalid characters in field"));
        assert_eq!(wizard.src.as_deref(), Some("entry #1 of 2"));
    }

    #[test]
    fn test_empty_entries_rejected() {
        let api = api();
        assert!(Wizard::new(&api).parse(Vec::new()).is_err());
    }

    #[test]
    fn test_specific_adapter_field_type() {
        let api = api();
        let result = Wizard::new(&api)
            .parse(vec![entry(EntryKind::Simple, "aws:instance_id exists")])
            .unwrap();
        assert_eq!(result.expressions[0].field_type, "aws_adapter");
        assert!(result
            .filter
            .contains("adapters_data.aws_adapter.instance_id"));
    }

    #[test]
    fn test_idempotent_for_same_entries() {
        let api = api();
        let wizard = Wizard::new(&api);
        let entries = vec![
            entry(EntryKind::Simple, "( hostname exists"),
            entry(EntryKind::Simple, "or os.type equals windows"),
        ];
        let first = wizard.parse(entries.clone()).unwrap();
        let second = wizard.parse(entries).unwrap();
        assert_eq!(first, second);
    }
}
