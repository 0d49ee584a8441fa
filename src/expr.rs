//! GUI expression nodes and query text assembly.
//!
//! [`ExpressionNode`] serializes to the exact key shape the platform GUI
//! stores in saved queries, so queries built here render and re-edit
//! correctly in the query wizard UI.

use serde::Serialize;

use crate::entry::{Flag, WizardEntry};
use crate::schema::FieldSchema;
use crate::value_parser::ExprValue;

/// Joiner between sub conditions inside a complex match.
pub const SUBS_JOINER: &str = " and ";
/// `context` token marking complex expressions.
pub const CONTEXT_OBJ: &str = "OBJ";

pub fn wrap_not(query: &str) -> String {
    format!("not {query}")
}

pub fn wrap_left(query: &str) -> String {
    format!("({query}")
}

pub fn wrap_right(query: &str) -> String {
    format!("{query})")
}

pub fn wrap_or(query: &str) -> String {
    format!("or {query}")
}

pub fn wrap_and(query: &str) -> String {
    format!("and {query}")
}

/// AQL for a complex field match over joined sub conditions.
pub fn complex_query(field: &str, subs: &str) -> String {
    format!("(\"{field}\" == match([{subs}]))")
}

/// One node of a GUI expression, one per top-level wizard entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub bracket_weight: i64,
    pub children: Vec<ChildExpression>,
    pub comp_op: String,
    pub field: String,
    pub field_type: String,
    /// AQL fragment for this node, flags applied.
    pub filter: String,
    pub filtered_adapters: Option<()>,
    pub left_bracket: bool,
    pub logic_op: String,
    #[serde(rename = "not")]
    pub not_flag: bool,
    pub right_bracket: bool,
    pub value: Option<ExprValue>,
    /// Position of this node in the expression list.
    pub i: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One sub condition of a complex expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildExpression {
    pub condition: String,
    pub expression: ChildDetails,
    pub i: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDetails {
    pub comp_op: String,
    pub field: String,
    pub filtered_adapters: Option<()>,
    pub value: Option<ExprValue>,
}

impl Default for ChildExpression {
    fn default() -> Self {
        Self {
            condition: String::new(),
            expression: ChildDetails {
                comp_op: String::new(),
                field: String::new(),
                filtered_adapters: None,
                value: None,
            },
            i: 0,
        }
    }
}

/// Build the expression node for a top-level entry.
///
/// `query` is the rendered AQL before logic flags; `not`, brackets and the
/// `and`/`or` joiner are applied here. Entries past the first default to
/// `and` when neither `and` nor `or` was flagged.
pub fn build_expression(
    entry: &WizardEntry,
    field: &FieldSchema,
    idx: usize,
    query: String,
    comp_op: &str,
    value: Option<ExprValue>,
    children: Vec<ChildExpression>,
    is_complex: bool,
) -> ExpressionNode {
    let is_not = entry.has_flag(Flag::Not);
    let is_left = entry.has_flag(Flag::LeftBracket);
    let is_right = entry.has_flag(Flag::RightBracket);
    let is_or = entry.has_flag(Flag::Or);

    let mut filter = query;
    if is_not {
        filter = wrap_not(&filter);
    }
    if is_right {
        filter = wrap_right(&filter);
    }
    if is_left {
        filter = wrap_left(&filter);
    }
    let logic_op = if idx == 0 {
        String::new()
    } else if is_or {
        filter = wrap_or(&filter);
        "or".to_string()
    } else {
        filter = wrap_and(&filter);
        "and".to_string()
    };

    let children = if children.is_empty() {
        vec![ChildExpression::default()]
    } else {
        children
    };

    ExpressionNode {
        bracket_weight: entry.bracket_weight,
        children,
        comp_op: comp_op.to_string(),
        field: field.name.clone(),
        field_type: field.expr_field_type.clone(),
        filter,
        filtered_adapters: None,
        left_bracket: is_left,
        logic_op,
        not_flag: is_not,
        right_bracket: is_right,
        value,
        i: idx,
        context: is_complex.then(|| CONTEXT_OBJ.to_string()),
    }
}

/// Build one sub condition of a complex expression.
pub fn build_child(
    field_name: &str,
    idx: usize,
    comp_op: &str,
    value: Option<ExprValue>,
    query: String,
) -> ChildExpression {
    ChildExpression {
        condition: query,
        expression: ChildDetails {
            comp_op: comp_op.to_string(),
            field: field_name.to_string(),
            filtered_adapters: None,
            value,
        },
        i: idx,
    }
}

/// The final AQL: node filters joined by single spaces.
pub fn get_query(expressions: &[ExpressionNode]) -> String {
    expressions
        .iter()
        .map(|node| node.filter.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// AND together already-valid filters, skipping empty and absent ones.
/// Each surviving filter is parenthesized.
pub fn join_and_or_not<I, S>(filters: I) -> String
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    filters
        .into_iter()
        .flatten()
        .filter_map(|filter| {
            let trimmed = filter.as_ref().trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        })
        .map(|filter| format!("({filter})"))
        .collect::<Vec<_>>()
        .join(" and ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryKind, WizardEntry};
    use crate::schema::parse_fields;
    use pretty_assertions::assert_eq;

    fn hostname_schema() -> FieldSchema {
        let catalog = parse_fields(&crate::schema::test_fixtures::sample_raw());
        catalog["agg"]
            .iter()
            .find(|f| f.name_base == "hostname")
            .unwrap()
            .clone()
    }

    #[test]
    fn test_join_and_or_not_skips_empty_and_none() {
        let joined = join_and_or_not([Some("a == 1"), None, Some(""), Some("b == 2")]);
        assert_eq!(joined, "(a == 1) and (b == 2)");
    }

    #[test]
    fn test_join_and_or_not_rewrap_only_adds_parens() {
        let once = join_and_or_not([Some("a == 1")]);
        assert_eq!(once, "(a == 1)");
        let twice = join_and_or_not([Some(once.as_str())]);
        assert_eq!(twice, "((a == 1))");
    }

    #[test]
    fn test_join_and_or_not_all_empty() {
        let joined = join_and_or_not::<_, &str>([None, Some("  ")]);
        assert_eq!(joined, "");
    }

    #[test]
    fn test_flags_wrap_in_order() {
        let mut entry = WizardEntry::new(EntryKind::Simple, "hostname exists");
        entry.flags = vec![Flag::Or, Flag::Not, Flag::LeftBracket];
        let node = build_expression(
            &entry,
            &hostname_schema(),
            1,
            "(\"f\" == \"x\")".to_string(),
            "equals",
            None,
            Vec::new(),
            false,
        );
        assert_eq!(node.filter, "or (not (\"f\" == \"x\")");
        assert_eq!(node.logic_op, "or");
        assert!(node.not_flag);
        assert!(node.left_bracket);
    }

    #[test]
    fn test_first_expression_has_no_logic_op() {
        let entry = WizardEntry::new(EntryKind::Simple, "hostname exists");
        let node = build_expression(
            &entry,
            &hostname_schema(),
            0,
            "q".to_string(),
            "exists",
            None,
            Vec::new(),
            false,
        );
        assert_eq!(node.logic_op, "");
        assert_eq!(node.filter, "q");
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0], ChildExpression::default());
    }

    #[test]
    fn test_later_expression_defaults_to_and() {
        let entry = WizardEntry::new(EntryKind::Simple, "hostname exists");
        let node = build_expression(
            &entry,
            &hostname_schema(),
            2,
            "q".to_string(),
            "exists",
            None,
            Vec::new(),
            false,
        );
        assert_eq!(node.logic_op, "and");
        assert_eq!(node.filter, "and q");
    }

    #[test]
    fn test_serialized_key_shape() {
        let entry = WizardEntry::new(EntryKind::Simple, "hostname exists");
        let node = build_expression(
            &entry,
            &hostname_schema(),
            0,
            "q".to_string(),
            "exists",
            None,
            Vec::new(),
            false,
        );
        let json = serde_json::to_value(&node).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "bracketWeight",
            "children",
            "compOp",
            "field",
            "fieldType",
            "filter",
            "filteredAdapters",
            "leftBracket",
            "logicOp",
            "not",
            "rightBracket",
            "value",
            "i",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(!obj.contains_key("context"));
        assert_eq!(json["fieldType"], "axonius");
        assert_eq!(json["field"], "specific_data.data.hostname");
    }

    #[test]
    fn test_complex_node_carries_obj_context() {
        let entry = WizardEntry::new(EntryKind::Complex, "installed_software");
        let child = build_child("version", 0, "<", None, "c".to_string());
        let node = build_expression(
            &entry,
            &hostname_schema(),
            0,
            "q".to_string(),
            "",
            None,
            vec![child],
            true,
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["context"], "OBJ");
        assert_eq!(json["children"][0]["condition"], "c");
        assert_eq!(json["children"][0]["expression"]["compOp"], "<");
    }

    #[test]
    fn test_get_query_joins_filters_with_spaces() {
        let entry = WizardEntry::new(EntryKind::Simple, "x");
        let schema = hostname_schema();
        let first = build_expression(&entry, &schema, 0, "a".into(), "", None, vec![], false);
        let second = build_expression(&entry, &schema, 1, "b".into(), "", None, vec![], false);
        assert_eq!(get_query(&[first, second]), "a and b");
    }
}
