//! The wizard operator table.
//!
//! Each operator maps a token from wizard entries to the `compOp` the GUI
//! expression uses, an AQL template with `{field}` and `{aql_value}` slots,
//! and the coercion applied to the user value before it lands in the
//! template. Operator-to-field-type compatibility is not validated here;
//! the platform rejects nonsense server side.

use crate::error::{NotFoundError, Result};

/// How the user-supplied value is coerced before template rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Operator takes no value; any supplied text is ignored.
    NoValue,
    /// Plain string, used verbatim.
    Str,
    /// Numbers and booleans stay bare, everything else gets quoted.
    Auto,
    /// Regex-escaped before interpolation into `regex(...)`.
    EscapedRegex,
    /// Integer literal.
    Int,
    /// Comma separated list, each item quoted.
    Csv,
    /// Dotted version, each segment zero padded for lexicographic compare.
    Version,
}

#[derive(Debug, Clone, Copy)]
pub struct Operator {
    /// Token used in wizard entries.
    pub name: &'static str,
    /// `compOp` emitted in the GUI expression.
    pub comp_op: &'static str,
    /// AQL template with `{field}` and `{aql_value}` slots.
    pub template: &'static str,
    pub value_kind: ValueKind,
}

pub static OPERATORS: &[Operator] = &[
    Operator {
        name: "exists",
        comp_op: "exists",
        template: r#"(("{field}" == ({"$exists":true,"$ne":""})))"#,
        value_kind: ValueKind::NoValue,
    },
    Operator {
        name: "contains",
        comp_op: "contains",
        template: r#"("{field}" == regex("{aql_value}", "i"))"#,
        value_kind: ValueKind::EscapedRegex,
    },
    Operator {
        name: "regex",
        comp_op: "regex",
        template: r#"("{field}" == regex("{aql_value}", "i"))"#,
        value_kind: ValueKind::Str,
    },
    Operator {
        name: "equals",
        comp_op: "equals",
        template: r#"("{field}" == {aql_value})"#,
        value_kind: ValueKind::Auto,
    },
    Operator {
        name: "startswith",
        comp_op: "starts",
        template: r#"("{field}" == regex("^{aql_value}", "i"))"#,
        value_kind: ValueKind::EscapedRegex,
    },
    Operator {
        name: "endswith",
        comp_op: "ends",
        template: r#"("{field}" == regex("{aql_value}$", "i"))"#,
        value_kind: ValueKind::EscapedRegex,
    },
    Operator {
        name: "in",
        comp_op: "IN",
        template: r#"("{field}" in [{aql_value}])"#,
        value_kind: ValueKind::Csv,
    },
    Operator {
        name: "less_than",
        comp_op: "<",
        template: r#"("{field}" < {aql_value})"#,
        value_kind: ValueKind::Int,
    },
    Operator {
        name: "more_than",
        comp_op: ">",
        template: r#"("{field}" > {aql_value})"#,
        value_kind: ValueKind::Int,
    },
    Operator {
        name: "last_days",
        comp_op: "days",
        template: r#"("{field}" >= date("NOW - {aql_value}d"))"#,
        value_kind: ValueKind::Int,
    },
    Operator {
        name: "next_days",
        comp_op: "next_days",
        template: r#"("{field}" >= date("NOW + {aql_value}d"))"#,
        value_kind: ValueKind::Int,
    },
    Operator {
        name: "earlier_than",
        comp_op: "earlier than",
        template: r#"("{field}_raw" < '{aql_value}')"#,
        value_kind: ValueKind::Version,
    },
    Operator {
        name: "later_than",
        comp_op: "later than",
        template: r#"("{field}_raw" > '{aql_value}')"#,
        value_kind: ValueKind::Version,
    },
    Operator {
        name: "true",
        comp_op: "true",
        template: r#"("{field}" == true)"#,
        value_kind: ValueKind::NoValue,
    },
    Operator {
        name: "false",
        comp_op: "false",
        template: r#"("{field}" == false)"#,
        value_kind: ValueKind::NoValue,
    },
];

/// Look up an operator by token.
pub fn get_operator(name: &str) -> Result<&'static Operator> {
    let search = name.trim().to_lowercase();
    OPERATORS
        .iter()
        .find(|op| op.name == search)
        .ok_or_else(|| {
            NotFoundError {
                value: name.to_string(),
                kind: "operator",
                candidates: OPERATORS.iter().map(|op| op.name.to_string()).collect(),
                fuzzy: false,
            }
            .into()
        })
}

/// Fill the `{field}` and `{aql_value}` slots of an operator template.
pub fn render(template: &str, field: &str, aql_value: &str) -> String {
    template
        .replace("{field}", field)
        .replace("{aql_value}", aql_value)
}
