//! Operator table for `Call` nodes
//!
//! Operators are immutable and shared by reference: every call site that uses
//! `=` points at the same `SqlOperator`. Built-in operators live in a static
//! table initialised once; function operators are created on demand.

use crate::ast::{NodeKind, SqlNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, LazyLock};

/// Node kind tag
///
/// Every node carries one. For `Call` nodes the tag is the operator's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlKind {
    // Queries
    Select,

    // Expressions
    Identifier,
    Literal,
    Call,

    // Arithmetic
    Plus,
    Minus,
    Times,
    Divide,
    Mod,

    // Comparison
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,

    // Logical
    And,
    Or,
    Not,

    // Predicates
    IsNull,
    IsNotNull,
    Between,
    In,
    Like,
    Exists,

    // Special forms
    Case,
    Cast,
    Over,
    Window,
    Distinct,
    Descending,
    As,

    // Relations
    Join,

    Other,
}

impl SqlKind {
    /// Binary comparison kinds (the only predicates eligible as join predicates)
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::NotEquals
                | Self::GreaterThan
                | Self::LessThan
                | Self::GreaterThanOrEqual
                | Self::LessThanOrEqual
        )
    }

    /// AND / OR / NOT
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }
}

/// How an operator is written around its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlSyntax {
    /// `f(x, y)`
    Function,
    /// `-x`, `NOT x`
    Prefix,
    /// `x IS NULL`
    Postfix,
    /// `x + y`
    Binary,
    /// `x AS y`, `CASE ... END`, `x BETWEEN a AND b`
    Special,
}

/// Binding strength used when rendering nested calls
pub mod precedence {
    pub const ALIAS: u8 = 0;
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const NOT: u8 = 3;
    pub const COMPARISON: u8 = 4;
    pub const CONCAT: u8 = 5;
    pub const ADDITIVE: u8 = 6;
    pub const MULTIPLICATIVE: u8 = 7;
    pub const UNARY: u8 = 8;
    pub const ATOM: u8 = 9;
}

/// An operator or function
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlOperator {
    pub name: String,
    pub kind: SqlKind,
    pub syntax: SqlSyntax,
    pub precedence: u8,
}

static BUILTINS: LazyLock<HashMap<&'static str, Arc<SqlOperator>>> = LazyLock::new(|| {
    use precedence::*;

    let table: &[(&'static str, SqlKind, SqlSyntax, u8)] = &[
        ("+", SqlKind::Plus, SqlSyntax::Binary, ADDITIVE),
        ("-", SqlKind::Minus, SqlSyntax::Binary, ADDITIVE),
        ("*", SqlKind::Times, SqlSyntax::Binary, MULTIPLICATIVE),
        ("/", SqlKind::Divide, SqlSyntax::Binary, MULTIPLICATIVE),
        ("%", SqlKind::Mod, SqlSyntax::Binary, MULTIPLICATIVE),
        ("||", SqlKind::Other, SqlSyntax::Binary, CONCAT),
        ("=", SqlKind::Equals, SqlSyntax::Binary, COMPARISON),
        ("<>", SqlKind::NotEquals, SqlSyntax::Binary, COMPARISON),
        ("!=", SqlKind::NotEquals, SqlSyntax::Binary, COMPARISON),
        (">", SqlKind::GreaterThan, SqlSyntax::Binary, COMPARISON),
        ("<", SqlKind::LessThan, SqlSyntax::Binary, COMPARISON),
        (">=", SqlKind::GreaterThanOrEqual, SqlSyntax::Binary, COMPARISON),
        ("<=", SqlKind::LessThanOrEqual, SqlSyntax::Binary, COMPARISON),
        ("AND", SqlKind::And, SqlSyntax::Binary, AND),
        ("OR", SqlKind::Or, SqlSyntax::Binary, OR),
        ("NOT", SqlKind::Not, SqlSyntax::Prefix, NOT),
        ("UNARY -", SqlKind::Minus, SqlSyntax::Prefix, UNARY),
        ("UNARY +", SqlKind::Plus, SqlSyntax::Prefix, UNARY),
        ("IS NULL", SqlKind::IsNull, SqlSyntax::Postfix, COMPARISON),
        ("IS NOT NULL", SqlKind::IsNotNull, SqlSyntax::Postfix, COMPARISON),
        ("BETWEEN", SqlKind::Between, SqlSyntax::Special, COMPARISON),
        ("NOT BETWEEN", SqlKind::Between, SqlSyntax::Special, COMPARISON),
        ("IN", SqlKind::In, SqlSyntax::Special, COMPARISON),
        ("NOT IN", SqlKind::In, SqlSyntax::Special, COMPARISON),
        ("LIKE", SqlKind::Like, SqlSyntax::Binary, COMPARISON),
        ("NOT LIKE", SqlKind::Like, SqlSyntax::Binary, COMPARISON),
        ("ILIKE", SqlKind::Like, SqlSyntax::Binary, COMPARISON),
        ("NOT ILIKE", SqlKind::Like, SqlSyntax::Binary, COMPARISON),
        ("EXISTS", SqlKind::Exists, SqlSyntax::Special, ATOM),
        ("NOT EXISTS", SqlKind::Exists, SqlSyntax::Special, NOT),
        ("CASE", SqlKind::Case, SqlSyntax::Special, ATOM),
        ("CAST", SqlKind::Cast, SqlSyntax::Special, ATOM),
        ("OVER", SqlKind::Over, SqlSyntax::Special, ATOM),
        ("DISTINCT", SqlKind::Distinct, SqlSyntax::Prefix, UNARY),
        ("WINDOW", SqlKind::Window, SqlSyntax::Special, ATOM),
        ("DESC", SqlKind::Descending, SqlSyntax::Postfix, ALIAS),
        ("NULLS FIRST", SqlKind::Other, SqlSyntax::Postfix, ALIAS),
        ("NULLS LAST", SqlKind::Other, SqlSyntax::Postfix, ALIAS),
        ("AS", SqlKind::As, SqlSyntax::Special, ALIAS),
    ];

    table
        .iter()
        .map(|&(name, kind, syntax, precedence)| {
            // Unary forms share the printed name of their binary twin
            let printed = name.strip_prefix("UNARY ").unwrap_or(name);
            let op = SqlOperator {
                name: printed.to_string(),
                kind,
                syntax,
                precedence,
            };
            (name, Arc::new(op))
        })
        .collect()
});

impl SqlOperator {
    /// Look up a built-in operator by its symbol or keyword
    ///
    /// Prefix forms of `+`/`-` are registered as `UNARY +` / `UNARY -`.
    pub fn builtin(name: &str) -> Option<Arc<SqlOperator>> {
        BUILTINS.get(name).cloned()
    }

    /// The shared `AS` operator
    pub fn alias() -> Arc<SqlOperator> {
        Self::expect_builtin("AS")
    }

    /// The shared `AND` operator
    pub fn and() -> Arc<SqlOperator> {
        Self::expect_builtin("AND")
    }

    /// The shared `=` operator
    pub fn equals() -> Arc<SqlOperator> {
        Self::expect_builtin("=")
    }

    fn expect_builtin(name: &str) -> Arc<SqlOperator> {
        match BUILTINS.get(name) {
            Some(op) => Arc::clone(op),
            None => unreachable!("operator `{name}` is missing from the builtin table"),
        }
    }

    /// A function operator (`COUNT`, `MUL`, ...)
    pub fn function(name: impl Into<String>) -> SqlOperator {
        Self {
            name: name.into(),
            kind: SqlKind::Call,
            syntax: SqlSyntax::Function,
            precedence: precedence::ATOM,
        }
    }

    /// A binary operator that has no dedicated kind
    pub fn other_binary(name: impl Into<String>) -> SqlOperator {
        Self {
            name: name.into(),
            kind: SqlKind::Other,
            syntax: SqlSyntax::Binary,
            precedence: precedence::COMPARISON,
        }
    }

    /// A prefix operator that has no dedicated kind
    pub fn other_prefix(name: impl Into<String>) -> SqlOperator {
        Self {
            name: name.into(),
            kind: SqlKind::Other,
            syntax: SqlSyntax::Prefix,
            precedence: precedence::UNARY,
        }
    }

    /// Render this operator applied to `operands`
    pub fn format(&self, operands: &[SqlNode]) -> String {
        match self.syntax {
            SqlSyntax::Function => {
                format!("{}({})", self.name, join_operands(operands, ", "))
            }
            SqlSyntax::Binary if operands.len() == 2 => format!(
                "{} {} {}",
                self.operand(&operands[0], false),
                self.name,
                self.operand(&operands[1], true)
            ),
            SqlSyntax::Prefix if operands.len() == 1 => {
                let inner = self.operand(&operands[0], true);
                if self.name.chars().all(|c| c.is_ascii_alphabetic()) {
                    format!("{} {}", self.name, inner)
                } else {
                    format!("{}{}", self.name, inner)
                }
            }
            SqlSyntax::Postfix if operands.len() == 1 => {
                format!("{} {}", self.operand(&operands[0], false), self.name)
            }
            SqlSyntax::Special => self.format_special(operands),
            _ => self.name.clone(),
        }
    }

    fn format_special(&self, operands: &[SqlNode]) -> String {
        match (self.kind, operands) {
            (SqlKind::As, [target, alias]) => {
                format!("{} AS {}", render_operand(target), alias)
            }
            (SqlKind::Between, [value, low, high]) => format!(
                "{} {} {} AND {}",
                self.operand(value, false),
                self.name,
                self.operand(low, true),
                self.operand(high, true)
            ),
            (SqlKind::In, [value, set]) => {
                let set = match &set.kind {
                    NodeKind::Select(_) => set.to_string(),
                    _ => join_operands(std::slice::from_ref(set), ", "),
                };
                format!("{} {} ({})", self.operand(value, false), self.name, set)
            }
            (SqlKind::Exists, [query]) => format!("{} ({})", self.name, query),
            (SqlKind::Cast, [value, target]) => {
                let target = match &target.kind {
                    NodeKind::Literal(literal) => literal.raw_text(),
                    _ => target.to_string(),
                };
                format!("CAST({} AS {})", value, target)
            }
            (SqlKind::Over, [function, window]) => match &window.kind {
                NodeKind::Identifier(_) => format!("{} OVER {}", function, window),
                _ => format!("{} OVER ({})", function, window),
            },
            (SqlKind::Over, [function, partition, order]) => {
                format!("{} OVER ({})", function, window_spec(partition, order))
            }
            (SqlKind::Window, [name, partition, order]) => {
                format!("{} AS ({})", name, window_spec(partition, order))
            }
            (SqlKind::Case, [subject, whens, thens, otherwise]) => {
                format_case(subject, whens, thens, otherwise)
            }
            _ => format!("{}({})", self.name, join_operands(operands, ", ")),
        }
    }

    /// Render one operand, parenthesising calls that bind looser than `self`
    fn operand(&self, node: &SqlNode, right_side: bool) -> String {
        if let NodeKind::Call(call) = &node.kind {
            let inner = call.operator.precedence;
            let needs_parens = matches!(
                call.operator.syntax,
                SqlSyntax::Binary | SqlSyntax::Prefix | SqlSyntax::Postfix | SqlSyntax::Special
            ) && (inner < self.precedence || (right_side && inner == self.precedence && inner != precedence::ATOM));
            if needs_parens {
                return format!("({})", node);
            }
        }
        render_operand(node)
    }
}

impl std::fmt::Display for SqlOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Subqueries in operand position are parenthesised
fn render_operand(node: &SqlNode) -> String {
    match &node.kind {
        NodeKind::Select(_) => format!("({})", node),
        _ => node.to_string(),
    }
}

fn join_operands(operands: &[SqlNode], separator: &str) -> String {
    operands
        .iter()
        .map(render_operand)
        .collect::<Vec<_>>()
        .join(separator)
}

fn is_empty_list(node: &SqlNode) -> bool {
    matches!(&node.kind, NodeKind::NodeList(items) if items.is_empty())
}

fn window_spec(partition: &SqlNode, order: &SqlNode) -> String {
    let mut spec = Vec::new();
    if !is_empty_list(partition) {
        spec.push(format!("PARTITION BY {}", partition));
    }
    if !is_empty_list(order) {
        spec.push(format!("ORDER BY {}", order));
    }
    spec.join(" ")
}

fn list_items(node: &SqlNode) -> &[SqlNode] {
    match &node.kind {
        NodeKind::NodeList(items) => items,
        _ => std::slice::from_ref(node),
    }
}

fn format_case(subject: &SqlNode, whens: &SqlNode, thens: &SqlNode, otherwise: &SqlNode) -> String {
    let mut out = String::from("CASE");
    for item in list_items(subject) {
        let _ = write!(out, " {}", item);
    }
    for (condition, result) in list_items(whens).iter().zip(list_items(thens)) {
        let _ = write!(out, " WHEN {} THEN {}", condition, result);
    }
    for item in list_items(otherwise) {
        let _ = write!(out, " ELSE {}", item);
    }
    out.push_str(" END");
    out
}
