//! Canonical SQL syntax tree
//!
//! Nodes are built once by the tree builder and never mutated afterwards.
//! Every node carries the source span it was built from; `Display` renders
//! canonical SQL text.

use crate::operator::{SqlKind, SqlOperator};
use std::fmt;
use std::sync::Arc;

/// Start/end position of a node in the source text (lines and columns are 1-indexed)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceSpan {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Zero-width span at a single position
    pub fn point(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }

    /// True for spans with no position information
    pub fn is_empty(&self) -> bool {
        self.start_line == 0 && self.end_line == 0
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(&self, other: &SourceSpan) -> SourceSpan {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let (start_line, start_column) =
            (self.start_line, self.start_column).min((other.start_line, other.start_column));
        let (end_line, end_column) =
            (self.end_line, self.end_column).max((other.end_line, other.end_column));

        SourceSpan::new(start_line, start_column, end_line, end_column)
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// A node of the canonical tree
#[derive(Debug, Clone, PartialEq)]
pub struct SqlNode {
    pub span: SourceSpan,
    pub kind: NodeKind,
}

/// Closed set of node variants
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Identifier(Identifier),
    Literal(Literal),
    Call(Call),
    Select(Box<Select>),
    Join(Box<Join>),
    BasicCall(Box<BasicCall>),
    NodeList(Vec<SqlNode>),
    Hint(Hint),
}

/// Dotted name; `["*"]` is a wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub parts: Vec<String>,
}

impl Identifier {
    pub fn new(parts: Vec<String>) -> Self {
        Self { parts }
    }

    /// Dotted rendering of all parts
    pub fn name(&self) -> String {
        self.parts.join(".")
    }

    /// Bare `*`
    pub fn is_star(&self) -> bool {
        self.parts.len() == 1 && self.parts[0] == "*"
    }

    /// Two or more parts
    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }

    /// Everything before the last part, if any
    pub fn qualifier(&self) -> Option<String> {
        match self.parts.len() {
            0 | 1 => None,
            n => Some(self.parts[..n - 1].join(".")),
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
}

/// Type tag of a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Null,
    Boolean,
    Integer,
    Decimal,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
}

impl Literal {
    pub fn new(value: LiteralValue) -> Self {
        Self { value }
    }

    pub fn kind(&self) -> LiteralKind {
        match self.value {
            LiteralValue::Null => LiteralKind::Null,
            LiteralValue::Boolean(_) => LiteralKind::Boolean,
            LiteralValue::Integer(_) => LiteralKind::Integer,
            LiteralValue::Decimal(_) => LiteralKind::Decimal,
            LiteralValue::String(_) => LiteralKind::String,
        }
    }

    /// Text without string quoting
    pub fn raw_text(&self) -> String {
        match &self.value {
            LiteralValue::String(s) => s.clone(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            LiteralValue::Null => write!(f, "NULL"),
            LiteralValue::Boolean(true) => write!(f, "TRUE"),
            LiteralValue::Boolean(false) => write!(f, "FALSE"),
            LiteralValue::Integer(i) => write!(f, "{}", i),
            LiteralValue::Decimal(d) => write!(f, "{:?}", d),
            LiteralValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Operator applied to operands
///
/// `AS` aliasing is a call with two operands: target and alias identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operator: Arc<SqlOperator>,
    pub operands: Vec<SqlNode>,
}

impl Call {
    pub fn is_alias(&self) -> bool {
        self.operator.kind == SqlKind::As && self.operands.len() == 2
    }
}

/// Query block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    /// `Hint` nodes, source order
    pub hints: Vec<SqlNode>,
    /// Select keywords such as `DISTINCT`
    pub keywords: Vec<String>,
    pub select_list: Vec<SqlNode>,
    pub from: Option<SqlNode>,
    pub where_clause: Option<SqlNode>,
    pub group_by: Vec<SqlNode>,
    pub having: Option<SqlNode>,
    pub window_decls: Vec<SqlNode>,
    pub order_by: Vec<SqlNode>,
    pub offset: Option<SqlNode>,
    pub fetch: Option<SqlNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
            Self::Cross => "CROSS",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binary relation join
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: SqlNode,
    pub right: SqlNode,
    pub kind: JoinKind,
    pub condition: Option<SqlNode>,
    pub using: Vec<SqlNode>,
}

/// Relation alias carrier used for aliased join groups
#[derive(Debug, Clone, PartialEq)]
pub struct BasicCall {
    pub operand: SqlNode,
    pub alias: String,
}

/// Optimizer / backend-selection directive
#[derive(Debug, Clone, PartialEq)]
pub struct Hint {
    pub name: String,
    pub parameters: Vec<SqlNode>,
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.parameters.is_empty() {
            write!(f, "({})", join_nodes(&self.parameters, ", "))?;
        }
        Ok(())
    }
}

impl SqlNode {
    pub fn new(kind: NodeKind, span: SourceSpan) -> Self {
        Self { span, kind }
    }

    pub fn identifier(parts: Vec<String>, span: SourceSpan) -> Self {
        Self::new(NodeKind::Identifier(Identifier::new(parts)), span)
    }

    pub fn literal(value: LiteralValue, span: SourceSpan) -> Self {
        Self::new(NodeKind::Literal(Literal::new(value)), span)
    }

    pub fn call(operator: Arc<SqlOperator>, operands: Vec<SqlNode>, span: SourceSpan) -> Self {
        Self::new(NodeKind::Call(Call { operator, operands }), span)
    }

    pub fn select(select: Select, span: SourceSpan) -> Self {
        Self::new(NodeKind::Select(Box::new(select)), span)
    }

    pub fn join(join: Join, span: SourceSpan) -> Self {
        Self::new(NodeKind::Join(Box::new(join)), span)
    }

    pub fn basic_call(operand: SqlNode, alias: impl Into<String>, span: SourceSpan) -> Self {
        let alias = alias.into();
        Self::new(NodeKind::BasicCall(Box::new(BasicCall { operand, alias })), span)
    }

    pub fn node_list(items: Vec<SqlNode>, span: SourceSpan) -> Self {
        Self::new(NodeKind::NodeList(items), span)
    }

    pub fn hint(name: impl Into<String>, parameters: Vec<SqlNode>, span: SourceSpan) -> Self {
        let name = name.into();
        Self::new(NodeKind::Hint(Hint { name, parameters }), span)
    }

    /// Kind tag; for calls this is the operator's kind
    pub fn sql_kind(&self) -> SqlKind {
        match &self.kind {
            NodeKind::Identifier(_) => SqlKind::Identifier,
            NodeKind::Literal(_) => SqlKind::Literal,
            NodeKind::Call(call) => call.operator.kind,
            NodeKind::Select(_) => SqlKind::Select,
            NodeKind::Join(_) => SqlKind::Join,
            NodeKind::BasicCall(_) => SqlKind::As,
            NodeKind::NodeList(_) | NodeKind::Hint(_) => SqlKind::Other,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match &self.kind {
            NodeKind::Identifier(identifier) => Some(identifier),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            NodeKind::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            NodeKind::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&Select> {
        match &self.kind {
            NodeKind::Select(select) => Some(select),
            _ => None,
        }
    }

    pub fn as_join(&self) -> Option<&Join> {
        match &self.kind {
            NodeKind::Join(join) => Some(join),
            _ => None,
        }
    }

    pub fn as_hint(&self) -> Option<&Hint> {
        match &self.kind {
            NodeKind::Hint(hint) => Some(hint),
            _ => None,
        }
    }

    /// Target and alias of an `AS` call
    pub fn as_alias(&self) -> Option<(&SqlNode, &SqlNode)> {
        match &self.kind {
            NodeKind::Call(call) if call.is_alias() => Some((&call.operands[0], &call.operands[1])),
            _ => None,
        }
    }

    /// Direct children, left to right
    pub fn children(&self) -> Vec<&SqlNode> {
        match &self.kind {
            NodeKind::Identifier(_) | NodeKind::Literal(_) => Vec::new(),
            NodeKind::Call(call) => call.operands.iter().collect(),
            NodeKind::Select(select) => {
                let mut children: Vec<&SqlNode> = select.hints.iter().collect();
                children.extend(&select.select_list);
                children.extend(&select.from);
                children.extend(&select.where_clause);
                children.extend(&select.group_by);
                children.extend(&select.having);
                children.extend(&select.window_decls);
                children.extend(&select.order_by);
                children.extend(&select.offset);
                children.extend(&select.fetch);
                children
            }
            NodeKind::Join(join) => {
                let mut children = vec![&join.left, &join.right];
                children.extend(&join.condition);
                children.extend(&join.using);
                children
            }
            NodeKind::BasicCall(basic) => vec![&basic.operand],
            NodeKind::NodeList(items) => items.iter().collect(),
            NodeKind::Hint(hint) => hint.parameters.iter().collect(),
        }
    }
}

impl fmt::Display for SqlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Identifier(identifier) => write!(f, "{}", identifier),
            NodeKind::Literal(literal) => write!(f, "{}", literal),
            NodeKind::Call(call) => write!(f, "{}", call.operator.format(&call.operands)),
            NodeKind::Select(select) => write!(f, "{}", select),
            NodeKind::Join(join) => write!(f, "{}", join),
            NodeKind::BasicCall(basic) => {
                write!(f, "{} AS {}", relation_text(&basic.operand, true), basic.alias)
            }
            NodeKind::NodeList(items) => write!(f, "{}", join_nodes(items, ", ")),
            NodeKind::Hint(hint) => write!(f, "{}", hint),
        }
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT")?;
        if !self.hints.is_empty() {
            write!(f, " /*+ {} */", join_nodes(&self.hints, ", "))?;
        }
        for keyword in &self.keywords {
            write!(f, " {}", keyword)?;
        }
        write!(f, " {}", join_nodes(&self.select_list, ", "))?;
        if let Some(from) = &self.from {
            write!(f, " FROM {}", relation_text(from, false))?;
        }
        if let Some(condition) = &self.where_clause {
            write!(f, " WHERE {}", condition)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", join_nodes(&self.group_by, ", "))?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", having)?;
        }
        if !self.window_decls.is_empty() {
            write!(f, " WINDOW {}", join_nodes(&self.window_decls, ", "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", join_nodes(&self.order_by, ", "))?;
        }
        if let Some(fetch) = &self.fetch {
            write!(f, " LIMIT {}", fetch)?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} JOIN {}",
            relation_text(&self.left, false),
            self.kind,
            relation_text(&self.right, true)
        )?;
        if let Some(condition) = &self.condition {
            write!(f, " ON {}", condition)?;
        }
        if !self.using.is_empty() {
            write!(f, " USING ({})", join_nodes(&self.using, ", "))?;
        }
        Ok(())
    }
}

/// Relations in FROM: subqueries always parenthesised, joins only when nested on the right
fn relation_text(node: &SqlNode, nested: bool) -> String {
    match &node.kind {
        NodeKind::Select(_) => format!("({})", node),
        NodeKind::Join(_) if nested => format!("({})", node),
        _ => node.to_string(),
    }
}

fn join_nodes(nodes: &[SqlNode], separator: &str) -> String {
    nodes
        .iter()
        .map(|node| match &node.kind {
            NodeKind::Select(_) => format!("({})", node),
            _ => node.to_string(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}
