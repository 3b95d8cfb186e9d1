//! Semantic analysis over the canonical tree
//!
//! A second, independent traversal that never fails. Relation names are only
//! read at from-positions; every other identifier counts as a column.

use fedsql_core::{
    BasicCall, Call, Hint, Identifier, Join, Literal, NodeKind, Select, SqlAnalysis, SqlNode,
    SqlVisitor,
};
use std::collections::HashSet;
use std::sync::LazyLock;

static AGGREGATE_FUNCTIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "COUNT",
        "SUM",
        "AVG",
        "MAX",
        "MIN",
        "STDDEV",
        "VARIANCE",
        "GROUP_CONCAT",
        "ARRAY_AGG",
        "STRING_AGG",
    ]
    .into_iter()
    .collect()
});

static WINDOW_FUNCTIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "ROW_NUMBER",
        "RANK",
        "DENSE_RANK",
        "NTILE",
        "LAG",
        "LEAD",
        "FIRST_VALUE",
        "LAST_VALUE",
        "NTH_VALUE",
    ]
    .into_iter()
    .collect()
});

/// Is `name` (any case) an aggregate function
pub fn is_aggregate_function(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(name.to_uppercase().as_str())
}

/// Is `name` (any case) a window function
pub fn is_window_function(name: &str) -> bool {
    WINDOW_FUNCTIONS.contains(name.to_uppercase().as_str())
}

/// Analyze a tree; an absent tree yields an empty record
pub fn analyze(ast: Option<&SqlNode>) -> SqlAnalysis {
    let mut analyzer = SemanticAnalyzer::default();
    if let Some(ast) = ast {
        ast.accept(&mut analyzer);
    }
    analyzer.analysis
}

/// Collects an `SqlAnalysis` while visiting
#[derive(Debug, Default)]
pub struct SemanticAnalyzer {
    analysis: SqlAnalysis,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_analysis(self) -> SqlAnalysis {
        self.analysis
    }

    fn visit_all<'a>(&mut self, nodes: impl IntoIterator<Item = &'a SqlNode>) {
        for node in nodes {
            node.accept(self);
        }
    }

    /// Alias maps: dotted targets are column aliases, everything else a table alias
    fn record_alias(&mut self, target: &SqlNode, alias: String) {
        let text = target.to_string();
        if text.contains('.') {
            self.analysis.add_column_alias(alias, text);
        } else {
            self.analysis.add_table_alias(alias, text);
        }
    }

    /// A relation in FROM
    fn visit_from_position(&mut self, node: &SqlNode) {
        match &node.kind {
            NodeKind::Identifier(identifier) => {
                if !identifier.is_star() {
                    self.analysis.add_table(identifier.name());
                }
            }
            NodeKind::Call(_) => match node.as_alias() {
                Some((target, alias)) => {
                    self.record_alias(target, alias.to_string());
                    self.visit_aliased_relation(target);
                }
                None => {
                    node.accept(self);
                }
            },
            NodeKind::BasicCall(basic) => {
                self.record_alias(&basic.operand, basic.alias.clone());
                self.visit_aliased_relation(&basic.operand);
            }
            NodeKind::Join(join) => {
                self.analysis.add_join_type(format!("{} JOIN", join.kind));
                self.visit_from_position(&join.left);
                self.visit_from_position(&join.right);
                self.visit_all(&join.condition);
                self.visit_all(&join.using);
            }
            NodeKind::Select(_) => {
                self.analysis.has_subquery = true;
                node.accept(self);
            }
            _ => {
                node.accept(self);
            }
        }
    }

    /// Target of an aliased from-item
    fn visit_aliased_relation(&mut self, target: &SqlNode) {
        match &target.kind {
            NodeKind::Select(_) => {
                self.analysis.has_subquery = true;
                target.accept(self);
            }
            NodeKind::Identifier(identifier) => {
                let name = identifier.name();
                if !name.contains('.') {
                    self.analysis.add_table(name);
                }
            }
            _ => self.visit_from_position(target),
        }
    }
}

impl SqlVisitor for SemanticAnalyzer {
    type Output = ();

    fn visit_identifier(&mut self, _node: &SqlNode, identifier: &Identifier) {
        let name = identifier.name();
        if name != "*" {
            self.analysis.add_column(name);
        }
    }

    fn visit_literal(&mut self, _node: &SqlNode, _literal: &Literal) {}

    fn visit_call(&mut self, node: &SqlNode, call: &Call) {
        let name = call.operator.name.to_uppercase();
        if is_aggregate_function(&name) {
            self.analysis.add_aggregate(name.clone());
        }
        if is_window_function(&name) {
            self.analysis.has_window_function = true;
        }

        if let Some((target, alias)) = node.as_alias() {
            self.record_alias(target, alias.to_string());
        }

        self.visit_all(&call.operands);
    }

    fn visit_select(&mut self, _node: &SqlNode, select: &Select) {
        self.visit_all(&select.select_list);
        if let Some(from) = &select.from {
            self.visit_from_position(from);
        }
        self.visit_all(&select.where_clause);
        self.visit_all(&select.group_by);
        self.visit_all(&select.having);
        self.visit_all(&select.order_by);
        self.visit_all(&select.window_decls);
        self.visit_all(&select.offset);
        self.visit_all(&select.fetch);
    }

    fn visit_join(&mut self, node: &SqlNode, _join: &Join) {
        self.visit_from_position(node);
    }

    fn visit_basic_call(&mut self, node: &SqlNode, _basic: &BasicCall) {
        self.visit_from_position(node);
    }

    fn visit_node_list(&mut self, _node: &SqlNode, items: &[SqlNode]) {
        self.visit_all(items);
    }

    fn visit_hint(&mut self, _node: &SqlNode, _hint: &Hint) {}
}
