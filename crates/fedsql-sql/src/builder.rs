//! Statement tree -> canonical tree
//!
//! One `AstBuilder` is created per parse call and consumed by `build`. It
//! walks the `sqlparser` statement once, depth first, left to right. Per
//! query block it visits FROM, then classifies the WHERE leaves into join
//! and filter predicates, then hands both to the join reconstructor before
//! visiting the rest of the block.

use crate::hints::HintIndex;
use crate::joins::{self, ClassifiedPredicate, PredicateClass};
use fedsql_core::{
    Diagnostic, DiagnosticCode, Join, JoinKind, LiteralValue, Location, Severity, SourceSpan,
    SqlNode, SqlOperator,
};
use serde::Serialize;
use sqlparser::ast::{
    BinaryOperator, Distinct, DuplicateTreatment, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, GroupByExpr, Ident, JoinConstraint, JoinOperator, NamedWindowDefinition,
    NamedWindowExpr, ObjectName, OrderByExpr, Query, Select, SelectItem, SetExpr, Spanned,
    Statement, TableFactor, TableWithJoins, UnaryOperator, Value, WindowSpec, WindowType,
};
use sqlparser::tokenizer::Span;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Errors raised while building the canonical tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

fn unsupported<T>(construct: impl Into<String>) -> Result<T, BuildError> {
    Err(BuildError::Unsupported(construct.into()))
}

/// Column and relation references seen while building
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct References {
    /// `relation.column`, deduplicated in first-seen order
    pub qualified_columns: Vec<String>,

    /// alias -> table name (unaliased tables map to themselves)
    pub relation_aliases: BTreeMap<String, String>,

    /// Aliases of derived tables, source order
    pub derived_tables: Vec<String>,
}

/// Everything a successful build produces
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub ast: SqlNode,
    pub references: References,
    pub diagnostics: Vec<Diagnostic>,
}

/// Predicates discovered in the WHERE clause of the query block being built
#[derive(Debug, Default)]
struct PredicateScope {
    predicates: Vec<ClassifiedPredicate>,
}

/// Single-use builder; all state is local to one parse call
#[derive(Debug, Default)]
pub struct AstBuilder {
    hints: HintIndex,
    /// Function and non-builtin operators, shared across call sites
    operators: HashMap<String, Arc<SqlOperator>>,
    subqueries: HashMap<String, SqlNode>,
    current_relation: Option<String>,
    scope: PredicateScope,
    references: References,
    diagnostics: Vec<Diagnostic>,
}

impl AstBuilder {
    pub fn new(hints: HintIndex) -> Self {
        Self {
            hints,
            ..Self::default()
        }
    }

    /// Build the canonical tree for one statement
    pub fn build(mut self, statement: &Statement) -> Result<BuildOutput, BuildError> {
        let ast = match statement {
            Statement::Query(query) => self.query(query)?,
            other => return unsupported(format!("{} statement", statement_keyword(other))),
        };

        if !self.hints.is_empty() {
            debug!(
                pending = self.hints.pending(),
                "hint blocks did not match any SELECT keyword"
            );
        }

        Ok(BuildOutput {
            ast,
            references: self.references,
            diagnostics: self.diagnostics,
        })
    }

    fn query(&mut self, query: &Query) -> Result<SqlNode, BuildError> {
        if let Some(with) = &query.with {
            if with.recursive {
                return unsupported("WITH RECURSIVE");
            }
            debug!(ctes = with.cte_tables.len(), "skipping WITH definitions");
        }

        match query.body.as_ref() {
            SetExpr::Select(select) => self.select(select, query),
            SetExpr::Query(inner) => {
                if query.order_by.is_some()
                    || query.limit.is_some()
                    || query.offset.is_some()
                    || query.fetch.is_some()
                {
                    return unsupported("ORDER BY / LIMIT on a parenthesized query");
                }
                self.query(inner)
            }
            SetExpr::SetOperation { op, .. } => unsupported(format!("{} set operation", op)),
            SetExpr::Values(_) => unsupported("VALUES"),
            _ => unsupported("query body"),
        }
    }

    /// Predicate scope and current relation are saved around each block so
    /// nested queries never leak into the enclosing one
    fn select(&mut self, select: &Select, query: &Query) -> Result<SqlNode, BuildError> {
        let saved_scope = std::mem::take(&mut self.scope);
        let saved_relation = self.current_relation.take();

        let result = self.select_block(select, query);

        self.scope = saved_scope;
        self.current_relation = saved_relation;
        result
    }

    fn select_block(&mut self, select: &Select, query: &Query) -> Result<SqlNode, BuildError> {
        check_select_shape(select)?;

        // FROM
        let relations = select
            .from
            .iter()
            .map(|item| self.table_with_joins(item))
            .collect::<Result<Vec<_>, _>>()?;

        // WHERE
        if let Some(selection) = &select.selection {
            let condition = self.classify(selection)?;
            debug!(
                condition = %condition,
                predicates = self.scope.predicates.len(),
                "classified WHERE predicates"
            );
        }

        let predicates = std::mem::take(&mut self.scope.predicates);
        let reconstruction = joins::reconstruct(relations, predicates, &self.subqueries);
        for predicate in &reconstruction.degenerate {
            self.diagnostics.push(degenerate_join(predicate));
        }

        let mut block = fedsql_core::Select {
            from: reconstruction.from,
            where_clause: reconstruction.where_clause,
            ..Default::default()
        };

        block.select_list = select
            .projection
            .iter()
            .map(|item| self.select_item(item))
            .collect::<Result<_, _>>()?;

        block.group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, modifiers) => {
                if !modifiers.is_empty() {
                    return unsupported("GROUP BY modifiers");
                }
                self.exprs(exprs)?
            }
            GroupByExpr::All(_) => return unsupported("GROUP BY ALL"),
        };

        block.having = select.having.as_ref().map(|e| self.expr(e)).transpose()?;

        if let Some(order_by) = &query.order_by {
            block.order_by = order_by
                .exprs
                .iter()
                .map(|item| self.order_item(item))
                .collect::<Result<_, _>>()?;
        }

        block.offset = query
            .offset
            .as_ref()
            .map(|offset| self.expr(&offset.value))
            .transpose()?;

        block.fetch = match (&query.limit, &query.fetch) {
            (Some(limit), _) => Some(self.expr(limit)?),
            (None, Some(fetch)) => fetch.quantity.as_ref().map(|q| self.expr(q)).transpose()?,
            (None, None) => None,
        };

        if let Some(Distinct::Distinct) = &select.distinct {
            block.keywords.push("DISTINCT".to_string());
        }

        block.window_decls = select
            .named_window
            .iter()
            .map(|window| self.window_decl(window))
            .collect::<Result<_, _>>()?;

        let span = convert_span(select.span());
        block.hints = self.hints.take(span.start_line, span.start_column);

        Ok(SqlNode::select(block, span))
    }

    // ---------------------------------------------------------------------
    // FROM
    // ---------------------------------------------------------------------

    fn table_with_joins(&mut self, item: &TableWithJoins) -> Result<SqlNode, BuildError> {
        let mut node = self.table_factor(&item.relation)?;

        for join in &item.joins {
            let right = self.table_factor(&join.relation)?;
            let (kind, constraint) = match &join.join_operator {
                JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
                JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
                JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
                JoinOperator::FullOuter(c) => (JoinKind::Full, Some(c)),
                JoinOperator::CrossJoin => (JoinKind::Cross, None),
                _ => return unsupported("join operator"),
            };

            let (condition, using) = match constraint {
                Some(JoinConstraint::On(expr)) => (Some(self.expr(expr)?), Vec::new()),
                Some(JoinConstraint::Using(columns)) => {
                    let columns = columns
                        .iter()
                        .map(|c| SqlNode::identifier(vec![c.value.clone()], ident_span(c)))
                        .collect();
                    (None, columns)
                }
                Some(JoinConstraint::Natural) => return unsupported("NATURAL JOIN"),
                Some(JoinConstraint::None) | None => (None, Vec::new()),
            };

            let span = node.span.merge(&right.span);
            node = SqlNode::join(
                Join {
                    left: node,
                    right,
                    kind,
                    condition,
                    using,
                },
                span,
            );
        }

        Ok(node)
    }

    fn table_factor(&mut self, factor: &TableFactor) -> Result<SqlNode, BuildError> {
        match factor {
            TableFactor::Table { args: Some(_), .. } => unsupported("table function"),
            TableFactor::Table { name, alias, .. } => {
                let parts = object_parts(name);
                let table_name = parts.join(".");
                let table = SqlNode::identifier(parts, object_span(name));

                match alias {
                    Some(alias) => {
                        if !alias.columns.is_empty() {
                            return unsupported("column alias list");
                        }
                        let alias_name = alias.name.value.clone();
                        self.references
                            .relation_aliases
                            .insert(alias_name.clone(), table_name);
                        Ok(self.aliased(table, &alias.name))
                    }
                    None => {
                        self.references
                            .relation_aliases
                            .insert(table_name.clone(), table_name.clone());
                        self.current_relation = Some(table_name);
                        Ok(table)
                    }
                }
            }
            TableFactor::Derived {
                lateral,
                subquery,
                alias,
                ..
            } => {
                if *lateral {
                    return unsupported("LATERAL");
                }
                let query = self.query(subquery)?;

                match alias {
                    Some(alias) => {
                        let alias_name = alias.name.value.clone();
                        self.subqueries.insert(alias_name.clone(), query.clone());
                        self.references.derived_tables.push(alias_name);
                        Ok(self.aliased(query, &alias.name))
                    }
                    None => Ok(query),
                }
            }
            TableFactor::NestedJoin {
                table_with_joins,
                alias,
                ..
            } => {
                let group = self.table_with_joins(table_with_joins)?;
                match alias {
                    Some(alias) => {
                        let span = group.span.merge(&ident_span(&alias.name));
                        self.current_relation = Some(alias.name.value.clone());
                        Ok(SqlNode::basic_call(group, alias.name.value.clone(), span))
                    }
                    None => Ok(group),
                }
            }
            TableFactor::TableFunction { .. } | TableFactor::Function { .. } => {
                unsupported("table function")
            }
            TableFactor::UNNEST { .. } => unsupported("UNNEST"),
            TableFactor::Pivot { .. } => unsupported("PIVOT"),
            TableFactor::Unpivot { .. } => unsupported("UNPIVOT"),
            _ => unsupported("table factor"),
        }
    }

    /// `target AS alias`; the alias becomes the current relation
    fn aliased(&mut self, target: SqlNode, alias: &Ident) -> SqlNode {
        self.current_relation = Some(alias.value.clone());
        let alias_node = SqlNode::identifier(vec![alias.value.clone()], ident_span(alias));
        let span = target.span.merge(&alias_node.span);
        SqlNode::call(SqlOperator::alias(), vec![target, alias_node], span)
    }

    // ---------------------------------------------------------------------
    // WHERE
    // ---------------------------------------------------------------------

    /// Rebuild AND/OR/NOT combinators and classify every leaf predicate
    fn classify(&mut self, expr: &Expr) -> Result<SqlNode, BuildError> {
        match expr {
            Expr::Nested(inner) => self.classify(inner),
            Expr::BinaryOp {
                left,
                op: op @ (BinaryOperator::And | BinaryOperator::Or),
                right,
            } => {
                let left = self.classify(left)?;
                let right = self.classify(right)?;
                let span = left.span.merge(&right.span);
                Ok(SqlNode::call(self.binary_operator(op), vec![left, right], span))
            }
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: inner,
            } => {
                let inner = self.classify(inner)?;
                let span = convert_span(expr.span()).merge(&inner.span);
                Ok(SqlNode::call(builtin("NOT"), vec![inner], span))
            }
            leaf => {
                let node = self.expr(leaf)?;
                let class = if is_join_predicate(&node) {
                    PredicateClass::Join
                } else {
                    PredicateClass::Filter
                };
                self.scope
                    .predicates
                    .push(ClassifiedPredicate::new(node.clone(), class));
                Ok(node)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn exprs(&mut self, exprs: &[Expr]) -> Result<Vec<SqlNode>, BuildError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn expr(&mut self, expr: &Expr) -> Result<SqlNode, BuildError> {
        let span = convert_span(expr.span());

        let node = match expr {
            Expr::Identifier(ident) => self.column(vec![ident.value.clone()], ident_span(ident)),
            Expr::CompoundIdentifier(idents) => {
                let parts = idents.iter().map(|i| i.value.clone()).collect();
                self.column(parts, span)
            }
            Expr::Value(value) => SqlNode::literal(literal_value(value)?, span),
            Expr::Nested(inner) => self.expr(inner)?,
            Expr::BinaryOp { left, op, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                SqlNode::call(self.binary_operator(op), vec![left, right], span)
            }
            Expr::UnaryOp { op, expr: inner } => {
                let operand = self.expr(inner)?;
                SqlNode::call(self.unary_operator(op), vec![operand], span)
            }
            Expr::IsNull(inner) => SqlNode::call(builtin("IS NULL"), vec![self.expr(inner)?], span),
            Expr::IsNotNull(inner) => {
                SqlNode::call(builtin("IS NOT NULL"), vec![self.expr(inner)?], span)
            }
            Expr::Between {
                expr: value,
                negated,
                low,
                high,
            } => {
                let operands = vec![self.expr(value)?, self.expr(low)?, self.expr(high)?];
                let name = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                SqlNode::call(builtin(name), operands, span)
            }
            Expr::InList {
                expr: value,
                list,
                negated,
            } => {
                let value = self.expr(value)?;
                let list = SqlNode::node_list(self.exprs(list)?, span);
                let name = if *negated { "NOT IN" } else { "IN" };
                SqlNode::call(builtin(name), vec![value, list], span)
            }
            Expr::InSubquery {
                expr: value,
                subquery,
                negated,
            } => {
                let value = self.expr(value)?;
                let subquery = self.query(subquery)?;
                let name = if *negated { "NOT IN" } else { "IN" };
                SqlNode::call(builtin(name), vec![value, subquery], span)
            }
            Expr::Like {
                negated,
                expr: value,
                pattern,
                ..
            } => {
                let operands = vec![self.expr(value)?, self.expr(pattern)?];
                let name = if *negated { "NOT LIKE" } else { "LIKE" };
                SqlNode::call(builtin(name), operands, span)
            }
            Expr::ILike {
                negated,
                expr: value,
                pattern,
                ..
            } => {
                let operands = vec![self.expr(value)?, self.expr(pattern)?];
                let name = if *negated { "NOT ILIKE" } else { "ILIKE" };
                SqlNode::call(builtin(name), operands, span)
            }
            Expr::Exists { subquery, negated } => {
                let subquery = self.query(subquery)?;
                let name = if *negated { "NOT EXISTS" } else { "EXISTS" };
                SqlNode::call(builtin(name), vec![subquery], span)
            }
            Expr::Subquery(query) => self.query(query)?,
            Expr::Cast {
                expr: value,
                data_type,
                ..
            } => {
                let value = self.expr(value)?;
                let target = SqlNode::literal(LiteralValue::String(data_type.to_string()), span);
                SqlNode::call(builtin("CAST"), vec![value, target], span)
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                let subject = operand.iter().map(|e| self.expr(e)).collect::<Result<_, _>>()?;
                let whens = self.exprs(conditions)?;
                let thens = self.exprs(results)?;
                let otherwise = else_result
                    .iter()
                    .map(|e| self.expr(e))
                    .collect::<Result<_, _>>()?;

                let operands = vec![
                    SqlNode::node_list(subject, span),
                    SqlNode::node_list(whens, span),
                    SqlNode::node_list(thens, span),
                    SqlNode::node_list(otherwise, span),
                ];
                SqlNode::call(builtin("CASE"), operands, span)
            }
            Expr::Function(function) => self.function(function, span)?,
            other => return unsupported(format!("expression `{}`", other)),
        };

        Ok(node)
    }

    /// Column reference; bare names are recorded against the current relation
    fn column(&mut self, parts: Vec<String>, span: SourceSpan) -> SqlNode {
        let reference = match (&self.current_relation, parts.len()) {
            (Some(relation), 1) => format!("{}.{}", relation, parts[0]),
            _ => parts.join("."),
        };
        if !self.references.qualified_columns.contains(&reference) {
            self.references.qualified_columns.push(reference);
        }
        SqlNode::identifier(parts, span)
    }

    fn function(&mut self, function: &Function, span: SourceSpan) -> Result<SqlNode, BuildError> {
        if function.filter.is_some() {
            return unsupported("FILTER clause");
        }
        if !function.within_group.is_empty() {
            return unsupported("WITHIN GROUP");
        }

        let name = function.name.to_string();
        let operands = match &function.args {
            FunctionArguments::None => Vec::new(),
            FunctionArguments::Subquery(query) => vec![self.query(query)?],
            FunctionArguments::List(list) => {
                if !list.clauses.is_empty() {
                    return unsupported(format!("argument clause in {}()", name));
                }
                let mut operands = list
                    .args
                    .iter()
                    .map(|arg| self.function_arg(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                if let (Some(DuplicateTreatment::Distinct), Some(first)) =
                    (&list.duplicate_treatment, operands.first_mut())
                {
                    let inner = std::mem::replace(first, SqlNode::node_list(Vec::new(), span));
                    let inner_span = inner.span;
                    *first = SqlNode::call(builtin("DISTINCT"), vec![inner], inner_span);
                }
                operands
            }
        };

        let operator = self.function_operator(&name);
        let call = SqlNode::call(operator, operands, span);

        match &function.over {
            None => Ok(call),
            Some(WindowType::NamedWindow(window)) => {
                let window = SqlNode::identifier(vec![window.value.clone()], ident_span(window));
                Ok(SqlNode::call(builtin("OVER"), vec![call, window], span))
            }
            Some(WindowType::WindowSpec(spec)) => {
                let (partition, order) = self.window_spec(spec, span)?;
                Ok(SqlNode::call(builtin("OVER"), vec![call, partition, order], span))
            }
        }
    }

    fn function_arg(&mut self, arg: &FunctionArg) -> Result<SqlNode, BuildError> {
        match arg {
            FunctionArg::Unnamed(arg) => self.function_arg_expr(arg),
            FunctionArg::Named { name, arg, .. } => {
                let name_node = SqlNode::identifier(vec![name.value.clone()], ident_span(name));
                let value = self.function_arg_expr(arg)?;
                let span = name_node.span.merge(&value.span);
                let operator = self.intern("=>", || SqlOperator::other_binary("=>"));
                Ok(SqlNode::call(operator, vec![name_node, value], span))
            }
            _ => unsupported("function argument"),
        }
    }

    fn function_arg_expr(&mut self, arg: &FunctionArgExpr) -> Result<SqlNode, BuildError> {
        match arg {
            FunctionArgExpr::Expr(expr) => self.expr(expr),
            FunctionArgExpr::Wildcard => Ok(star(Vec::new())),
            FunctionArgExpr::QualifiedWildcard(name) => Ok(star(object_parts(name))),
        }
    }

    fn window_spec(
        &mut self,
        spec: &WindowSpec,
        span: SourceSpan,
    ) -> Result<(SqlNode, SqlNode), BuildError> {
        if spec.window_frame.is_some() {
            return unsupported("window frame");
        }
        let partition = SqlNode::node_list(self.exprs(&spec.partition_by)?, span);
        let order = spec
            .order_by
            .iter()
            .map(|item| self.order_item(item))
            .collect::<Result<_, _>>()?;
        Ok((partition, SqlNode::node_list(order, span)))
    }

    fn window_decl(&mut self, window: &NamedWindowDefinition) -> Result<SqlNode, BuildError> {
        let NamedWindowDefinition(name, definition) = window;
        let NamedWindowExpr::WindowSpec(spec) = definition else {
            return unsupported("window defined as another window");
        };

        let name_node = SqlNode::identifier(vec![name.value.clone()], ident_span(name));
        let span = name_node.span;
        let (partition, order) = self.window_spec(spec, span)?;
        Ok(SqlNode::call(builtin("WINDOW"), vec![name_node, partition, order], span))
    }

    fn order_item(&mut self, item: &OrderByExpr) -> Result<SqlNode, BuildError> {
        let mut node = self.expr(&item.expr)?;
        let span = node.span;

        if item.asc == Some(false) {
            node = SqlNode::call(builtin("DESC"), vec![node], span);
        }
        match item.nulls_first {
            Some(true) => node = SqlNode::call(builtin("NULLS FIRST"), vec![node], span),
            Some(false) => node = SqlNode::call(builtin("NULLS LAST"), vec![node], span),
            None => {}
        }

        Ok(node)
    }

    fn select_item(&mut self, item: &SelectItem) -> Result<SqlNode, BuildError> {
        match item {
            SelectItem::UnnamedExpr(expr) => self.expr(expr),
            SelectItem::ExprWithAlias { expr, alias } => {
                let target = self.expr(expr)?;
                let alias_node = SqlNode::identifier(vec![alias.value.clone()], ident_span(alias));
                let span = target.span.merge(&alias_node.span);
                Ok(SqlNode::call(SqlOperator::alias(), vec![target, alias_node], span))
            }
            SelectItem::Wildcard(_) => Ok(star(Vec::new())),
            SelectItem::QualifiedWildcard(name, _) => Ok(star(object_parts(name))),
        }
    }

    // ---------------------------------------------------------------------
    // Operators
    // ---------------------------------------------------------------------

    fn intern(&mut self, key: &str, make: impl FnOnce() -> SqlOperator) -> Arc<SqlOperator> {
        Arc::clone(
            self.operators
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(make())),
        )
    }

    fn function_operator(&mut self, name: &str) -> Arc<SqlOperator> {
        self.intern(&format!("fn:{}", name), || SqlOperator::function(name))
    }

    fn binary_operator(&mut self, op: &BinaryOperator) -> Arc<SqlOperator> {
        let symbol = op.to_string();
        match SqlOperator::builtin(&symbol) {
            Some(operator) => operator,
            None => self.intern(&format!("binary:{}", symbol), || {
                SqlOperator::other_binary(symbol.clone())
            }),
        }
    }

    fn unary_operator(&mut self, op: &UnaryOperator) -> Arc<SqlOperator> {
        let symbol = op.to_string();
        let builtin_name = match symbol.as_str() {
            "-" => "UNARY -",
            "+" => "UNARY +",
            other => other,
        };
        match SqlOperator::builtin(builtin_name) {
            Some(operator) => operator,
            None => self.intern(&format!("prefix:{}", symbol), || {
                SqlOperator::other_prefix(symbol.clone())
            }),
        }
    }
}

/// Shapes of `SELECT` the builder refuses outright
fn check_select_shape(select: &Select) -> Result<(), BuildError> {
    if let Some(Distinct::On(_)) = &select.distinct {
        return unsupported("DISTINCT ON");
    }
    if select.top.is_some() {
        return unsupported("TOP");
    }
    if select.into.is_some() {
        return unsupported("SELECT INTO");
    }
    if !select.lateral_views.is_empty() {
        return unsupported("LATERAL VIEW");
    }
    if select.qualify.is_some() {
        return unsupported("QUALIFY");
    }
    Ok(())
}

/// Comparison whose operands are both qualified column references
fn is_join_predicate(node: &SqlNode) -> bool {
    let Some(call) = node.as_call() else {
        return false;
    };
    call.operator.kind.is_comparison()
        && call.operands.len() == 2
        && call
            .operands
            .iter()
            .all(|operand| operand.as_identifier().is_some_and(|id| id.is_qualified()))
}

fn degenerate_join(predicate: &SqlNode) -> Diagnostic {
    let mut diagnostic = Diagnostic::new(
        DiagnosticCode::SqlDegenerateJoin,
        Severity::Warn,
        format!(
            "both relations of `{}` were already joined; the predicate was stacked as an extra join",
            predicate
        ),
    )
    .with_snippet(predicate.to_string());

    if !predicate.span.is_empty() {
        diagnostic = diagnostic.with_location(Location::with_position(
            "<input>",
            predicate.span.start_line,
            predicate.span.start_column.saturating_sub(1),
        ));
    }
    diagnostic
}

fn builtin(name: &str) -> Arc<SqlOperator> {
    SqlOperator::builtin(name).unwrap_or_else(|| Arc::new(SqlOperator::other_prefix(name)))
}

fn star(mut qualifier: Vec<String>) -> SqlNode {
    qualifier.push("*".to_string());
    SqlNode::identifier(qualifier, SourceSpan::default())
}

fn literal_value(value: &Value) -> Result<LiteralValue, BuildError> {
    let literal = match value {
        Value::Null => LiteralValue::Null,
        Value::Boolean(b) => LiteralValue::Boolean(*b),
        Value::Number(text, _) => {
            if let Ok(i) = text.parse::<i64>() {
                LiteralValue::Integer(i)
            } else if let Ok(f) = text.parse::<f64>() {
                LiteralValue::Decimal(f)
            } else {
                return unsupported(format!("numeric literal {}", text));
            }
        }
        Value::SingleQuotedString(s)
        | Value::DoubleQuotedString(s)
        | Value::EscapedStringLiteral(s)
        | Value::NationalStringLiteral(s) => LiteralValue::String(s.clone()),
        other => return unsupported(format!("literal {}", other)),
    };
    Ok(literal)
}

fn object_parts(name: &ObjectName) -> Vec<String> {
    name.0.iter().map(|ident| ident.value.clone()).collect()
}

fn object_span(name: &ObjectName) -> SourceSpan {
    name.0
        .iter()
        .map(ident_span)
        .fold(SourceSpan::default(), |acc, span| acc.merge(&span))
}

fn ident_span(ident: &Ident) -> SourceSpan {
    convert_span(ident.span)
}

fn convert_span(span: Span) -> SourceSpan {
    SourceSpan::new(
        span.start.line as usize,
        span.start.column as usize,
        span.end.line as usize,
        span.end.column as usize,
    )
}

/// Leading keyword of a statement, for error messages
fn statement_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    fn build(sql: &str) -> Result<BuildOutput, BuildError> {
        let statements = Parser::parse_sql(&GenericDialect {}, sql).unwrap();
        let (hints, errors) = crate::hints::scan(sql);
        assert!(errors.is_empty());
        AstBuilder::new(hints).build(&statements[0])
    }

    fn select_of(output: &BuildOutput) -> &fedsql_core::Select {
        output.ast.as_select().unwrap()
    }

    #[test]
    fn implicit_join_becomes_join_tree() {
        let output = build("select t1.k from t1, t2 where t1.id = t2.id").unwrap();
        let select = select_of(&output);
        let join = select.from.as_ref().unwrap().as_join().unwrap();
        assert_eq!(join.kind, JoinKind::Inner);
        assert_eq!(join.condition.as_ref().unwrap().to_string(), "t1.id = t2.id");
        assert!(select.where_clause.is_none());
    }

    #[test]
    fn literal_comparisons_stay_in_where() {
        let output = build("SELECT a FROM t1, t2 WHERE t1.id = t2.id AND t1.age > 18 AND t2.name = 'x'")
            .unwrap();
        let select = select_of(&output);
        assert_eq!(
            select.where_clause.as_ref().unwrap().to_string(),
            "t1.age > 18 AND t2.name = 'x'"
        );
    }

    #[test]
    fn subquery_predicates_do_not_leak() {
        let output = build(
            "SELECT a.x FROM a, (SELECT b.x FROM b, c WHERE b.id = c.id) s WHERE a.x = s.x",
        )
        .unwrap();
        let select = select_of(&output);
        let from = select.from.as_ref().unwrap();
        assert_eq!(
            from.to_string(),
            "a INNER JOIN (SELECT b.x FROM b INNER JOIN c ON b.id = c.id) AS s ON a.x = s.x"
        );
        assert!(select.where_clause.is_none());
        assert_eq!(output.references.derived_tables, vec!["s"]);
    }

    #[test]
    fn explicit_join_kinds() {
        let output = build("SELECT * FROM a LEFT OUTER JOIN b ON a.id = b.id CROSS JOIN c").unwrap();
        let from = select_of(&output).from.as_ref().unwrap();
        let outer = from.as_join().unwrap();
        assert_eq!(outer.kind, JoinKind::Cross);
        assert_eq!(outer.left.as_join().unwrap().kind, JoinKind::Left);
    }

    #[test]
    fn aliases_and_references() {
        let output = build("SELECT u.id, name FROM users u WHERE u.age > 1").unwrap();
        assert_eq!(output.references.relation_aliases["u"], "users");
        assert_eq!(output.references.qualified_columns, vec!["u.age", "u.id", "u.name"]);
    }

    #[test]
    fn function_operators_are_shared() {
        let output = build("SELECT COUNT(a), COUNT(b) FROM t").unwrap();
        let list = &select_of(&output).select_list;
        let first = list[0].as_call().unwrap();
        let second = list[1].as_call().unwrap();
        assert!(Arc::ptr_eq(&first.operator, &second.operator));
    }

    #[test]
    fn hints_attach_to_their_select() {
        let output = build("select /*+ FUNC(TEE) */ MUL(t1.k,t2.k) from t1, t2").unwrap();
        let hints = &select_of(&output).hints;
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].as_hint().unwrap().name, "FUNC");
    }

    #[test]
    fn unsupported_constructs_are_named() {
        let err = build("SELECT a FROM t UNION SELECT b FROM u").unwrap_err();
        assert_eq!(err, BuildError::Unsupported("UNION set operation".into()));

        let err = build("INSERT INTO t VALUES (1)").unwrap_err();
        assert_eq!(err.to_string(), "unsupported construct: INSERT statement");

        let err = build(
            "SELECT SUM(a) OVER (ORDER BY b ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) FROM t",
        )
        .unwrap_err();
        assert_eq!(err, BuildError::Unsupported("window frame".into()));
    }

    #[test]
    fn plain_cte_is_skipped() {
        let output = build("WITH x AS (SELECT 1) SELECT a FROM t").unwrap();
        assert_eq!(select_of(&output).select_list.len(), 1);
    }

    #[test]
    fn degenerate_join_reports_diagnostic() {
        let output =
            build("SELECT t1.a FROM t1, t2 WHERE t1.a = t2.a AND t1.b = t2.b").unwrap();
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].code, DiagnosticCode::SqlDegenerateJoin);
    }

    #[test]
    fn using_columns_keep_source_positions() {
        let output = build("SELECT a.x FROM a JOIN b USING (id)").unwrap();
        let join = select_of(&output).from.as_ref().unwrap().as_join().unwrap();
        assert_eq!(join.using.len(), 1);
        assert_eq!(join.using[0].as_identifier().unwrap().parts, vec!["id"]);
        assert_eq!(join.using[0].span.start_line, 1);
        assert_eq!(join.using[0].span.start_column, 33);
    }

    #[test]
    fn correlated_predicate_stays_in_subquery_where() {
        let output = build(
            "SELECT o.x FROM o WHERE EXISTS (SELECT 1 FROM a, b WHERE a.id = b.id AND a.oid = o.id)",
        )
        .unwrap();
        assert_eq!(
            output.ast.to_string(),
            "SELECT o.x FROM o WHERE EXISTS (SELECT 1 FROM a INNER JOIN b ON a.id = b.id WHERE a.oid = o.id)"
        );
    }
}
