//! Join reconstruction
//!
//! Rewrites an implicit comma join (`FROM a, b WHERE a.id = b.id`) into the
//! join tree an explicit `JOIN ... ON` would have produced, and folds the
//! remaining WHERE predicates back into one conjunction.

use fedsql_core::{Identifier, Join, JoinKind, LiteralValue, NodeKind, SourceSpan, SqlNode, SqlOperator};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Where a WHERE leaf predicate ended up during classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateClass {
    /// Comparison between two qualified column references
    Join,
    Filter,
}

/// A WHERE leaf predicate, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedPredicate {
    pub node: SqlNode,
    pub class: PredicateClass,
}

impl ClassifiedPredicate {
    pub fn new(node: SqlNode, class: PredicateClass) -> Self {
        Self { node, class }
    }
}

/// Output of one reconstruction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    /// Relation tree for `Select.from`
    pub from: Option<SqlNode>,

    /// AND-folded leftover predicates for `Select.where`
    pub where_clause: Option<SqlNode>,

    /// Join predicates whose relations were both attached already
    pub degenerate: Vec<SqlNode>,
}

/// Build the relation tree for one query block
///
/// `relations` are the top-level FROM items in source order; `subqueries`
/// maps derived-table aliases to their trees.
pub fn reconstruct(
    relations: Vec<SqlNode>,
    predicates: Vec<ClassifiedPredicate>,
    subqueries: &HashMap<String, SqlNode>,
) -> Reconstruction {
    let has_join_predicates = predicates
        .iter()
        .any(|p| p.class == PredicateClass::Join);

    if relations.len() <= 1 || !has_join_predicates {
        // Nothing to fold: join predicates stay in the filter output
        let from = cartesian(relations);
        let where_clause = fold_and(predicates.into_iter().map(|p| p.node));
        return Reconstruction {
            from,
            where_clause,
            degenerate: Vec::new(),
        };
    }

    let keys: Vec<Vec<String>> = relations.iter().map(relation_keys).collect();
    let mut attached: HashSet<String> = HashSet::new();
    let mut tree: Option<SqlNode> = None;
    let mut leftovers = Vec::new();
    let mut degenerate = Vec::new();

    for predicate in predicates {
        if predicate.class == PredicateClass::Filter {
            leftovers.push(predicate.node);
            continue;
        }

        let Some((left, right)) = predicate_sides(&predicate.node, &relations, &keys, subqueries)
        else {
            leftovers.push(predicate.node);
            continue;
        };

        let current = match tree.take() {
            Some(current) => current,
            None => {
                attached.insert(left.key.clone());
                left.node.clone()
            }
        };

        let attach = if !attached.contains(&right.key) {
            attached.insert(right.key);
            right.node
        } else if !attached.contains(&left.key) {
            attached.insert(left.key);
            left.node
        } else {
            warn!(
                predicate = %predicate.node,
                "both relations already joined; stacking a join on the left relation"
            );
            degenerate.push(predicate.node.clone());
            left.node
        };

        debug!(condition = %predicate.node, "folding join predicate");
        tree = Some(inner_join(current, attach, predicate.node));
    }

    for (index, relation) in relations.into_iter().enumerate() {
        if attached.contains(&index_key(index)) {
            continue;
        }
        debug!(relation = %relation, "appending unreferenced relation with a trivially-true join");
        tree = Some(match tree {
            Some(current) => inner_join(current, relation, always_true()),
            None => relation,
        });
    }

    Reconstruction {
        from: tree,
        where_clause: fold_and(leftovers),
        degenerate,
    }
}

/// Left-deep chain of trivially-true inner joins
fn cartesian(relations: Vec<SqlNode>) -> Option<SqlNode> {
    relations
        .into_iter()
        .reduce(|left, right| inner_join(left, right, always_true()))
}

/// Left-to-right AND fold
pub fn fold_and(predicates: impl IntoIterator<Item = SqlNode>) -> Option<SqlNode> {
    predicates.into_iter().reduce(|left, right| {
        let span = left.span.merge(&right.span);
        SqlNode::call(SqlOperator::and(), vec![left, right], span)
    })
}

fn inner_join(left: SqlNode, right: SqlNode, condition: SqlNode) -> SqlNode {
    let span = left.span.merge(&right.span).merge(&condition.span);
    SqlNode::join(
        Join {
            left,
            right,
            kind: JoinKind::Inner,
            condition: Some(condition),
            using: Vec::new(),
        },
        span,
    )
}

/// `1 = 1`
fn always_true() -> SqlNode {
    let one = || SqlNode::literal(LiteralValue::Integer(1), SourceSpan::default());
    SqlNode::call(SqlOperator::equals(), vec![one(), one()], SourceSpan::default())
}

/// A relation reference resolved from one side of a join predicate
struct Resolved {
    /// Attachment key, unique per relation
    key: String,
    node: SqlNode,
}

fn index_key(index: usize) -> String {
    format!("#{}", index)
}

fn predicate_sides(
    predicate: &SqlNode,
    relations: &[SqlNode],
    keys: &[Vec<String>],
    subqueries: &HashMap<String, SqlNode>,
) -> Option<(Resolved, Resolved)> {
    let call = predicate.as_call()?;
    let [left, right] = call.operands.as_slice() else {
        return None;
    };

    let left = resolve(left.as_identifier()?.qualifier()?, relations, keys, subqueries)?;
    let right = resolve(right.as_identifier()?.qualifier()?, relations, keys, subqueries)?;
    Some((left, right))
}

/// Resolve a column qualifier to a FROM item
///
/// Names compare ASCII case-insensitively. Exact key matches win over
/// matches on the qualifier's last part; qualifiers naming no FROM item fall
/// back to a registered subquery alias. Anything else (an outer query's
/// relation, a typo) is unresolved.
fn resolve(
    qualifier: String,
    relations: &[SqlNode],
    keys: &[Vec<String>],
    subqueries: &HashMap<String, SqlNode>,
) -> Option<Resolved> {
    let last = qualifier.rsplit('.').next().unwrap_or(&qualifier).to_string();
    let names = |k: &Vec<String>, name: &str| k.iter().any(|key| key.eq_ignore_ascii_case(name));

    let index = keys
        .iter()
        .position(|k| names(k, qualifier.as_str()))
        .or_else(|| keys.iter().position(|k| names(k, last.as_str())));

    if let Some(index) = index {
        return Some(Resolved {
            key: index_key(index),
            node: relations[index].clone(),
        });
    }

    let subquery = [&qualifier, &last].into_iter().find_map(|name| {
        subqueries
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, node)| node)
    });
    if let Some(subquery) = subquery {
        return Some(Resolved {
            key: format!("?{}", qualifier.to_lowercase()),
            node: subquery.clone(),
        });
    }

    debug!(qualifier = %qualifier, "join predicate names no FROM item");
    None
}

/// Names a column qualifier may use to refer to a FROM item
pub fn relation_keys(node: &SqlNode) -> Vec<String> {
    let mut keys = Vec::new();
    collect_keys(node, &mut keys);
    keys
}

fn collect_keys(node: &SqlNode, keys: &mut Vec<String>) {
    match &node.kind {
        NodeKind::Identifier(identifier) => push_table_keys(identifier, keys),
        NodeKind::Call(_) => {
            if let Some((target, alias)) = node.as_alias() {
                push_key(keys, alias.to_string());
                if let Some(identifier) = target.as_identifier() {
                    push_table_keys(identifier, keys);
                }
            }
        }
        NodeKind::BasicCall(basic) => push_key(keys, basic.alias.clone()),
        NodeKind::Join(join) => {
            collect_keys(&join.left, keys);
            collect_keys(&join.right, keys);
        }
        _ => {}
    }
}

fn push_table_keys(identifier: &Identifier, keys: &mut Vec<String>) {
    push_key(keys, identifier.name());
    if let Some(last) = identifier.last() {
        push_key(keys, last.to_string());
    }
}

fn push_key(keys: &mut Vec<String>, key: String) {
    if !keys.contains(&key) {
        keys.push(key);
    }
}
