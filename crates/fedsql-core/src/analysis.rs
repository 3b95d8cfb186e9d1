//! Analysis record produced by the semantic analyzer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata extracted from one query
///
/// Table and column lists are deduplicated in first-seen order; aggregate
/// and join lists keep every occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlAnalysis {
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub aggregate_functions: Vec<String>,
    pub join_types: Vec<String>,
    pub has_subquery: bool,
    /// Reserved; never set
    #[serde(rename = "hasCTE")]
    pub has_cte: bool,
    pub has_window_function: bool,
    /// alias -> table name
    pub table_aliases: BTreeMap<String, String>,
    /// alias -> column expression text
    pub column_aliases: BTreeMap<String, String>,
}

impl SqlAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: impl Into<String>) {
        push_unique(&mut self.tables, name.into());
    }

    pub fn add_column(&mut self, name: impl Into<String>) {
        push_unique(&mut self.columns, name.into());
    }

    pub fn add_aggregate(&mut self, name: impl Into<String>) {
        self.aggregate_functions.push(name.into());
    }

    pub fn add_join_type(&mut self, label: impl Into<String>) {
        self.join_types.push(label.into());
    }

    /// Last write wins
    pub fn add_table_alias(&mut self, alias: impl Into<String>, table: impl Into<String>) {
        self.table_aliases.insert(alias.into(), table.into());
    }

    /// Last write wins
    pub fn add_column_alias(&mut self, alias: impl Into<String>, expression: impl Into<String>) {
        self.column_aliases.insert(alias.into(), expression.into());
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
