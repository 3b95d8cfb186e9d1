//! Narrow name extraction: tables only, or select-list columns only

use fedsql_core::{Diagnostic, DiagnosticCode, Location, NodeKind, SqlNode, Severity};
use std::path::Path;

/// Extraction error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("no AST to extract from")]
    MissingAst,
}

impl ExtractError {
    /// Convert to a diagnostic
    pub fn to_diagnostic(&self, file_path: Option<&Path>) -> Diagnostic {
        let source = file_path.map_or_else(
            || crate::parser::INLINE_SOURCE.to_string(),
            |p| p.display().to_string(),
        );
        match self {
            Self::MissingAst => {
                Diagnostic::new(DiagnosticCode::MissingAst, Severity::Error, self.to_string())
                    .with_location(Location::new(source))
            }
        }
    }
}

/// Relation names at FROM positions, recursing into joins and derived tables
pub fn extract_table_names(ast: Option<&SqlNode>) -> Result<Vec<String>, ExtractError> {
    let ast = ast.ok_or(ExtractError::MissingAst)?;
    let mut names = Vec::new();
    if let Some(select) = ast.as_select() {
        if let Some(from) = &select.from {
            collect_tables(from, &mut names);
        }
    }
    Ok(names)
}

/// Identifier text from the top-level select list
pub fn extract_column_names(ast: Option<&SqlNode>) -> Result<Vec<String>, ExtractError> {
    let ast = ast.ok_or(ExtractError::MissingAst)?;
    let mut names = Vec::new();
    if let Some(select) = ast.as_select() {
        for item in &select.select_list {
            let target = match &item.kind {
                NodeKind::BasicCall(basic) => &basic.operand,
                _ => item.as_alias().map_or(item, |(target, _)| target),
            };
            if let Some(identifier) = target.as_identifier() {
                if !identifier.is_star() {
                    names.push(identifier.name());
                }
            }
        }
    }
    Ok(names)
}

fn collect_tables(node: &SqlNode, names: &mut Vec<String>) {
    match &node.kind {
        NodeKind::Identifier(identifier) => {
            if identifier.parts.first().is_some_and(|part| part != "*") {
                names.push(identifier.name());
            }
        }
        NodeKind::Call(_) => {
            if let Some((target, _)) = node.as_alias() {
                collect_tables(target, names);
            }
        }
        NodeKind::BasicCall(basic) => collect_tables(&basic.operand, names),
        NodeKind::Join(join) => {
            collect_tables(&join.left, names);
            collect_tables(&join.right, names);
        }
        NodeKind::Select(select) => {
            if let Some(from) = &select.from {
                collect_tables(from, names);
            }
        }
        _ => {}
    }
}
