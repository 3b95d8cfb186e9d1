//! SQL parsing using sqlparser-rs
//!
//! Parses SQL into the statement tree, scans optimizer hints, and builds the
//! canonical tree. Failures carry positioned syntax errors and convert to
//! diagnostics.

use crate::builder::{AstBuilder, BuildError, References};
use crate::hints;
use fedsql_core::{Diagnostic, DiagnosticCode, DialectConfig, Location, Severity, SqlNode};
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::{BigQueryDialect, Dialect, GenericDialect, PostgreSqlDialect, SnowflakeDialect};
use sqlparser::parser::{Parser, ParserError};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Source name used in diagnostics for SQL that did not come from a file
pub const INLINE_SOURCE: &str = "<input>";

static LOCATION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*at Line: (\d+), Column: (\d+)\s*$").expect("valid location regex")
});

/// SQL parser with configurable dialect
pub struct SqlParser {
    dialect: Box<dyn Dialect>,
}

impl SqlParser {
    /// Create a new SQL parser with the default (generic) dialect
    pub fn new() -> Self {
        Self {
            dialect: Box::new(GenericDialect {}),
        }
    }

    /// Create a SQL parser for BigQuery
    pub fn bigquery() -> Self {
        Self {
            dialect: Box::new(BigQueryDialect {}),
        }
    }

    /// Create a SQL parser for PostgreSQL
    pub fn postgres() -> Self {
        Self {
            dialect: Box::new(PostgreSqlDialect {}),
        }
    }

    /// Create a SQL parser for Snowflake
    pub fn snowflake() -> Self {
        Self {
            dialect: Box::new(SnowflakeDialect {}),
        }
    }

    /// Create a parser from a dialect config
    pub fn from_dialect(dialect: &DialectConfig) -> Self {
        match dialect {
            DialectConfig::BigQuery => Self::bigquery(),
            DialectConfig::Snowflake => Self::snowflake(),
            DialectConfig::Postgres => Self::postgres(),
            DialectConfig::Ansi => Self::new(),
        }
    }

    /// Parse one SELECT statement into the canonical tree
    ///
    /// The input is trimmed first; empty input is rejected without invoking
    /// the statement parser. Statement and hint syntax errors are reported
    /// together.
    pub fn parse(&self, sql: &str, file_path: Option<&Path>) -> Result<ParsedSql, ParseError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let (hint_index, mut errors) = hints::scan(sql);

        let statements = match Parser::parse_sql(&*self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                errors.push(SyntaxError::from_parser_error(&e));
                Vec::new()
            }
        };

        if !errors.is_empty() {
            errors.sort_by_key(|e| (e.line, e.column));
            return Err(ParseError::Syntax(errors));
        }

        let mut statements = statements.into_iter();
        let statement = match (statements.next(), statements.next()) {
            (Some(statement), None) => statement,
            (None, _) => {
                return Err(ParseError::Syntax(vec![SyntaxError::new(1, 0, "no statement found")]))
            }
            (Some(_), Some(_)) => {
                return Err(BuildError::Unsupported("multiple statements".to_string()).into())
            }
        };

        let output = AstBuilder::new(hint_index).build(&statement)?;
        debug!(ast = %output.ast, "built canonical tree");

        let source = source_name(file_path);
        let diagnostics = output
            .diagnostics
            .into_iter()
            .map(|mut diagnostic| {
                if let Some(location) = diagnostic.location.as_mut() {
                    location.file = source.clone();
                }
                diagnostic
            })
            .collect();

        Ok(ParsedSql {
            sql: sql.to_string(),
            ast: output.ast,
            raw_tree: statement,
            references: output.references,
            diagnostics,
            file_path: file_path.map(|p| p.to_path_buf()),
        })
    }

    /// Parse SQL from a file
    pub fn parse_file(&self, path: &Path) -> Result<ParsedSql, ParseError> {
        let sql = std::fs::read_to_string(path)
            .map_err(|e| ParseError::Io(format!("{}: {}", path.display(), e)))?;

        self.parse(&sql, Some(path))
    }

    /// Parse SQL and return diagnostic on error
    pub fn parse_with_diagnostic(
        &self,
        sql: &str,
        file_path: Option<&Path>,
    ) -> Result<ParsedSql, Diagnostic> {
        self.parse(sql, file_path)
            .map_err(|e| e.to_diagnostic(file_path))
    }

    /// Parse and flatten into a `ParseResult`
    pub fn parse_result(&self, sql: &str) -> ParseResult {
        ParseResult::from(self.parse(sql, None))
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Successfully parsed SQL with its canonical tree
#[derive(Debug, Clone)]
pub struct ParsedSql {
    /// Trimmed SQL string
    pub sql: String,

    /// Canonical tree
    pub ast: SqlNode,

    /// Statement as produced by sqlparser
    pub raw_tree: Statement,

    /// Column and relation references seen while building
    pub references: References,

    /// Warnings raised while building
    pub diagnostics: Vec<Diagnostic>,

    /// Source file path (if parsed from file)
    pub file_path: Option<std::path::PathBuf>,
}

impl ParsedSql {
    /// `Hint` nodes of the outermost SELECT
    pub fn hints(&self) -> &[SqlNode] {
        self.ast
            .as_select()
            .map(|select| select.hints.as_slice())
            .unwrap_or_default()
    }
}

/// Flattened outcome of one parse call
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub success: bool,

    /// Present iff the parse failed
    pub error_message: Option<String>,

    pub ast: Option<SqlNode>,

    pub raw_tree: Option<Statement>,
}

impl From<Result<ParsedSql, ParseError>> for ParseResult {
    fn from(result: Result<ParsedSql, ParseError>) -> Self {
        match result {
            Ok(parsed) => Self {
                success: true,
                error_message: None,
                ast: Some(parsed.ast),
                raw_tree: Some(parsed.raw_tree),
            },
            Err(e) => Self {
                success: false,
                error_message: Some(e.to_string()),
                ast: None,
                raw_tree: None,
            },
        }
    }
}

/// A positioned syntax error (line 1-indexed, column 0-indexed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// Split sqlparser's trailing ` at Line: L, Column: C` off the message
    ///
    /// Errors without a position (end of input) are placed at 1:0.
    pub fn from_parser_error(error: &ParserError) -> Self {
        let text = match error {
            ParserError::TokenizerError(message) | ParserError::ParserError(message) => {
                message.clone()
            }
            ParserError::RecursionLimitExceeded => "recursion limit exceeded".to_string(),
        };

        match LOCATION_SUFFIX.captures(&text) {
            Some(captures) => {
                let line = captures[1].parse().unwrap_or(1);
                let column = captures[2].parse::<usize>().unwrap_or(1).saturating_sub(1);
                let message = text[..captures.get(0).map_or(text.len(), |m| m.start())].to_string();
                Self::new(line, column, message)
            }
            None => Self::new(1, 0, text),
        }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} {}", self.line, self.column, self.message)
    }
}

fn join_syntax_errors(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// SQL parsing error
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("empty SQL input")]
    EmptyInput,

    /// Semicolon-joined `line:col message` entries
    #[error("{}", join_syntax_errors(.0))]
    Syntax(Vec<SyntaxError>),

    #[error(transparent)]
    Unsupported(#[from] BuildError),

    #[error("failed to read SQL file {0}")]
    Io(String),
}

impl ParseError {
    /// Convert to a diagnostic
    pub fn to_diagnostic(&self, file_path: Option<&Path>) -> Diagnostic {
        let source = source_name(file_path);

        match self {
            Self::EmptyInput => Diagnostic::new(
                DiagnosticCode::EmptyInput,
                Severity::Error,
                "SQL input is empty",
            )
            .with_location(Location::new(source)),
            Self::Syntax(errors) => {
                let first = errors.first();
                let mut diag = Diagnostic::new(
                    DiagnosticCode::SqlSyntaxError,
                    Severity::Error,
                    format!("Failed to parse SQL: {}", self),
                );
                if let Some(first) = first {
                    diag = diag.with_location(Location::with_position(source, first.line, first.column));
                }
                diag
            }
            Self::Unsupported(BuildError::Unsupported(construct)) => Diagnostic::new(
                DiagnosticCode::SqlUnsupportedConstruct,
                Severity::Error,
                self.to_string(),
            )
            .with_snippet(construct.clone())
            .with_location(Location::new(source)),
            Self::Io(_) => Diagnostic::new(
                DiagnosticCode::InputUnreadable,
                Severity::Error,
                self.to_string(),
            )
            .with_location(Location::new(source)),
        }
    }

    /// Positioned syntax errors, if this is a syntax failure
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        match self {
            Self::Syntax(errors) => errors,
            _ => &[],
        }
    }
}

fn source_name(file_path: Option<&Path>) -> String {
    file_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| INLINE_SOURCE.to_string())
}
