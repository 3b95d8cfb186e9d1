//! Diagnostic codes and error reporting
//!
//! Diagnostic codes are stable string identifiers.
//! NEVER rename or remove codes - add new ones with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Input (1xxx)
    /// Input was empty or whitespace only
    EmptyInput,

    /// SQL source file could not be read
    InputUnreadable,

    // Parsing (2xxx)
    /// Statement or hint block failed to parse
    SqlSyntaxError,

    /// Parsed, but the tree builder does not handle this construct
    SqlUnsupportedConstruct,

    // Tree shape (3xxx)
    /// Both sides of a join predicate were already part of the join tree
    SqlDegenerateJoin,

    /// An extractor was called without a tree
    MissingAst,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_INPUT",
            Self::InputUnreadable => "INPUT_UNREADABLE",
            Self::SqlSyntaxError => "SQL_SYNTAX_ERROR",
            Self::SqlUnsupportedConstruct => "SQL_UNSUPPORTED_CONSTRUCT",
            Self::SqlDegenerateJoin => "SQL_DEGENERATE_JOIN",
            Self::MissingAst => "MISSING_AST",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Should be reviewed, does not fail the run
    Warn,

    /// Fails the run
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Position in a SQL source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path, or `<input>` for inline SQL
    pub file: String,

    /// Line (1-indexed)
    pub line: Option<usize>,

    /// Column (0-indexed, as reported in syntax errors)
    pub column: Option<usize>,
}

impl Location {
    /// Create a new location with just a source name
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Create a location with source name, line, and column
    pub fn with_position(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        Ok(())
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Offending SQL fragment, when one can be named
    pub snippet: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            snippet: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the offending fragment
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Replace the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::EmptyInput.as_str(), "EMPTY_INPUT");
        assert_eq!(DiagnosticCode::SqlSyntaxError.as_str(), "SQL_SYNTAX_ERROR");
        assert_eq!(DiagnosticCode::MissingAst.as_str(), "MISSING_AST");
        assert_eq!(DiagnosticCode::InputUnreadable.as_str(), "INPUT_UNREADABLE");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::SqlSyntaxError,
            Severity::Error,
            "Expected: an expression, found: EOF",
        )
        .with_location(Location::with_position("query.sql", 1, 7));

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("SQL_SYNTAX_ERROR"));
        assert!(json.contains("error"));
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::new(DiagnosticCode::SqlDegenerateJoin, Severity::Warn, "stacked join")
            .with_location(Location::with_position("<input>", 2, 4));
        assert_eq!(
            diag.to_string(),
            "warn[SQL_DEGENERATE_JOIN]: stacked join (<input>:2:4)"
        );
    }
}
