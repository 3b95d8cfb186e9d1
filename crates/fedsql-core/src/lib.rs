//! fedsql core
//!
//! Canonical SQL tree, operator table, visitor contract, analysis record,
//! diagnostics and configuration.
//! Never rename diagnostic codes - they are part of the public API.

pub mod analysis;
pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod operator;
pub mod visitor;

pub use analysis::SqlAnalysis;
pub use ast::{
    BasicCall, Call, Hint, Identifier, Join, JoinKind, Literal, LiteralKind, LiteralValue, NodeKind,
    Select, SourceSpan, SqlNode,
};
pub use config::{Config, ConfigError, DialectConfig, OutputFormat, SeverityThreshold};
pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
pub use operator::{SqlKind, SqlOperator, SqlSyntax};
pub use visitor::SqlVisitor;
