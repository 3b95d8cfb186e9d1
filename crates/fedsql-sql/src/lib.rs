//! SQL parsing and analysis
//!
//! This crate handles:
//! - Parsing SQL using sqlparser-rs
//! - Scanning `/*+ ... */` optimizer hints
//! - Building the canonical tree, rewriting comma joins into join trees
//! - Semantic analysis and name extraction over the canonical tree

pub mod analyzer;
pub mod builder;
pub mod extract;
pub mod hints;
pub mod joins;
pub mod parser;

pub use analyzer::{analyze, is_aggregate_function, is_window_function, SemanticAnalyzer};
pub use builder::{AstBuilder, BuildError, BuildOutput, References};
pub use extract::{extract_column_names, extract_table_names, ExtractError};
pub use hints::HintIndex;
pub use joins::{ClassifiedPredicate, PredicateClass, Reconstruction};
pub use parser::{ParseError, ParseResult, ParsedSql, SqlParser, SyntaxError};
