use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fedsql_core::{Config, Diagnostic, OutputFormat, Severity};
use fedsql_sql::{analyze, extract_column_names, extract_table_names, ParsedSql, SqlParser};

/// fedsql - SQL front end for federated query planning
#[derive(Parser)]
#[command(name = "fedsql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: fedsql.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the SQL text comes from
#[derive(Args)]
struct SqlInput {
    /// SQL text (use --file to read from disk instead)
    sql: Option<String>,

    /// Read SQL from a file
    #[arg(short, long, conflicts_with = "sql")]
    file: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and print the canonical tree, hints and diagnostics
    Parse(SqlInput),

    /// Print the semantic analysis record
    Analyze(SqlInput),

    /// List relation names at FROM positions
    Tables(SqlInput),

    /// List identifier columns of the top-level select list
    Columns(SqlInput),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new("fedsql.toml").exists() {
        Config::from_file(Path::new("fedsql.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if cli.verbose {
        eprintln!("{} dialect: {:?}", "Using".cyan(), config.dialect);
    }

    let ok = match &cli.command {
        Commands::Parse(input) => parse_command(&config, input)?,
        Commands::Analyze(input) => analyze_command(&config, input)?,
        Commands::Tables(input) => names_command(&config, input, NameKind::Tables)?,
        Commands::Columns(input) => names_command(&config, input, NameKind::Columns)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

impl SqlInput {
    fn read(&self) -> Result<String> {
        match (&self.sql, &self.file) {
            (Some(sql), _) => Ok(sql.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            (None, None) => anyhow::bail!("provide SQL text or --file <PATH>"),
        }
    }

    fn wants_json(&self, config: &Config) -> bool {
        self.json || config.output == OutputFormat::Json
    }
}

/// Parse the input; on failure print the diagnostic and return `None`
fn parse_input(config: &Config, input: &SqlInput) -> Result<Option<ParsedSql>> {
    let sql = input.read()?;
    let parser = SqlParser::from_dialect(&config.dialect);

    match parser.parse(&sql, input.file.as_deref()) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            let diagnostic = apply_overrides(config, e.to_diagnostic(input.file.as_deref()));
            if input.wants_json(config) {
                println!("{}", serde_json::to_string_pretty(&diagnostic)?);
            } else {
                print_diagnostic(&diagnostic);
            }
            Ok(None)
        }
    }
}

/// Build diagnostics with severity overrides applied
fn build_diagnostics(config: &Config, parsed: &ParsedSql) -> Vec<Diagnostic> {
    parsed
        .diagnostics
        .iter()
        .cloned()
        .map(|d| apply_overrides(config, d))
        .collect()
}

/// Print build diagnostics to stderr; true when none is an error
fn report_diagnostics(config: &Config, parsed: &ParsedSql) -> bool {
    let diagnostics = build_diagnostics(config, parsed);
    for diagnostic in &diagnostics {
        print_diagnostic(diagnostic);
    }
    !has_errors(&diagnostics)
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

fn apply_overrides(config: &Config, diagnostic: Diagnostic) -> Diagnostic {
    let severity = config
        .severity
        .get_severity(diagnostic.code, diagnostic.severity);
    diagnostic.with_severity(severity)
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    let label = match diagnostic.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warn => "warning".yellow().bold(),
        Severity::Info => "info".blue().bold(),
    };
    eprintln!("{}[{}]: {}", label, diagnostic.code, diagnostic.message);
    if let Some(location) = &diagnostic.location {
        eprintln!("  {} {}", "-->".bright_blue(), location);
    }
    if let Some(snippet) = &diagnostic.snippet {
        eprintln!("  {} {}", "|".bright_blue(), snippet);
    }
}

/// Parse command - print the canonical tree
fn parse_command(config: &Config, input: &SqlInput) -> Result<bool> {
    let Some(parsed) = parse_input(config, input)? else {
        return Ok(false);
    };

    let diagnostics = build_diagnostics(config, &parsed);
    let ok = !has_errors(&diagnostics);

    if input.wants_json(config) {
        let hints: Vec<String> = parsed.hints().iter().map(ToString::to_string).collect();
        let output = serde_json::json!({
            "ast": parsed.ast.to_string(),
            "hints": hints,
            "references": parsed.references,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ok);
    }

    println!("{}", parsed.ast);

    let hints = parsed.hints();
    if !hints.is_empty() {
        println!();
        println!("{}", "Hints:".bold());
        for hint in hints {
            println!("  {}", hint.to_string().green());
        }
    }

    if !parsed.references.relation_aliases.is_empty() {
        println!();
        println!("{}", "Relation aliases:".bold());
        for (alias, relation) in &parsed.references.relation_aliases {
            println!("  {} -> {}", alias.cyan(), relation);
        }
    }

    for diagnostic in &diagnostics {
        print_diagnostic(diagnostic);
    }

    Ok(ok)
}

/// Analyze command - print the semantic analysis record
fn analyze_command(config: &Config, input: &SqlInput) -> Result<bool> {
    let Some(parsed) = parse_input(config, input)? else {
        return Ok(false);
    };
    let ok = report_diagnostics(config, &parsed);
    let analysis = analyze(Some(&parsed.ast));

    if input.wants_json(config) {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(ok);
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "SQL Analysis".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    print_list("Tables:", &analysis.tables);
    print_list("Columns:", &analysis.columns);
    print_list("Aggregate functions:", &analysis.aggregate_functions);
    print_list("Join types:", &analysis.join_types);

    println!("{} {}", "Has subquery:".bold(), flag(analysis.has_subquery));
    println!("{} {}", "Has CTE:".bold(), flag(analysis.has_cte));
    println!(
        "{} {}",
        "Has window function:".bold(),
        flag(analysis.has_window_function)
    );

    for (title, aliases) in [
        ("Table aliases:", &analysis.table_aliases),
        ("Column aliases:", &analysis.column_aliases),
    ] {
        if aliases.is_empty() {
            continue;
        }
        println!("{}", title.bold());
        for (alias, target) in aliases {
            println!("  {} -> {}", alias.cyan(), target);
        }
    }

    println!();
    Ok(ok)
}

enum NameKind {
    Tables,
    Columns,
}

/// Tables / columns commands - narrow name extraction
fn names_command(config: &Config, input: &SqlInput, kind: NameKind) -> Result<bool> {
    let Some(parsed) = parse_input(config, input)? else {
        return Ok(false);
    };

    let ok = report_diagnostics(config, &parsed);

    let extracted = match kind {
        NameKind::Tables => extract_table_names(Some(&parsed.ast)),
        NameKind::Columns => extract_column_names(Some(&parsed.ast)),
    };
    let names = match extracted {
        Ok(names) => names,
        Err(e) => {
            let diagnostic = apply_overrides(config, e.to_diagnostic(input.file.as_deref()));
            print_diagnostic(&diagnostic);
            return Ok(false);
        }
    };

    if input.wants_json(config) {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(ok)
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        println!("{} {}", title.bold(), "-".dimmed());
    } else {
        println!("{} {}", title.bold(), items.join(", "));
    }
}

fn flag(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedsql_core::DiagnosticCode;

    const DEGENERATE: &str = "SELECT t1.a FROM t1, t2 WHERE t1.a = t2.a AND t1.b = t2.b";

    fn parsed(sql: &str) -> ParsedSql {
        SqlParser::new().parse(sql, None).unwrap()
    }

    #[test]
    fn degenerate_join_is_a_warning_by_default() {
        let config = Config::default();
        let diagnostics = build_diagnostics(&config, &parsed(DEGENERATE));

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warn);
        assert!(report_diagnostics(&config, &parsed(DEGENERATE)));
    }

    #[test]
    fn severity_override_fails_every_command() {
        let mut config = Config::default();
        config
            .severity
            .set_override(DiagnosticCode::SqlDegenerateJoin, Severity::Error);

        let input = SqlInput {
            sql: Some(DEGENERATE.to_string()),
            file: None,
            json: true,
        };

        assert!(has_errors(&build_diagnostics(&config, &parsed(DEGENERATE))));
        assert!(!parse_command(&config, &input).unwrap());
        assert!(!analyze_command(&config, &input).unwrap());
        assert!(!names_command(&config, &input, NameKind::Tables).unwrap());
        assert!(!names_command(&config, &input, NameKind::Columns).unwrap());
    }

    #[test]
    fn clean_query_succeeds() {
        let config = Config::default();
        let input = SqlInput {
            sql: Some("SELECT t1.a FROM t1, t2 WHERE t1.a = t2.a".to_string()),
            file: None,
            json: true,
        };

        assert!(analyze_command(&config, &input).unwrap());
        assert!(names_command(&config, &input, NameKind::Tables).unwrap());
    }
}
