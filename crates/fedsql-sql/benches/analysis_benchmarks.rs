//! Benchmarks for the parse -> build -> analyze pipeline
//!
//! Measures how join reconstruction and analysis scale with the number of
//! comma-joined relations and hint blocks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fedsql_sql::{analyze, extract_table_names, SqlParser};

/// `SELECT ... FROM t0, t1, ... WHERE t0.id = t1.id AND ...` over N relations
fn generate_chain_sql(num_tables: usize, with_predicates: bool) -> String {
    let columns: Vec<String> = (0..num_tables).map(|i| format!("t{}.k", i)).collect();
    let tables: Vec<String> = (0..num_tables).map(|i| format!("plat{}.atest t{}", i, i)).collect();

    let mut sql = format!(
        "SELECT /*+ FUNC(TEE), JOIN(FL) */ {} FROM {}",
        columns.join(", "),
        tables.join(", ")
    );

    if with_predicates && num_tables > 1 {
        let predicates: Vec<String> = (1..num_tables)
            .map(|i| format!("t{}.id = t{}.id", i - 1, i))
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
        sql.push_str(" AND t0.age > 18");
    }

    sql
}

fn bench_parse_and_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_and_build");
    let parser = SqlParser::new();

    for num_tables in [2, 8, 32].iter() {
        let sql = generate_chain_sql(*num_tables, true);

        group.bench_with_input(
            BenchmarkId::from_parameter(num_tables),
            num_tables,
            |b, _| {
                b.iter(|| black_box(parser.parse(&sql, None)));
            },
        );
    }

    group.finish();
}

fn bench_cartesian_fallback(c: &mut Criterion) {
    let mut group = c.benchmark_group("cartesian_fallback");
    let parser = SqlParser::new();

    for num_tables in [2, 8, 32].iter() {
        let sql = generate_chain_sql(*num_tables, false);

        group.bench_with_input(
            BenchmarkId::from_parameter(num_tables),
            num_tables,
            |b, _| {
                b.iter(|| black_box(parser.parse(&sql, None)));
            },
        );
    }

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analysis");
    let parser = SqlParser::new();

    for num_tables in [2, 8, 32].iter() {
        let sql = generate_chain_sql(*num_tables, true);
        let Ok(parsed) = parser.parse(&sql, None) else {
            continue;
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(num_tables),
            num_tables,
            |b, _| {
                b.iter(|| {
                    black_box(analyze(Some(&parsed.ast)));
                    black_box(extract_table_names(Some(&parsed.ast)))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_and_build,
    bench_cartesian_fallback,
    bench_analysis
);

criterion_main!(benches);
