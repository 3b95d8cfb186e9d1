//! Integration tests for the parse -> build -> analyze pipeline

use fedsql_core::{DiagnosticCode, NodeKind, Severity, SqlKind, SqlNode};
use fedsql_sql::{
    analyze, extract_column_names, extract_table_names, is_aggregate_function, ParseError,
    SqlParser,
};
use pretty_assertions::assert_eq;

fn parse(sql: &str) -> SqlNode {
    SqlParser::new()
        .parse(sql, None)
        .unwrap_or_else(|e| panic!("failed to parse {sql}: {e}"))
        .ast
}

fn count_nodes(node: &SqlNode, matches: &dyn Fn(&SqlNode) -> bool) -> usize {
    let own = usize::from(matches(node));
    own + node
        .children()
        .into_iter()
        .map(|child| count_nodes(child, matches))
        .sum::<usize>()
}

/// Joins in the outer FROM tree, not descending into derived tables
fn top_level_joins(ast: &SqlNode) -> usize {
    fn joins(node: &SqlNode) -> usize {
        match &node.kind {
            NodeKind::Join(join) => 1 + joins(&join.left) + joins(&join.right),
            NodeKind::BasicCall(basic) => joins(&basic.operand),
            _ => node.as_alias().map_or(0, |(target, _)| joins(target)),
        }
    }
    ast.as_select()
        .and_then(|s| s.from.as_ref())
        .map_or(0, joins)
}

#[test]
fn test_simple_select_analysis() {
    let ast = parse("SELECT id, name FROM users WHERE age > 18");
    let analysis = analyze(Some(&ast));

    assert_eq!(analysis.tables, vec!["users"]);
    assert_eq!(analysis.columns, vec!["id", "name", "age"]);
    assert!(analysis.join_types.is_empty());
    assert!(!analysis.has_subquery);
}

#[test]
fn test_explicit_join_with_aliases() {
    let ast = parse(
        "SELECT u.id, u.name, o.order_id FROM users u JOIN orders o ON u.id = o.user_id",
    );
    let analysis = analyze(Some(&ast));

    assert_eq!(analysis.join_types, vec!["INNER JOIN"]);
    assert_eq!(analysis.table_aliases.len(), 2);
    assert_eq!(analysis.table_aliases["u"], "users");
    assert_eq!(analysis.table_aliases["o"], "orders");
}

#[test]
fn test_group_by_having_aggregates() {
    let ast = parse(
        "SELECT department, COUNT(*) as cnt FROM employees GROUP BY department HAVING COUNT(*) > 5",
    );
    let analysis = analyze(Some(&ast));

    assert_eq!(analysis.aggregate_functions, vec!["COUNT", "COUNT"]);
    assert_eq!(ast.as_select().unwrap().group_by.len(), 1);
}

#[test]
fn test_implicit_join_is_reconstructed() {
    let ast = parse("select t1.k from t1, t2 where t1.id = t2.id");
    let select = ast.as_select().unwrap();

    let join = select.from.as_ref().and_then(|f| f.as_join()).unwrap();
    assert_eq!(join.condition.as_ref().unwrap().to_string(), "t1.id = t2.id");
    assert!(select.where_clause.is_none());
    assert_eq!(top_level_joins(&ast), 1);
}

#[test]
fn test_hint_with_identifier_parameter() {
    let parsed = SqlParser::new()
        .parse("select /*+ FUNC(TEE) */ MUL(t1.k,t2.k) from t1, t2", None)
        .unwrap();

    let hints = parsed.hints();
    assert_eq!(hints.len(), 1);
    let hint = hints[0].as_hint().unwrap();
    assert_eq!(hint.name, "FUNC");
    assert_eq!(hint.parameters.len(), 1);
    assert_eq!(hint.parameters[0].as_identifier().unwrap().name(), "TEE");

    let analysis = analyze(Some(&parsed.ast));
    assert!(analysis.aggregate_functions.is_empty());
}

#[test]
fn test_empty_input_is_rejected() {
    for sql in ["", "   \n\t "] {
        let result = SqlParser::new().parse(sql, None);
        assert!(matches!(result, Err(ParseError::EmptyInput)));
    }

    let diag = ParseError::EmptyInput.to_diagnostic(None);
    assert_eq!(diag.code, DiagnosticCode::EmptyInput);
}

#[test]
fn test_equi_chain_yields_n_minus_one_joins() {
    let ast = parse(
        "select plat1.atest.k, plat2.btest.b2 from plat1.atest, plat2.btest, plat3.ctest \
         where plat1.atest.id = plat2.btest.id and plat2.btest.id = plat3.ctest.id and plat1.atest.a1 = 1",
    );
    let select = ast.as_select().unwrap();

    assert_eq!(top_level_joins(&ast), 2);
    assert_eq!(
        select.where_clause.as_ref().unwrap().to_string(),
        "plat1.atest.a1 = 1"
    );
}

#[test]
fn test_unreferenced_relation_is_appended() {
    let ast = parse(
        "select plat1.atest.k, plat2.btest.b2 from plat1.atest, plat2.btest, plat3.ctest \
         where plat1.atest.id = plat2.btest.id and plat1.atest.a1 = 1",
    );
    let select = ast.as_select().unwrap();
    let outer = select.from.as_ref().and_then(|f| f.as_join()).unwrap();

    assert_eq!(top_level_joins(&ast), 2);
    assert_eq!(outer.right.to_string(), "plat3.ctest");
    assert_eq!(outer.condition.as_ref().unwrap().to_string(), "1 = 1");
}

#[test]
fn test_cartesian_chain_without_join_predicates() {
    let ast = parse("SELECT a.x FROM a, b, c WHERE a.x > 1");
    let select = ast.as_select().unwrap();

    assert_eq!(top_level_joins(&ast), 2);
    assert_eq!(select.where_clause.as_ref().unwrap().to_string(), "a.x > 1");

    let trivial = count_nodes(select.from.as_ref().unwrap(), &|n| {
        n.as_join()
            .and_then(|j| j.condition.as_ref())
            .is_some_and(|c| c.to_string() == "1 = 1")
    });
    assert_eq!(trivial, 2);
}

#[test]
fn test_derived_tables_join_through_aliases() {
    let ast = parse(
        "select plat2.btest.b1, tmp_table.id from plat1.atest, plat2.btest,\
         (select id, a1 from plat1.atest ) tmp_table \
         where plat1.atest.id= plat2.btest.id and tmp_table.id= plat2.btest.id",
    );
    let select = ast.as_select().unwrap();
    let analysis = analyze(Some(&ast));

    assert_eq!(top_level_joins(&ast), 2);
    assert!(select.where_clause.is_none());
    assert!(analysis.has_subquery);
    assert_eq!(
        extract_table_names(Some(&ast)).unwrap(),
        vec!["plat1.atest", "plat2.btest", "plat1.atest"]
    );
}

#[test]
fn test_nested_derived_tables() {
    let ast = parse(
        "select plat2.btest.b1, tmp_table.id from plat1.atest, plat2.btest,\
         (select id, cnt, tot_val from (select id, count(a1) as cnt, sum(a1) as tot_val \
         from plat1.atest group by id ) tmp_inner ) tmp_table \
         where plat1.atest.id= plat2.btest.id and tmp_table.id= plat2.btest.id",
    );
    let analysis = analyze(Some(&ast));

    assert!(analysis.has_subquery);
    assert_eq!(analysis.aggregate_functions, vec!["COUNT", "SUM"]);
    assert_eq!(analysis.table_aliases["cnt"], "count(a1)");
}

#[test]
fn test_outer_joins_keep_their_kind() {
    let cases = [
        (
            "select plat1.atest.id from plat2.btest left outer join plat1.atest \
             on plat1.atest.id = plat2.btest.id where plat1.atest.id is null",
            "LEFT JOIN",
        ),
        (
            "select plat1.atest.id from plat1.atest right outer join plat2.btest \
             on plat1.atest.id = plat2.btest.id where plat1.atest.id is null",
            "RIGHT JOIN",
        ),
        (
            "select plat1.atest.id from plat1.atest full outer join plat2.btest \
             on plat1.atest.id = plat2.btest.id where plat2.btest.id is null",
            "FULL JOIN",
        ),
    ];

    for (sql, expected) in cases {
        let ast = parse(sql);
        let analysis = analyze(Some(&ast));
        assert_eq!(analysis.join_types, vec![expected]);

        let where_clause = ast.as_select().unwrap().where_clause.as_ref().unwrap();
        assert_eq!(where_clause.sql_kind(), SqlKind::IsNull);
    }
}

#[test]
fn test_non_equality_join_predicate() {
    let ast = parse(
        "select plat1.atest.id from plat1.atest, plat2.btest where plat1.atest.id <> plat2.btest.id",
    );
    let select = ast.as_select().unwrap();
    let join = select.from.as_ref().and_then(|f| f.as_join()).unwrap();

    assert_eq!(join.condition.as_ref().unwrap().sql_kind(), SqlKind::NotEquals);
    assert!(select.where_clause.is_none());
}

#[test]
fn test_non_comparison_predicates_stay_filters() {
    let cases = [
        ("a.x BETWEEN b.lo AND b.hi", SqlKind::Between),
        ("a.x IN (b.y, b.z)", SqlKind::In),
        ("a.x LIKE b.pattern", SqlKind::Like),
        ("a.x IS NULL", SqlKind::IsNull),
    ];

    for (predicate, kind) in cases {
        let ast = parse(&format!("SELECT a.x FROM a, b WHERE {predicate}"));
        let select = ast.as_select().unwrap();

        assert_eq!(
            select.from.as_ref().unwrap().to_string(),
            "a INNER JOIN b ON 1 = 1",
            "{predicate}"
        );
        assert_eq!(select.where_clause.as_ref().unwrap().sql_kind(), kind);
    }
}

#[test]
fn test_same_relation_predicate_stacks_degenerate_join() {
    let parsed = SqlParser::new()
        .parse(
            "SELECT t1.k FROM t1, t2 WHERE t1.id = t2.id AND t1.a = t1.b",
            None,
        )
        .unwrap();
    let select = parsed.ast.as_select().unwrap();

    assert_eq!(
        select.from.as_ref().unwrap().to_string(),
        "t1 INNER JOIN t2 ON t1.id = t2.id INNER JOIN t1 ON t1.a = t1.b"
    );
    assert!(select.where_clause.is_none());

    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].code, DiagnosticCode::SqlDegenerateJoin);
    assert_eq!(parsed.diagnostics[0].severity, Severity::Warn);
}

#[test]
fn test_correlated_predicate_is_not_joined() {
    let ast = parse(
        "SELECT o.x FROM o WHERE EXISTS (SELECT 1 FROM a, b WHERE a.id = b.id AND a.oid = o.id)",
    );

    assert_eq!(
        ast.to_string(),
        "SELECT o.x FROM o WHERE EXISTS (SELECT 1 FROM a INNER JOIN b ON a.id = b.id WHERE a.oid = o.id)"
    );
    assert_eq!(analyze(Some(&ast)).join_types, vec!["INNER JOIN"]);
}

#[test]
fn test_qualifiers_resolve_case_insensitively() {
    let ast = parse("SELECT T1.k FROM T1, t2 WHERE t1.id = t2.id");
    let select = ast.as_select().unwrap();

    assert_eq!(top_level_joins(&ast), 1);
    assert_eq!(
        select.from.as_ref().unwrap().to_string(),
        "T1 INNER JOIN t2 ON t1.id = t2.id"
    );
}

#[test]
fn test_aggregate_count_matches_aggregate_calls() {
    let queries = [
        "select count(plat1.atest.k), max(plat1.atest.k), avg(plat1.atest.k) from plat1.atest",
        "select SUM(plat1.atest.k*plat2.btest.k) from plat1.atest, plat2.btest where plat1.atest.id=plat2.btest.id",
        "select plat1.atest.a1, sum(tmp_table2.tot_val2 + 2 * plat1.atest.a1) as result from plat1.atest,\
         ( select id as id2, count(b2) as cnt2, sum(b2) as tot_val2 from plat2.btest group by id) tmp_table2, \
         (select id as id1, count(a1) as cnt1, sum(a1) as tot_val1 from plat1.atest group by id ) tmp_table1 \
         where plat1.atest.id= tmp_table1.id1 and tmp_table1.id1= tmp_table2.id2 \
         group by plat1.atest.a1, plat1.atest.k, tmp_table2.id2",
    ];

    for sql in queries {
        let ast = parse(sql);
        let calls = count_nodes(&ast, &|n| {
            n.as_call()
                .is_some_and(|call| is_aggregate_function(&call.operator.name))
        });
        assert_eq!(analyze(Some(&ast)).aggregate_functions.len(), calls, "{sql}");
    }
}

#[test]
fn test_extraction_is_deterministic() {
    let sql = "select plat1.atest.k, plat1.atest.a1, plat2.btest.b1, plat2.btest.id \
               from plat1.atest, plat2.btest, plat3.ctest \
               where plat1.atest.id = plat2.btest.id AND plat3.ctest.id = plat2.btest.id";

    let first = parse(sql);
    let second = parse(sql);

    assert_eq!(first, second);
    assert_eq!(
        extract_table_names(Some(&first)).unwrap(),
        extract_table_names(Some(&second)).unwrap()
    );
    assert_eq!(
        extract_column_names(Some(&first)).unwrap(),
        vec!["plat1.atest.k", "plat1.atest.a1", "plat2.btest.b1", "plat2.btest.id"]
    );
    assert_eq!(analyze(Some(&first)), analyze(Some(&second)));
}

#[test]
fn test_hint_blocks() {
    let parser = SqlParser::new();

    let bare = parser.parse("select /*+ TEE */ * from plat1.atest", None).unwrap();
    let hint = bare.hints()[0].as_hint().unwrap();
    assert_eq!(hint.name, "TEE");
    assert!(hint.parameters.is_empty());

    let multi = parser
        .parse("select /*+ JOIN(TEE), FUNC(TEE) */ * from plat1.atest, plat2.btest", None)
        .unwrap();
    let names: Vec<&str> = multi
        .hints()
        .iter()
        .filter_map(|h| h.as_hint())
        .map(|h| h.name.as_str())
        .collect();
    assert_eq!(names, vec!["JOIN", "FUNC"]);

    let he = parser
        .parse(
            "select /*+ JOIN(HE) */ plat1.atest.id from plat1.atest, plat2.btest \
             where plat1.atest.id=plat2.btest.id",
            None,
        )
        .unwrap();
    assert_eq!(he.hints().len(), 1);
    assert!(he.ast.to_string().starts_with("SELECT /*+ JOIN(HE) */"));
}

#[test]
fn test_hints_attach_to_their_own_select() {
    let parsed = SqlParser::new()
        .parse(
            "SELECT /*+ LOCAL(FL) */ s.a FROM (SELECT /*+ FUNC(TEE) */ a FROM plat1.atest) s",
            None,
        )
        .unwrap();

    let outer = parsed.ast.as_select().unwrap();
    assert_eq!(outer.hints.len(), 1);
    assert_eq!(outer.hints[0].as_hint().unwrap().name, "LOCAL");

    let inner = outer
        .from
        .as_ref()
        .and_then(|f| f.as_alias())
        .and_then(|(target, _)| target.as_select())
        .unwrap();
    assert_eq!(inner.hints[0].as_hint().unwrap().name, "FUNC");
}

#[test]
fn test_hint_parameter_literals() {
    let parsed = SqlParser::new()
        .parse("SELECT /*+ LIMITS(10, 0.5, 'fl', true) */ a FROM t", None)
        .unwrap();
    let hint = parsed.hints()[0].as_hint().unwrap();

    let rendered: Vec<String> = hint.parameters.iter().map(|p| p.to_string()).collect();
    assert_eq!(rendered, vec!["10", "0.5", "'fl'", "TRUE"]);
}

#[test]
fn test_malformed_hint_is_a_syntax_error() {
    let result = SqlParser::new().parse("select /*+ FUNC( */ * from plat1.atest", None);

    let Err(error) = result else {
        panic!("expected a syntax error");
    };
    assert!(!error.syntax_errors().is_empty());
    assert_eq!(error.to_diagnostic(None).code, DiagnosticCode::SqlSyntaxError);
}

#[test]
fn test_statement_syntax_error_has_position() {
    let error = SqlParser::new()
        .parse("SELECT id FROM users WHERE", None)
        .unwrap_err();

    let errors = error.syntax_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 1);

    let diag = error.to_diagnostic(None);
    assert!(diag.location.is_some());
}

#[test]
fn test_unsupported_constructs_are_reported() {
    let parser = SqlParser::new();

    for sql in [
        "SELECT a FROM t UNION SELECT b FROM u",
        "WITH RECURSIVE r AS (SELECT 1) SELECT * FROM r",
        "SELECT 1; SELECT 2",
    ] {
        let error = parser.parse(sql, None).unwrap_err();
        assert!(matches!(error, ParseError::Unsupported(_)), "{sql}");
        assert_eq!(
            error.to_diagnostic(None).code,
            DiagnosticCode::SqlUnsupportedConstruct
        );
    }
}

#[test]
fn test_analysis_json_shape() {
    let ast = parse("SELECT u.id FROM users u WHERE u.id > 1");
    let json = serde_json::to_value(analyze(Some(&ast))).unwrap();

    for key in [
        "tables",
        "columns",
        "aggregateFunctions",
        "joinTypes",
        "hasSubquery",
        "hasCTE",
        "hasWindowFunction",
        "tableAliases",
        "columnAliases",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["hasCTE"], serde_json::json!(false));
}

#[test]
fn test_parse_result_envelope() {
    let parser = SqlParser::new();

    let ok = parser.parse_result("SELECT a FROM t");
    assert!(ok.success);
    assert!(ok.ast.is_some());
    assert!(ok.error_message.is_none());

    let failed = parser.parse_result("");
    assert!(!failed.success);
    assert!(failed.ast.is_none());
    assert_eq!(failed.error_message.as_deref(), Some("empty SQL input"));
}
