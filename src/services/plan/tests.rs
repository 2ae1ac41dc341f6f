//! Plan notation unit tests

use super::*;

fn sample_plan() -> AnalyticalPlan {
    AnalyticalPlan {
        question: "Why are deliveries delayed?".to_string(),
        feasible: true,
        reason: None,
        tables: vec!["shipments".to_string(), "events".to_string()],
        sql: Some("SELECT origin, COUNT(*) AS delays FROM shipments GROUP BY origin".to_string()),
        panels: vec![
            PanelSpec {
                panel_type: PanelType::Bar,
                title: "Delays by Origin".to_string(),
                sql: Some("SELECT origin, COUNT(*) AS n FROM shipments GROUP BY 1".to_string()),
                x: Some("origin".to_string()),
                y: Some("n".to_string()),
                description: Some("Houston dominates the delay count.".to_string()),
                value_field: None,
                columns: Vec::new(),
                forecast: None,
            },
            PanelSpec {
                panel_type: PanelType::Line,
                title: "Monthly Delay Trend".to_string(),
                sql: Some(
                    "SELECT month, COUNT(*) AS n FROM shipments GROUP BY month ORDER BY month"
                        .to_string(),
                ),
                x: Some("month".to_string()),
                y: Some("n".to_string()),
                description: None,
                value_field: None,
                columns: Vec::new(),
                forecast: Some(ForecastSpec {
                    strategy: ForecastStrategy::Linear,
                    horizon: 3,
                    window: Some(4),
                    alpha: Some(0.3),
                    season_length: Some(12),
                    confidence: ConfidenceLevel::High,
                    interval_pct: Some(95.0),
                }),
            },
        ],
        follow_ups: vec!["Compare carriers on Houston routes".to_string()],
        executive_summary: None,
    }
}

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn test_plan_round_trip_compact() {
    let plan = sample_plan();
    let text = plan.to_notation_string(true);
    let reparsed = parse_plan(&text).expect("round trip parse failed");
    assert_eq!(reparsed, plan);
}

#[test]
fn test_plan_round_trip_indented() {
    let plan = sample_plan();
    let text = plan.to_notation_string(false);
    let reparsed = parse_plan(&text).expect("round trip parse failed");
    assert_eq!(reparsed, plan);
}

#[test]
fn test_dashboard_round_trip() {
    let dashboard = DashboardSpec {
        title: "Overview".to_string(),
        panels: sample_plan().panels,
    };
    let text = render(&dashboard.to_notation(), false);
    let reparsed = parse_dashboard(&text).expect("dashboard parse failed");
    assert_eq!(reparsed, dashboard);
}

// ============================================================================
// Prose Tolerance
// ============================================================================

#[test]
fn test_parse_with_surrounding_prose() {
    let text = "Sure! Here is the plan you asked for:\n\n\
                @plan{q:\"total orders\" feasible:true sql:\"SELECT COUNT(*) FROM orders\"}\n\n\
                Let me know if you need anything else.";
    let plan = parse_plan(text).unwrap();
    assert_eq!(plan.question, "total orders");
    assert!(plan.is_feasible());
}

#[test]
fn test_parse_inside_code_fence() {
    let text = "```plan\n@plan{\n  q:\"orders\"\n  feasible:true\n  sql:\"SELECT 1\"\n}\n```";
    let plan = parse_plan(text).unwrap();
    assert_eq!(plan.question, "orders");
}

#[test]
fn test_parse_braces_inside_strings() {
    let text = r#"@plan{q:"curly {braces} inside" feasible:true sql:"SELECT '{}' AS x"}"#;
    let plan = parse_plan(text).unwrap();
    assert_eq!(plan.question, "curly {braces} inside");
    assert_eq!(plan.sql.as_deref(), Some("SELECT '{}' AS x"));
}

// ============================================================================
// Failure Modes
// ============================================================================

#[test]
fn test_unknown_type_tag_is_distinct() {
    let err = parse("@mystery{a:1}").unwrap_err();
    assert!(matches!(err, NotationError::UnknownType(tag) if tag == "mystery"));
}

#[test]
fn test_unbalanced_braces() {
    // Truncated output: the span extractor never finds a closing brace
    let err = parse("@plan{q:\"cut off\" feasible:true").unwrap_err();
    assert!(matches!(err, NotationError::MissingObject));
}

#[test]
fn test_unterminated_string() {
    let err = parse("@plan{q:\"no closing quote}").unwrap_err();
    // The open quote swallows the closing brace, so either error is a
    // format failure; it must never panic.
    assert!(matches!(
        err,
        NotationError::MissingObject | NotationError::UnterminatedString(_)
    ));
}

#[test]
fn test_no_object_in_text() {
    let err = parse("I am unable to produce a plan for that question.").unwrap_err();
    assert!(matches!(err, NotationError::MissingObject));
}

#[test]
fn test_bad_field_coercion() {
    let err = parse_plan("@plan{q:\"x\" feasible:maybe sql:\"SELECT 1\"}").unwrap_err();
    assert!(matches!(err, NotationError::Field { .. }));
}

#[test]
fn test_unknown_panel_type_rejected() {
    let err =
        parse_plan("@plan{q:\"x\" feasible:true panels:[@panel{type:starburst title:\"t\"}]}")
            .unwrap_err();
    assert!(matches!(err, NotationError::Field { .. }));
}

#[test]
fn test_alpha_out_of_range_rejected() {
    let text = "@plan{q:\"x\" feasible:true panels:[@panel{type:line title:\"t\" \
                sql:\"SELECT 1\" forecast:@forecast{strategy:exp_smoothing horizon:3 alpha:1.5}}]}";
    let err = parse_plan(text).unwrap_err();
    assert!(matches!(err, NotationError::Field { .. }));
}

#[test]
fn test_wrong_top_level_type_for_plan() {
    let err = parse_plan("@dashboard{title:\"t\" panels:[]}").unwrap_err();
    assert!(matches!(err, NotationError::UnexpectedType { expected: "plan", .. }));
}

// ============================================================================
// Semantics
// ============================================================================

#[test]
fn test_refusal_decodes_to_infeasible_plan() {
    let text = "@refusal{reason:\"no supplier data available\" \
                followUps:[\"Ask about shipments instead\"]}";
    let plan = parse_plan(text).unwrap();
    assert!(!plan.feasible);
    assert!(!plan.is_feasible());
    assert_eq!(plan.reason.as_deref(), Some("no supplier data available"));
    assert_eq!(plan.follow_ups.len(), 1);
}

#[test]
fn test_feasibility_requires_some_sql() {
    let no_sql = parse_plan("@plan{q:\"x\" feasible:true}").unwrap();
    assert!(!no_sql.is_feasible());

    let panel_sql = parse_plan(
        "@plan{q:\"x\" feasible:true panels:[@panel{type:stat title:\"t\" sql:\"SELECT 1\"}]}",
    )
    .unwrap();
    assert!(panel_sql.is_feasible());
}

#[test]
fn test_scalar_value_kinds() {
    let value = parse("@plan{q:\"mixed\" feasible:true sql:\"SELECT 1\"}").unwrap();
    assert_eq!(value.tag(), Some("plan"));

    let spec = parse(
        "@forecast{strategy:seasonal_naive horizon:12 window:4 alpha:0.25 seasonLength:12 \
         confidence:low intervalPct:80.5}",
    )
    .unwrap();
    assert!(matches!(spec.get("horizon"), Some(NotationValue::Int(12))));
    assert!(matches!(spec.get("alpha"), Some(NotationValue::Float(a)) if (a - 0.25).abs() < 1e-12));
    assert!(matches!(spec.get("strategy"), Some(NotationValue::Str(s)) if s == "seasonal_naive"));
}

#[test]
fn test_extract_prefers_fenced_block() {
    let text = "Ignore this @plan{q:\"decoy\"} mention.\n\
                ```\n@plan{q:\"real\" feasible:true sql:\"SELECT 1\"}\n```";
    let span = extract_notation(text).unwrap();
    assert!(span.contains("real"));
}
