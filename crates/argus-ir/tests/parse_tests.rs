use argus_ir::output::{LineStatus, Output, RunStatus};
use argus_ir::parse::parse_bounds;
use argus_ir::types::BoundValue;

#[test]
fn test_parse_dependent_bounds_from_file() {
    let json = include_str!("fixtures/archiver.json");
    let bounds = parse_bounds(json).unwrap();
    assert!(!bounds.is_bounded());

    let dependent = bounds.dependent.as_ref().unwrap();
    assert_eq!(dependent.len(), 4);
    assert_eq!(dependent[0].pattern, "");
    assert_eq!(dependent[0].parameters[0].options.len(), 4);
    assert_eq!(bounds.tests.len(), 2);
    assert_eq!(bounds.tests[1].stdout, None);
}

#[test]
fn test_parse_bounded_bounds_from_file() {
    let json = include_str!("fixtures/calculator.json");
    let bounds = parse_bounds(json).unwrap();
    assert!(bounds.is_bounded());

    let params = bounds.parameters.as_ref().unwrap();
    assert_eq!(params.len(), 4);
    assert_eq!(params[0].min.as_ref().and_then(BoundValue::as_i64), Some(-50));
    assert_eq!(params[2].min.as_ref().and_then(BoundValue::as_f64), Some(0.0));
    assert_eq!(params[2].max.as_ref().and_then(BoundValue::as_f64), None);
    assert!(params[3].optional);
    assert!(bounds.tests.is_empty());
}

#[test]
fn test_parse_invalid_json() {
    assert!(parse_bounds("not json at all").is_err());
}

#[test]
fn test_parse_missing_type_fails() {
    let json = r#"{ "parameters": [ { "options": ["a"] } ] }"#;
    assert!(parse_bounds(json).is_err());
}

#[test]
fn test_unknown_type_is_preserved() {
    let json = r#"{ "parameters": [ { "type": "uuid" } ] }"#;
    let bounds = parse_bounds(json).unwrap();
    assert_eq!(bounds.parameters.unwrap()[0].param_type, "uuid");
}

#[test]
fn test_bound_value_text_parsing() {
    assert_eq!(BoundValue::from("  12 ").as_i64(), Some(12));
    assert_eq!(BoundValue::from("2.5").as_f64(), Some(2.5));
    assert_eq!(BoundValue::from("2.5").as_i64(), Some(2));
    assert_eq!(BoundValue::from("abc").as_i64(), None);
    assert_eq!(BoundValue::from(7).as_f64(), Some(7.0));
}

#[test]
fn test_output_roundtrips_through_json() {
    let mut output = Output::new(vec!["-x".into()], RunStatus::TimedOut);
    output.permissions.insert("file.read".into(), 2);
    let json = serde_json::to_string(&output).unwrap();
    assert!(json.contains("\"kind\":\"timed_out\""));
    let back: Output = serde_json::from_str(&json).unwrap();
    assert_eq!(back, output);
    assert_eq!(
        serde_json::from_str::<LineStatus>("\"partly_covered\"").unwrap(),
        LineStatus::PartlyCovered
    );
}
