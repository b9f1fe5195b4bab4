use std::collections::BTreeSet;
use std::sync::Arc;

use argus_explore::traversal::engine::{SearchConfig, TreeGenerator};
use argus_explore::traversal::trace::TraceStepKind;
use argus_explore::{GenerateError, Generator, TestGenerator};
use argus_grammar::value::ValueConfig;
use argus_grammar::{compile, MatchPolicy, ParameterGrammar};
use argus_ir::output::{ClassCoverage, LineStatus, Output, RunStatus};
use argus_ir::parse_bounds;

const ARCHIVER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../argus-ir/tests/fixtures/archiver.json"
));

fn grammar(json: &str) -> Arc<ParameterGrammar> {
    let bounds = parse_bounds(json).unwrap();
    Arc::new(compile(&bounds, MatchPolicy::Union).unwrap().grammar)
}

fn flags_grammar() -> Arc<ParameterGrammar> {
    grammar(
        r#"{ "dependent": [
            { "pattern": "", "parameters": [ { "type": "enum", "options": ["--a", "--b"] } ] },
            { "pattern": "--a", "parameters": [ { "type": "enum", "options": ["x", "y"] } ] }
        ] }"#,
    )
}

fn traced() -> SearchConfig {
    SearchConfig {
        record_trace: true,
        ..SearchConfig::default()
    }
}

fn vectors(items: &[&[&str]]) -> BTreeSet<Vec<String>> {
    items
        .iter()
        .map(|v| v.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// Output whose only class has lines `[first, first + len)` partly covered.
fn partial(first: u32, len: usize) -> Output {
    let mut out = Output::new(vec![], RunStatus::Exited { code: Some(0) });
    let mut lines = vec![LineStatus::NotCovered; 100];
    for line in lines.iter_mut().skip(first as usize - 1).take(len) {
        *line = LineStatus::PartlyCovered;
    }
    out.coverage
        .insert("Main".to_string(), ClassCoverage::new(1, lines));
    out
}

#[test]
fn test_dependent_flags_tree_then_random() {
    let mut g = TreeGenerator::new(flags_grammar(), ValueConfig::default(), traced());

    let first: BTreeSet<Vec<String>> = (0..3).map(|_| g.next_vector(None).unwrap()).collect();
    let expected = vectors(&[&["--b"], &["--a", "x"], &["--a", "y"]]);
    assert_eq!(first, expected);
    assert!(!g.is_exhausted());

    let fourth = g.next_vector(None).unwrap();
    assert!(g.is_exhausted());
    assert!(expected.contains(&fourth));
    assert_eq!(g.tree().len(), 1);
}

#[test]
fn test_two_terminals_reached_before_any_prune() {
    let grammar = grammar(
        r#"{ "dependent": [
            { "pattern": "", "parameters": [ { "type": "enum", "options": ["--a"] } ] },
            { "pattern": "--a", "parameters": [ { "type": "enum", "options": ["x", "y"] } ] }
        ] }"#,
    );
    let mut g = TreeGenerator::new(grammar, ValueConfig::default(), traced());
    let got: BTreeSet<Vec<String>> = (0..2).map(|_| g.next_vector(None).unwrap()).collect();

    assert_eq!(got, vectors(&[&["--a", "x"], &["--a", "y"]]));
    let trace = g.trace().unwrap();
    assert!(trace.steps().iter().all(|s| s.kind != TraceStepKind::Pruned));
    assert_eq!(trace.returned().len(), 2);
}

#[test]
fn test_terminal_paths_round_trip() {
    let grammar = grammar(ARCHIVER);
    let mut g = TreeGenerator::new(grammar.clone(), ValueConfig::default(), traced());

    for _ in 0..60 {
        let args = g.next_vector(None).unwrap();
        for i in 0..args.len() {
            assert!(
                !grammar.next_choices(&args[..i]).is_empty(),
                "{args:?} complete too early at {i}"
            );
        }
        assert!(grammar.is_complete(&args), "{args:?} not complete");
    }
}

#[test]
fn test_coverage_feedback_backpropagates() {
    let mut g = TreeGenerator::new(flags_grammar(), ValueConfig::default(), traced());
    g.next_vector(None).unwrap();
    let node = g.last_node().unwrap();

    g.next_vector(Some(Arc::new(partial(10, 11)))).unwrap();

    assert_eq!(g.accountant().running_total(node), 11);
    let root = g.tree().node(g.tree().root()).unwrap();
    assert_eq!(root.visits, 1);
    assert_eq!(root.score, 11.0);
    let scored = g.tree().node(node).unwrap();
    assert_eq!(scored.visits, 1);
    assert!(scored.output.is_some());
}

#[test]
fn test_overlapping_coverage_contests_lines() {
    let mut g = TreeGenerator::new(flags_grammar(), ValueConfig::default(), traced());
    g.next_vector(None).unwrap();
    let a = g.last_node().unwrap();
    g.next_vector(Some(Arc::new(partial(10, 11)))).unwrap();
    let b = g.last_node().unwrap();
    g.next_vector(Some(Arc::new(partial(15, 11)))).unwrap();

    assert_eq!(g.accountant().running_total(a), 5);
    assert_eq!(g.accountant().running_total(b), 5);
    assert!(g.accountant().counter("Main").unwrap().is_partition());
}

#[test]
fn test_unscored_test_leaves_tree_untouched() {
    let mut g = TreeGenerator::new(flags_grammar(), ValueConfig::default(), traced());
    g.next_vector(None).unwrap();
    g.next_vector(None).unwrap();
    let root = g.tree().node(g.tree().root()).unwrap();
    assert_eq!(root.visits, 0);
    assert_eq!(root.score, 0.0);
}

#[test]
fn test_bounded_pinned_integers() {
    let grammar = grammar(
        r#"{ "parameters": [
            { "type": "int", "min": 1, "max": 1 },
            { "type": "int", "min": "1", "max": "1" }
        ] }"#,
    );
    let mut g = Generator::for_grammar(grammar, ValueConfig::default(), SearchConfig::default());
    assert_eq!(g.name(), "random");
    for _ in 0..25 {
        assert_eq!(g.generate_next(None).unwrap(), vec!["1", "1"]);
    }
}

#[test]
fn test_empty_schema_is_immediately_terminal() {
    let mut g = Generator::for_grammar(
        grammar(r#"{ "parameters": [] }"#),
        ValueConfig::default(),
        SearchConfig::default(),
    );
    assert!(g.generate_next(None).unwrap().is_empty());
}

#[test]
fn test_dependent_grammar_selects_tree() {
    let g = Generator::for_grammar(flags_grammar(), ValueConfig::default(), SearchConfig::default());
    assert_eq!(g.name(), "tree");
}

#[test]
fn test_same_seed_same_vectors() {
    let run = || {
        let mut g = Generator::for_grammar(
            grammar(ARCHIVER),
            ValueConfig::default(),
            SearchConfig::default(),
        );
        (0..30)
            .map(|_| g.generate_next(None).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_replay_reports_exhaustion() {
    let mut g = Generator::replay(vec![vec!["--help".to_string()]]);
    assert_eq!(g.name(), "replay");
    assert_eq!(g.generate_next(None).unwrap(), vec!["--help"]);
    assert!(matches!(
        g.generate_next(None),
        Err(GenerateError::Exhausted)
    ));
}
