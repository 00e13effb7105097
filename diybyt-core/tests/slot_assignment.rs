//! Slot assignment over parsed metadata documents.

use diybyt_core::{metadata, SlotAssigner, SlotAssignment};
use rstest::rstest;

fn assign(doc: &str) -> SlotAssignment {
    let parsed = metadata::parse(doc).expect("parse");
    SlotAssigner::assign(parsed.enabled().map(|p| &p.name))
}

fn pairs(assignment: &SlotAssignment) -> Vec<(String, usize)> {
    assignment
        .iter()
        .map(|(name, slot)| (name.0.clone(), slot))
        .collect()
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn same_document_always_yields_same_mapping() {
    let doc = r#"{
        "b.star": {"enabled": true, "order": 5},
        "a.star": {"enabled": true, "order": 1},
        "c.star": {"enabled": true, "order": 3}
    }"#;
    let first = assign(doc);
    for _ in 0..10 {
        assert_eq!(assign(doc), first);
    }
    assert_eq!(
        pairs(&first),
        vec![
            ("b.star".to_string(), 0),
            ("a.star".to_string(), 1),
            ("c.star".to_string(), 2),
        ],
        "order hint must not influence slot numbering"
    );
}

// ---------------------------------------------------------------------------
// Totality: disabling a program shifts later slots down with no gap
// ---------------------------------------------------------------------------

#[rstest]
#[case("first", [false, true, true], vec![("b.star", 0), ("c.star", 1)])]
#[case("middle", [true, false, true], vec![("a.star", 0), ("c.star", 1)])]
#[case("last", [true, true, false], vec![("a.star", 0), ("b.star", 1)])]
fn disabling_one_of_three_leaves_no_gap(
    #[case] label: &str,
    #[case] enabled: [bool; 3],
    #[case] expected: Vec<(&str, usize)>,
) {
    let doc = format!(
        r#"{{"a.star": {{"enabled": {}}}, "b.star": {{"enabled": {}}}, "c.star": {{"enabled": {}}}}}"#,
        enabled[0], enabled[1], enabled[2]
    );
    let got = pairs(&assign(&doc));
    let expected: Vec<(String, usize)> = expected
        .into_iter()
        .map(|(n, s)| (n.to_string(), s))
        .collect();
    assert_eq!(got, expected, "[{label}]");
}

// ---------------------------------------------------------------------------
// Enabling a previously disabled program
// ---------------------------------------------------------------------------

#[test]
fn enabling_middle_program_reshuffles_later_slots() {
    let before = assign(
        r#"{
            "_config": {"render_server_url": "http://localhost:8000"},
            "A": {"enabled": true, "order": 1},
            "B": {"enabled": false},
            "C": {"enabled": true, "order": 2}
        }"#,
    );
    assert_eq!(
        pairs(&before),
        vec![("A".to_string(), 0), ("C".to_string(), 1)]
    );

    let after = assign(
        r#"{
            "_config": {"render_server_url": "http://localhost:8000"},
            "A": {"enabled": true, "order": 1},
            "B": {"enabled": true},
            "C": {"enabled": true, "order": 2}
        }"#,
    );
    assert_eq!(
        pairs(&after),
        vec![
            ("A".to_string(), 0),
            ("B".to_string(), 1),
            ("C".to_string(), 2)
        ]
    );
}

#[test]
fn reserved_config_entry_never_takes_a_slot() {
    let assignment = assign(r#"{"_config": {"enabled": true}, "only.star": {"enabled": true}}"#);
    assert_eq!(pairs(&assignment), vec![("only.star".to_string(), 0)]);
}
