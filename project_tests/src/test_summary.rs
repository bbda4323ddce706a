//! # Vote Summary Runner
//!
//! Walks the summary calculator through the documented examples and edge
//! cases and prints each checkpoint. Purely local; no server needed.

use std::collections::HashMap;

use lib_poker::{calculate, VoteValue};

fn votes(entries: &[(&str, &str)]) -> HashMap<String, VoteValue> {
    entries
        .iter()
        .map(|(user, vote)| (user.to_string(), VoteValue::from(Some(vote.to_string()))))
        .collect()
}

fn main() {
    println!("--- Starting Summary Module Tests ---");

    // 1. The documented mixed example.
    let summary = calculate(&votes(&[
        ("A", "5"),
        ("B", "5"),
        ("C", "8"),
        ("D", "not_voted"),
    ]));
    assert_eq!(summary.average, 6.0);
    assert_eq!(
        summary.distribution,
        vec![("5".to_string(), 2), ("8".to_string(), 1)]
    );
    assert!(!summary.unanimous);
    println!("✅ Mixed deck: average {}, top {:?}", summary.average, summary.most_common);

    // 2. Symbolic-only votes: counted, never averaged.
    let summary = calculate(&votes(&[("A", "?"), ("B", "?")]));
    assert_eq!(summary.average, 0.0);
    assert_eq!(summary.distribution, vec![("?".to_string(), 2)]);
    assert!(summary.unanimous);
    println!("✅ Symbolic deck: unanimous {:?}", summary.most_common);

    // 3. Sentinels contribute nothing.
    let summary = calculate(&votes(&[("A", "voted"), ("B", "not_voted")]));
    assert_eq!(summary.average, 0.0);
    assert!(summary.distribution.is_empty());
    assert_eq!(summary.most_common, None);
    println!("✅ Sentinel-only deck yields the zero summary");

    // 4. Empty room.
    let summary = calculate(&HashMap::new());
    assert_eq!(summary.average, 0.0);
    assert!(summary.distribution.is_empty());
    println!("✅ Empty room yields the zero summary");

    // 5. Count invariant: distribution covers every concrete vote.
    let input = votes(&[("A", "3"), ("B", "5"), ("C", "5"), ("D", "?"), ("E", "voted")]);
    let summary = calculate(&input);
    let counted: usize = summary.distribution.iter().map(|(_, c)| c).sum();
    assert_eq!(counted, 4);
    println!("✅ Distribution counts cover all {counted} concrete votes");

    println!("\n--- All Tests Passed Successfully ---");
}
