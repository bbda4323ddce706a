//! Vote aggregation for the results view.
//!
//! A pure, synchronous reduction of the participant -> vote mapping.
//! No I/O, fully deterministic for a given input.

use std::collections::HashMap;

use crate::model::VoteValue;

/// Aggregated view of one round of voting.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteSummary {
    /// Arithmetic mean of the revealed numeric votes. Exactly 0.0 when no
    /// numeric vote exists, so display code never has to handle NaN.
    pub average: f64,
    /// (vote value, occurrences), most frequent first.
    pub distribution: Vec<(String, usize)>,
    /// Value of the top distribution entry, `None` when nothing was
    /// revealed (never an empty string, which could be a real option).
    pub most_common: Option<String>,
    /// True when every counted vote landed on the same value.
    pub unanimous: bool,
}

/// Reduce a vote mapping into a [`VoteSummary`].
///
/// Sentinel votes (not-yet-voted, committed-but-hidden) contribute to
/// neither the average nor the distribution. Concrete non-numeric votes
/// ("?") are skipped by the average but still counted in the
/// distribution.
pub fn calculate(votes: &HashMap<String, VoteValue>) -> VoteSummary {
    let mut sum = 0.0;
    let mut numeric = 0usize;
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for vote in votes.values() {
        let Some(value) = vote.as_cast() else { continue };
        if let Ok(parsed) = value.parse::<f64>() {
            if parsed.is_finite() {
                sum += parsed;
                numeric += 1;
            }
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let average = if numeric > 0 { sum / numeric as f64 } else { 0.0 };

    let mut distribution: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    // Count descending; equal counts order by value ascending so the
    // result does not depend on map iteration order.
    distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let most_common = distribution.first().map(|(value, _)| value.clone());
    let unanimous = distribution.len() == 1;

    VoteSummary {
        average,
        distribution,
        most_common,
        unanimous,
    }
}
