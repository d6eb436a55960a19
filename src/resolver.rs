//! Tier and group precedence
//!
//! Tiers are tried in order and the first one producing any tuple wins. Inside
//! a tier every group contributes, but only through its first pattern that
//! has a solution somewhere in the sentence.

use crate::emit::{Tuple, emit};
use crate::library::PatternLibrary;
use crate::search::{Solution, solve};
use crate::tree::{Tree, TreeError};

/// Extract tuples from one sentence with one library.
///
/// The tree is validated first. Tuples are returned in discovery order and
/// may contain duplicates; see [`crate::miner::dedup_tuples`].
pub fn extract(tree: &Tree, library: &PatternLibrary) -> Result<Vec<Tuple>, TreeError> {
    tree.validate()?;
    let anchors = tree.ordered_ids();

    for (tier_index, tier) in library.tiers().iter().enumerate() {
        let mut tuples = Vec::new();

        for group in tier.groups() {
            for pattern in group.patterns() {
                let solutions: Vec<Solution> = anchors
                    .iter()
                    .flat_map(|&anchor| solve(anchor, tree, pattern))
                    .collect();
                if solutions.is_empty() {
                    continue;
                }

                for solution in &solutions {
                    tuples.extend(emit(solution, tree, pattern));
                }
                tracing::debug!(
                    library = library.name(),
                    tier = tier_index + 1,
                    pattern = pattern.name(),
                    solutions = solutions.len(),
                    "group resolved"
                );
                break;
            }
        }

        if !tuples.is_empty() {
            tracing::debug!(
                library = library.name(),
                tier = tier_index + 1,
                tuples = tuples.len(),
                "tier selected"
            );
            return Ok(tuples);
        }
    }

    Ok(Vec::new())
}
