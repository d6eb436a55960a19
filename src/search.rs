//! Subtree search
//!
//! Finds every correspondence between a pattern tree and the parse subtree
//! under a chosen anchor. Pattern children are unordered: each pattern node
//! with k children is matched against every ordered k-permutation of the parse
//! node's children, and parse children beyond the k selected are ignored.
//!
//! The search is iterative. Partial assignments live in an arena; each frame
//! holds only the pairs resolved in its step and points at the frame it was
//! expanded from, so the pairs fixed earlier are shared rather than copied.
//! Work is driven by an explicit stack of frame indices.
//!
//! Cost grows with the product of sibling permutations, so wide parse nodes
//! combined with wide pattern nodes can get expensive. Pattern arity is capped
//! at load time ([`crate::pattern::MAX_ARITY`]); parse fan-out is not.

use itertools::Itertools;

use crate::pattern::{PATTERN_ROOT, PatternNodeId, PatternSpec};
use crate::tree::{NodeId, Tree};

/// A (parse node, pattern node) correspondence
pub type Pair = (NodeId, PatternNodeId);

/// One complete correspondence between a pattern and a parse subtree.
///
/// Pairs are ordered as the search resolved them: the anchor pair first, then
/// each level of the pattern in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub pairs: Vec<Pair>,
}

impl Solution {
    /// Parse node bound to a pattern node
    pub fn get(&self, pattern_id: PatternNodeId) -> Option<NodeId> {
        self.pairs
            .iter()
            .rev()
            .find(|(_, p)| *p == pattern_id)
            .map(|(n, _)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A partial assignment: the pairs added in one step plus a link back to the
/// frame holding everything resolved before it
#[derive(Debug)]
struct Frame {
    parent: Option<usize>,
    pairs: Vec<Pair>,
}

/// Find every solution of `pattern` rooted at `anchor`
///
/// Assumes `tree` passes [`Tree::validate`].
pub fn solve(anchor: NodeId, tree: &Tree, pattern: &PatternSpec) -> Vec<Solution> {
    let mut solutions = Vec::new();

    let Some(anchor_node) = tree.get_node(anchor) else {
        return solutions;
    };
    if !pattern.root().matches(&anchor_node.attrs) {
        return solutions;
    }

    let mut arena = vec![Frame {
        parent: None,
        pairs: vec![(anchor, PATTERN_ROOT)],
    }];
    let mut stack = vec![0];

    while let Some(frame_id) = stack.pop() {
        // For every pattern node of this step that has children: the
        // permutations of its parse node's children that satisfy them
        let mut obligations: Vec<(PatternNodeId, Vec<Vec<NodeId>>)> = Vec::new();
        let mut dead_end = false;

        for &(parse_id, pattern_id) in &arena[frame_id].pairs {
            let wanted = pattern.children(pattern_id);
            if wanted.is_empty() {
                continue;
            }
            let perms = matching_permutations(tree, tree.children(parse_id), wanted, pattern);
            if perms.is_empty() {
                dead_end = true;
                break;
            }
            obligations.push((pattern_id, perms));
        }

        if dead_end {
            continue;
        }
        if obligations.is_empty() {
            solutions.push(collect_solution(&arena, frame_id));
            continue;
        }

        // Every combination of choices becomes its own partial assignment
        for choice in obligations
            .iter()
            .map(|(_, perms)| perms.iter())
            .multi_cartesian_product()
        {
            let pairs = obligations
                .iter()
                .zip(choice)
                .flat_map(|((pattern_id, _), perm)| {
                    perm.iter()
                        .copied()
                        .zip(pattern.children(*pattern_id).iter().copied())
                })
                .collect();
            arena.push(Frame {
                parent: Some(frame_id),
                pairs,
            });
            stack.push(arena.len() - 1);
        }
    }

    tracing::trace!(
        pattern = pattern.name(),
        anchor,
        frames = arena.len(),
        solutions = solutions.len(),
        "subtree search finished"
    );

    solutions
}

/// Ordered selections of `candidates` whose members satisfy `wanted`
/// position by position
fn matching_permutations(
    tree: &Tree,
    candidates: &[NodeId],
    wanted: &[PatternNodeId],
    pattern: &PatternSpec,
) -> Vec<Vec<NodeId>> {
    candidates
        .iter()
        .copied()
        .permutations(wanted.len())
        .filter(|perm| {
            perm.iter().zip(wanted).all(|(&child, &pattern_id)| {
                tree.get_node(child)
                    .is_some_and(|node| pattern.node(pattern_id).matches(&node.attrs))
            })
        })
        .collect()
}

/// Concatenate the pairs along a frame's ancestry, oldest first
fn collect_solution(arena: &[Frame], frame_id: usize) -> Solution {
    let mut chain = vec![frame_id];
    let mut current = frame_id;
    while let Some(parent) = arena[current].parent {
        chain.push(parent);
        current = parent;
    }

    let pairs = chain
        .into_iter()
        .rev()
        .flat_map(|id| arena[id].pairs.iter().copied())
        .collect();
    Solution { pairs }
}
