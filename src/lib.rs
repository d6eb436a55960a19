//! Treetuples: noun-feature relations from dependency parses
//!
//! Ranked tree patterns are matched against each parsed sentence; the
//! winning patterns emit `(subject, feature, role, pattern)` tuples.
//! Core implementation in Rust with Python bindings.

// Matching engine
pub mod emit; // Template substitution into tuples
pub mod pattern; // Pattern nodes, constraints and templates
pub mod resolver; // Tier and group precedence
pub mod search; // Subtree search with sibling permutations
pub mod tree; // Dependency tree arena

// Pattern catalogues
pub mod library;
pub mod parser; // Catalogue grammar

// Corpora and pipeline
pub mod config;
pub mod conllu; // CoNLL-U file parsing
pub mod iterators;
pub mod miner;
pub mod stats; // LLR association scores

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use config::RunConfig;
pub use conllu::CoNLLUReader;
pub use emit::{Tuple, emit};
pub use iterators::{Corpus, Document};
pub use library::{Catalog, LibraryError, PatternLibrary};
pub use miner::{Miner, dedup_tuples};
pub use pattern::{PatternError, PatternSpec};
pub use resolver::extract;
pub use search::{Solution, solve};
pub use tree::{Attrs, Node, NodeId, Tree, TreeError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_conllu() {
        let text = "# text = The man is not tall.
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tman\tman\tNOUN\tNN\t_\t3\tnsubj\t_\t_
3\tis\tbe\tAUX\tVBZ\t_\t0\tROOT\t_\t_
4\tnot\tnot\tPART\tRB\t_\t3\tneg\t_\t_
5\ttall\ttall\tADJ\tJJ\t_\t3\tacomp\t_\t_

";
        let catalog = Catalog::english().unwrap();
        let adj = catalog.require("adj").unwrap();
        let tree = CoNLLUReader::from_string(text).next().unwrap().unwrap();

        let tuples = dedup_tuples(extract(&tree, adj).unwrap());
        assert_eq!(tuples, vec![Tuple::new("man", "NEG_tall", "adj", "A_an")]);
    }
}
