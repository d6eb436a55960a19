//! Turning solutions into output tuples

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pattern::{NEG_LABEL, PatternSpec};
use crate::search::Solution;
use crate::tree::{NodeId, Tree};

/// Prefix marking a feature observed under negation
pub const NEG_PREFIX: &str = "NEG_";

/// A mined relation: `subject` has `feature` via `role`, found by `pattern`.
///
/// Serialized as a plain 4-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(
    from = "(String, String, String, String)",
    into = "(String, String, String, String)"
)]
pub struct Tuple {
    pub subject: String,
    pub feature: String,
    pub role: String,
    pub pattern: String,
}

impl Tuple {
    pub fn new(subject: &str, feature: &str, role: &str, pattern: &str) -> Self {
        Self {
            subject: subject.to_string(),
            feature: feature.to_string(),
            role: role.to_string(),
            pattern: pattern.to_string(),
        }
    }

    pub fn is_negated(&self) -> bool {
        self.feature.starts_with(NEG_PREFIX)
    }
}

impl From<(String, String, String, String)> for Tuple {
    fn from((subject, feature, role, pattern): (String, String, String, String)) -> Self {
        Self {
            subject,
            feature,
            role,
            pattern,
        }
    }
}

impl From<Tuple> for (String, String, String, String) {
    fn from(t: Tuple) -> Self {
        (t.subject, t.feature, t.role, t.pattern)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.subject, self.feature, self.role, self.pattern
        )
    }
}

/// Lemma of a parse node, falling back to its surface form
fn lemma_of(tree: &Tree, id: NodeId) -> &str {
    tree.get_node(id)
        .and_then(|node| node.lemma().or_else(|| node.text()))
        .unwrap_or("")
}

/// Instantiate the pattern's template for one solution.
///
/// Each labelled pattern node binds its label to the lemma of the parse node
/// it matched (a later binding of the same label wins). Placeholders are
/// rewritten by replacing every label they contain in one pass. If the `neg`
/// label was bound, every feature produced here is prefixed with `NEG_`.
pub fn emit(solution: &Solution, tree: &Tree, pattern: &PatternSpec) -> Vec<Tuple> {
    let mut bound: Vec<Option<&str>> = vec![None; pattern.labels().len()];
    let mut negated = false;

    for &(parse_id, pattern_id) in solution.iter() {
        let Some(label) = pattern.node(pattern_id).label.as_deref() else {
            continue;
        };
        if let Some(slot) = pattern.label_index(label) {
            bound[slot] = Some(lemma_of(tree, parse_id));
        }
        if label == NEG_LABEL {
            negated = true;
        }
    }

    let values: Vec<&str> = bound.into_iter().map(Option::unwrap_or_default).collect();

    pattern
        .template()
        .iter()
        .map(|entry| {
            let subject = pattern.substitute(&entry.subject, &values);
            let mut feature = pattern.substitute(&entry.feature, &values);
            if negated {
                feature.insert_str(0, NEG_PREFIX);
            }
            Tuple {
                subject,
                feature,
                role: entry.role.clone(),
                pattern: entry.id.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::TemplateEntry;
    use crate::search::solve;
    use crate::tree::Node;

    fn tall_man() -> Tree {
        let mut tree = Tree::new();
        tree.add_node(Node::new(0, "man", "man", "NOUN", "ROOT"));
        tree.add_node(Node::new(0, "tall", "tall", "ADJ", "amod"));
        tree.set_parent(1, 0).unwrap();
        tree.set_parent(2, 1).unwrap();
        tree
    }

    #[test]
    fn test_emit_simple() {
        let tree = tall_man();
        let pattern = PatternSpec::from_parts(
            "A",
            [(0, vec![1]), (1, vec![2])],
            [
                (1, vec![("pos", "NOUN|PROPN"), ("label", "noun")]),
                (2, vec![("pos", "ADJ"), ("label", "word")]),
            ],
            vec![TemplateEntry::new("noun", "word", "adj", "A")],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(solutions.len(), 1);
        assert_eq!(
            emit(&solutions[0], &tree, &pattern),
            vec![Tuple::new("man", "tall", "adj", "A")]
        );
    }

    #[test]
    fn test_emit_negated() {
        let mut tree = tall_man();
        let not = tree.add_node(Node::new(0, "not", "not", "PART", "neg"));
        tree.set_parent(not, 1).unwrap();

        let pattern = PatternSpec::from_parts(
            "A_n",
            [(1, vec![2, 3])],
            [
                (1, vec![("pos", "NOUN"), ("label", "noun")]),
                (2, vec![("pos", "ADJ"), ("label", "word")]),
                (3, vec![("dep", "neg"), ("label", "neg")]),
            ],
            vec![TemplateEntry::new("noun", "word", "adj", "A_n")],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(solutions.len(), 1);
        let tuples = emit(&solutions[0], &tree, &pattern);
        assert_eq!(tuples, vec![Tuple::new("man", "NEG_tall", "adj", "A_n")]);
        assert!(tuples[0].is_negated());
    }

    #[test]
    fn test_emit_compound_placeholder() {
        // "Dutch are tight with money" -> feature "tight_with_money"
        let mut tree = Tree::new();
        for (form, lemma, pos) in [
            ("are", "be", "AUX"),
            ("Dutch", "Dutch", "PROPN"),
            ("tight", "tight", "ADJ"),
            ("with", "with", "ADP"),
            ("money", "money", "NOUN"),
        ] {
            tree.add_node(Node::new(0, form, lemma, pos, "dep"));
        }
        for (child, parent) in [(1, 0), (2, 1), (3, 1), (4, 3), (5, 4)] {
            tree.set_parent(child, parent).unwrap();
        }

        let pattern = PatternSpec::from_parts(
            "A_ap",
            [(1, vec![2, 3]), (3, vec![4]), (4, vec![5])],
            [
                (1, vec![("lemma", "be")]),
                (2, vec![("pos", "PROPN"), ("label", "noun")]),
                (3, vec![("pos", "ADJ"), ("label", "adj")]),
                (4, vec![("pos", "ADP"), ("label", "prep")]),
                (5, vec![("pos", "NOUN"), ("label", "pobj")]),
            ],
            vec![TemplateEntry::new("noun", "adj_prep_pobj", "adj", "A_ap")],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(solutions.len(), 1);
        assert_eq!(
            emit(&solutions[0], &tree, &pattern),
            vec![Tuple::new("Dutch", "tight_with_money", "adj", "A_ap")]
        );
    }

    #[test]
    fn test_emit_lemma_falls_back_to_text() {
        let mut tree = Tree::new();
        let mut noun = Node::new(0, "men", "man", "NOUN", "ROOT");
        noun.attrs = [("text", "men"), ("pos", "NOUN")].into_iter().collect();
        tree.add_node(noun);
        tree.add_node(Node::new(0, "tall", "tall", "ADJ", "amod"));
        tree.set_parent(1, 0).unwrap();
        tree.set_parent(2, 1).unwrap();

        let pattern = PatternSpec::from_parts(
            "A",
            [(1, vec![2])],
            [
                (1, vec![("pos", "NOUN"), ("label", "noun")]),
                (2, vec![("pos", "ADJ"), ("label", "word")]),
            ],
            vec![TemplateEntry::new("noun", "word", "adj", "A")],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(
            emit(&solutions[0], &tree, &pattern),
            vec![Tuple::new("men", "tall", "adj", "A")]
        );
    }

    #[test]
    fn test_emit_multiple_template_entries() {
        let tree = tall_man();
        let pattern = PatternSpec::from_parts(
            "A",
            [(1, vec![2])],
            [
                (1, vec![("pos", "NOUN"), ("label", "noun")]),
                (2, vec![("pos", "ADJ"), ("label", "word")]),
            ],
            vec![
                TemplateEntry::new("noun", "word", "adj", "A"),
                TemplateEntry::new("word", "noun", "head", "A_rev"),
            ],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(
            emit(&solutions[0], &tree, &pattern),
            vec![
                Tuple::new("man", "tall", "adj", "A"),
                Tuple::new("tall", "man", "head", "A_rev"),
            ]
        );
    }

    #[test]
    fn test_emit_repeated_label_last_binding_wins() {
        let tree = tall_man();
        let pattern = PatternSpec::from_parts(
            "P",
            [(1, vec![2])],
            [
                (1, vec![("pos", "NOUN"), ("label", "x")]),
                (2, vec![("pos", "ADJ"), ("label", "x")]),
            ],
            vec![TemplateEntry::new("x", "x", "r", "P")],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(solutions.len(), 1);
        assert_eq!(
            emit(&solutions[0], &tree, &pattern),
            vec![Tuple::new("tall", "tall", "r", "P")]
        );
    }

    #[test]
    fn test_emit_negation_marks_every_entry() {
        let mut tree = tall_man();
        let not = tree.add_node(Node::new(0, "not", "not", "PART", "neg"));
        tree.set_parent(not, 1).unwrap();

        let pattern = PatternSpec::from_parts(
            "A_n",
            [(1, vec![2, 3])],
            [
                (1, vec![("pos", "NOUN"), ("label", "noun")]),
                (2, vec![("pos", "ADJ"), ("label", "word")]),
                (3, vec![("dep", "neg"), ("label", "neg")]),
            ],
            vec![
                TemplateEntry::new("noun", "word", "adj", "A_n"),
                TemplateEntry::new("word", "noun", "head", "A_n_rev"),
            ],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(solutions.len(), 1);
        let tuples = emit(&solutions[0], &tree, &pattern);
        assert_eq!(
            tuples,
            vec![
                Tuple::new("man", "NEG_tall", "adj", "A_n"),
                Tuple::new("tall", "NEG_man", "head", "A_n_rev"),
            ]
        );
        assert!(tuples.iter().all(Tuple::is_negated));
    }

    #[test]
    fn test_emit_fixed_feature_text() {
        let tree = tall_man();
        let pattern = PatternSpec::from_parts(
            "A_fixed",
            [(1, vec![2])],
            [
                (1, vec![("pos", "NOUN"), ("label", "noun")]),
                (2, vec![("pos", "ADJ")]),
            ],
            vec![TemplateEntry::new("noun", "has_modifier", "adj", "A_fixed")],
        )
        .unwrap();

        let solutions = solve(1, &tree, &pattern);
        assert_eq!(
            emit(&solutions[0], &tree, &pattern),
            vec![Tuple::new("man", "has_modifier", "adj", "A_fixed")]
        );
    }

    #[test]
    fn test_tuple_serializes_as_array() {
        let tuple = Tuple::new("man", "tall", "adj", "A");
        let json = serde_json::to_string(&tuple).unwrap();
        assert_eq!(json, r#"["man","tall","adj","A"]"#);
        let back: Tuple = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tuple);
        assert_eq!(tuple.to_string(), "(man, tall, adj, A)");
    }
}
