//! Pattern representation
//!
//! A pattern is a small tree of constraint records. Node 1 is the pattern
//! root (node 0 is the fake root, mirroring parse trees). Each node carries a
//! list of attribute constraints and optionally a label whose matched lemma is
//! substituted into the pattern's output template.

use aho_corasick::{AhoCorasick, MatchKind};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::tree::Attrs;

/// Type alias for pattern node identifiers
pub type PatternNodeId = usize;

/// The pattern root; the fake root 0 always maps to it
pub const PATTERN_ROOT: PatternNodeId = 1;

/// Constraint key that names a capture instead of constraining a token
pub const LABEL_KEY: &str = "label";

/// Label that marks a negation particle
pub const NEG_LABEL: &str = "neg";

/// Largest number of children a single pattern node may require
pub const MAX_ARITY: usize = 8;

/// What is wrong with a pattern definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternErrorKind {
    #[error("fake root must map to [1], found {0:?}")]
    FakeRoot(Vec<PatternNodeId>),

    #[error("node {0} appears in the structure but has no constraint record")]
    MissingConstraints(PatternNodeId),

    #[error("node {0} is not reachable from the pattern root")]
    Unreachable(PatternNodeId),

    #[error("node {0} is reached more than once")]
    NotATree(PatternNodeId),

    #[error("node {node} requires {arity} children, more than the limit of {MAX_ARITY}")]
    ArityTooLarge { node: PatternNodeId, arity: usize },

    #[error("node {0} has an empty label")]
    EmptyLabel(PatternNodeId),

    #[error("node {0} has more than one label")]
    DuplicateLabel(PatternNodeId),

    #[error("node {node} has an empty alternative for {key}")]
    EmptyAlternative { node: PatternNodeId, key: String },

    #[error("pattern has no output template")]
    EmptyTemplate,

    #[error("template does not mention any label")]
    UnboundTemplate,

    #[error("cannot build label substitution: {0}")]
    Substitution(String),
}

/// A pattern failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pattern {pattern}: {kind}")]
pub struct PatternError {
    pub pattern: String,
    pub kind: PatternErrorKind,
}

/// One attribute constraint: the attribute must equal one of the alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub key: String,
    pub alternatives: Vec<String>,
}

impl Constraint {
    /// Build a constraint from a `|`-separated alternation
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            alternatives: value.split('|').map(str::to_string).collect(),
        }
    }

    /// Exact string equality against any alternative; a missing attribute fails
    pub fn matches(&self, attrs: &Attrs) -> bool {
        attrs
            .get(&self.key)
            .is_some_and(|value| self.alternatives.iter().any(|alt| alt == value))
    }
}

/// A node in a pattern tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternNode {
    pub constraints: Vec<Constraint>,
    pub label: Option<String>,
}

impl PatternNode {
    /// Does a token satisfy every constraint of this node? The label never
    /// constrains, so a node without constraints matches anything.
    pub fn matches(&self, attrs: &Attrs) -> bool {
        self.constraints.iter().all(|c| c.matches(attrs))
    }

    fn from_record<K, V>(
        id: PatternNodeId,
        record: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, PatternErrorKind>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut node = PatternNode::default();
        for (key, value) in record {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key == LABEL_KEY {
                if value.is_empty() {
                    return Err(PatternErrorKind::EmptyLabel(id));
                }
                if node.label.replace(value.to_string()).is_some() {
                    return Err(PatternErrorKind::DuplicateLabel(id));
                }
            } else {
                let constraint = Constraint::new(key, value);
                if constraint.alternatives.iter().any(String::is_empty) {
                    return Err(PatternErrorKind::EmptyAlternative {
                        node: id,
                        key: key.to_string(),
                    });
                }
                node.constraints.push(constraint);
            }
        }
        Ok(node)
    }
}

/// One output tuple template: placeholders for subject and feature, plus the
/// literal role and pattern identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    pub subject: String,
    pub feature: String,
    pub role: String,
    pub id: String,
}

impl TemplateEntry {
    pub fn new(subject: &str, feature: &str, role: &str, id: &str) -> Self {
        Self {
            subject: subject.to_string(),
            feature: feature.to_string(),
            role: role.to_string(),
            id: id.to_string(),
        }
    }
}

/// A validated, named extraction rule
#[derive(Debug, Clone)]
pub struct PatternSpec {
    name: String,
    // Dense by pattern node id; ids never reached from the root stay default
    nodes: Vec<PatternNode>,
    children: Vec<Vec<PatternNodeId>>,
    template: Vec<TemplateEntry>,
    superseded_by: Vec<String>,
    labels: Vec<String>,
    substitutions: AhoCorasick,
}

impl PatternSpec {
    /// Build and validate a pattern from its structure (node -> ordered
    /// children), its constraint records (node -> key/value pairs, where a
    /// `label` key names the capture) and its output template.
    pub fn from_parts<S, C, P, R, K, V>(
        name: &str,
        structure: S,
        properties: P,
        template: Vec<TemplateEntry>,
    ) -> Result<Self, PatternError>
    where
        S: IntoIterator<Item = (PatternNodeId, C)>,
        C: IntoIterator<Item = PatternNodeId>,
        P: IntoIterator<Item = (PatternNodeId, R)>,
        R: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::build(name, structure, properties, template).map_err(|kind| PatternError {
            pattern: name.to_string(),
            kind,
        })
    }

    fn build<S, C, P, R, K, V>(
        name: &str,
        structure: S,
        properties: P,
        template: Vec<TemplateEntry>,
    ) -> Result<Self, PatternErrorKind>
    where
        S: IntoIterator<Item = (PatternNodeId, C)>,
        C: IntoIterator<Item = PatternNodeId>,
        P: IntoIterator<Item = (PatternNodeId, R)>,
        R: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut structure: FxHashMap<PatternNodeId, Vec<PatternNodeId>> = structure
            .into_iter()
            .map(|(id, children)| (id, children.into_iter().collect()))
            .collect();
        match structure.remove(&0) {
            None => {}
            Some(children) if children == [PATTERN_ROOT] => {}
            Some(children) => return Err(PatternErrorKind::FakeRoot(children)),
        }

        let mut records: FxHashMap<PatternNodeId, PatternNode> = FxHashMap::default();
        for (id, record) in properties {
            records.insert(id, PatternNode::from_record(id, record)?);
        }

        let max_id = structure
            .iter()
            .flat_map(|(id, children)| std::iter::once(*id).chain(children.iter().copied()))
            .chain(records.keys().copied())
            .chain(std::iter::once(PATTERN_ROOT))
            .max()
            .unwrap_or(PATTERN_ROOT);

        let mut nodes = vec![PatternNode::default(); max_id + 1];
        let mut children = vec![Vec::new(); max_id + 1];
        children[0] = vec![PATTERN_ROOT];

        // Walk from the root so that only reachable nodes are kept
        let mut seen: FxHashSet<PatternNodeId> = FxHashSet::default();
        let mut stack = vec![PATTERN_ROOT];
        seen.insert(PATTERN_ROOT);
        while let Some(id) = stack.pop() {
            nodes[id] = records
                .remove(&id)
                .ok_or(PatternErrorKind::MissingConstraints(id))?;
            let kids = structure.remove(&id).unwrap_or_default();
            if kids.len() > MAX_ARITY {
                return Err(PatternErrorKind::ArityTooLarge {
                    node: id,
                    arity: kids.len(),
                });
            }
            for &kid in &kids {
                if !seen.insert(kid) {
                    return Err(PatternErrorKind::NotATree(kid));
                }
                stack.push(kid);
            }
            children[id] = kids;
        }

        // Anything left over was never reached
        let leftover = records.keys().chain(structure.keys()).min().copied();
        if let Some(id) = leftover {
            return Err(PatternErrorKind::Unreachable(id));
        }

        let mut labels: Vec<String> = Vec::new();
        for node in &nodes {
            if let Some(label) = &node.label
                && !labels.contains(label)
            {
                labels.push(label.clone());
            }
        }

        if template.is_empty() {
            return Err(PatternErrorKind::EmptyTemplate);
        }
        let substitutions = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&labels)
            .map_err(|e| PatternErrorKind::Substitution(e.to_string()))?;
        // Placeholders without a label pass through as fixed text
        let bound = !labels.is_empty()
            && template.iter().any(|entry| {
                substitutions.is_match(entry.subject.as_str())
                    || substitutions.is_match(entry.feature.as_str())
            });
        if !bound {
            return Err(PatternErrorKind::UnboundTemplate);
        }

        Ok(Self {
            name: name.to_string(),
            nodes,
            children,
            template,
            superseded_by: Vec::new(),
            labels,
            substitutions,
        })
    }

    /// Declare patterns that must precede this one inside its group
    pub fn with_superseded_by(mut self, names: Vec<String>) -> Self {
        self.superseded_by = names;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &PatternNode {
        &self.nodes[PATTERN_ROOT]
    }

    /// Constraint record of a pattern node
    pub fn node(&self, id: PatternNodeId) -> &PatternNode {
        &self.nodes[id]
    }

    /// Ordered children of a pattern node
    pub fn children(&self, id: PatternNodeId) -> &[PatternNodeId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of nodes reachable from the pattern root
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().skip(1).map(Vec::len).sum::<usize>()
    }

    pub fn template(&self) -> &[TemplateEntry] {
        &self.template
    }

    pub fn superseded_by(&self) -> &[String] {
        &self.superseded_by
    }

    /// Distinct labels, in node order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Replace every label occurrence in `text` at once (leftmost-longest),
    /// `values[i]` standing in for `labels()[i]`
    pub fn substitute<S: AsRef<str>>(&self, text: &str, values: &[S]) -> String {
        self.substitutions.replace_all(text, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    fn tall_man_pattern() -> Result<PatternSpec, PatternError> {
        PatternSpec::from_parts(
            "A",
            [(0, vec![1]), (1, vec![2])],
            [
                (1, vec![("pos", "NOUN|PROPN"), ("label", "noun")]),
                (2, vec![("pos", "ADJ"), ("dep", "amod"), ("label", "word")]),
            ],
            vec![TemplateEntry::new("noun", "word", "adj", "A")],
        )
    }

    #[test]
    fn test_pattern_creation() {
        let pattern = tall_man_pattern().unwrap();

        assert_eq!(pattern.name(), "A");
        assert_eq!(pattern.children(0), &[1]);
        assert_eq!(pattern.children(1), &[2]);
        assert!(pattern.children(2).is_empty());
        assert_eq!(pattern.node_count(), 2);
        assert_eq!(pattern.labels(), &["noun".to_string(), "word".to_string()]);
        assert_eq!(pattern.root().label.as_deref(), Some("noun"));
        assert_eq!(pattern.node(2).constraints.len(), 2);
    }

    #[test]
    fn test_constraint_alternation() {
        let c = Constraint::new("pos", "NOUN|PROPN");
        assert!(c.matches(&Node::new(1, "Bob", "Bob", "PROPN", "nsubj").attrs));
        assert!(c.matches(&Node::new(1, "dog", "dog", "NOUN", "nsubj").attrs));
        assert!(!c.matches(&Node::new(1, "ran", "run", "VERB", "ROOT").attrs));
    }

    #[test]
    fn test_constraint_is_exact_not_substring() {
        let c = Constraint::new("pos", "NOUN");
        assert!(!c.matches(&Node::new(1, "Bob", "Bob", "PROPN", "nsubj").attrs));
        assert!(!c.matches(&Node::new(1, "x", "x", "NOU", "dep").attrs));
    }

    #[test]
    fn test_missing_attribute_fails() {
        let node = PatternNode::from_record(1, [("tag", "NN")]).unwrap();
        assert!(!node.matches(&Node::new(1, "dog", "dog", "NOUN", "nsubj").attrs));
    }

    #[test]
    fn test_label_is_not_a_constraint() {
        let node = PatternNode::from_record(1, [("label", "word")]).unwrap();
        assert!(node.constraints.is_empty());
        assert!(node.matches(&Attrs::new()));
    }

    #[test]
    fn test_missing_constraint_record() {
        let err = PatternSpec::from_parts(
            "broken",
            [(1, vec![2, 3])],
            [
                (1, vec![("label", "noun")]),
                (2, vec![("label", "word")]),
            ],
            vec![TemplateEntry::new("noun", "word", "adj", "broken")],
        )
        .unwrap_err();

        assert_eq!(err.pattern, "broken");
        assert_eq!(err.kind, PatternErrorKind::MissingConstraints(3));
    }

    #[test]
    fn test_unreachable_node() {
        let err = PatternSpec::from_parts(
            "p",
            [(1, vec![2])],
            [
                (1, vec![("label", "noun")]),
                (2, vec![("label", "word")]),
                (5, vec![("pos", "ADV")]),
            ],
            vec![TemplateEntry::new("noun", "word", "adj", "p")],
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::Unreachable(5));
    }

    #[test]
    fn test_shared_child_rejected() {
        let err = PatternSpec::from_parts(
            "p",
            [(1, vec![2, 3]), (2, vec![3])],
            [
                (1, vec![("label", "noun")]),
                (2, vec![("label", "word")]),
                (3, vec![("pos", "ADV")]),
            ],
            vec![TemplateEntry::new("noun", "word", "adj", "p")],
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::NotATree(3));
    }

    #[test]
    fn test_bad_fake_root() {
        let err = PatternSpec::from_parts(
            "p",
            [(0, vec![2]), (2, vec![1])],
            [(1, vec![("label", "noun")]), (2, vec![("label", "word")])],
            vec![TemplateEntry::new("noun", "word", "adj", "p")],
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::FakeRoot(vec![2]));
    }

    #[test]
    fn test_arity_limit() {
        let kids: Vec<PatternNodeId> = (2..=MAX_ARITY + 2).collect();
        let mut props = vec![(1, vec![("label", "noun")])];
        props.extend(kids.iter().map(|&k| (k, vec![("pos", "ADJ")])));

        let err = PatternSpec::from_parts(
            "wide",
            [(1, kids.clone())],
            props,
            vec![TemplateEntry::new("noun", "noun", "adj", "wide")],
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            PatternErrorKind::ArityTooLarge {
                node: 1,
                arity: MAX_ARITY + 1
            }
        );
    }

    #[test]
    fn test_unbound_template() {
        let err = PatternSpec::from_parts(
            "p",
            [(1, vec![2])],
            [(1, vec![("label", "noun")]), (2, vec![("pos", "ADJ")])],
            vec![TemplateEntry::new("man", "word", "adj", "p")],
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::UnboundTemplate);

        let err = PatternSpec::from_parts(
            "p",
            [(1, vec![2])],
            [(1, vec![("pos", "NOUN")]), (2, vec![("pos", "ADJ")])],
            vec![TemplateEntry::new("noun", "word", "adj", "p")],
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::UnboundTemplate);
    }

    #[test]
    fn test_fixed_placeholder_passes_through() {
        let pattern = PatternSpec::from_parts(
            "p",
            [(1, vec![2])],
            [(1, vec![("label", "noun")]), (2, vec![("pos", "ADJ")])],
            vec![TemplateEntry::new("noun", "is_tall", "adj", "p")],
        )
        .unwrap();
        assert_eq!(pattern.substitute("is_tall", &["man"]), "is_tall");
        assert_eq!(pattern.substitute("noun", &["man"]), "man");
    }

    #[test]
    fn test_label_errors() {
        let err = PatternSpec::from_parts(
            "p",
            Vec::<(PatternNodeId, Vec<PatternNodeId>)>::new(),
            [(1, vec![("label", "noun"), ("label", "word")])],
            vec![TemplateEntry::new("noun", "word", "adj", "p")],
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::DuplicateLabel(1));

        let err = PatternSpec::from_parts(
            "p",
            Vec::<(PatternNodeId, Vec<PatternNodeId>)>::new(),
            [(1, vec![("label", "")])],
            vec![TemplateEntry::new("noun", "word", "adj", "p")],
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::EmptyLabel(1));
    }

    #[test]
    fn test_empty_template() {
        let err = PatternSpec::from_parts(
            "p",
            [(0, vec![1])],
            [(1, vec![("label", "noun")])],
            Vec::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::EmptyTemplate);
    }

    #[test]
    fn test_substitute_longest_match() {
        let pattern = PatternSpec::from_parts(
            "p",
            [(1, vec![2])],
            [
                (1, vec![("label", "noun")]),
                (2, vec![("label", "noun_p")]),
            ],
            vec![TemplateEntry::new("noun", "noun_p", "patient", "p")],
        )
        .unwrap();

        // "noun_p" must not be rewritten as "<noun>_p"
        let values = ["Bob", "Alice"];
        assert_eq!(pattern.substitute("noun_p", &values), "Alice");
        assert_eq!(pattern.substitute("noun", &values), "Bob");
        assert_eq!(pattern.substitute("noun-noun_p", &values), "Bob-Alice");
    }
}
