//! Tree data structures for pattern matching
//!
//! A sentence is an arena of nodes indexed by position. Node 0 is a synthetic
//! fake root whose single child is the real syntactic root, so real tokens keep
//! the 1-based indices used by the HEAD column of CoNLL-U.

use rustc_hash::FxHashMap;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Unique identifier for a node
pub type NodeId = usize;

/// Index of the synthetic fake root
pub const FAKE_ROOT: NodeId = 0;

/// Structural problems detected in a parse tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree has no fake root")]
    Empty,

    #[error("fake root must have exactly one child, found {0}")]
    RootArity(usize),

    #[error("node {0} does not exist")]
    NoSuchNode(NodeId),

    #[error("node {0} cannot be its own parent")]
    SelfLoop(NodeId),

    #[error("node {child} already has parent {parent}")]
    SecondParent { child: NodeId, parent: NodeId },

    #[error("node {0} is reached more than once from the fake root")]
    Revisited(NodeId),

    #[error("node {0} is not reachable from the fake root")]
    Unreachable(NodeId),
}

/// String-valued linguistic attributes of a token (text, lemma, pos, dep, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrs(FxHashMap<String, String>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A node in a dependency tree
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub attrs: Attrs,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    /// Create a new node with the usual token attributes
    pub fn new(id: NodeId, text: &str, lemma: &str, pos: &str, dep: &str) -> Self {
        let attrs = [("text", text), ("lemma", lemma), ("pos", pos), ("dep", dep)]
            .into_iter()
            .collect();
        Self::with_attrs(id, attrs)
    }

    /// Create a node from an arbitrary attribute record
    pub fn with_attrs(id: NodeId, attrs: Attrs) -> Self {
        Self {
            id,
            attrs,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)
    }

    pub fn lemma(&self) -> Option<&str> {
        self.attrs.get("lemma")
    }

    pub fn text(&self) -> Option<&str> {
        self.attrs.get("text")
    }
}

/// A dependency tree (sentence)
#[derive(Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub sentence_text: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl Tree {
    /// Create a tree holding only the fake root
    pub fn new() -> Self {
        Self::with_metadata(None, HashMap::new())
    }

    /// Create a tree with sentence text and metadata
    pub fn with_metadata(sentence_text: Option<String>, metadata: HashMap<String, String>) -> Self {
        Self {
            nodes: vec![Node::with_attrs(FAKE_ROOT, Attrs::new())],
            sentence_text,
            metadata,
        }
    }

    /// Build a tree from a head -> children mapping and a node -> attributes
    /// mapping. Children keep the order in which they are listed. Indices that
    /// only appear in the structure get an empty attribute record.
    pub fn from_structure<S, C, P>(structure: S, properties: P) -> Result<Self, TreeError>
    where
        S: IntoIterator<Item = (NodeId, C)>,
        C: IntoIterator<Item = NodeId>,
        P: IntoIterator<Item = (NodeId, Attrs)>,
    {
        let structure: Vec<(NodeId, Vec<NodeId>)> = structure
            .into_iter()
            .map(|(head, children)| (head, children.into_iter().collect()))
            .collect();
        let properties: Vec<(NodeId, Attrs)> = properties.into_iter().collect();

        let max_id = structure
            .iter()
            .flat_map(|(head, children)| std::iter::once(*head).chain(children.iter().copied()))
            .chain(properties.iter().map(|(id, _)| *id))
            .max()
            .unwrap_or(FAKE_ROOT);

        let mut tree = Tree::new();
        for id in 1..=max_id {
            tree.nodes.push(Node::with_attrs(id, Attrs::new()));
        }
        for (id, attrs) in properties {
            tree.nodes[id].attrs = attrs;
        }

        // Attach in head order so sibling order is independent of map iteration
        let mut structure = structure;
        structure.sort_by_key(|(head, _)| *head);
        for (head, children) in structure {
            for child in children {
                tree.set_parent(child, head)?;
            }
        }

        Ok(tree)
    }

    /// Add a node to the tree; its id becomes its arena position
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.nodes.len();
        node.id = id;
        self.nodes.push(node);
        id
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a mutable reference to a node by ID
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Attach `child_id` as the last child of `parent_id`
    pub fn set_parent(&mut self, child_id: NodeId, parent_id: NodeId) -> Result<(), TreeError> {
        if child_id == parent_id {
            return Err(TreeError::SelfLoop(child_id));
        }
        if parent_id >= self.nodes.len() {
            return Err(TreeError::NoSuchNode(parent_id));
        }
        let child = self
            .nodes
            .get_mut(child_id)
            .ok_or(TreeError::NoSuchNode(child_id))?;
        if let Some(parent) = child.parent {
            return Err(TreeError::SecondParent {
                child: child_id,
                parent,
            });
        }
        child.parent = Some(parent_id);
        self.nodes[parent_id].children.push(child_id);
        Ok(())
    }

    /// Children of a node, in stored order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Get the parent of a node
    pub fn parent(&self, id: NodeId) -> Option<&Node> {
        self.get_node(id)
            .and_then(|node| node.parent)
            .and_then(|parent_id| self.get_node(parent_id))
    }

    /// The real syntactic root (the fake root's first child)
    pub fn root(&self) -> Option<NodeId> {
        self.children(FAKE_ROOT).first().copied()
    }

    /// Number of real tokens
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sentence text, falling back to the space-joined token forms
    pub fn text(&self) -> String {
        match &self.sentence_text {
            Some(text) => text.clone(),
            None => self
                .nodes
                .iter()
                .skip(1)
                .filter_map(Node::text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Check that the tree is a single tree hanging off the fake root: the
    /// fake root has exactly one child and every node is reached exactly once.
    pub fn validate(&self) -> Result<(), TreeError> {
        let Some(fake_root) = self.nodes.first() else {
            return Err(TreeError::Empty);
        };
        if fake_root.children.len() != 1 {
            return Err(TreeError::RootArity(fake_root.children.len()));
        }

        let mut seen = vec![false; self.nodes.len()];
        seen[FAKE_ROOT] = true;
        let mut stack = vec![FAKE_ROOT];
        while let Some(id) = stack.pop() {
            for &child in &self.nodes[id].children {
                let Some(flag) = seen.get_mut(child) else {
                    return Err(TreeError::NoSuchNode(child));
                };
                if *flag {
                    return Err(TreeError::Revisited(child));
                }
                *flag = true;
                stack.push(child);
            }
        }

        match seen.iter().position(|reached| !reached) {
            Some(id) => Err(TreeError::Unreachable(id)),
            None => Ok(()),
        }
    }

    /// Real node ids from the top of the tree down, never including the fake
    /// root. Ancestors always come before their descendants; siblings keep
    /// their stored order (level order).
    ///
    /// Assumes a tree that passes [`Tree::validate`].
    pub fn ordered_ids(&self) -> Vec<NodeId> {
        let mut ordered = Vec::with_capacity(self.len());
        let mut queue = VecDeque::from([FAKE_ROOT]);

        while let Some(id) = queue.pop_back() {
            if id != FAKE_ROOT {
                ordered.push(id);
            }
            for &child in self.children(id) {
                queue.push_front(child);
            }
        }

        ordered
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
