//! Pattern catalogue parser
//!
//! Parses catalogue text into plain definitions using the pest grammar in
//! `library.pest`. Nothing is validated here beyond syntax; building the
//! definitions into patterns and libraries is the job of [`crate::library`].

use pest::Parser;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;
use std::collections::VecDeque;
use thiserror::Error;

use crate::pattern::{
    LABEL_KEY, PATTERN_ROOT, PatternError, PatternNodeId, PatternSpec, TemplateEntry,
};

#[derive(Parser)]
#[grammar = "library.pest"]
struct CatalogParser;

/// Error type for parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::new(err.to_string())
    }
}

/// A pattern as written, nodes numbered breadth-first from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDef {
    pub name: String,
    pub line: usize,
    pub structure: Vec<(PatternNodeId, Vec<PatternNodeId>)>,
    pub properties: Vec<(PatternNodeId, Vec<(String, String)>)>,
    pub template: Vec<TemplateEntry>,
    pub superseded_by: Vec<String>,
}

impl PatternDef {
    /// Validate into a pattern
    pub fn build(self) -> Result<PatternSpec, PatternError> {
        let spec =
            PatternSpec::from_parts(&self.name, self.structure, self.properties, self.template)?;
        Ok(spec.with_superseded_by(self.superseded_by))
    }
}

/// A library as written: tiers of groups of pattern names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDef {
    pub name: String,
    pub line: usize,
    pub tiers: Vec<Vec<Vec<String>>>,
}

/// Everything in one catalogue text, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDef {
    pub version: Option<String>,
    pub patterns: Vec<PatternDef>,
    pub libraries: Vec<LibraryDef>,
}

/// A node before numbering
struct NodeDef {
    record: Vec<(String, String)>,
    children: Vec<NodeDef>,
}

/// Parse a catalogue
pub fn parse_catalog(input: &str) -> Result<CatalogDef, ParseError> {
    let mut pairs = CatalogParser::parse(Rule::catalog, input)?;
    let catalog_pair = next_pair(&mut pairs, "catalogue")?;

    let mut catalog = CatalogDef::default();
    for item in catalog_pair.into_inner() {
        match item.as_rule() {
            Rule::version_decl => {
                let value = next_pair(&mut item.into_inner(), "version string")?;
                catalog.version = Some(unquote(&value));
            }
            Rule::pattern_def => catalog.patterns.push(parse_pattern(item)?),
            Rule::library_def => catalog.libraries.push(parse_library(item)?),
            _ => {} // EOI
        }
    }
    Ok(catalog)
}

/// pattern NAME { node clauses* }
fn parse_pattern(pair: Pair<Rule>) -> Result<PatternDef, ParseError> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();

    let name = next_pair(&mut inner, "pattern name")?.as_str().to_string();
    let root = parse_node(next_pair(&mut inner, "pattern root node")?)?;
    let (structure, properties) = number_nodes(root);

    let mut template = Vec::new();
    let mut superseded_by = Vec::new();
    for clause in inner {
        match clause.as_rule() {
            Rule::superseded_decl => {
                superseded_by.extend(clause.into_inner().map(|p| p.as_str().to_string()));
            }
            Rule::emit_decl => {
                let args: Vec<String> = clause.into_inner().map(|p| unquote(&p)).collect();
                let id = args.get(3).map(String::as_str).unwrap_or(&name);
                match &args[..] {
                    [subject, feature, role, ..] => {
                        template.push(TemplateEntry::new(subject, feature, role, id));
                    }
                    _ => {
                        return Err(ParseError::new(format!(
                            "line {line}: pattern {name}: emit needs subject, feature and role"
                        )));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(PatternDef {
        name,
        line,
        structure,
        properties,
        template,
        superseded_by,
    })
}

/// [label:] [key="value", ...] { children }
fn parse_node(pair: Pair<Rule>) -> Result<NodeDef, ParseError> {
    let mut record = Vec::new();
    let mut children = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::ident => record.push((LABEL_KEY.to_string(), part.as_str().to_string())),
            Rule::constraint_list => {
                for constraint in part.into_inner() {
                    let mut kv = constraint.into_inner();
                    let key = next_pair(&mut kv, "constraint key")?.as_str().to_string();
                    let value = unquote(&next_pair(&mut kv, "constraint value")?);
                    record.push((key, value));
                }
            }
            Rule::node_children => {
                for child in part.into_inner() {
                    children.push(parse_node(child)?);
                }
            }
            _ => {}
        }
    }

    Ok(NodeDef { record, children })
}

/// Assign ids breadth-first and flatten into structure and constraint records
#[allow(clippy::type_complexity)]
fn number_nodes(
    root: NodeDef,
) -> (
    Vec<(PatternNodeId, Vec<PatternNodeId>)>,
    Vec<(PatternNodeId, Vec<(String, String)>)>,
) {
    let mut structure = vec![(0, vec![PATTERN_ROOT])];
    let mut properties = Vec::new();
    let mut next_id = PATTERN_ROOT + 1;

    let mut queue = VecDeque::from([(PATTERN_ROOT, root)]);
    while let Some((id, node)) = queue.pop_front() {
        properties.push((id, node.record));
        if node.children.is_empty() {
            continue;
        }
        let ids: Vec<PatternNodeId> = (next_id..next_id + node.children.len()).collect();
        next_id += node.children.len();
        queue.extend(ids.iter().copied().zip(node.children));
        structure.push((id, ids));
    }

    (structure, properties)
}

/// library NAME { tier { [a, b] ... } ... }
fn parse_library(pair: Pair<Rule>) -> Result<LibraryDef, ParseError> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let name = next_pair(&mut inner, "library name")?.as_str().to_string();

    let tiers: Vec<Vec<Vec<String>>> = inner
        .filter(|p| p.as_rule() == Rule::tier)
        .map(|tier| {
            tier.into_inner()
                .map(|group| {
                    group
                        .into_inner()
                        .map(|p| p.as_str().to_string())
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(LibraryDef { name, line, tiers })
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, ParseError> {
    pairs
        .next()
        .ok_or_else(|| ParseError::new(format!("expected {what}")))
}

fn unquote(pair: &Pair<Rule>) -> String {
    let s = pair.as_str();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}
