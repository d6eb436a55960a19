//! CoNLL-U file parsing
//!
//! Reads CoNLL-U sentences into [`Tree`]s. Token `i` becomes node `i`, so the
//! HEAD column indexes nodes directly and HEAD 0 is the fake root. Multiword
//! token ranges and empty nodes are skipped. Files ending in `.gz` are
//! decompressed on the fly.
//!
//! Node attributes: `index`, `text`, `lemma`, `pos` (UPOS), `tag` (XPOS),
//! `dep`, `depindex` and one `feats.<Name>` entry per morphological feature.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use atoi::FromRadix10Checked;
use bstr::ByteSlice;
use bstr::io::{BufReadExt, ByteLines};
use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::tree::{Attrs, Node, NodeId, Tree};

const FIELD_COUNT: usize = 10;

/// Error during CoNLL-U reading
#[derive(Debug, Error)]
pub enum ConlluError {
    #[error("parse error at line {line_num}: {message}")]
    Parse { line_num: usize, message: String },

    #[error("read error at line {line_num}: {source}")]
    Io {
        line_num: usize,
        #[source]
        source: io::Error,
    },
}

impl ConlluError {
    fn parse(line_num: usize, message: impl Into<String>) -> Self {
        ConlluError::Parse {
            line_num,
            message: message.into(),
        }
    }
}

/// CoNLL-U reader that iterates over sentences
pub struct CoNLLUReader<R: BufRead> {
    lines: ByteLines<R>,
    line_num: usize,
}

impl<R: BufRead> CoNLLUReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.byte_lines(),
            line_num: 0,
        }
    }
}

impl CoNLLUReader<Box<dyn BufRead + Send>> {
    /// Open a file, decompressing it if the name ends in `.gz`
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead + Send> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader))
    }
}

impl<'a> CoNLLUReader<&'a [u8]> {
    /// Read from in-memory text
    pub fn from_string(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<R: BufRead> Iterator for CoNLLUReader<R> {
    type Item = Result<Tree, ConlluError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut tokens: Vec<(usize, Vec<u8>)> = Vec::new();
        let mut metadata = HashMap::new();
        let mut sentence_text = None;

        // Read lines until a blank line (sentence boundary) or EOF
        loop {
            let line = match self.lines.next() {
                None => break,
                Some(Err(source)) => {
                    return Some(Err(ConlluError::Io {
                        line_num: self.line_num + 1,
                        source,
                    }));
                }
                Some(Ok(line)) => line,
            };
            self.line_num += 1;

            let line = line.trim();
            if line.is_empty() {
                if tokens.is_empty() {
                    continue;
                }
                break;
            }

            if let Some(comment) = line.strip_prefix(b"#") {
                parse_comment(comment, &mut metadata, &mut sentence_text);
                continue;
            }

            tokens.push((self.line_num, line.to_vec()));
        }

        if tokens.is_empty() {
            return None;
        }
        Some(parse_tree(&tokens, sentence_text, metadata))
    }
}

/// Parse a comment line (without the leading #); `key = value` is kept
fn parse_comment(
    comment: &[u8],
    metadata: &mut HashMap<String, String>,
    sentence_text: &mut Option<String>,
) {
    let Some(eq_pos) = memchr::memchr(b'=', comment) else {
        return;
    };
    let key = comment[..eq_pos].trim().to_str_lossy();
    let value = comment[eq_pos + 1..].trim().to_str_lossy().into_owned();

    if key == "text" {
        *sentence_text = Some(value);
    } else {
        metadata.insert(key.into_owned(), value);
    }
}

/// Build a tree from the token lines of one sentence
fn parse_tree(
    tokens: &[(usize, Vec<u8>)],
    sentence_text: Option<String>,
    metadata: HashMap<String, String>,
) -> Result<Tree, ConlluError> {
    let mut tree = Tree::with_metadata(sentence_text, metadata);
    let mut heads: Vec<(usize, NodeId, NodeId)> = Vec::with_capacity(tokens.len());

    for (line_num, line) in tokens {
        let Some((index, attrs, head)) = parse_line(line, *line_num)? else {
            continue;
        };
        let expected = tree.nodes.len();
        if index != expected {
            return Err(ConlluError::parse(
                *line_num,
                format!("expected token {expected}, found {index}"),
            ));
        }
        let id = tree.add_node(Node::with_attrs(index, attrs));
        heads.push((*line_num, id, head));
    }

    for (line_num, id, head) in heads {
        tree.set_parent(id, head)
            .map_err(|e| ConlluError::parse(line_num, e.to_string()))?;
    }

    Ok(tree)
}

/// Parse one token line into its index, attributes and head. Returns `None`
/// for multiword token ranges and empty nodes.
fn parse_line(
    line: &[u8],
    line_num: usize,
) -> Result<Option<(NodeId, Attrs, NodeId)>, ConlluError> {
    let fields = split_fields(line);
    if fields.len() != FIELD_COUNT {
        return Err(ConlluError::parse(
            line_num,
            format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
        ));
    }

    // Field 0: ID (ranges like 1-2 and empty nodes like 2.1 are skipped)
    let id = fields[0];
    if memchr::memchr2(b'-', b'.', id).is_some() {
        return Ok(None);
    }
    let Some(index) = parse_index(id) else {
        return Err(ConlluError::parse(
            line_num,
            format!("invalid ID {:?}", id.as_bstr()),
        ));
    };

    // Field 6: HEAD
    let Some(head) = parse_index(fields[6]) else {
        return Err(ConlluError::parse(
            line_num,
            format!("invalid HEAD {:?}", fields[6].as_bstr()),
        ));
    };

    let text = fields[1].to_str_lossy();
    let lemma = if fields[2] == b"_" {
        text.clone()
    } else {
        fields[2].to_str_lossy()
    };

    let mut attrs = Attrs::new();
    attrs.insert("index", index.to_string());
    attrs.insert("text", text);
    attrs.insert("lemma", lemma);
    attrs.insert("pos", fields[3].to_str_lossy());
    if fields[4] != b"_" {
        attrs.insert("tag", fields[4].to_str_lossy());
    }
    attrs.insert("dep", fields[7].to_str_lossy());
    attrs.insert("depindex", head.to_string());
    parse_features(fields[5], &mut attrs);

    Ok(Some((index, attrs, head)))
}

fn split_fields(line: &[u8]) -> Vec<&[u8]> {
    let mut fields = Vec::with_capacity(FIELD_COUNT);
    let mut start = 0;
    for pos in memchr::memchr_iter(b'\t', line) {
        fields.push(&line[start..pos]);
        start = pos + 1;
    }
    fields.push(&line[start..]);
    fields
}

/// A whole field as a non-negative integer
fn parse_index(bytes: &[u8]) -> Option<usize> {
    let (value, used) = usize::from_radix_10_checked(bytes);
    if used == 0 || used != bytes.len() {
        return None;
    }
    value
}

/// FEATS (Name=Value|Name=Value) as `feats.Name` attributes
fn parse_features(field: &[u8], attrs: &mut Attrs) {
    if field == b"_" {
        return;
    }
    for pair in field.split_str("|") {
        if let Some(eq_pos) = memchr::memchr(b'=', pair) {
            let name = pair[..eq_pos].to_str_lossy();
            attrs.insert(
                format!("feats.{name}"),
                pair[eq_pos + 1..].to_str_lossy(),
            );
        }
    }
}
