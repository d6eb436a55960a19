//! Corpora and documents
//!
//! Provides collection interfaces for:
//! - Iterating over trees from a string, file, or glob pattern
//! - Splitting a corpus into documents, the unit of parallel mining

use crate::conllu::{CoNLLUReader, ConlluError};
use crate::tree::Tree;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trees of one document, in file order
pub type Trees<'a> = Box<dyn Iterator<Item = Result<Tree, ConlluError>> + Send + 'a>;

/// Source of trees for a document
#[derive(Debug, Clone)]
enum DocumentSource {
    /// In-memory CoNLL-U text
    Text(Arc<str>),
    /// CoNLL-U file, possibly gzipped
    File(PathBuf),
}

/// One CoNLL-U document, mined and written out as a unit
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    source: DocumentSource,
}

impl Document {
    pub fn from_string(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            source: DocumentSource::Text(Arc::from(text)),
        }
    }

    /// A file; the document is named after the file without its
    /// `.conllu` / `.gz` suffixes
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            name: document_name(path),
            source: DocumentSource::File(path.to_path_buf()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            DocumentSource::File(path) => Some(path),
            DocumentSource::Text(_) => None,
        }
    }

    /// Open the document and iterate over its sentences
    pub fn trees(&self) -> std::io::Result<Trees<'_>> {
        match &self.source {
            DocumentSource::Text(text) => Ok(Box::new(CoNLLUReader::from_string(text))),
            DocumentSource::File(path) => Ok(Box::new(CoNLLUReader::from_file(path)?)),
        }
    }
}

/// `dir/book.conllu.gz` -> `book`
fn document_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    base.strip_suffix(".conllu")
        .or_else(|| base.strip_suffix(".conll"))
        .unwrap_or(base)
        .to_string()
}

/// Source of trees for a corpus
#[derive(Debug, Clone)]
enum CorpusSource {
    /// In-memory CoNLL-U text
    String(String),
    /// Multiple file paths (from glob or explicit paths)
    Files(Vec<PathBuf>),
}

/// Collection of trees from a string, file, or glob pattern
///
/// Iterating a corpus yields every readable tree; unreadable files and
/// malformed sentences are logged and skipped. Use [`Corpus::documents`]
/// when errors must be reported per document.
///
/// # Examples
///
/// ```no_run
/// use treetuples::Corpus;
/// use pariter::IteratorExt as _;
///
/// // Sequential iteration
/// for tree in Corpus::from_file("data.conllu") {
///     println!("Tree with {} words", tree.len());
/// }
///
/// // One worker per document
/// let sizes: Vec<usize> = Corpus::from_glob("data/*.conllu")
///     .unwrap()
///     .documents()
///     .into_iter()
///     .parallel_map(|doc| doc.trees().map(|t| t.count()).unwrap_or(0))
///     .collect();
/// ```
#[derive(Debug, Clone)]
pub struct Corpus {
    source: CorpusSource,
}

impl Corpus {
    /// Create from an in-memory CoNLL-U string
    pub fn from_string(text: &str) -> Self {
        Self {
            source: CorpusSource::String(text.to_string()),
        }
    }

    /// Create from a single file path
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self::from_paths(vec![path.as_ref().to_path_buf()])
    }

    /// Create from a glob pattern
    ///
    /// Files are processed in sorted order for deterministic results.
    pub fn from_glob(pattern: &str) -> Result<Self, glob::PatternError> {
        let mut file_paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(Result::ok).collect();
        file_paths.sort();
        Ok(Self::from_paths(file_paths))
    }

    /// Create from explicit file paths
    pub fn from_paths(file_paths: Vec<PathBuf>) -> Self {
        Self {
            source: CorpusSource::Files(file_paths),
        }
    }

    /// The corpus as documents: one per file, or a single document named
    /// `string` for in-memory text
    pub fn documents(&self) -> Vec<Document> {
        match &self.source {
            CorpusSource::String(text) => vec![Document::from_string("string", text)],
            CorpusSource::Files(paths) => paths.iter().map(Document::from_file).collect(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = Arc<Tree>>> {
        self.clone().into_iter()
    }
}

impl IntoIterator for Corpus {
    type Item = Arc<Tree>;
    type IntoIter = Box<dyn Iterator<Item = Self::Item>>;

    fn into_iter(self) -> Self::IntoIter {
        let documents = self.documents();
        Box::new(documents.into_iter().flat_map(document_trees))
    }
}

/// Helper: every readable tree of a document
///
/// Logs open and parse errors and skips them.
fn document_trees(document: Document) -> Vec<Arc<Tree>> {
    let trees = match document.trees() {
        Ok(trees) => trees,
        Err(e) => {
            tracing::warn!(document = document.name(), error = %e, "cannot open document");
            return Vec::new();
        }
    };
    trees
        .filter_map(|result| match result {
            Ok(tree) => Some(Arc::new(tree)),
            Err(e) => {
                tracing::warn!(document = document.name(), error = %e, "skipping sentence");
                None
            }
        })
        .collect()
}
