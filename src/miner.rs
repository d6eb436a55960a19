//! Corpus mining
//!
//! Runs one or more pattern libraries over every sentence of a document and
//! writes the deduplicated tuples as one JSON file per document.

use pariter::IteratorExt as _;
use rustc_hash::FxHashSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::conllu::ConlluError;
use crate::emit::Tuple;
use crate::iterators::Document;
use crate::library::{Catalog, LibraryError, PatternLibrary};
use crate::resolver::extract;
use crate::tree::{Tree, TreeError};

/// Sentence text with the tuples one library found in it
pub type SentenceTuples = (String, Vec<Tuple>);

#[derive(Debug, Error)]
pub enum MineError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Conllu(#[from] ConlluError),

    #[error("sentence {sentence}: {source}")]
    Tree {
        sentence: usize,
        #[source]
        source: TreeError,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Drop repeated tuples, keeping the first occurrence of each
pub fn dedup_tuples(tuples: Vec<Tuple>) -> Vec<Tuple> {
    let mut seen = FxHashSet::default();
    tuples
        .into_iter()
        .filter(|tuple| seen.insert(tuple.clone()))
        .collect()
}

/// What happened to one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written { sentences: usize, tuples: usize },
    Skipped,
}

/// Totals over a corpus run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub tuples: usize,
}

/// Applies a fixed list of libraries to sentences and documents
#[derive(Debug, Clone)]
pub struct Miner {
    libraries: Vec<PatternLibrary>,
}

impl Miner {
    /// Select libraries from a catalogue by name, in the given order
    pub fn new<S: AsRef<str>>(catalog: &Catalog, names: &[S]) -> Result<Self, LibraryError> {
        let libraries = names
            .iter()
            .map(|name| catalog.require(name.as_ref()).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { libraries })
    }

    pub fn libraries(&self) -> &[PatternLibrary] {
        &self.libraries
    }

    /// Tuples of every library for one sentence, each list deduplicated
    pub fn mine_tree<'m>(&'m self, tree: &Tree) -> Result<Vec<(&'m str, Vec<Tuple>)>, TreeError> {
        self.libraries
            .iter()
            .map(|library| Ok((library.name(), dedup_tuples(extract(tree, library)?))))
            .collect()
    }

    /// Mine every sentence of a document
    ///
    /// Entries are library-major: all sentences for the first library, then
    /// all for the next. Sentences where a library found nothing are left
    /// out. The first malformed sentence aborts the document.
    pub fn mine_document(&self, document: &Document) -> Result<Vec<SentenceTuples>, MineError> {
        let path = document.path().map(Path::to_path_buf).unwrap_or_default();
        let trees = document
            .trees()
            .map_err(|source| MineError::Io { path, source })?;

        let mut per_library: Vec<Vec<SentenceTuples>> = vec![Vec::new(); self.libraries.len()];
        for (sentence, tree) in trees.enumerate() {
            let tree = tree?;
            let results = self
                .mine_tree(&tree)
                .map_err(|source| MineError::Tree {
                    sentence: sentence + 1,
                    source,
                })?;
            let text = tree.text();
            for (slot, (_, tuples)) in per_library.iter_mut().zip(results) {
                if !tuples.is_empty() {
                    slot.push((text.clone(), tuples));
                }
            }
        }

        Ok(per_library.into_iter().flatten().collect())
    }

    /// Mine a document and write `<output_dir>/<name>.json`
    pub fn write_document(
        &self,
        document: &Document,
        output_dir: &Path,
        skip_existing: bool,
    ) -> Result<Outcome, MineError> {
        let out_path = output_path(output_dir, document);
        if skip_existing && out_path.exists() {
            tracing::debug!(document = document.name(), "output exists, skipping");
            return Ok(Outcome::Skipped);
        }

        let entries = self.mine_document(document)?;
        write_json(&out_path, &entries)?;

        let tuples = entries.iter().map(|(_, t)| t.len()).sum();
        tracing::info!(
            document = document.name(),
            sentences = entries.len(),
            tuples,
            "wrote tuples"
        );
        Ok(Outcome::Written {
            sentences: entries.len(),
            tuples,
        })
    }

    /// Mine documents on `threads` workers, one document per job
    ///
    /// Failures are logged and counted; the remaining documents still run.
    pub fn run(
        self: Arc<Self>,
        documents: Vec<Document>,
        output_dir: &Path,
        skip_existing: bool,
        threads: Option<usize>,
    ) -> Result<RunSummary, MineError> {
        fs::create_dir_all(output_dir).map_err(|source| MineError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let threads = threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        });
        tracing::info!(documents = documents.len(), threads, "mining corpus");

        let output_dir = output_dir.to_path_buf();
        let results = documents.into_iter().parallel_map_custom(
            |o| o.threads(threads),
            move |document| {
                let result = self.write_document(&document, &output_dir, skip_existing);
                (document, result)
            },
        );

        let mut summary = RunSummary::default();
        for (document, result) in results {
            match result {
                Ok(Outcome::Written { tuples, .. }) => {
                    summary.written += 1;
                    summary.tuples += tuples;
                }
                Ok(Outcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    tracing::error!(document = document.name(), error = %e, "document failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}

pub fn output_path(output_dir: &Path, document: &Document) -> PathBuf {
    output_dir.join(format!("{}.json", document.name()))
}

/// Write through a temporary file so an interrupted run never leaves a
/// partial output behind for `skip_existing` to trust
fn write_json(path: &Path, entries: &[SentenceTuples]) -> Result<(), MineError> {
    let io_err = |source| MineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let tmp_path = path.with_extension("json.tmp");

    let file = fs::File::create(&tmp_path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, entries).map_err(|source| MineError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)
}

/// Read back a document written by [`Miner::write_document`]
pub fn read_output(path: &Path) -> Result<Vec<SentenceTuples>, MineError> {
    let file = fs::File::open(path).map_err(|source| MineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| MineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SENTENCES: &str = "# text = The tall man smiled.
1\tThe\tthe\tDET\tDT\t_\t3\tdet\t_\t_
2\ttall\ttall\tADJ\tJJ\t_\t3\tamod\t_\t_
3\tman\tman\tNOUN\tNN\t_\t4\tnsubj\t_\t_
4\tsmiled\tsmile\tVERB\tVBD\t_\t0\tROOT\t_\t_

# text = Bob clapped Alice.
1\tBob\tBob\tPROPN\tNNP\t_\t2\tnsubj\t_\t_
2\tclapped\tclap\tVERB\tVBD\t_\t0\tROOT\t_\t_
3\tAlice\tAlice\tPROPN\tNNP\t_\t2\tdobj\t_\t_

";

    fn miner() -> Miner {
        let catalog = Catalog::english().unwrap();
        Miner::new(&catalog, &["adj", "verb"]).unwrap()
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let a = Tuple::new("man", "tall", "adj", "A");
        let b = Tuple::new("man", "old", "adj", "A");
        let deduped = dedup_tuples(vec![a.clone(), b.clone(), a.clone(), b.clone()]);
        assert_eq!(deduped, vec![a, b]);
    }

    #[test]
    fn test_unknown_library() {
        let catalog = Catalog::english().unwrap();
        let err = Miner::new(&catalog, &["nouns"]).unwrap_err();
        assert!(matches!(err, LibraryError::NoSuchLibrary(name) if name == "nouns"));
    }

    #[test]
    fn test_mine_document_is_library_major() {
        let document = Document::from_string("doc", SENTENCES);
        let entries = miner().mine_document(&document).unwrap();

        let texts: Vec<&str> = entries.iter().map(|(text, _)| text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["The tall man smiled.", "The tall man smiled.", "Bob clapped Alice."]
        );
        assert!(entries[0].1.iter().all(|t| t.role == "adj"));
        assert!(entries[0].1.contains(&Tuple::new("man", "tall", "adj", "A")));
        assert!(entries[1].1.iter().all(|t| t.role != "adj"));
        assert!(
            entries[2]
                .1
                .contains(&Tuple::new("Bob", "clap", "agent", "V_act_av1"))
        );
    }

    #[test]
    fn test_malformed_sentence_aborts_document() {
        let text = format!("{SENTENCES}1\tbroken\n\n");
        let document = Document::from_string("doc", &text);
        let err = miner().mine_document(&document).unwrap_err();
        assert!(matches!(err, MineError::Conllu(_)));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let document = Document::from_string("book", SENTENCES);
        let miner = miner();

        let outcome = miner.write_document(&document, dir.path(), false).unwrap();
        let Outcome::Written { sentences, .. } = outcome else {
            panic!("expected a written document");
        };
        assert_eq!(sentences, 3);

        let path = dir.path().join("book.json");
        let back = read_output(&path).unwrap();
        assert_eq!(back, miner.mine_document(&document).unwrap());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[[\"The tall man smiled.\",[[\"man\",\"tall\",\"adj\",\"A\"]"));
        assert!(!dir.path().join("book.json.tmp").exists());
    }

    #[test]
    fn test_skip_existing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("book.json"), "[]").unwrap();
        let document = Document::from_string("book", SENTENCES);

        let outcome = miner().write_document(&document, dir.path(), true).unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(fs::read_to_string(dir.path().join("book.json")).unwrap(), "[]");
    }

    #[test]
    fn test_run_counts_failures() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let good = input.path().join("good.conllu");
        fs::write(&good, SENTENCES).unwrap();
        let missing = input.path().join("missing.conllu");

        let documents = vec![Document::from_file(&good), Document::from_file(&missing)];
        let summary = Arc::new(miner())
            .run(documents, output.path(), false, Some(2))
            .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert!(output.path().join("good.json").exists());
    }
}
