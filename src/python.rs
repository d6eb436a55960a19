//! Python bindings for treetuples
//!
//! Exposes the catalogue and extraction so parses produced on the Python
//! side (for example with spaCy) can be mined without writing CoNLL-U.

use pyo3::exceptions::{PyIOError, PyKeyError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::conllu::{CoNLLUReader, ConlluError};
use crate::emit::Tuple;
use crate::iterators::Corpus;
use crate::library::{Catalog as RustCatalog, LibraryError};
use crate::miner::{MineError, Miner, dedup_tuples};
use crate::resolver::extract;
use crate::tree::{Attrs, Tree as RustTree, TreeError};

type PyTuple4 = (String, String, String, String);

impl From<LibraryError> for PyErr {
    fn from(err: LibraryError) -> PyErr {
        match err {
            LibraryError::Io { .. } => PyIOError::new_err(err.to_string()),
            LibraryError::NoSuchLibrary(name) => {
                PyKeyError::new_err(format!("no library named {name}"))
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

impl From<TreeError> for PyErr {
    fn from(err: TreeError) -> PyErr {
        PyValueError::new_err(format!("Invalid tree: {err}"))
    }
}

impl From<ConlluError> for PyErr {
    fn from(err: ConlluError) -> PyErr {
        match err {
            ConlluError::Io { .. } => PyIOError::new_err(err.to_string()),
            ConlluError::Parse { .. } => PyValueError::new_err(err.to_string()),
        }
    }
}

impl From<MineError> for PyErr {
    fn from(err: MineError) -> PyErr {
        match err {
            MineError::Library(e) => e.into(),
            MineError::Conllu(e) => e.into(),
            MineError::Io { .. } => PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// Node records as passed from Python: `{index: {key: value}}`
type PyProperties<'py> = HashMap<usize, HashMap<String, Bound<'py, PyAny>>>;

/// Render every value with `str()`, so integer fields such as `index` and
/// `depindex` are accepted alongside strings
fn attrs_from_py(properties: PyProperties<'_>) -> PyResult<Vec<(usize, Attrs)>> {
    properties
        .into_iter()
        .map(|(id, record)| -> PyResult<(usize, Attrs)> {
            let attrs = record
                .into_iter()
                .map(|(key, value)| -> PyResult<(String, String)> {
                    Ok((key, value.str()?.to_string()))
                })
                .collect::<PyResult<Attrs>>()?;
            Ok((id, attrs))
        })
        .collect()
}

fn to_py(tuples: Vec<Tuple>) -> Vec<PyTuple4> {
    tuples.into_iter().map(Into::into).collect()
}

/// A parsed sentence
#[pyclass(name = "Tree")]
#[derive(Clone)]
pub struct PyTree {
    pub(crate) inner: Arc<RustTree>,
}

#[pymethods]
impl PyTree {
    /// Build from `{head: [children]}` and `{index: {key: value}}`
    #[classmethod]
    fn from_parse<'py>(
        _cls: &Bound<'py, pyo3::types::PyType>,
        structure: HashMap<usize, Vec<usize>>,
        properties: PyProperties<'py>,
    ) -> PyResult<Self> {
        let tree = RustTree::from_structure(structure, attrs_from_py(properties)?)?;
        tree.validate()?;
        Ok(PyTree {
            inner: Arc::new(tree),
        })
    }

    #[getter]
    fn text(&self) -> String {
        self.inner.text()
    }

    #[getter]
    fn metadata(&self) -> HashMap<String, String> {
        self.inner.metadata.clone()
    }

    /// Attributes of one node
    fn attrs(&self, id: usize) -> PyResult<HashMap<String, String>> {
        self.inner
            .get_node(id)
            .map(|node| {
                node.attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .ok_or_else(|| PyKeyError::new_err(format!("no node {id}")))
    }

    fn children(&self, id: usize) -> Vec<usize> {
        self.inner.children(id).to_vec()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!("<Tree len={} text='{}'>", self.inner.len(), self.inner.text())
    }
}

/// Read every sentence of a CoNLL-U string
#[pyfunction]
fn read_conllu(text: &str) -> PyResult<Vec<PyTree>> {
    CoNLLUReader::from_string(text)
        .map(|tree| {
            Ok(PyTree {
                inner: Arc::new(tree?),
            })
        })
        .collect()
}

/// Read every readable sentence of the CoNLL-U files matching a glob;
/// unreadable files and malformed sentences are skipped
#[pyfunction]
fn read_corpus(pattern: &str) -> PyResult<Vec<PyTree>> {
    let corpus = Corpus::from_glob(pattern).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(corpus.into_iter().map(|inner| PyTree { inner }).collect())
}

/// Pattern catalogue with its named libraries
#[pyclass(name = "Catalog")]
#[derive(Clone)]
pub struct PyCatalog {
    inner: Arc<RustCatalog>,
}

#[pymethods]
impl PyCatalog {
    /// The built-in English catalogue
    #[classmethod]
    fn english(_cls: &Bound<'_, pyo3::types::PyType>) -> PyResult<Self> {
        Ok(PyCatalog {
            inner: Arc::new(RustCatalog::english()?),
        })
    }

    #[classmethod]
    fn from_str(_cls: &Bound<'_, pyo3::types::PyType>, text: &str) -> PyResult<Self> {
        Ok(PyCatalog {
            inner: Arc::new(text.parse::<RustCatalog>()?),
        })
    }

    #[classmethod]
    fn load(_cls: &Bound<'_, pyo3::types::PyType>, path: &str) -> PyResult<Self> {
        Ok(PyCatalog {
            inner: Arc::new(RustCatalog::load(path)?),
        })
    }

    #[getter]
    fn libraries(&self) -> Vec<String> {
        self.inner.library_names().map(str::to_string).collect()
    }

    /// Deduplicated `(subject, feature, role, pattern)` tuples of one
    /// library for a parse given as `{head: [children]}` and
    /// `{index: {key: value}}`
    fn extract<'py>(
        &self,
        structure: HashMap<usize, Vec<usize>>,
        properties: PyProperties<'py>,
        library: &str,
    ) -> PyResult<Vec<PyTuple4>> {
        let library = self.inner.require(library)?;
        let tree = RustTree::from_structure(structure, attrs_from_py(properties)?)?;
        Ok(to_py(dedup_tuples(extract(&tree, library)?)))
    }

    /// Same as `extract` for an already built tree
    fn extract_tree(&self, tree: &PyTree, library: &str) -> PyResult<Vec<PyTuple4>> {
        let library = self.inner.require(library)?;
        Ok(to_py(dedup_tuples(extract(&tree.inner, library)?)))
    }

    /// `(text, tuples)` entries for a CoNLL-U string, library-major
    #[pyo3(signature = (text, libraries=vec!["adj".to_string(), "verb".to_string()]))]
    fn mine_conllu(&self, text: &str, libraries: Vec<String>) -> PyResult<Vec<(String, Vec<PyTuple4>)>> {
        let miner = Miner::new(&self.inner, &libraries)?;
        let document = crate::iterators::Document::from_string("string", text);
        Ok(miner
            .mine_document(&document)?
            .into_iter()
            .map(|(text, tuples)| (text, to_py(tuples)))
            .collect())
    }

    fn __repr__(&self) -> String {
        format!(
            "<Catalog patterns={} libraries={:?}>",
            self.inner.patterns().len(),
            self.libraries()
        )
    }
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn treetuples(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTree>()?;
    m.add_class::<PyCatalog>()?;

    m.add_function(wrap_pyfunction!(read_conllu, m)?)?;
    m.add_function(wrap_pyfunction!(read_corpus, m)?)?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;

    Ok(())
}
