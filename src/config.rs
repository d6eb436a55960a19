//! Run configuration
//!
//! A config file holds one run object or an array of them; runs with
//! `enabled: false` are kept but skipped by the driver.
//!
//! ```json
//! [
//!   {
//!     "input": "corpus/*.conllu.gz",
//!     "output_dir": "tuples",
//!     "libraries": ["adj", "verb"],
//!     "threads": 8,
//!     "skip_existing": true
//!   }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::iterators::Corpus;
use crate::library::{Catalog, LibraryError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
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

    #[error("run {index}: {message}")]
    Invalid { index: usize, message: String },
}

fn default_enabled() -> bool {
    true
}

fn default_libraries() -> Vec<String> {
    vec!["adj".to_string(), "verb".to_string()]
}

/// One extraction run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default = "default_enabled", alias = "switch")]
    pub enabled: bool,
    /// Glob of CoNLL-U files
    pub input: String,
    pub output_dir: PathBuf,
    /// Catalogue file; the built-in English catalogue when absent
    #[serde(default)]
    pub patterns: Option<PathBuf>,
    #[serde(default = "default_libraries")]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub skip_existing: bool,
}

impl RunConfig {
    pub fn new(input: &str, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            input: input.to_string(),
            output_dir: output_dir.into(),
            patterns: None,
            libraries: default_libraries(),
            threads: None,
            skip_existing: false,
        }
    }

    fn check(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            index,
            message: message.to_string(),
        };
        if self.input.is_empty() {
            return Err(invalid("input is empty"));
        }
        if self.libraries.is_empty() {
            return Err(invalid("no libraries selected"));
        }
        if self.threads == Some(0) {
            return Err(invalid("threads must be at least 1"));
        }
        Ok(())
    }

    pub fn catalog(&self) -> Result<Catalog, LibraryError> {
        match &self.patterns {
            Some(path) => Catalog::load(path),
            None => Catalog::english(),
        }
    }

    pub fn corpus(&self) -> Result<Corpus, glob::PatternError> {
        Corpus::from_glob(&self.input)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Many(Vec<RunConfig>),
    One(RunConfig),
}

/// Parse config text holding one run or an array of runs
pub fn parse_configs(text: &str) -> Result<Vec<RunConfig>, serde_json::Error> {
    let runs = match serde_json::from_str(text)? {
        ConfigFile::Many(runs) => runs,
        ConfigFile::One(run) => vec![run],
    };
    Ok(runs)
}

/// Load and check every run of a config file
pub fn load_configs(path: &Path) -> Result<Vec<RunConfig>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let runs = parse_configs(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    for (index, run) in runs.iter().enumerate() {
        run.check(index)?;
    }
    Ok(runs)
}
