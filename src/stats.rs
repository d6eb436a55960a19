//! Noun/feature association scores
//!
//! Counts how often each noun co-occurs with each feature under one role and
//! scores every observed pair with a log-likelihood ratio: the noun's feature
//! distribution against that of all other nouns.

use lasso::{Key, Rodeo, Spur};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::emit::Tuple;
use crate::miner::{MineError, read_output};

/// Roles scored when none are named
pub const DEFAULT_ROLES: [&str; 3] = ["adj", "agent", "patient"];

#[derive(Debug, Error)]
pub enum StatsError {
    #[error(transparent)]
    Mine(#[from] MineError),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

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

/// `k ln p + (n - k) ln(1 - p)`, zero unless `0 < p < 1`
pub fn log_binom(k: f64, n: f64, p: f64) -> f64 {
    if p > 0.0 && p < 1.0 {
        k * p.ln() + (n - k) * (1.0 - p).ln()
    } else {
        0.0
    }
}

/// Log-likelihood ratio of `s` occurrences out of `n1` (the noun) against
/// `r` out of `n2` (every other noun)
pub fn llr(s: u64, n1: u64, r: u64, n2: u64) -> f64 {
    let (s, n1, r, n2) = (s as f64, n1 as f64, r as f64, n2 as f64);
    let p = (s + r) / (n1 + n2);
    2.0 * (log_binom(s, n1, s / n1) + log_binom(r, n2, r / n2)
        - log_binom(s, n1, p)
        - log_binom(r, n2, p))
}

/// One non-zero cell of the noun x feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub noun: usize,
    pub feature: usize,
    pub count: u64,
    pub llr: f64,
}

/// Serialized scores for one role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub role: String,
    pub nouns: Vec<String>,
    pub features: Vec<String>,
    pub cells: Vec<Cell>,
}

impl RoleProfile {
    pub fn noun_index(&self, noun: &str) -> Option<usize> {
        self.nouns.iter().position(|n| n == noun)
    }

    pub fn feature_index(&self, feature: &str) -> Option<usize> {
        self.features.iter().position(|f| f == feature)
    }

    pub fn cell(&self, noun: &str, feature: &str) -> Option<&Cell> {
        let (noun, feature) = (self.noun_index(noun)?, self.feature_index(feature)?);
        self.cells
            .iter()
            .find(|c| c.noun == noun && c.feature == feature)
    }
}

/// Co-occurrence counts for one role
///
/// Nouns and features are interned in first-seen order, so indices are
/// stable for a given input order.
#[derive(Debug)]
pub struct RoleTable {
    role: String,
    nouns: Rodeo,
    features: Rodeo,
    counts: FxHashMap<(Spur, Spur), u64>,
}

impl RoleTable {
    pub fn new(role: &str) -> Self {
        Self {
            role: role.to_string(),
            nouns: Rodeo::default(),
            features: Rodeo::default(),
            counts: FxHashMap::default(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Count a tuple; tuples of other roles are ignored
    pub fn add(&mut self, tuple: &Tuple) {
        if tuple.role != self.role {
            return;
        }
        let noun = self.nouns.get_or_intern(&tuple.subject);
        let feature = self.features.get_or_intern(&tuple.feature);
        *self.counts.entry((noun, feature)).or_default() += 1;
    }

    pub fn noun_count(&self) -> usize {
        self.nouns.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn frequency(&self, noun: &str, feature: &str) -> u64 {
        match (self.nouns.get(noun), self.features.get(feature)) {
            (Some(n), Some(f)) => self.counts.get(&(n, f)).copied().unwrap_or(0),
            _ => 0,
        }
    }

    /// Score every observed pair
    pub fn profile(&self) -> RoleProfile {
        let mut noun_totals = vec![0u64; self.nouns.len()];
        let mut feature_totals = vec![0u64; self.features.len()];
        for (&(noun, feature), &count) in &self.counts {
            noun_totals[noun.into_usize()] += count;
            feature_totals[feature.into_usize()] += count;
        }
        let total: u64 = noun_totals.iter().sum();

        let mut cells: Vec<Cell> = self
            .counts
            .iter()
            .map(|(&(noun, feature), &s)| {
                let (noun, feature) = (noun.into_usize(), feature.into_usize());
                let n1 = noun_totals[noun];
                let r = feature_totals[feature] - s;
                Cell {
                    noun,
                    feature,
                    count: s,
                    llr: llr(s, n1, r, total - n1),
                }
            })
            .collect();
        cells.sort_by_key(|c| (c.noun, c.feature));

        RoleProfile {
            role: self.role.clone(),
            nouns: self.nouns.strings().map(str::to_string).collect(),
            features: self.features.strings().map(str::to_string).collect(),
            cells,
        }
    }
}

/// Tuples from every `*.json` mining output in `input_dir`, in file order
pub fn read_tuples(input_dir: &Path) -> Result<Vec<Tuple>, StatsError> {
    let pattern = input_dir.join("*.json");
    let mut paths: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .collect();
    paths.sort();

    let mut tuples = Vec::new();
    for path in &paths {
        for (_, sentence_tuples) in read_output(path)? {
            tuples.extend(sentence_tuples);
        }
    }
    tracing::info!(files = paths.len(), tuples = tuples.len(), "read tuples");
    Ok(tuples)
}

/// Build a profile per role from `tuples`
pub fn score<S: AsRef<str>>(tuples: &[Tuple], roles: &[S]) -> Vec<RoleProfile> {
    roles
        .iter()
        .map(|role| {
            let mut table = RoleTable::new(role.as_ref());
            tuples.iter().for_each(|t| table.add(t));
            tracing::info!(
                role = table.role(),
                nouns = table.noun_count(),
                features = table.feature_count(),
                "scoring role"
            );
            table.profile()
        })
        .collect()
}

/// Write `<output_dir>/<role>.json` for every profile
pub fn write_profiles(output_dir: &Path, profiles: &[RoleProfile]) -> Result<(), StatsError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| StatsError::Io { path, source }
    };
    fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;

    for profile in profiles {
        let path = output_dir.join(format!("{}.json", profile.role));
        let file = fs::File::create(&path).map_err(io_err(&path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, profile).map_err(|source| StatsError::Json {
            path: path.clone(),
            source,
        })?;
        writer.flush().map_err(io_err(&path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterators::Document;
    use crate::library::Catalog;
    use crate::miner::Miner;
    use tempfile::tempdir;

    fn adj(noun: &str, feature: &str) -> Tuple {
        Tuple::new(noun, feature, "adj", "A")
    }

    #[test]
    fn test_log_binom_edges() {
        assert_eq!(log_binom(3.0, 5.0, 0.0), 0.0);
        assert_eq!(log_binom(3.0, 5.0, 1.0), 0.0);
        assert_eq!(log_binom(0.0, 0.0, f64::NAN), 0.0);
        let expected = 2.0 * 0.5f64.ln();
        assert!((log_binom(1.0, 2.0, 0.5) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_nouns() {
        // each noun has its own feature
        let profile = score(&[adj("man", "tall"), adj("dog", "old")], &["adj"]).remove(0);
        let cell = profile.cell("man", "tall").unwrap();
        assert_eq!(cell.count, 1);
        assert!((cell.llr - 4.0 * 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_same_distribution_scores_zero() {
        let tuples = [
            adj("man", "tall"),
            adj("man", "old"),
            adj("dog", "tall"),
            adj("dog", "old"),
        ];
        let profile = score(&tuples, &["adj"]).remove(0);
        assert_eq!(profile.cells.len(), 4);
        assert!(profile.cells.iter().all(|c| c.llr.abs() < 1e-12));
    }

    #[test]
    fn test_single_noun() {
        let profile = score(&[adj("man", "tall"), adj("man", "tall")], &["adj"]).remove(0);
        assert_eq!(profile.cells.len(), 1);
        assert_eq!(profile.cells[0].count, 2);
        assert_eq!(profile.cells[0].llr, 0.0);
    }

    #[test]
    fn test_roles_are_separate() {
        let tuples = [
            adj("man", "tall"),
            Tuple::new("man", "smile", "agent", "V_act_av1"),
            Tuple::new("Alice", "clap", "patient", "V_act_pv1"),
        ];
        let profiles = score(&tuples, &DEFAULT_ROLES);
        let nouns: Vec<_> = profiles.iter().map(|p| p.nouns.clone()).collect();
        assert_eq!(
            nouns,
            vec![vec!["man".to_string()], vec!["man".to_string()], vec!["Alice".to_string()]]
        );
    }

    #[test]
    fn test_frequency_and_interning() {
        let mut table = RoleTable::new("adj");
        for t in [adj("man", "tall"), adj("dog", "old"), adj("man", "tall")] {
            table.add(&t);
        }
        table.add(&Tuple::new("man", "smile", "agent", "V_act_av1"));

        assert_eq!(table.noun_count(), 2);
        assert_eq!(table.feature_count(), 2);
        assert_eq!(table.frequency("man", "tall"), 2);
        assert_eq!(table.frequency("man", "old"), 0);
        assert_eq!(table.frequency("man", "smile"), 0);

        let profile = table.profile();
        assert_eq!(profile.nouns, vec!["man", "dog"]);
        assert_eq!(profile.features, vec!["tall", "old"]);
    }

    #[test]
    fn test_scores_mining_output() {
        let mined = tempdir().unwrap();
        let roles = tempdir().unwrap();
        let text = "1\tThe\tthe\tDET\tDT\t_\t3\tdet\t_\t_
2\ttall\ttall\tADJ\tJJ\t_\t3\tamod\t_\t_
3\tman\tman\tNOUN\tNN\t_\t4\tnsubj\t_\t_
4\tsmiled\tsmile\tVERB\tVBD\t_\t0\tROOT\t_\t_

";
        let miner = Miner::new(&Catalog::english().unwrap(), &["adj", "verb"]).unwrap();
        miner
            .write_document(&Document::from_string("one", text), mined.path(), false)
            .unwrap();
        miner
            .write_document(&Document::from_string("two", text), mined.path(), false)
            .unwrap();

        let tuples = read_tuples(mined.path()).unwrap();
        assert_eq!(tuples.len(), 4);

        let profiles = score(&tuples, &DEFAULT_ROLES);
        write_profiles(roles.path(), &profiles).unwrap();

        let raw = fs::read_to_string(roles.path().join("adj.json")).unwrap();
        let back: RoleProfile = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.cell("man", "tall").unwrap().count, 2);
        assert!(roles.path().join("patient.json").exists());
    }
}
