//! Pattern libraries
//!
//! A [`Catalog`] is the load-time registry: every named pattern, plus named
//! [`PatternLibrary`] values that arrange patterns into tiers and groups.
//! All structural checks happen here, once, so extraction can rely on them.

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::parser::{CatalogDef, ParseError, parse_catalog};
use crate::pattern::{PatternError, PatternSpec};

/// Catalogue format version understood by this crate
pub const CATALOG_VERSION: &str = "1";

/// The built-in English catalogue source
pub const ENGLISH: &str = include_str!("patterns/english.pat");

/// Problems found while loading a catalogue or assembling a library
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("unsupported catalogue version {0:?}")]
    Version(String),

    #[error("pattern {0} is defined more than once")]
    DuplicatePattern(String),

    #[error("library {0} is defined more than once")]
    DuplicateLibrary(String),

    #[error("library {library} refers to unknown pattern {pattern}")]
    UnknownPattern { library: String, pattern: String },

    #[error("library {0} has no tiers")]
    EmptyLibrary(String),

    #[error("library {library}: tier {tier} has no groups")]
    EmptyTier { library: String, tier: usize },

    #[error("library {library}: tier {tier}, group {group} is empty")]
    EmptyGroup {
        library: String,
        tier: usize,
        group: usize,
    },

    #[error("library {library} lists pattern {pattern} more than once")]
    DuplicateMember { library: String, pattern: String },

    #[error("pattern {pattern} is superseded by unknown pattern {partner}")]
    UnknownPartner { pattern: String, partner: String },

    #[error(
        "library {library}: pattern {pattern} is superseded by {partner}, which must come earlier in the same group"
    )]
    Supersession {
        library: String,
        pattern: String,
        partner: String,
    },

    #[error("no library named {0}")]
    NoSuchLibrary(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered patterns of which at most the first matching one contributes
#[derive(Debug, Clone)]
pub struct Group {
    patterns: Vec<Arc<PatternSpec>>,
}

impl Group {
    pub fn new(patterns: Vec<Arc<PatternSpec>>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[Arc<PatternSpec>] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Groups evaluated together; a tier's result is the union of its groups'
#[derive(Debug, Clone)]
pub struct Tier {
    groups: Vec<Group>,
}

impl Tier {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

/// A named, validated ranking of patterns
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    name: String,
    tiers: Vec<Tier>,
}

impl PatternLibrary {
    /// Assemble and validate a library.
    ///
    /// Fails on an empty library, tier or group, on a pattern listed twice,
    /// and on a supersession declaration whose partner is not an earlier
    /// member of the same group.
    pub fn new(name: &str, tiers: Vec<Tier>) -> Result<Self, LibraryError> {
        let library = Self {
            name: name.to_string(),
            tiers,
        };
        library.check()?;
        Ok(library)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Every pattern, in evaluation order
    pub fn patterns(&self) -> impl Iterator<Item = &Arc<PatternSpec>> {
        self.tiers
            .iter()
            .flat_map(|t| t.groups.iter())
            .flat_map(|g| g.patterns.iter())
    }

    fn check(&self) -> Result<(), LibraryError> {
        if self.tiers.is_empty() {
            return Err(LibraryError::EmptyLibrary(self.name.clone()));
        }

        let mut members: FxHashSet<&str> = FxHashSet::default();
        for (t, tier) in self.tiers.iter().enumerate() {
            if tier.groups.is_empty() {
                return Err(LibraryError::EmptyTier {
                    library: self.name.clone(),
                    tier: t + 1,
                });
            }
            for (g, group) in tier.groups.iter().enumerate() {
                if group.is_empty() {
                    return Err(LibraryError::EmptyGroup {
                        library: self.name.clone(),
                        tier: t + 1,
                        group: g + 1,
                    });
                }
                for (i, pattern) in group.patterns.iter().enumerate() {
                    if !members.insert(pattern.name()) {
                        return Err(LibraryError::DuplicateMember {
                            library: self.name.clone(),
                            pattern: pattern.name().to_string(),
                        });
                    }
                    let earlier = &group.patterns[..i];
                    for partner in pattern.superseded_by() {
                        if !earlier.iter().any(|p| p.name() == partner) {
                            return Err(LibraryError::Supersession {
                                library: self.name.clone(),
                                pattern: pattern.name().to_string(),
                                partner: partner.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Registry of named patterns and the libraries built from them
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    version: Option<String>,
    patterns: Vec<Arc<PatternSpec>>,
    by_name: FxHashMap<String, usize>,
    libraries: Vec<PatternLibrary>,
}

impl Catalog {
    /// The built-in English adjective and verb libraries
    pub fn english() -> Result<Self, LibraryError> {
        ENGLISH.parse()
    }

    /// Load a catalogue file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: Catalog = text.parse()?;
        tracing::info!(
            path = %path.display(),
            patterns = catalog.patterns.len(),
            libraries = catalog.libraries.len(),
            "loaded pattern catalogue"
        );
        Ok(catalog)
    }

    /// Build from parsed definitions, validating everything
    pub fn from_def(def: CatalogDef) -> Result<Self, LibraryError> {
        if let Some(version) = &def.version
            && version != CATALOG_VERSION
        {
            return Err(LibraryError::Version(version.clone()));
        }

        let mut catalog = Catalog {
            version: def.version,
            ..Default::default()
        };

        for pattern_def in def.patterns {
            let spec = pattern_def.build()?;
            if catalog.by_name.contains_key(spec.name()) {
                return Err(LibraryError::DuplicatePattern(spec.name().to_string()));
            }
            catalog
                .by_name
                .insert(spec.name().to_string(), catalog.patterns.len());
            catalog.patterns.push(Arc::new(spec));
        }

        for pattern in &catalog.patterns {
            for partner in pattern.superseded_by() {
                if !catalog.by_name.contains_key(partner) {
                    return Err(LibraryError::UnknownPartner {
                        pattern: pattern.name().to_string(),
                        partner: partner.clone(),
                    });
                }
            }
        }

        for library_def in def.libraries {
            if catalog.library(&library_def.name).is_some() {
                return Err(LibraryError::DuplicateLibrary(library_def.name));
            }
            let mut tiers = Vec::with_capacity(library_def.tiers.len());
            for tier in &library_def.tiers {
                let mut groups = Vec::with_capacity(tier.len());
                for group in tier {
                    let patterns = group
                        .iter()
                        .map(|name| {
                            catalog.pattern(name).cloned().ok_or_else(|| {
                                LibraryError::UnknownPattern {
                                    library: library_def.name.clone(),
                                    pattern: name.clone(),
                                }
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    groups.push(Group::new(patterns));
                }
                tiers.push(Tier::new(groups));
            }
            let library = PatternLibrary::new(&library_def.name, tiers)?;
            catalog.libraries.push(library);
        }

        let referenced: FxHashSet<&str> = catalog
            .libraries
            .iter()
            .flat_map(|l| l.patterns())
            .map(|p| p.name())
            .collect();
        for pattern in &catalog.patterns {
            if !referenced.contains(pattern.name()) {
                tracing::warn!(
                    pattern = pattern.name(),
                    "pattern is not used by any library"
                );
            }
        }

        Ok(catalog)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn pattern(&self, name: &str) -> Option<&Arc<PatternSpec>> {
        self.by_name.get(name).map(|&i| &self.patterns[i])
    }

    /// All patterns, in definition order
    pub fn patterns(&self) -> &[Arc<PatternSpec>] {
        &self.patterns
    }

    pub fn library(&self, name: &str) -> Option<&PatternLibrary> {
        self.libraries.iter().find(|l| l.name == name)
    }

    /// Look up a library, failing if it does not exist
    pub fn require(&self, name: &str) -> Result<&PatternLibrary, LibraryError> {
        self.library(name)
            .ok_or_else(|| LibraryError::NoSuchLibrary(name.to_string()))
    }

    pub fn libraries(&self) -> &[PatternLibrary] {
        &self.libraries
    }

    pub fn library_names(&self) -> impl Iterator<Item = &str> {
        self.libraries.iter().map(|l| l.name.as_str())
    }
}

impl FromStr for Catalog {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Catalog::from_def(parse_catalog(s)?)
    }
}
