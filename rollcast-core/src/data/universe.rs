//! Universe configuration — named symbol lists.
//!
//! Stored as TOML, one array per list:
//!
//! ```toml
//! [lists]
//! banks = ["HDFCBANK", "ICICIBANK"]
//! it = ["TCS", "INFY"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown list '{0}'")]
    UnknownList(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub lists: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A universe with a single list.
    pub fn single(name: impl Into<String>, symbols: Vec<String>) -> Self {
        let mut lists = BTreeMap::new();
        lists.insert(name.into(), symbols);
        Self { lists }
    }

    /// Every symbol across all lists, first occurrence wins, list order kept.
    pub fn all_symbols(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.lists
            .values()
            .flatten()
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    pub fn list(&self, name: &str) -> Result<&[String], UniverseError> {
        self.lists
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| UniverseError::UnknownList(name.to_string()))
    }

    pub fn list_names(&self) -> Vec<&str> {
        self.lists.keys().map(|s| s.as_str()).collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.all_symbols().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[lists]
banks = ["HDFCBANK", "ICICIBANK", "SBIN"]
it = ["TCS", "INFY", "SBIN"]
"#;

    #[test]
    fn parse_and_query() {
        let u = Universe::from_toml(SAMPLE).unwrap();
        assert_eq!(u.list_names(), vec!["banks", "it"]);
        assert_eq!(u.list("it").unwrap(), &["TCS", "INFY", "SBIN"]);
        assert!(matches!(u.list("pharma"), Err(UniverseError::UnknownList(_))));
    }

    #[test]
    fn all_symbols_deduplicates() {
        let u = Universe::from_toml(SAMPLE).unwrap();
        assert_eq!(
            u.all_symbols(),
            vec!["HDFCBANK", "ICICIBANK", "SBIN", "TCS", "INFY"]
        );
        assert_eq!(u.symbol_count(), 5);
    }

    #[test]
    fn toml_roundtrip_and_file() {
        let u = Universe::single("core", vec!["A".into(), "B".into()]);
        let text = u.to_toml().unwrap();
        assert_eq!(Universe::from_toml(&text).unwrap(), u);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("universe.toml");
        std::fs::write(&path, text).unwrap();
        assert_eq!(Universe::from_file(&path).unwrap(), u);
        assert!(matches!(
            Universe::from_file(&dir.path().join("missing.toml")),
            Err(UniverseError::Io { .. })
        ));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            Universe::from_toml("lists = 3"),
            Err(UniverseError::Parse(_))
        ));
    }
}
