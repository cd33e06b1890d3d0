//! Country Alias Map
//! Reconciles country spellings between the Barro-Lee and Berkeley Earth
//! datasets through an explicit lookup table.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AliasError {
    #[error("Failed to read alias file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Alias map is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Alias chain: '{alias}' maps to '{canonical}', which is itself an alias")]
    Chain { alias: String, canonical: String },
}

/// Barro-Lee spelling (or common variant) on the left, Berkeley Earth
/// spelling on the right.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("USA", "United States"),
    ("United States of America", "United States"),
    ("Republic of Korea", "South Korea"),
    ("Korea, Rep.", "South Korea"),
    ("Russian Federation", "Russia"),
    ("China, Hong Kong Special Administrative Region", "Hong Kong"),
    ("China, Macao Special Administrative Region", "Macau"),
    ("Iran (Islamic Republic of)", "Iran"),
    ("Viet Nam", "Vietnam"),
    ("Syrian Arab Republic", "Syria"),
    ("Lao People's Democratic Republic", "Laos"),
    ("Republic of Moldova", "Moldova"),
    ("United Republic of Tanzania", "Tanzania"),
    ("Democratic Republic of the Congo", "Congo (Democratic Republic Of The)"),
    ("Libyan Arab Jamahiriya", "Libya"),
    ("Slovak Republic", "Slovakia"),
    ("Brunei Darussalam", "Brunei"),
    ("Cote dIvoire", "Côte D'Ivoire"),
    ("Cote d'Ivoire", "Côte D'Ivoire"),
    ("Kyrgyz Republic", "Kyrgyzstan"),
    ("TFYR of Macedonia", "Macedonia"),
    ("The former Yugoslav Republic of Macedonia", "Macedonia"),
    ("Bolivia (Plurinational State of)", "Bolivia"),
    ("Venezuela (Bolivarian Republic of)", "Venezuela"),
    ("Dominican Rep.", "Dominican Republic"),
    ("Central African Rep.", "Central African Republic"),
];

/// Collapses whitespace runs and trims.
pub fn normalize_spacing(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key used to compare country names: spacing normalized, case folded.
pub fn normalize_key(name: &str) -> String {
    normalize_spacing(name).to_lowercase()
}

/// Maps alternate country spellings to one canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryAliasMap {
    /// normalized alias -> canonical spelling
    entries: HashMap<String, String>,
}

impl CountryAliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The known spelling differences between the two datasets.
    pub fn builtin() -> Self {
        let mut map = Self::new();
        for (alias, canonical) in BUILTIN_ALIASES {
            map.insert(alias, canonical);
        }
        map
    }

    /// Parse a JSON object of `"alias": "canonical"` pairs.
    pub fn from_json_str(json: &str) -> Result<Self, AliasError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut map = Self::new();
        for (alias, canonical) in &raw {
            map.insert(alias, canonical);
        }
        map.check_chains()?;
        Ok(map)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AliasError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| AliasError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.entries
            .insert(normalize_key(alias), normalize_spacing(canonical));
    }

    /// Merge `other` into `self`; entries of `other` win.
    pub fn merge(&mut self, other: CountryAliasMap) -> Result<(), AliasError> {
        self.entries.extend(other.entries);
        self.check_chains()
    }

    /// Canonical spelling if `name` is a known alias.
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.entries.get(&normalize_key(name)).map(String::as_str)
    }

    /// Canonical spelling, or `name` with normalized spacing.
    pub fn resolve<'a>(&'a self, name: &str) -> Cow<'a, str> {
        match self.canonical(name) {
            Some(canonical) => Cow::Borrowed(canonical),
            None => Cow::Owned(normalize_spacing(name)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_chains(&self) -> Result<(), AliasError> {
        let mut aliases: Vec<_> = self.entries.iter().collect();
        aliases.sort();

        for (alias, canonical) in aliases {
            let key = normalize_key(canonical);
            if key == *alias {
                continue;
            }
            if let Some(next) = self.entries.get(&key) {
                if normalize_key(next) != key {
                    return Err(AliasError::Chain {
                        alias: alias.clone(),
                        canonical: canonical.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spacing_and_case_are_normalized() {
        assert_eq!(normalize_spacing("  United   States "), "United States");
        assert_eq!(normalize_key("United  STATES"), "united states");
    }

    #[test]
    fn resolve_uses_alias_or_falls_back() {
        let mut map = CountryAliasMap::new();
        map.insert("United States of America", "United States");

        assert_eq!(map.resolve("united states of america"), "United States");
        assert_eq!(map.resolve(" Chile "), "Chile");
        assert_eq!(map.canonical("Chile"), None);
    }

    #[test]
    fn builtin_table_has_no_chains() {
        let map = CountryAliasMap::builtin();
        assert!(!map.is_empty());
        assert!(map.check_chains().is_ok());
        assert_eq!(map.resolve("USA"), "United States");
    }

    #[test]
    fn json_map_is_parsed() {
        let map = CountryAliasMap::from_json_str(r#"{"Burma": "Myanmar", "UK": "United Kingdom"}"#)
            .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve("burma"), "Myanmar");
    }

    #[test]
    fn json_map_rejects_chains() {
        let err = CountryAliasMap::from_json_str(r#"{"A": "B", "B": "C"}"#).unwrap_err();
        assert!(matches!(err, AliasError::Chain { .. }));
    }

    #[test]
    fn json_map_rejects_non_string_values() {
        let err = CountryAliasMap::from_json_str(r#"{"A": 3}"#).unwrap_err();
        assert!(matches!(err, AliasError::Json(_)));
    }

    #[test]
    fn merge_overrides_entries() {
        let mut map = CountryAliasMap::builtin();
        let mut custom = CountryAliasMap::new();
        custom.insert("USA", "United States of America");
        // the builtin entry "United States of America" -> "United States" now forms a chain
        assert!(map.merge(custom).is_err());

        let mut map = CountryAliasMap::builtin();
        let mut custom = CountryAliasMap::new();
        custom.insert("Burma", "Myanmar");
        map.merge(custom).unwrap();
        assert_eq!(map.resolve("Burma"), "Myanmar");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = CountryAliasMap::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, AliasError::Io { .. }));
    }
}
