use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numbered model version; the registry directory name. Only canonical
/// decimal names parse, so `dir_name` always maps back to the directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ModelVersion(u32);

impl ModelVersion {
    pub const FIRST: ModelVersion = ModelVersion(0);

    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Option<ModelVersion> {
        self.0.checked_add(1).map(ModelVersion)
    }

    pub fn dir_name(&self) -> String {
        self.0.to_string()
    }
}

impl Display for ModelVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a model version directory name: {0:?}")]
pub struct VersionParseError(pub String);

impl FromStr for ModelVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = s.len() == 1 || !s.starts_with('0');
        if s.is_empty() || !canonical || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VersionParseError(s.to_string()));
        }
        s.parse::<u32>()
            .map(ModelVersion)
            .map_err(|_| VersionParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_digits_only() {
        assert_eq!("0".parse::<ModelVersion>(), Ok(ModelVersion::new(0)));
        assert_eq!("17".parse::<ModelVersion>(), Ok(ModelVersion::new(17)));
        for bad in ["", "007", "+1", "-1", " 2", "3a", "latest", "1.0", "99999999999"] {
            assert!(bad.parse::<ModelVersion>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn orders_numerically_not_lexically() {
        let mut versions: Vec<ModelVersion> = ["10", "9", "2"]
            .iter()
            .map(|s| s.parse().expect("valid version"))
            .collect();
        versions.sort();
        assert_eq!(versions.iter().map(|v| v.number()).collect::<Vec<_>>(), vec![2, 9, 10]);
        assert_eq!(ModelVersion::new(u32::MAX).next(), None);
    }
}
