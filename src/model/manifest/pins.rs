use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::model::ParseError;

use super::DependencyName;

/// Versions an external fetcher settled on for each dependency.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinFile {
    #[serde(default)]
    pub pins: Vec<Pin>,
}

const VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct VersionedPinFile<'a> {
    pub version: i64,
    #[serde(flatten)]
    pub content: &'a PinFile,
}

impl PinFile {
    pub fn from_file(file: &Path) -> Result<PinFile, ParseError> {
        PinFile::from_str(&std::fs::read_to_string(file)?)
    }

    pub fn from_str(s: &str) -> Result<PinFile, ParseError> {
        let mut table = toml::from_str::<toml::Table>(s)?;
        match table.remove("version") {
            Some(toml::Value::Integer(VERSION)) => table.try_into::<PinFile>().map_err(Into::into),
            Some(other) => Err(ParseError::UnsupportedVersion(other)),
            None => Err(ParseError::MissingVersion),
        }
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&VersionedPinFile {
            version: VERSION,
            content: self,
        })
    }

    pub fn get(&self, name: &DependencyName) -> Option<&Pin> {
        self.pins.iter().find(|pin| &pin.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pin {
    pub name: DependencyName,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<String>,
}

impl std::fmt::Display for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.version, &self.revision) {
            (Some(version), Some(revision)) => write!(f, "{} ({})", version, revision),
            (Some(version), None) => write!(f, "{}", version),
            (None, Some(revision)) => f.write_str(revision),
            (None, None) => f.write_str("unpinned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use toml::toml;

    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_save_pin_file() {
        let text = toml::to_string_pretty(&toml! {
            version = 1

            [[pins]]
            name = "AppCenter"
            version = "4.4.3"
            revision = "a1b2c3"

            [[pins]]
            name = "FXReachability"
            revision = "d4e5f6"
        })
        .unwrap();
        let data = PinFile {
            pins: vec![
                Pin {
                    name: DependencyName::from("AppCenter"),
                    version: Some(Version::new(4, 4, 3)),
                    revision: Some("a1b2c3".to_string()),
                },
                Pin {
                    name: DependencyName::from("FXReachability"),
                    version: None,
                    revision: Some("d4e5f6".to_string()),
                },
            ],
        };
        let parsed = PinFile::from_str(&text).unwrap();
        let formatted = data.to_string().unwrap();
        assert_eq!(parsed, data);
        assert_eq!(formatted, text);
        assert_eq!(
            parsed.get(&DependencyName::from("FXReachability")).unwrap().to_string(),
            "d4e5f6"
        );
    }

    #[test]
    fn load_pin_file_without_version() {
        let text = toml::to_string_pretty(&toml! {
            [[pins]]
            name = "AppCenter"
        })
        .unwrap();
        PinFile::from_str(&text).expect_err("should not parse unversioned pin file");
    }

    #[test]
    fn load_pin_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildplan.pins");
        let pins = PinFile {
            pins: vec![Pin {
                name: DependencyName::from("OHHTTPStubs"),
                version: Some(Version::new(9, 1, 0)),
                revision: None,
            }],
        };
        std::fs::write(&path, pins.to_string().unwrap()).unwrap();
        assert_eq!(PinFile::from_file(&path).unwrap(), pins);
    }
}
