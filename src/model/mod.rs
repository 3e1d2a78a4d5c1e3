use std::num::ParseIntError;
use thiserror::Error;

pub mod manifest;
pub mod platform;
pub mod version;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading manifest: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseIntError),
    #[error("Missing TOML key `{0}` while parsing")]
    MissingKey(String),
    #[error("Invalid version `{0}`")]
    InvalidVersion(String),
    #[error("Invalid version range `{0}`")]
    InvalidRange(String),
    #[error("Unknown platform `{0}`")]
    UnknownPlatform(String),
    #[error("Unknown build configuration `{0}`")]
    UnknownConfiguration(String),
    #[error("Unknown product kind `{0}`")]
    UnknownProductKind(String),
    #[error("Dependency `{0}` must declare exactly one version requirement, found {1}")]
    AmbiguousRequirement(String, usize),
    #[error("Invalid resource rule `{0}`")]
    InvalidResourceRule(String),
    #[error("Invalid dependency reference in target `{0}`")]
    InvalidReference(String),
    #[error("Target `{0}` is declared more than once")]
    DuplicateTarget(String),
    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(toml::Value),
    #[error("Missing file version")]
    MissingVersion,
}
