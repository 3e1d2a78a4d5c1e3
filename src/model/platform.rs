use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    str::FromStr,
};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::model::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Macos,
    MacCatalyst,
    Tvos,
    Watchos,
    Linux,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Ios,
        Platform::Macos,
        Platform::MacCatalyst,
        Platform::Tvos,
        Platform::Watchos,
        Platform::Linux,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Macos => "macos",
            Platform::MacCatalyst => "maccatalyst",
            Platform::Tvos => "tvos",
            Platform::Watchos => "watchos",
            Platform::Linux => "linux",
        }
    }
}

impl FromStr for Platform {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|platform| platform.as_str() == value)
            .ok_or(ParseError::UnknownPlatform(value))
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildConfiguration {
    Debug,
    Release,
}

impl BuildConfiguration {
    pub const ALL: [BuildConfiguration; 2] = [BuildConfiguration::Debug, BuildConfiguration::Release];
}

impl FromStr for BuildConfiguration {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.to_ascii_lowercase();
        match value.as_str() {
            "debug" => Ok(BuildConfiguration::Debug),
            "release" => Ok(BuildConfiguration::Release),
            _ => Err(ParseError::UnknownConfiguration(value)),
        }
    }
}

impl Display for BuildConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BuildConfiguration::Debug => f.write_str("debug"),
            BuildConfiguration::Release => f.write_str("release"),
        }
    }
}

/// Set of platforms a dependency edge or a define directive is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformCondition {
    platforms: BTreeSet<Platform>,
}

impl PlatformCondition {
    pub fn new(platforms: impl IntoIterator<Item = Platform>) -> Self {
        PlatformCondition {
            platforms: platforms.into_iter().collect(),
        }
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.platforms.iter().copied()
    }
}

/// Returns true when an edge or directive gated by `condition` applies to `platform`.
pub fn is_active_on(condition: Option<&PlatformCondition>, platform: Platform) -> bool {
    condition.map_or(true, |c| c.contains(platform))
}

/// Minimum supported OS version per platform family.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlatformFloors {
    floors: BTreeMap<Platform, Version>,
}

impl PlatformFloors {
    pub fn new(floors: impl IntoIterator<Item = (Platform, Version)>) -> Self {
        PlatformFloors {
            floors: floors.into_iter().collect(),
        }
    }

    pub fn get(&self, platform: Platform) -> Option<&Version> {
        self.floors.get(&platform)
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.floors.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Platform, &Version)> {
        self.floors.iter().map(|(p, v)| (*p, v))
    }

    /// Keeps the higher floor for every platform either side declares.
    pub fn raise(&mut self, other: &PlatformFloors) {
        for (platform, version) in other.iter() {
            match self.floors.get_mut(&platform) {
                Some(existing) if *existing >= *version => {}
                Some(existing) => *existing = version.clone(),
                None => {
                    self.floors.insert(platform, version.clone());
                }
            }
        }
    }

    /// Adds floors for platforms not yet present; existing floors are kept.
    pub fn extend_missing(&mut self, other: PlatformFloors) {
        for (platform, version) in other.floors {
            self.floors.entry(platform).or_insert(version);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn parse_platform_ignores_case() {
        assert_eq!(Platform::from_str("iOS").unwrap(), Platform::Ios);
        assert_eq!(Platform::from_str("tvOS").unwrap(), Platform::Tvos);
        assert_eq!(
            Platform::from_str("macCatalyst").unwrap(),
            Platform::MacCatalyst
        );
        assert!(Platform::from_str("symbian").is_err());
    }

    #[test]
    fn missing_condition_is_unconditional() {
        assert!(is_active_on(None, Platform::Linux));
        let ios_only = PlatformCondition::new([Platform::Ios]);
        assert!(is_active_on(Some(&ios_only), Platform::Ios));
        assert!(!is_active_on(Some(&ios_only), Platform::Tvos));
    }

    #[test]
    fn extend_missing_keeps_existing_floors() {
        let mut floors = PlatformFloors::new([(Platform::Ios, Version::new(9, 0, 0))]);
        floors.extend_missing(PlatformFloors::new([
            (Platform::Ios, Version::new(11, 0, 0)),
            (Platform::Tvos, Version::new(11, 0, 0)),
        ]));
        assert_eq!(floors.get(Platform::Ios), Some(&Version::new(9, 0, 0)));
        assert_eq!(floors.get(Platform::Tvos), Some(&Version::new(11, 0, 0)));
    }

    #[test]
    fn raise_keeps_highest_floor() {
        let mut floors = PlatformFloors::new([
            (Platform::Ios, Version::new(9, 0, 0)),
            (Platform::Tvos, Version::new(12, 0, 0)),
        ]);
        floors.raise(&PlatformFloors::new([
            (Platform::Ios, Version::new(15, 0, 0)),
            (Platform::Tvos, Version::new(11, 0, 0)),
            (Platform::Macos, Version::new(10, 13, 0)),
        ]));
        assert_eq!(
            floors,
            PlatformFloors::new([
                (Platform::Ios, Version::new(15, 0, 0)),
                (Platform::Macos, Version::new(10, 13, 0)),
                (Platform::Tvos, Version::new(12, 0, 0)),
            ])
        );
    }
}
