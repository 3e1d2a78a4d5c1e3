use std::{
    cmp::Ordering,
    fmt::{Display, Write},
    str::FromStr,
};

use lazy_static::lazy_static;
use regex_lite::Regex;
use semver::Version;
use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};

use crate::model::ParseError;

lazy_static! {
    static ref SHORT_VERSION_REGEX: Regex =
        Regex::new(r"^v?(?P<major>\d+)(?:[._](?P<minor>\d+)(?:[._](?P<patch>\d+))?)?$").unwrap();
}

/// Parses a possibly abbreviated version such as `9`, `10.13`, `10_13` or `v4.4.1`.
/// Missing components are zero. Anything else must be a full semantic version.
pub fn parse_version(value: &str) -> Result<Version, ParseError> {
    match SHORT_VERSION_REGEX.captures(value.trim()) {
        Some(captures) => {
            let component = |name: &str| -> Result<u64, ParseError> {
                Ok(match captures.name(name) {
                    Some(c) => c.as_str().parse::<u64>()?,
                    None => 0,
                })
            };
            Ok(Version::new(
                component("major")?,
                component("minor")?,
                component("patch")?,
            ))
        }
        None => Version::parse(value.trim().trim_start_matches('v'))
            .map_err(|_| ParseError::InvalidVersion(value.to_string())),
    }
}

/// `None` when the major component is already at its maximum.
pub fn next_major(version: &Version) -> Option<Version> {
    Some(Version::new(version.major.checked_add(1)?, 0, 0))
}

/// `None` when the minor component is already at its maximum.
pub fn next_minor(version: &Version) -> Option<Version> {
    Some(Version::new(version.major, version.minor.checked_add(1)?, 0))
}

/// Version constraint declared on a dependency. Exactly one kind per declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Requirement {
    Exact(Version),
    UpToNextMajor(Version),
    UpToNextMinor(Version),
    /// Half-open `[from, to)`.
    Range {
        from: Version,
        to: Version,
    },
    Branch(String),
    Revision(String),
}

impl Requirement {
    pub fn range(&self) -> VersionRange {
        match self {
            Requirement::Exact(v) => VersionRange::exact(v.clone()),
            Requirement::UpToNextMajor(v) => VersionRange::up_to(
                v.clone(),
                next_major(v),
                Version::new(u64::MAX, u64::MAX, u64::MAX),
            ),
            Requirement::UpToNextMinor(v) => VersionRange::up_to(
                v.clone(),
                next_minor(v),
                Version::new(v.major, u64::MAX, u64::MAX),
            ),
            Requirement::Range { from, to } => VersionRange::half_open(from.clone(), to.clone()),
            Requirement::Branch(_) | Requirement::Revision(_) => VersionRange::Unbounded,
        }
    }

    /// Branches and revisions can move or are not tied to a published version.
    pub fn is_reproducible(&self) -> bool {
        !matches!(self, Requirement::Branch(_) | Requirement::Revision(_))
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Requirement::Exact(v) => write!(f, "exact {}", v),
            Requirement::UpToNextMajor(v) => write!(f, "up to next major from {}", v),
            Requirement::UpToNextMinor(v) => write!(f, "up to next minor from {}", v),
            Requirement::Range { from, to } => write!(f, "{}..<{}", from, to),
            Requirement::Branch(branch) => write!(f, "branch {}", branch),
            Requirement::Revision(revision) => write!(f, "revision {}", revision),
        }
    }
}

/// Normalized form of a [`Requirement`]. The lower bound is always inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VersionRange {
    Bounded {
        lower: Version,
        upper: Version,
        upper_inclusive: bool,
    },
    Unbounded,
}

impl VersionRange {
    pub fn exact(version: Version) -> Self {
        VersionRange::Bounded {
            lower: version.clone(),
            upper: version,
            upper_inclusive: true,
        }
    }

    pub fn half_open(lower: Version, upper: Version) -> Self {
        VersionRange::Bounded {
            lower,
            upper,
            upper_inclusive: false,
        }
    }

    /// `[lower, upper)`, or `[lower, ceiling]` when `upper` is not representable.
    fn up_to(lower: Version, upper: Option<Version>, ceiling: Version) -> Self {
        match upper {
            Some(upper) => VersionRange::half_open(lower, upper),
            None => VersionRange::Bounded {
                lower,
                upper: ceiling,
                upper_inclusive: true,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            VersionRange::Bounded {
                lower,
                upper,
                upper_inclusive,
            } => match lower.cmp(upper) {
                Ordering::Less => false,
                Ordering::Equal => !upper_inclusive,
                Ordering::Greater => true,
            },
            VersionRange::Unbounded => false,
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionRange::Bounded {
                lower,
                upper,
                upper_inclusive,
            } => {
                version >= lower && (version < upper || (*upper_inclusive && version == upper))
            }
            VersionRange::Unbounded => true,
        }
    }

    /// Returns the overlap of both ranges, or `None` when they are disjoint.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        match (self, other) {
            (VersionRange::Unbounded, range) | (range, VersionRange::Unbounded) => {
                Some(range.clone())
            }
            (
                VersionRange::Bounded {
                    lower: lower1,
                    upper: upper1,
                    upper_inclusive: inclusive1,
                },
                VersionRange::Bounded {
                    lower: lower2,
                    upper: upper2,
                    upper_inclusive: inclusive2,
                },
            ) => {
                let lower = lower1.max(lower2).clone();
                let (upper, upper_inclusive) = match upper1.cmp(upper2) {
                    Ordering::Less => (upper1.clone(), *inclusive1),
                    Ordering::Greater => (upper2.clone(), *inclusive2),
                    Ordering::Equal => (upper1.clone(), *inclusive1 && *inclusive2),
                };
                let range = VersionRange::Bounded {
                    lower,
                    upper,
                    upper_inclusive,
                };
                (!range.is_empty()).then_some(range)
            }
        }
    }
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionRange::Bounded {
                lower,
                upper,
                upper_inclusive,
            } => write!(
                f,
                "[{}, {}{}",
                lower,
                upper,
                if *upper_inclusive { ']' } else { ')' }
            ),
            VersionRange::Unbounded => f.write_char('*'),
        }
    }
}

impl FromStr for VersionRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidRange(s.to_string());
        let s = s.trim();
        if s == "*" {
            return Ok(VersionRange::Unbounded);
        }
        let inner = s.strip_prefix('[').ok_or_else(invalid)?;
        let (inner, upper_inclusive) = if let Some(inner) = inner.strip_suffix(']') {
            (inner, true)
        } else {
            (inner.strip_suffix(')').ok_or_else(invalid)?, false)
        };
        let (lower, upper) = inner.split_once(',').ok_or_else(invalid)?;
        Ok(VersionRange::Bounded {
            lower: Version::parse(lower.trim()).map_err(|_| invalid())?,
            upper: Version::parse(upper.trim()).map_err(|_| invalid())?,
            upper_inclusive,
        })
    }
}

impl Serialize for VersionRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VersionRangeVisitor;

        impl<'de> Visitor<'de> for VersionRangeVisitor {
            type Value = VersionRange;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a version range such as `[1.0.0, 2.0.0)` or `*`")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                VersionRange::from_str(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(VersionRangeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    #[test]
    fn parse_abbreviated_versions() {
        assert_eq!(v("9"), Version::new(9, 0, 0));
        assert_eq!(v("10.13"), Version::new(10, 13, 0));
        assert_eq!(v("10_10"), Version::new(10, 10, 0));
        assert_eq!(v("v4.4.1"), Version::new(4, 4, 1));
        assert_eq!(v("1.0.0-beta.1").pre.as_str(), "beta.1");
        assert!(parse_version("feature/spm-support").is_err());
    }

    #[test]
    fn normalize_requirements() {
        assert_eq!(
            Requirement::UpToNextMajor(v("9.0.0")).range().to_string(),
            "[9.0.0, 10.0.0)"
        );
        assert_eq!(
            Requirement::UpToNextMinor(v("4.4.1")).range().to_string(),
            "[4.4.1, 4.5.0)"
        );
        assert_eq!(
            Requirement::Exact(v("1.0.0")).range().to_string(),
            "[1.0.0, 1.0.0]"
        );
        assert_eq!(
            Requirement::Branch("main".to_string()).range(),
            VersionRange::Unbounded
        );
        assert!(!Requirement::Branch("main".to_string()).is_reproducible());
        assert!(Requirement::Exact(v("1.0.0")).is_reproducible());
    }

    #[test]
    fn normalize_at_component_limit() {
        let top = Version::new(u64::MAX, 0, 0);
        let range = Requirement::UpToNextMajor(top.clone()).range();
        assert!(range.contains(&top));
        assert!(range.contains(&Version::new(u64::MAX, 3, 1)));
        assert!(!range.contains(&Version::new(u64::MAX - 1, 0, 0)));

        let range = Requirement::UpToNextMinor(Version::new(1, u64::MAX, 0)).range();
        assert!(range.contains(&Version::new(1, u64::MAX, 7)));
        assert!(!range.contains(&Version::new(2, 0, 0)));
        assert_eq!(next_minor(&Version::new(1, u64::MAX, 0)), None);
        assert_eq!(next_major(&Version::new(1, 2, 3)), Some(Version::new(2, 0, 0)));
    }

    #[test]
    fn exact_and_next_major_do_not_intersect() {
        let exact = Requirement::Exact(v("1.0.0")).range();
        let major = Requirement::UpToNextMajor(v("2.0.0")).range();
        assert_eq!(exact.intersect(&major), None);
        assert_eq!(major.intersect(&exact), None);
    }

    #[test]
    fn overlapping_ranges_intersect() {
        let major = Requirement::UpToNextMajor(v("4.4.1")).range();
        let minor = Requirement::UpToNextMinor(v("4.6.0")).range();
        assert_eq!(
            major.intersect(&minor),
            Some(VersionRange::half_open(v("4.6.0"), v("4.7.0")))
        );
        assert_eq!(
            major.intersect(&VersionRange::Unbounded),
            Some(major.clone())
        );
    }

    #[test]
    fn touching_bounds() {
        let lower = VersionRange::half_open(v("1.0.0"), v("2.0.0"));
        assert_eq!(lower.intersect(&VersionRange::exact(v("2.0.0"))), None);
        assert_eq!(
            VersionRange::exact(v("2.0.0")).intersect(&VersionRange::half_open(v("2.0.0"), v("3.0.0"))),
            Some(VersionRange::exact(v("2.0.0")))
        );
    }

    #[test]
    fn contains_respects_upper_bound() {
        let range = VersionRange::half_open(v("9.0.0"), v("10.0.0"));
        assert!(range.contains(&v("9.4.2")));
        assert!(!range.contains(&v("10.0.0")));
        assert!(VersionRange::exact(v("1.0.0")).contains(&v("1.0.0")));
    }

    #[test]
    fn parse_displayed_range() {
        for text in ["[9.0.0, 10.0.0)", "[1.0.0, 1.0.0]", "*"] {
            assert_eq!(VersionRange::from_str(text).unwrap().to_string(), text);
        }
        assert!(VersionRange::from_str("9.0.0").is_err());
    }
}
