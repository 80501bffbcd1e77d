// src/recipe/meta.rs

//! Declared recipe metadata
//!
//! [`RecipeMeta`] is the declarative half of a recipe: identity, declared
//! requirements, configuration axes, and option forcing. The executable
//! half (lifecycle hooks) lives on the [`Recipe`](super::Recipe) trait.
//!
//! Requirements are written in reference syntax with an optional semver
//! range in place of the version:
//!
//! - `Hello/0.1@lasote/testing`: exact version
//! - `Hello/[>=0.1, <1.0]@lasote/testing`: any exported version in range

use crate::error::{Error, Result};
use crate::reference::Reference;
use semver::{Version, VersionReq};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Version part of a requirement: a pinned version or a semver range
#[derive(Debug, Clone, PartialEq)]
pub enum VersionSpec {
    Exact(String),
    Range(VersionReq),
}

impl VersionSpec {
    /// Whether a concrete version satisfies this spec
    ///
    /// Versions that do not parse as semver can only satisfy exact specs.
    pub fn admits(&self, version: &str) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::Range(req) => Version::parse(version).is_ok_and(|v| req.matches(&v)),
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range(_))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{}", v),
            Self::Range(req) => write!(f, "[{}]", req),
        }
    }
}

/// One declared dependency of a recipe
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub name: String,
    pub version: VersionSpec,
    pub user: String,
    pub channel: String,
}

impl Requirement {
    /// Parse `name/version@user/channel` or `name/[range]@user/channel`
    pub fn parse(s: &str) -> Result<Self> {
        let (pkg, origin) = s
            .split_once('@')
            .ok_or_else(|| Error::Parse(format!("requirement '{}' is missing '@'", s)))?;
        let (name, version) = pkg
            .split_once('/')
            .ok_or_else(|| Error::Parse(format!("requirement '{}' is missing name/version", s)))?;
        let (user, channel) = origin
            .split_once('/')
            .ok_or_else(|| Error::Parse(format!("requirement '{}' is missing user/channel", s)))?;

        let version = if let Some(range) = version.strip_prefix('[') {
            let range = range.strip_suffix(']').ok_or_else(|| {
                Error::Parse(format!("requirement '{}' has an unterminated range", s))
            })?;
            VersionSpec::Range(
                VersionReq::parse(range)
                    .map_err(|e| Error::Parse(format!("bad range in '{}': {}", s, e)))?,
            )
        } else {
            VersionSpec::Exact(version.to_string())
        };

        // Reuse reference validation for the fixed components
        Reference::new(name, "0", user, channel)?;

        Ok(Self {
            name: name.to_string(),
            version,
            user: user.to_string(),
            channel: channel.to_string(),
        })
    }

    /// Whether a resolved reference satisfies this requirement
    pub fn admits(&self, reference: &Reference) -> bool {
        self.name == reference.name
            && self.user == reference.user
            && self.channel == reference.channel
            && self.version.admits(&reference.version)
    }

    /// Resolve an exact requirement to a concrete reference
    ///
    /// Ranged requirements need a candidate version list and are resolved
    /// by the graph builder instead.
    pub fn to_reference(&self) -> Option<Result<Reference>> {
        match &self.version {
            VersionSpec::Exact(version) => Some(Reference::new(
                self.name.clone(),
                version.clone(),
                self.user.clone(),
                self.channel.clone(),
            )),
            VersionSpec::Range(_) => None,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}/{}",
            self.name, self.version, self.user, self.channel
        )
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Requirement::parse(s)
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Requirement::parse(&text).map_err(D::Error::custom)
    }
}

/// An option forced by a recipe onto one of its named dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepOption {
    /// Dependency package name the option applies to
    pub dependency: String,
    pub option: String,
    pub value: String,
}

/// Declarative recipe metadata: identity, requirements, configuration axes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeMeta {
    pub name: String,
    pub version: String,
    /// Declared dependencies, in declaration order
    #[serde(default)]
    pub requires: Vec<Requirement>,
    /// Settings axes this recipe consumes (undeclared axes are dropped
    /// from the node's configuration and its identity input)
    #[serde(default)]
    pub settings: Vec<String>,
    /// Axis values pinned by the recipe regardless of the root profile
    #[serde(default)]
    pub pinned_settings: BTreeMap<String, String>,
    /// Default values for this recipe's own options
    #[serde(default)]
    pub default_options: BTreeMap<String, String>,
    /// Options forced onto named dependencies
    #[serde(default)]
    pub dep_options: Vec<DepOption>,
}

impl RecipeMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Declare a requirement from its text form
    pub fn add_require(&mut self, requirement: &str) -> Result<()> {
        self.requires.push(Requirement::parse(requirement)?);
        Ok(())
    }

    /// Declare the settings axes this recipe consumes
    pub fn declare_settings<I, S>(&mut self, axes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings = axes.into_iter().map(Into::into).collect();
    }

    /// Force an option value on a named dependency
    pub fn force_dep_option(
        &mut self,
        dependency: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.dep_options.push(DepOption {
            dependency: dependency.into(),
            option: option.into(),
            value: value.into(),
        });
    }
}
