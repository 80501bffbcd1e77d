// src/reference.rs

//! Recipe and package naming
//!
//! A [`Reference`] names a recipe independent of build configuration using
//! the format `name/version@user/channel`, e.g. `Hello/0.1@lasote/testing`.
//! A [`PackageReference`] pairs a reference with the [`PackageId`]
//! fingerprint of one concrete build configuration; it is the cache store's
//! primary key and renders as `name/version@user/channel:fingerprint`.
//!
//! Names may contain dots and hyphens (`Hello.Pkg`, `Hello-Tools`) and must
//! round-trip exactly through parsing and indexed info lookups.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

fn valid_component(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
}

/// Immutable recipe identity: (name, version, user, channel)
///
/// Created at recipe export time; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub version: String,
    pub user: String,
    pub channel: String,
}

impl Reference {
    /// Create a reference, validating each component
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        user: impl Into<String>,
        channel: impl Into<String>,
    ) -> Result<Self> {
        let reference = Self {
            name: name.into(),
            version: version.into(),
            user: user.into(),
            channel: channel.into(),
        };
        for (label, value) in [
            ("name", &reference.name),
            ("version", &reference.version),
            ("user", &reference.user),
            ("channel", &reference.channel),
        ] {
            if !valid_component(value) {
                return Err(Error::Parse(format!(
                    "invalid {} component '{}' in reference",
                    label, value
                )));
            }
        }
        Ok(reference)
    }

    /// Reference for the invoker's own working-tree recipe
    ///
    /// Consumer nodes are never exported or cached; the placeholder
    /// user/channel marks them as local.
    pub fn consumer(name: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        Self::new(name, version, "_", "_")
    }

    /// Parse `name/version@user/channel`
    pub fn parse(s: &str) -> Result<Self> {
        let (pkg, origin) = s
            .split_once('@')
            .ok_or_else(|| Error::Parse(format!("reference '{}' is missing '@'", s)))?;
        let (name, version) = pkg
            .split_once('/')
            .ok_or_else(|| Error::Parse(format!("reference '{}' is missing name/version", s)))?;
        let (user, channel) = origin
            .split_once('/')
            .ok_or_else(|| Error::Parse(format!("reference '{}' is missing user/channel", s)))?;
        Self::new(name, version, user, channel)
    }

    /// Relative directory layout used by the cache store:
    /// `name/version/user/channel`
    pub fn dir_path(&self) -> PathBuf {
        PathBuf::from(&self.name)
            .join(&self.version)
            .join(&self.user)
            .join(&self.channel)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}/{}",
            self.name, self.version, self.user, self.channel
        )
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Reference::parse(s)
    }
}

/// Opaque fixed-length package identity fingerprint
///
/// 64 lowercase hex characters (SHA-256). Two nodes with equal
/// [`Reference`] but different `PackageId` are different binary artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Expected hex digest length
    pub const HEX_LEN: usize = 64;

    /// Wrap a hex digest, validating length and character set
    pub fn new(digest: impl Into<String>) -> Result<Self> {
        let digest: String = digest.into();
        if digest.len() != Self::HEX_LEN || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Parse(format!(
                "invalid package identity '{}': expected {} hex characters",
                digest,
                Self::HEX_LEN
            )));
        }
        Ok(Self(digest.to_lowercase()))
    }

    /// Digest as a hex string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cache primary key: a reference plus the identity of one built artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageReference {
    pub reference: Reference,
    pub package_id: PackageId,
}

impl PackageReference {
    pub fn new(reference: Reference, package_id: PackageId) -> Self {
        Self {
            reference,
            package_id,
        }
    }

    /// Parse `name/version@user/channel:fingerprint`
    pub fn parse(s: &str) -> Result<Self> {
        let (reference, id) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Parse(format!("package reference '{}' is missing ':'", s)))?;
        Ok(Self {
            reference: Reference::parse(reference)?,
            package_id: PackageId::new(id)?,
        })
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.reference, self.package_id)
    }
}

impl FromStr for PackageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PackageReference::parse(s)
    }
}
