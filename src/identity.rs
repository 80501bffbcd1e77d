// src/identity.rs

//! Package identity computation
//!
//! The identity of a node is a SHA-256 fingerprint of a canonical text
//! rendering of its resolved configuration:
//!
//! ```text
//! [settings]
//! arch=x86_64
//! os=Linux
//! [options]
//! shared=False
//! [requires]
//! Hello/0.1@lasote/testing:<id>
//! ```
//!
//! Canonicalization rules:
//! - settings and options render in sorted axis order, so insertion order
//!   never changes the identity
//! - unset/empty axes are never rendered (they cannot be stored, see
//!   [`Settings::set`](crate::settings::Settings::set)), so a recipe that
//!   narrows its axis set does not drift
//! - dependency package references are sorted by their full textual form;
//!   declared order matters for info propagation but not for identity
//! - axis values are opaque strings; hashing never fails

use crate::hash::sha256;
use crate::reference::{PackageId, PackageReference};
use crate::settings::{Options, Settings};
use tracing::trace;

/// Compute the identity fingerprint for one node's resolved configuration
///
/// Pure function of (settings, options, dependency package references):
/// identical inputs yield the identical identity on any machine.
pub fn compute(settings: &Settings, options: &Options, requires: &[PackageReference]) -> PackageId {
    let mut canonical = String::new();

    canonical.push_str("[settings]\n");
    for (axis, value) in settings.iter() {
        canonical.push_str(axis);
        canonical.push('=');
        canonical.push_str(value);
        canonical.push('\n');
    }

    canonical.push_str("[options]\n");
    for (option, value) in options.iter() {
        canonical.push_str(option);
        canonical.push('=');
        canonical.push_str(value);
        canonical.push('\n');
    }

    canonical.push_str("[requires]\n");
    let mut lines: Vec<String> = requires.iter().map(|p| p.to_string()).collect();
    lines.sort();
    for line in lines {
        canonical.push_str(&line);
        canonical.push('\n');
    }

    trace!("identity input:\n{}", canonical);

    let digest = sha256(canonical.as_bytes());
    PackageId::new(digest).unwrap_or_else(|_| unreachable!("sha256 always yields 64 hex chars"))
}
