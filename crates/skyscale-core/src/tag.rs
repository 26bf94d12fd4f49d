//! Cloud routing tags.
//!
//! Jobs arrive with free-form tag strings (`"aws"`, `"metapipe-csc"`, ...).
//! `CloudTag::resolve` maps such a string onto one of the configured clouds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A cloud or cluster that jobs can be routed to.
///
/// The derived `Ord` is the deterministic tie-break order used wherever the
/// scheduler has to choose between otherwise equal clouds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudTag {
    Aws,
    Csc,
    Metapipe,
}

/// Outcome of resolving a raw tag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagResolution {
    /// Empty tag: the scheduler picks a cloud.
    Unassigned,
    /// Routed to a known cloud.
    Cloud(CloudTag),
    /// Non-empty but matches no known cloud.
    Undefined,
}

impl CloudTag {
    pub const ALL: [CloudTag; 3] = [CloudTag::Aws, CloudTag::Csc, CloudTag::Metapipe];

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudTag::Aws => "aws",
            CloudTag::Csc => "csc",
            CloudTag::Metapipe => "metapipe",
        }
    }

    /// Resolve a raw tag by substring match against the `known` clouds.
    ///
    /// `aws` and `csc` are checked first. A `metapipe` match only counts when
    /// the string contains neither of the others, so compound tags such as
    /// `"metapipe-aws"` route to the provider rather than the home cluster.
    pub fn resolve(raw: &str, known: &[CloudTag]) -> TagResolution {
        if raw.is_empty() {
            return TagResolution::Unassigned;
        }
        let has = |tag: CloudTag| raw.contains(tag.as_str());

        for tag in [CloudTag::Aws, CloudTag::Csc] {
            if known.contains(&tag) && has(tag) {
                return TagResolution::Cloud(tag);
            }
        }
        if known.contains(&CloudTag::Metapipe)
            && has(CloudTag::Metapipe)
            && !has(CloudTag::Aws)
            && !has(CloudTag::Csc)
        {
            return TagResolution::Cloud(CloudTag::Metapipe);
        }
        TagResolution::Undefined
    }
}

impl fmt::Display for CloudTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudTag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(CloudTag::Aws),
            "csc" => Ok(CloudTag::Csc),
            "metapipe" => Ok(CloudTag::Metapipe),
            other => Err(ConfigError::UnknownTag(other.to_string())),
        }
    }
}
