use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use semver::Prerelease;
use thiserror::Error;

pub const SENTINEL_VERSION: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid schema version '{raw}': {reason}")]
    Invalid { raw: String, reason: String },
}

/// A schema version as written in catalogs and version records.
///
/// Any number of dot-separated numeric segments is accepted and compared
/// segment by segment, with trailing zero segments ignored, so `"1.0"` and
/// `"1.0.0"` name the same version, `"1.01"` equals `"1.1"`, and `"2.0"`
/// sorts above `"1.20"`. An optional `-pre` suffix orders below the bare
/// numeric version using semver pre-release rules; a `+build` suffix is
/// kept in the raw text but ignored for comparison. The raw text is
/// preserved for display and persistence.
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    raw: String,
    segments: Vec<u64>,
    pre: Prerelease,
}

impl SchemaVersion {
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| VersionError::Invalid {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("must not be empty"));
        }

        let without_build = match trimmed.split_once('+') {
            Some((head, build)) => {
                if build.is_empty() {
                    return Err(invalid("build suffix must not be empty"));
                }
                head
            }
            None => trimmed,
        };
        let (numeric, pre) = match without_build.split_once('-') {
            Some((numeric, pre)) => {
                let pre = Prerelease::new(pre)
                    .map_err(|err| invalid(&format!("invalid pre-release suffix: {err}")))?;
                if pre.is_empty() {
                    return Err(invalid("pre-release suffix must not be empty"));
                }
                (numeric, pre)
            }
            None => (without_build, Prerelease::EMPTY),
        };

        let mut segments = Vec::new();
        for segment in numeric.split('.') {
            if segment.is_empty() || !segment.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(invalid("segments must be unsigned integers"));
            }
            let value = segment
                .parse::<u64>()
                .map_err(|_| invalid("segment is too large"))?;
            segments.push(value);
        }
        while segments.last() == Some(&0) {
            segments.pop();
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
            pre,
        })
    }

    pub fn sentinel() -> Self {
        Self {
            raw: SENTINEL_VERSION.to_string(),
            segments: Vec::new(),
            pre: Prerelease::EMPTY,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric segments with trailing zeros removed; empty for the sentinel.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn pre_release(&self) -> &Prerelease {
        &self.pre
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::sentinel()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.pre == other.pre
    }
}

impl Eq for SchemaVersion {}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Slice ordering is lexicographic with shorter-is-smaller, which is
        // segment-wise comparison once trailing zeros are gone.
        self.segments
            .cmp(&other.segments)
            .then_with(|| self.pre.cmp(&other.pre))
    }
}

impl Hash for SchemaVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
        self.pre.hash(state);
    }
}
