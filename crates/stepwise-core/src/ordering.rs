use std::ops::Bound::{Excluded, Unbounded};

use thiserror::Error;

use crate::catalog::VersionCatalog;
use crate::version::SchemaVersion;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("current version {version} is not present in the version catalog")]
    UnknownCurrentVersion { version: SchemaVersion },
    #[error("no migration path from {from} to {to} in the version catalog")]
    VersionUnreachable {
        from: SchemaVersion,
        to: SchemaVersion,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn between(from: &SchemaVersion, to: &SchemaVersion) -> Option<Self> {
        match from.cmp(to) {
            std::cmp::Ordering::Less => Some(Self::Ascending),
            std::cmp::Ordering::Greater => Some(Self::Descending),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "up",
            Self::Descending => "down",
        }
    }
}

/// A single transition between adjacent versions.
///
/// `step` names the catalog entry whose handler runs: the version arrived at
/// when ascending, the version being left when descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub step: SchemaVersion,
    pub direction: Direction,
}

/// Smallest catalog version strictly greater than `version`.
pub fn next_version<'a>(
    catalog: &'a VersionCatalog,
    version: &SchemaVersion,
) -> Option<&'a SchemaVersion> {
    catalog
        .versions()
        .range((Excluded(version), Unbounded))
        .next()
        .map(|(key, _)| key)
}

/// Largest catalog version strictly less than `version`.
pub fn prev_version<'a>(
    catalog: &'a VersionCatalog,
    version: &SchemaVersion,
) -> Option<&'a SchemaVersion> {
    catalog
        .versions()
        .range(..version)
        .next_back()
        .map(|(key, _)| key)
}

pub fn max_version(catalog: &VersionCatalog) -> Option<&SchemaVersion> {
    catalog.versions().keys().next_back()
}

/// Resolves the hop that moves `from` one position toward `to`, or `None`
/// when the two are already equal.
///
/// The sentinel version is a valid position in every chain without being a
/// catalog key.
pub fn next_hop(
    catalog: &VersionCatalog,
    from: &SchemaVersion,
    to: &SchemaVersion,
) -> Result<Option<Hop>, GraphError> {
    let Some(direction) = Direction::between(from, to) else {
        return Ok(None);
    };

    if !from.is_sentinel() && !catalog.contains(from) {
        return Err(GraphError::UnknownCurrentVersion {
            version: from.clone(),
        });
    }
    if !to.is_sentinel() && !catalog.contains(to) {
        return Err(unreachable(from, to));
    }

    let hop = match direction {
        Direction::Ascending => {
            let arrival = next_version(catalog, from).ok_or_else(|| unreachable(from, to))?;
            Hop {
                from: from.clone(),
                to: arrival.clone(),
                step: arrival.clone(),
                direction,
            }
        }
        Direction::Descending => {
            let arrival = match prev_version(catalog, from) {
                Some(version) => version.clone(),
                None if to.is_sentinel() => SchemaVersion::sentinel(),
                None => return Err(unreachable(from, to)),
            };
            Hop {
                from: from.clone(),
                to: arrival,
                step: from.clone(),
                direction,
            }
        }
    };

    Ok(Some(hop))
}

/// Every hop between `from` and `to`, in execution order.
pub fn plan_hops(
    catalog: &VersionCatalog,
    from: &SchemaVersion,
    to: &SchemaVersion,
) -> Result<Vec<Hop>, GraphError> {
    let mut hops = Vec::new();
    let mut current = from.clone();

    while let Some(hop) = next_hop(catalog, &current, to)? {
        if hops.len() > catalog.len() {
            return Err(unreachable(from, to));
        }
        current = hop.to.clone();
        hops.push(hop);
    }

    Ok(hops)
}

fn unreachable(from: &SchemaVersion, to: &SchemaVersion) -> GraphError {
    GraphError::VersionUnreachable {
        from: from.clone(),
        to: to.clone(),
    }
}
