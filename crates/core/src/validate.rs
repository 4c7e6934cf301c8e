use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::AssetId;
use crate::index::AssetIndex;
use crate::merge::{ResolutionError, resolve_all};

/// Two or more live assets claiming the same fqn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FqnCollision {
    pub fqn: String,
    pub ids: Vec<AssetId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedAsset {
    pub id: AssetId,
    pub fqn: String,
    pub error: ResolutionError,
}

/// Every problem found in a prospective asset set. An asset set is
/// committable only when the report is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub collisions: Vec<FqnCollision>,
    pub unresolved: Vec<UnresolvedAsset>,
    pub key_mismatches: Vec<AssetId>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty() && self.unresolved.is_empty() && self.key_mismatches.is_empty()
    }

    pub fn problem_count(&self) -> usize {
        self.collisions.len() + self.unresolved.len() + self.key_mismatches.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s)", self.problem_count())?;
        for collision in &self.collisions {
            write!(f, "; fqn {} used by {} assets", collision.fqn, collision.ids.len())?;
        }
        for unresolved in &self.unresolved {
            write!(f, "; {}", unresolved.error)?;
        }
        for id in &self.key_mismatches {
            write!(f, "; asset {id} key does not match its fqn")?;
        }
        Ok(())
    }
}

/// Check fqn uniqueness, key/fqn agreement and full resolution of every asset
/// in `index`.
pub fn validate_asset_set(index: &AssetIndex) -> ValidationReport {
    let collisions = index
        .fqn_collisions()
        .into_iter()
        .map(|(fqn, ids)| FqnCollision { fqn, ids })
        .collect();

    let key_mismatches = index
        .iter()
        .filter(|asset| asset.check_key().is_err())
        .map(|asset| asset.id)
        .collect();

    let unresolved = resolve_all(index)
        .into_iter()
        .filter_map(|(id, result)| {
            let error = result.err()?;
            let fqn = index.get(id).map(|a| a.fqn.clone()).unwrap_or_default();
            Some(UnresolvedAsset { id, fqn, error })
        })
        .collect();

    ValidationReport {
        collisions,
        unresolved,
        key_mismatches,
    }
}
