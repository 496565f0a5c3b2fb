//! Supported-feature sets.
//!
//! An optional capability (`feature` statement) prunes statements gated on it
//! (`if-feature`) when the capability is not in the build's supported set.
//! Pruning is not an error; it is the only graceful partial outcome a build
//! has.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

/// The set of optional capabilities a build treats as supported.
#[derive(Debug, Clone)]
pub enum FeatureSet {
    /// Every declared feature is supported.
    All,
    /// Only the listed features are supported.
    Explicit(FxHashSet<SmolStr>),
}

impl FeatureSet {
    pub fn all() -> Self {
        FeatureSet::All
    }

    pub fn none() -> Self {
        FeatureSet::Explicit(FxHashSet::default())
    }

    pub fn explicit<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        FeatureSet::Explicit(features.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, feature: &str) -> bool {
        match self {
            FeatureSet::All => true,
            FeatureSet::Explicit(set) => set.contains(feature),
        }
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        FeatureSet::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_contains_everything() {
        let features = FeatureSet::all();
        assert!(features.contains("anything"));
    }

    #[test]
    fn test_explicit_set() {
        let features = FeatureSet::explicit(["metrics", "history"]);
        assert!(features.contains("metrics"));
        assert!(!features.contains("tracing"));
        assert!(!FeatureSet::none().contains("metrics"));
    }
}
