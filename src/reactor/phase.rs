//! Ordered build phases.
//!
//! Every statement context passes through the four phases in order; the
//! scheduler advances the whole forest one phase at a time, so when a phase's
//! fixed point is reached every context has completed it.

/// One of the four ordered build phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildPhase {
    /// Cross-document linkage: imports resolved, root namespaces populated.
    SourceLinkage,
    /// Statement kind and argument validity established.
    StatementDefinition,
    /// All declared statements, including reuse-contributed ones, exist.
    FullDeclaration,
    /// Grafting, inheritance and effective-statement construction complete.
    EffectiveModel,
}

impl BuildPhase {
    /// All phases, in execution order.
    pub const ORDERED: [BuildPhase; 4] = [
        BuildPhase::SourceLinkage,
        BuildPhase::StatementDefinition,
        BuildPhase::FullDeclaration,
        BuildPhase::EffectiveModel,
    ];

    fn ordinal(self) -> u8 {
        match self {
            BuildPhase::SourceLinkage => 0,
            BuildPhase::StatementDefinition => 1,
            BuildPhase::FullDeclaration => 2,
            BuildPhase::EffectiveModel => 3,
        }
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildPhase::SourceLinkage => "source-linkage",
            BuildPhase::StatementDefinition => "statement-definition",
            BuildPhase::FullDeclaration => "full-declaration",
            BuildPhase::EffectiveModel => "effective-model",
        };
        f.write_str(name)
    }
}

/// Compact set of completed phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PhaseSet(u8);

impl PhaseSet {
    pub(crate) fn empty() -> Self {
        Self(0)
    }

    /// All phases up to and including `phase`.
    pub(crate) fn through(phase: BuildPhase) -> Self {
        let mut set = Self::empty();
        for p in BuildPhase::ORDERED {
            set.insert(p);
            if p == phase {
                break;
            }
        }
        set
    }

    pub(crate) fn insert(&mut self, phase: BuildPhase) {
        self.0 |= 1 << phase.ordinal();
    }

    pub(crate) fn contains(self, phase: BuildPhase) -> bool {
        self.0 & (1 << phase.ordinal()) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_set_through() {
        let set = PhaseSet::through(BuildPhase::StatementDefinition);
        assert!(set.contains(BuildPhase::SourceLinkage));
        assert!(set.contains(BuildPhase::StatementDefinition));
        assert!(!set.contains(BuildPhase::FullDeclaration));
        assert!(!set.contains(BuildPhase::EffectiveModel));
    }

    #[test]
    fn test_phase_order() {
        let mut previous = None;
        for phase in BuildPhase::ORDERED {
            if let Some(prev) = previous {
                assert!(prev < phase);
            }
            previous = Some(phase);
        }
    }
}
