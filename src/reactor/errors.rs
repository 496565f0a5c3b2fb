//! Error types for the build reactor.
//!
//! A build never fails on the first defect: independent failures discovered
//! up to the failing phase's fixed point are aggregated into one
//! [`BuildFailure`] so multiple problems can be fixed in one iteration.

use smol_str::SmolStr;
use thiserror::Error;

use crate::base::{DocId, Span};
use crate::model::StatementKind;

use super::namespace::NamespaceId;
use super::phase::BuildPhase;

/// One independent defect discovered during a build.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// Malformed raw input, rejected before the reactor starts.
    #[error("unknown statement keyword '{keyword}' in {doc} at {span}")]
    UnknownKeyword {
        keyword: SmolStr,
        doc: DocId,
        span: Span,
    },

    /// A document root must be a schema statement.
    #[error("document root must be 'schema', found '{kind}' in {doc} at {span}")]
    BadDocumentRoot {
        kind: StatementKind,
        doc: DocId,
        span: Span,
    },

    /// A namespace key was rebound to a different value.
    #[error("duplicate key '{key}' in namespace {ns} already bound to a different value")]
    DuplicateKey { ns: NamespaceId, key: SmolStr },

    /// A write was attempted against a derived (read-through) namespace.
    #[error("namespace {ns} is derived and cannot be written to")]
    ReadOnlyNamespace { ns: NamespaceId },

    /// A statement violates its kind's substatement grammar or argument shape.
    #[error("grammar error in {statement}: {violation}")]
    Grammar {
        statement: String,
        violation: String,
    },

    /// An action's prerequisite was never satisfied.
    #[error("unresolved reference: {action} requires {requirement}, required by {statement}")]
    Unresolved {
        /// What the owning action was trying to do.
        action: String,
        /// The unmet prerequisite, e.g. a namespace key at a phase.
        requirement: String,
        /// The statement that registered the action.
        statement: String,
    },

    /// A context was still short of the target phase at the fixed point.
    #[error("{statement} stuck below phase {phase}{blockers}")]
    StuckContext {
        statement: String,
        phase: BuildPhase,
        /// Pre-rendered ", blocked by ..." suffix; empty when unknown.
        blockers: String,
    },

    /// Raised by custom inference actions.
    #[error("{0}")]
    Action(String),
}

impl BuildError {
    /// Convenience constructor for custom action failures.
    pub fn action(message: impl Into<String>) -> Self {
        BuildError::Action(message.into())
    }
}

/// Aggregate failure of one build: every independent defect discovered by the
/// time progress stalled, not just the first.
#[derive(Debug, Error)]
#[error("build failed during {phase}: {} error(s)", .errors.len())]
pub struct BuildFailure {
    pub phase: BuildPhase,
    pub errors: Vec<BuildError>,
}

impl BuildFailure {
    pub fn new(phase: BuildPhase, errors: Vec<BuildError>) -> Self {
        Self { phase, errors }
    }
}
