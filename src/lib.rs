//! # stratum-base
//!
//! Core library for semantic analysis of a declarative schema-definition
//! language: a multi-phase statement build reactor that turns a forest of raw
//! statement trees into one fully cross-referenced, immutable effective model.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! reactor   → build phases, context tree, namespaces, action engine, scheduler
//!   ↓
//! model     → statement kinds, grammar tables, feature set, effective model
//!   ↓
//! raw       → raw statement trees (input collaborator surface)
//!   ↓
//! base      → primitives (DocId, Position, Span)
//! ```
//!
//! Lexical parsing of source text and consumption of the finished model
//! (code generation, data codecs) are external collaborators: the crate takes
//! already-parsed raw statement trees and hands back an [`EffectiveModel`].

// ============================================================================
// MODULES (dependency order: base → raw → model → reactor)
// ============================================================================

/// Foundation types: DocId, Position, Span
pub mod base;

/// Raw statement trees as supplied by an upstream producer
pub mod raw;

/// Statement kinds, grammar tables, feature set, effective model
pub mod model;

/// The build reactor: context tree, namespaces, action engine, scheduler
pub mod reactor;

// Re-export foundation types
pub use base::{DocId, Position, Span};

// Re-export the external surface
pub use model::{ArgValue, EffectiveModel, EffectiveStatement, FeatureSet, StatementKind, StmtId};
pub use raw::{RawDocument, RawStatement};
pub use reactor::{
    ActionBuilder, BuildError, BuildFailure, BuildPhase, BuildSession, CtxId, InferenceAction,
    NamespaceId, Prereq, Resolution,
};
