//! # Schema-language model
//!
//! Statement kinds and their grammar, the supported-feature set, and the
//! immutable effective model produced by a successful build.

pub mod effective;
pub mod features;
pub mod grammar;
pub mod kind;

pub use effective::{EffectiveModel, EffectiveStatement, StmtId};
pub use features::FeatureSet;
pub use grammar::{ArgumentShape, Cardinality, GrammarViolation, SubstatementRule};
pub use kind::{ArgValue, StatementKind};
