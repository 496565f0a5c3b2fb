//! # The statement build reactor
//!
//! Transforms a forest of raw statement trees into a single cross-referenced
//! effective model by driving every statement context through four ordered
//! build phases to a fixed point. Declarations may reference each other in
//! any order and across document boundaries; the reactor discovers a valid
//! evaluation order itself through prerequisites, blocking obligations and
//! deferred inference actions.

pub mod action;
pub mod context;
pub mod errors;
mod hooks;
mod linker;
pub mod namespace;
pub mod phase;
mod scheduler;
pub mod session;
mod tree;

pub use action::{ActionBuilder, ActionContext, ActionId, InferenceAction, Prereq, Resolution};
pub use context::{CopyHistory, CtxId};
pub use errors::{BuildError, BuildFailure};
pub use namespace::{NamespaceBehaviour, NamespaceId, NsValue};
pub use phase::BuildPhase;
pub use session::BuildSession;
