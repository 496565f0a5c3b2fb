//! Foundation types for the stratum toolchain.
//!
//! This module provides fundamental types used throughout the reactor:
//! - [`DocId`] - Identifier of a source document within one build
//! - [`Position`], [`Span`] - Line/column source locations for statements
//!
//! This module has NO dependencies on other stratum modules.

mod doc_id;
mod position;

pub use doc_id::DocId;
pub use position::{Position, Span};
