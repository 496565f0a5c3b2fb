//! # Raw statement trees
//!
//! The input surface of the reactor. An upstream producer (lexer/parser,
//! out of scope for this crate) hands over one [`RawDocument`] per source
//! document: a nested tree of keyword + argument statements with source
//! locations. The reactor performs no text parsing beyond resolving the
//! argument string of each statement against its kind's argument shape.

use smol_str::SmolStr;

use crate::base::Span;

/// One raw statement occurrence: keyword, optional argument text, location,
/// nested substatements in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    pub keyword: SmolStr,
    pub argument: Option<SmolStr>,
    pub span: Span,
    pub substatements: Vec<RawStatement>,
}

impl RawStatement {
    pub fn new(keyword: impl Into<SmolStr>, argument: Option<SmolStr>, span: Span) -> Self {
        Self {
            keyword: keyword.into(),
            argument,
            span,
            substatements: Vec::new(),
        }
    }

    pub fn with_substatements(mut self, substatements: Vec<RawStatement>) -> Self {
        self.substatements = substatements;
        self
    }

    /// Total number of statements in this subtree, including self.
    pub fn statement_count(&self) -> usize {
        1 + self
            .substatements
            .iter()
            .map(RawStatement::statement_count)
            .sum::<usize>()
    }
}

/// One source document: a single top-level statement tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub root: RawStatement,
}

impl RawDocument {
    pub fn new(root: RawStatement) -> Self {
        Self { root }
    }
}
