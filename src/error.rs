//! Error kinds surfaced by the builder and the compiler.
//!
//! Every failure in this crate is either a build-time error (raised while
//! composing AST nodes, e.g. a schema miss) or a compile-time error (raised
//! while rendering SQL text, e.g. an ambiguous column reference). Both are
//! represented by the same [`SqlGenError`] enum since callers generally want
//! to handle them uniformly: there is no recovery path for either.

use thiserror::Error;

/// The crate's single error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqlGenError {
    /// A column was looked up against a schema-bound source and not found.
    #[error("column `{column}` not found in schema of `{source}`")]
    SchemaMiss { source: String, column: String },

    /// A deferred column reference (`this.x`) could not be resolved against
    /// the scope established by the enclosing statement's source.
    #[error("column `{column}` could not be resolved in the current scope")]
    ScopeMiss { column: String },

    /// The same unqualified column name is exposed by more than one source
    /// in the current scope (typically both sides of a join).
    #[error("column `{column}` is ambiguous: present in {sources:?}")]
    AmbiguousReference {
        column: String,
        sources: Vec<String>,
    },

    /// A structural rule was violated: `HAVING` without `GROUP BY`, an
    /// `.else_()` applied to a `CASE` that already has one, an empty
    /// projection where one is required, and similar shape errors.
    #[error("{0}")]
    Structural(String),

    /// A node type that the bound dialect does not know how to render.
    #[error("dialect does not support {0}")]
    DialectUnsupported(String),

    /// Propagated from the underlying `std::fmt::Write` buffer. In practice
    /// this only occurs on allocation failure, since we always write into a
    /// `String`.
    #[error("formatting error: {0}")]
    Fmt(String),
}

impl From<std::fmt::Error> for SqlGenError {
    fn from(e: std::fmt::Error) -> Self {
        SqlGenError::Fmt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SqlGenError>;
