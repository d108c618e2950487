//! Schema containers: case-sensitive and case-insensitive column → type maps.
//!
//! A [`Schema`] is attached to a base [`crate::ast::TableRef`] and propagated
//! through projections (see [`Schema::project`]) so that out-of-schema column
//! access is caught at build time rather than silently rendered and left for
//! the database to reject.

use std::collections::HashMap;

use crate::error::{Result, SqlGenError};

/// A coarse SQL type tag. The compiler does not use this for anything beyond
/// carrying it through projections; type checking against a live catalog is
/// explicitly out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Str,
    Timestamp,
    Unknown,
}

/// A column name → type map, tagged with the case policy used to resolve
/// lookups against it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Schema {
    /// Lookups must match a stored key byte-for-byte.
    CaseSensitive(HashMap<String, ColumnType>),
    /// Lookups are folded to lowercase before matching; stored keys are
    /// themselves lowercase, so a resolved lookup always yields the
    /// lowercase spelling regardless of how it was requested.
    CaseInsensitive(HashMap<String, ColumnType>),
}

impl Schema {
    pub fn case_sensitive<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Schema::CaseSensitive(columns.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn case_insensitive<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Schema::CaseInsensitive(
            columns
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v))
                .collect(),
        )
    }

    /// Resolves `name` against this schema, returning the canonical spelling
    /// stored in the map (identical to `name` for case-sensitive schemas,
    /// the lowercase form for case-insensitive ones).
    ///
    /// `source` is carried only for the error message.
    pub fn resolve(&self, name: &str, source: &str) -> Result<String> {
        match self {
            Schema::CaseSensitive(map) => {
                if map.contains_key(name) {
                    Ok(name.to_string())
                } else {
                    Err(SqlGenError::SchemaMiss {
                        source: source.to_string(),
                        column: name.to_string(),
                    })
                }
            }
            Schema::CaseInsensitive(map) => {
                let folded = name.to_lowercase();
                if map.contains_key(&folded) {
                    Ok(folded)
                } else {
                    Err(SqlGenError::SchemaMiss {
                        source: source.to_string(),
                        column: name.to_string(),
                    })
                }
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name, "").is_ok()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        match self {
            Schema::CaseSensitive(map) => map.get(name).copied(),
            Schema::CaseInsensitive(map) => map.get(&name.to_lowercase()).copied(),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        match self {
            Schema::CaseSensitive(map) => map.keys().map(String::as_str),
            Schema::CaseInsensitive(map) => map.keys().map(String::as_str),
        }
    }

    /// Builds the schema exposed by a projection: always case-sensitive,
    /// since the names here are ones *we* computed (output aliases or
    /// pass-through column names), not ones a database reports back.
    pub fn project<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Schema::case_sensitive(names)
    }
}
