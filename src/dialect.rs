//! The [`Dialect`] trait: the narrow capability interface the compiler
//! consumes for everything vendor-specific. Concrete dialects (Postgres,
//! DuckDB, Snowflake, ...) live outside this crate; only the reference
//! [`mock::MockDialect`] used by the test suite ships here.

use chrono::{DateTime, Utc};

/// Hooks a target SQL dialect must provide. Object-safe so a `Compiler` can
/// hold a `&dyn Dialect` without committing callers to a generic parameter.
pub trait Dialect: std::fmt::Debug {
    /// Quotes an identifier, e.g. a column or table name, per this
    /// dialect's quoting convention. Dialects that never quote (like the
    /// mock dialect) simply return `name` unchanged.
    fn quote(&self, name: &str) -> String;

    /// Renders a multi-argument string concatenation.
    fn concat(&self, parts: &[String]) -> String;

    /// Renders an expression cast to text.
    fn to_string_cast(&self, expr: &str) -> String;

    /// Renders a null-safe inequality check between two rendered operands.
    fn is_distinct_from(&self, a: &str, b: &str) -> String;

    /// Renders a random-value expression, e.g. `random()`.
    fn random(&self) -> String;

    /// Renders the trailing `OFFSET`/`LIMIT` clause. Either argument may be
    /// absent; an absent pair renders as the empty string.
    fn offset_limit(&self, offset: Option<i64>, limit: Option<i64>) -> String;

    /// Wraps a rendered statement in this dialect's `EXPLAIN` syntax.
    fn explain_as_text(&self, query: &str) -> String;

    /// Renders a timestamp literal.
    fn timestamp_value(&self, t: &DateTime<Utc>) -> String;

    /// Whether numeric coercions in this dialect round on precision loss
    /// (vs. truncating). The compiler itself never branches on this; it's
    /// threaded through for callers doing numeric comparisons across
    /// differently-typed columns.
    fn rounds_on_precision_loss(&self) -> bool;
}

pub mod mock {
    //! The literal reference dialect used throughout this crate's own test
    //! suite: no quoting, uppercase SQL keywords, positional `GROUP BY`.
    //! Mirrors `MockDialect` from the original Python test suite this crate
    //! was ported from.

    use super::Dialect;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone, Copy, Default)]
    pub struct MockDialect;

    impl Dialect for MockDialect {
        fn quote(&self, name: &str) -> String {
            name.to_string()
        }

        fn concat(&self, parts: &[String]) -> String {
            format!("concat({})", parts.join(", "))
        }

        fn to_string_cast(&self, expr: &str) -> String {
            format!("cast({} as varchar)", expr)
        }

        fn is_distinct_from(&self, a: &str, b: &str) -> String {
            format!("{} is distinct from {}", a, b)
        }

        fn random(&self) -> String {
            "random()".to_string()
        }

        fn offset_limit(&self, offset: Option<i64>, limit: Option<i64>) -> String {
            let mut parts = Vec::new();
            if let Some(offset) = offset {
                parts.push(format!("OFFSET {}", offset));
            }
            if let Some(limit) = limit {
                parts.push(format!("LIMIT {}", limit));
            }
            parts.join(" ")
        }

        fn explain_as_text(&self, query: &str) -> String {
            format!("explain {}", query)
        }

        fn timestamp_value(&self, t: &DateTime<Utc>) -> String {
            format!("timestamp '{}'", t)
        }

        fn rounds_on_precision_loss(&self) -> bool {
            false
        }
    }
}
