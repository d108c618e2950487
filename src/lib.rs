//! A composable SQL query builder and dialect-aware compiler.
//!
//! Statements are built up from immutable, cheaply-cloned AST nodes
//! ([`ast::Stmt`], [`ast::Expr`]) through a fluent builder surface, then
//! rendered to SQL text by a [`Compiler`] bound to a target [`Dialect`].
//! Building a statement never touches a dialect; only [`Compiler::compile`]
//! does, which is what lets the same [`ast::Stmt`] tree be rendered against
//! several dialects without rebuilding it.
//!
//! ```
//! use sqeleton::ast::table;
//! use sqeleton::dialect::mock::MockDialect;
//! use sqeleton::Compiler;
//!
//! let stmt = table("point").select(["x", "y"]).unwrap();
//!
//! let dialect = MockDialect;
//! let compiler = Compiler::new(&dialect);
//! assert_eq!(compiler.compile(&stmt).unwrap(), "SELECT x, y FROM point");
//! ```

pub mod ast;
pub mod compiler;
pub mod dialect;
pub mod error;
pub mod schema;

pub use compiler::Compiler;
pub use dialect::Dialect;
pub use error::{Result, SqlGenError};
pub use schema::{ColumnType, Schema};
