//! The AST: [`expr`] holds value-producing nodes, [`stmt`] holds the
//! relational statement nodes built on top of them.

pub mod expr;
pub mod stmt;

pub use expr::{
    and_all, concat, or_all, random, this, when, AggKind, BinOpKind, CastType, CaseThenBuilder,
    CaseWhenBuilder, Expr, Literal, This, UnaryOpKind,
};
pub use stmt::{
    cte, inner_join, left_join, outerjoin, right_join, table, table_with_schema, CteNode,
    GroupBy, JoinBuilder, JoinKind, JoinNode, OrderByItem, Projection, SelectItem, SelectNode,
    Stmt, TableRef,
};
