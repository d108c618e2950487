// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The expression AST: the polymorphic base of all value-producing nodes.
//!
//! Every combinator here is a plain consuming method or operator overload
//! that returns a new [`Expr`] — nodes are immutable once built, so
//! composition never mutates an existing tree, only grows a new one on top
//! of it.

use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Not, Sub};

use super::stmt::SelectItem;

/// A primitive SQL literal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Rendered through [`crate::dialect::Dialect::timestamp_value`], since
    /// the literal syntax for a timestamp varies by dialect.
    Timestamp(DateTime<Utc>),
    Null,
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}
impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(v as i64)
    }
}
impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}
impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}
impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}
impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Str(v)
    }
}
impl From<DateTime<Utc>> for Literal {
    fn from(v: DateTime<Utc>) -> Self {
        Literal::Timestamp(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

impl BinOpKind {
    pub fn sql_symbol(self) -> &'static str {
        use BinOpKind::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Eq => "=",
            Ne => "<>",
            Lt => "<",
            Lte => "<=",
            Gt => ">",
            Gte => ">=",
            And => "AND",
            Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOpKind {
    Neg,
    Not,
}

/// Aggregate function kind. Rendered uppercase, per the compiler's
/// rendering rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AggKind {
    Sum,
    Count,
    Min,
    Max,
    Avg,
}

impl AggKind {
    pub fn sql_name(self) -> &'static str {
        match self {
            AggKind::Sum => "SUM",
            AggKind::Count => "COUNT",
            AggKind::Min => "MIN",
            AggKind::Max => "MAX",
            AggKind::Avg => "AVG",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CastType {
    Int,
    Float,
    Str,
    Bool,
    Timestamp,
}

/// The expression AST's single polymorphic node type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr {
    /// A column bound to a specific source table/subquery alias (produced
    /// by `tbl.col("x")`, never by a bare `this`).
    Column { name: String, source: Option<String> },
    Literal(Literal),
    BinOp {
        op: BinOpKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expr>,
    },
    Func {
        name: String,
        args: Vec<Expr>,
    },
    /// Multi-argument string concatenation, rendered through
    /// [`crate::dialect::Dialect::concat`] rather than as an ordinary
    /// [`Expr::Func`], since the function name and argument joining differ
    /// across dialects (`concat(a, b)` vs `a || b`).
    Concat(Vec<Expr>),
    Aggregate {
        kind: AggKind,
        operand: Box<Expr>,
        distinct: bool,
    },
    Case {
        branches: Vec<(Expr, Expr)>,
        else_: Option<Box<Expr>>,
    },
    IsDistinctFrom {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Like {
        operand: Box<Expr>,
        pattern: Box<Expr>,
    },
    /// A column referenced by bare name only; resolved against the
    /// enclosing scope at compile time.
    Deferred(String),
    Random,
    Cast {
        operand: Box<Expr>,
        to: CastType,
    },
    /// `<expr> AS <alias>`. Produced by [`Expr::alias`]; never appears
    /// nested inside another expression, only as a top-level projection
    /// item (see [`SelectItem`]).
    Aliased {
        expr: Box<Expr>,
        alias: String,
    },
}

impl Expr {
    pub fn lit(v: impl Into<Literal>) -> Expr {
        Expr::Literal(v.into())
    }

    fn bin(self, op: BinOpKind, rhs: impl Into<Expr>) -> Expr {
        Expr::BinOp {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into()),
        }
    }

    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::Eq, rhs)
    }
    pub fn ne(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::Ne, rhs)
    }
    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::Lt, rhs)
    }
    pub fn lte(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::Lte, rhs)
    }
    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::Gt, rhs)
    }
    pub fn gte(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::Gte, rhs)
    }
    pub fn and(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::And, rhs)
    }
    pub fn or(self, rhs: impl Into<Expr>) -> Expr {
        self.bin(BinOpKind::Or, rhs)
    }

    pub fn sum(self) -> Expr {
        self.aggregate(AggKind::Sum)
    }
    pub fn count(self) -> Expr {
        self.aggregate(AggKind::Count)
    }
    pub fn min(self) -> Expr {
        self.aggregate(AggKind::Min)
    }
    pub fn max(self) -> Expr {
        self.aggregate(AggKind::Max)
    }
    pub fn avg(self) -> Expr {
        self.aggregate(AggKind::Avg)
    }
    fn aggregate(self, kind: AggKind) -> Expr {
        Expr::Aggregate {
            kind,
            operand: Box::new(self),
            distinct: false,
        }
    }
    /// Same as the corresponding aggregate method, but renders
    /// `<FN>(DISTINCT <operand>)`.
    pub fn sum_distinct(self) -> Expr {
        Expr::Aggregate {
            kind: AggKind::Sum,
            operand: Box::new(self),
            distinct: true,
        }
    }
    pub fn count_distinct(self) -> Expr {
        Expr::Aggregate {
            kind: AggKind::Count,
            operand: Box::new(self),
            distinct: true,
        }
    }

    pub fn is_distinct_from(self, rhs: impl Into<Expr>) -> Expr {
        Expr::IsDistinctFrom {
            lhs: Box::new(self),
            rhs: Box::new(rhs.into()),
        }
    }

    pub fn like(self, pattern: impl Into<Expr>) -> Expr {
        Expr::Like {
            operand: Box::new(self),
            pattern: Box::new(pattern.into()),
        }
    }

    pub fn cast(self, to: CastType) -> Expr {
        Expr::Cast {
            operand: Box::new(self),
            to,
        }
    }

    /// Wraps this expression with an output alias, producing a
    /// [`SelectItem`] (`<expr> AS <name>`) suitable for a projection list.
    pub fn alias(self, name: impl Into<String>) -> SelectItem {
        SelectItem::Aliased(self, name.into())
    }

    pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Func {
            name: name.into(),
            args,
        }
    }
}

/// Dialect-aware string concatenation of `parts`, rendered through
/// [`crate::dialect::Dialect::concat`].
pub fn concat(parts: Vec<Expr>) -> Expr {
    Expr::Concat(parts)
}

impl<T: Into<Expr>> Add<T> for Expr {
    type Output = Expr;
    fn add(self, rhs: T) -> Expr {
        self.bin(BinOpKind::Add, rhs)
    }
}
impl<T: Into<Expr>> Sub<T> for Expr {
    type Output = Expr;
    fn sub(self, rhs: T) -> Expr {
        self.bin(BinOpKind::Sub, rhs)
    }
}
impl<T: Into<Expr>> Mul<T> for Expr {
    type Output = Expr;
    fn mul(self, rhs: T) -> Expr {
        self.bin(BinOpKind::Mul, rhs)
    }
}
impl<T: Into<Expr>> Div<T> for Expr {
    type Output = Expr;
    fn div(self, rhs: T) -> Expr {
        self.bin(BinOpKind::Div, rhs)
    }
}
impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOpKind::Neg,
            operand: Box::new(self),
        }
    }
}
impl Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOpKind::Not,
            operand: Box::new(self),
        }
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Expr {
        Expr::Literal(v.into())
    }
}
impl From<i32> for Expr {
    fn from(v: i32) -> Expr {
        Expr::Literal(v.into())
    }
}
impl From<f64> for Expr {
    fn from(v: f64) -> Expr {
        Expr::Literal(v.into())
    }
}
impl From<bool> for Expr {
    fn from(v: bool) -> Expr {
        Expr::Literal(v.into())
    }
}
impl From<&str> for Expr {
    fn from(v: &str) -> Expr {
        Expr::Literal(v.into())
    }
}
impl From<String> for Expr {
    fn from(v: String) -> Expr {
        Expr::Literal(v.into())
    }
}

/// A dialect-dependent random-value expression, e.g. `random()`.
pub fn random() -> Expr {
    Expr::Random
}

/// The `this` sentinel: a zero-sized factory for deferred column lookups.
/// Rust has no dynamic attribute access, so `this.X` from the original API
/// becomes `this.col("X")` here; `.col()` is the single stable spelling for
/// both the attribute-access and subscript surface syntax the source
/// library exposed.
#[derive(Debug, Clone, Copy, Default)]
pub struct This;

impl This {
    pub fn col(&self, name: &str) -> Expr {
        Expr::Deferred(name.to_string())
    }
}

/// The `this` sentinel value, matching the original API's naming. Allowed
/// to violate the usual constant-naming convention because it stands in
/// for a dynamic-language module-level singleton, not a true constant.
#[allow(non_upper_case_globals)]
pub const this: This = This;

/// Starts a `CASE WHEN <cond> THEN ...` chain.
pub fn when(cond: impl Into<Expr>) -> CaseWhenBuilder {
    CaseWhenBuilder {
        branches: Vec::new(),
        cond: cond.into(),
    }
}

/// A `CASE` builder that has an open `WHEN` condition awaiting `.then()`.
pub struct CaseWhenBuilder {
    branches: Vec<(Expr, Expr)>,
    cond: Expr,
}

impl CaseWhenBuilder {
    pub fn then(self, result: impl Into<Expr>) -> CaseThenBuilder {
        let mut branches = self.branches;
        branches.push((self.cond, result.into()));
        CaseThenBuilder { branches }
    }
}

/// A `CASE` builder with at least one complete `WHEN ... THEN ...` branch.
/// May add another branch, close with `.else_()`, or be used as-is (in
/// which case the `ELSE` branch is elided from the rendered SQL).
pub struct CaseThenBuilder {
    branches: Vec<(Expr, Expr)>,
}

impl CaseThenBuilder {
    pub fn when(self, cond: impl Into<Expr>) -> CaseWhenBuilder {
        CaseWhenBuilder {
            branches: self.branches,
            cond: cond.into(),
        }
    }

    pub fn else_(self, value: impl Into<Expr>) -> Expr {
        Expr::Case {
            branches: self.branches,
            else_: Some(Box::new(value.into())),
        }
    }
}

impl From<CaseThenBuilder> for Expr {
    fn from(b: CaseThenBuilder) -> Expr {
        Expr::Case {
            branches: b.branches,
            else_: None,
        }
    }
}

/// Folds a non-empty list of conditions with `AND`, matching
/// `Stmt::where_`'s own conjunction rule.
pub fn and_all(conds: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    let mut iter = conds.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, c| acc.and(c)))
}

/// Folds a non-empty list of conditions with `OR`.
pub fn or_all(conds: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    let mut iter = conds.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, c| acc.or(c)))
}
