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

//! The statement AST and the builder normalizations of spec §4.2: table
//! reference, `SELECT`, `JOIN`, `UNION`, `CTE`. Every method here returns a
//! new [`Stmt`]; nothing is mutated in place.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::rc::Rc;

use super::expr::Expr;
use crate::error::{Result, SqlGenError};
use crate::schema::{ColumnType, Schema};

/// One item of the comma-separated list following `SELECT`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SelectItem {
    Wildcard,
    Expr(Expr),
    Aliased(Expr, String),
}

impl SelectItem {
    /// The name this item would be indexable by in a derived schema, if
    /// any. Bare columns and deferred references keep their own name;
    /// explicitly aliased expressions use the alias; anything else (an
    /// unnamed computed expression) has no name and cannot be projected
    /// through to an outer scope.
    fn output_name(&self) -> Option<(String, ColumnType)> {
        match self {
            SelectItem::Wildcard => None,
            SelectItem::Aliased(_, alias) => Some((alias.clone(), ColumnType::Unknown)),
            SelectItem::Expr(Expr::Column { name, .. }) => Some((name.clone(), ColumnType::Unknown)),
            SelectItem::Expr(Expr::Deferred(name)) => Some((name.clone(), ColumnType::Unknown)),
            SelectItem::Expr(_) => None,
        }
    }

    fn expr(&self) -> Option<&Expr> {
        match self {
            SelectItem::Wildcard => None,
            SelectItem::Expr(e) | SelectItem::Aliased(e, _) => Some(e),
        }
    }
}

impl From<Expr> for SelectItem {
    fn from(e: Expr) -> Self {
        match e {
            Expr::Aliased { expr, alias } => SelectItem::Aliased(*expr, alias),
            other => SelectItem::Expr(other),
        }
    }
}
impl From<&str> for SelectItem {
    fn from(s: &str) -> Self {
        SelectItem::Expr(Expr::Deferred(s.to_string()))
    }
}
impl From<String> for SelectItem {
    fn from(s: String) -> Self {
        SelectItem::Expr(Expr::Deferred(s))
    }
}
impl From<super::expr::CaseThenBuilder> for SelectItem {
    fn from(b: super::expr::CaseThenBuilder) -> Self {
        SelectItem::Expr(b.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Projection {
    Wildcard,
    Items(Vec<SelectItem>),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupBy {
    pub keys: Vec<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderByItem {
    pub expr: Expr,
    pub asc: bool,
}

impl From<Expr> for OrderByItem {
    fn from(expr: Expr) -> Self {
        OrderByItem { expr, asc: true }
    }
}

impl OrderByItem {
    pub fn desc(mut self) -> Self {
        self.asc = false;
        self
    }
}

/// A base table or schema-qualified table name.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TableRef {
    pub name: String,
    pub schema: Option<Schema>,
}

impl TableRef {
    pub fn col(&self, name: &str) -> Result<Expr> {
        let resolved = match &self.schema {
            Some(schema) => schema.resolve(name, &self.name)?,
            None => name.to_string(),
        };
        Ok(Expr::Column {
            name: resolved,
            source: Some(self.name.clone()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JoinNode {
    pub kind: JoinKind,
    pub left: Stmt,
    pub right: Stmt,
    pub on: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CteNode {
    pub inner: Stmt,
    pub params: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelectNode {
    pub source: Stmt,
    pub projection: Projection,
    pub where_: Vec<Expr>,
    pub group_by: Option<GroupBy>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub distinct: bool,
    /// Computed whenever `projection` is explicit; `None` for a wildcard
    /// projection, in which case the schema (if any) is whatever the
    /// source exposes — see [`effective_schema`].
    pub output_schema: Option<Schema>,
}

impl SelectNode {
    pub(crate) fn bare(source: Stmt) -> Self {
        SelectNode {
            source,
            projection: Projection::Wildcard,
            where_: Vec::new(),
            group_by: None,
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            output_schema: None,
        }
    }
}

/// The statement AST's single polymorphic node type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stmt {
    Table(TableRef),
    Select(Box<SelectNode>),
    Join(Box<JoinNode>),
    Union {
        left: Box<Stmt>,
        right: Box<Stmt>,
        all: bool,
    },
    /// `Rc`, not `Box`: a CTE may be referenced from multiple points in the
    /// tree, and the compiler dedupes registrations by pointer identity
    /// (`Rc::as_ptr`), not by structural equality — see spec §4.3/§9.
    Cte(Rc<CteNode>),
}

/// Constructs a bare table reference with no attached schema.
pub fn table(name: impl Into<String>) -> Stmt {
    Stmt::Table(TableRef {
        name: name.into(),
        schema: None,
    })
}

/// Constructs a table reference bound to a known [`Schema`], enabling
/// build-time validation of column access against it.
pub fn table_with_schema(name: impl Into<String>, schema: Schema) -> Stmt {
    Stmt::Table(TableRef {
        name: name.into(),
        schema: Some(schema),
    })
}

/// Wraps `stmt` as a named subquery. `params`, when given, are rendered as
/// `alias(p1, p2, ...)` in the `WITH` clause and replace the positional
/// names of the columns the inner query returns.
pub fn cte(stmt: Stmt, params: Option<Vec<String>>) -> Stmt {
    Stmt::Cte(Rc::new(CteNode {
        inner: stmt,
        params,
    }))
}

pub struct JoinBuilder {
    kind: JoinKind,
    left: Stmt,
    right: Stmt,
}

impl JoinBuilder {
    /// Materializes `preds` (which may be a lazily-constructed iterator)
    /// into the join's `ON` condition, AND-ing them together.
    pub fn on<I, E>(self, preds: I) -> Stmt
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        let on: Vec<Expr> = preds.into_iter().map(Into::into).collect();
        Stmt::Join(Box::new(JoinNode {
            kind: self.kind,
            left: self.left,
            right: self.right,
            on,
        }))
    }
}

pub fn outerjoin(left: Stmt, right: Stmt) -> JoinBuilder {
    JoinBuilder {
        kind: JoinKind::Full,
        left,
        right,
    }
}
pub fn inner_join(left: Stmt, right: Stmt) -> JoinBuilder {
    JoinBuilder {
        kind: JoinKind::Inner,
        left,
        right,
    }
}
pub fn left_join(left: Stmt, right: Stmt) -> JoinBuilder {
    JoinBuilder {
        kind: JoinKind::Left,
        left,
        right,
    }
}
pub fn right_join(left: Stmt, right: Stmt) -> JoinBuilder {
    JoinBuilder {
        kind: JoinKind::Right,
        left,
        right,
    }
}

/// The schema a source makes available to deferred/unqualified column
/// lookups at *build* time — distinct from the compiler's scope
/// resolution, which additionally handles multi-source (join) scopes at
/// *compile* time. Returns `None` when the source carries no schema
/// information (an un-typed table, a join, a union), in which case
/// build-time lookups are left unvalidated and deferred to the compiler.
pub(crate) fn effective_schema(stmt: &Stmt) -> Option<Schema> {
    match stmt {
        Stmt::Table(t) => t.schema.clone(),
        Stmt::Select(inner) => match &inner.projection {
            Projection::Wildcard => effective_schema(&inner.source),
            Projection::Items(_) => inner.output_schema.clone(),
        },
        Stmt::Join(_) => None,
        Stmt::Union { .. } => None,
        Stmt::Cte(node) => match &node.params {
            Some(params) => Some(Schema::case_sensitive(
                params.iter().map(|p| (p.clone(), ColumnType::Unknown)),
            )),
            None => effective_schema(&node.inner),
        },
    }
}

fn table_source_name(stmt: &Stmt) -> Option<String> {
    match stmt {
        Stmt::Table(t) => Some(t.name.clone()),
        _ => None,
    }
}

fn stmt_label(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Table(t) => t.name.clone(),
        Stmt::Select(_) => "<subquery>".to_string(),
        Stmt::Join(_) => "<join>".to_string(),
        Stmt::Union { .. } => "<union>".to_string(),
        Stmt::Cte(_) => "<cte>".to_string(),
    }
}

fn compute_output_schema(projection: &Projection) -> Option<Schema> {
    match projection {
        Projection::Wildcard => None,
        Projection::Items(items) => {
            let cols: Vec<(String, ColumnType)> =
                items.iter().filter_map(SelectItem::output_name).collect();
            Some(Schema::project(cols))
        }
    }
}

fn eager_resolve_expr(expr: Expr, schema: &Schema, label: &str) -> Result<Expr> {
    Ok(match expr {
        Expr::Deferred(name) => {
            let canon = schema.resolve(&name, label)?;
            Expr::Column {
                name: canon,
                source: None,
            }
        }
        Expr::Column { name, source } => Expr::Column { name, source },
        Expr::Literal(l) => Expr::Literal(l),
        Expr::Random => Expr::Random,
        Expr::BinOp { op, lhs, rhs } => Expr::BinOp {
            op,
            lhs: Box::new(eager_resolve_expr(*lhs, schema, label)?),
            rhs: Box::new(eager_resolve_expr(*rhs, schema, label)?),
        },
        Expr::UnaryOp { op, operand } => Expr::UnaryOp {
            op,
            operand: Box::new(eager_resolve_expr(*operand, schema, label)?),
        },
        Expr::Func { name, args } => Expr::Func {
            name,
            args: args
                .into_iter()
                .map(|a| eager_resolve_expr(a, schema, label))
                .collect::<Result<_>>()?,
        },
        Expr::Concat(parts) => Expr::Concat(
            parts
                .into_iter()
                .map(|a| eager_resolve_expr(a, schema, label))
                .collect::<Result<_>>()?,
        ),
        Expr::Aggregate {
            kind,
            operand,
            distinct,
        } => Expr::Aggregate {
            kind,
            operand: Box::new(eager_resolve_expr(*operand, schema, label)?),
            distinct,
        },
        Expr::Case { branches, else_ } => Expr::Case {
            branches: branches
                .into_iter()
                .map(|(c, r)| {
                    Ok::<_, SqlGenError>((
                        eager_resolve_expr(c, schema, label)?,
                        eager_resolve_expr(r, schema, label)?,
                    ))
                })
                .collect::<Result<_>>()?,
            else_: else_
                .map(|e| eager_resolve_expr(*e, schema, label))
                .transpose()?
                .map(Box::new),
        },
        Expr::IsDistinctFrom { lhs, rhs } => Expr::IsDistinctFrom {
            lhs: Box::new(eager_resolve_expr(*lhs, schema, label)?),
            rhs: Box::new(eager_resolve_expr(*rhs, schema, label)?),
        },
        Expr::Like { operand, pattern } => Expr::Like {
            operand: Box::new(eager_resolve_expr(*operand, schema, label)?),
            pattern: Box::new(eager_resolve_expr(*pattern, schema, label)?),
        },
        Expr::Cast { operand, to } => Expr::Cast {
            operand: Box::new(eager_resolve_expr(*operand, schema, label)?),
            to,
        },
        Expr::Aliased { expr, alias } => Expr::Aliased {
            expr: Box::new(eager_resolve_expr(*expr, schema, label)?),
            alias,
        },
    })
}

fn eager_resolve_item(item: SelectItem, schema: &Schema, label: &str) -> Result<SelectItem> {
    Ok(match item {
        SelectItem::Wildcard => SelectItem::Wildcard,
        SelectItem::Expr(e) => SelectItem::Expr(eager_resolve_expr(e, schema, label)?),
        SelectItem::Aliased(e, alias) => {
            SelectItem::Aliased(eager_resolve_expr(e, schema, label)?, alias)
        }
    })
}

fn eager_resolve_items(
    items: Vec<SelectItem>,
    schema: Option<&Schema>,
    label: &str,
) -> Result<Vec<SelectItem>> {
    match schema {
        None => Ok(items),
        Some(schema) => items
            .into_iter()
            .map(|item| eager_resolve_item(item, schema, label))
            .collect(),
    }
}

impl Stmt {
    /// The Rust-idiomatic equivalent of `tbl["col"]` / `this.X`: resolves
    /// `name` against whatever schema this statement currently exposes,
    /// returning a column bound to it. Falls back to an unvalidated bare
    /// column when no schema is known (the compiler then resolves it
    /// against scope at compile time).
    pub fn col(&self, name: &str) -> Result<Expr> {
        match effective_schema(self) {
            Some(schema) => {
                let canon = schema.resolve(name, &stmt_label(self))?;
                Ok(Expr::Column {
                    name: canon,
                    source: table_source_name(self),
                })
            }
            None => Ok(Expr::Column {
                name: name.to_string(),
                source: table_source_name(self),
            }),
        }
    }

    fn ensure_select(self) -> Box<SelectNode> {
        match self {
            Stmt::Select(inner) => inner,
            other => Box::new(SelectNode::bare(other)),
        }
    }

    /// `.where` — conjoins with any existing `WHERE` conjuncts on the
    /// current `Select`, or wraps a non-`Select` source in a fresh one.
    /// Always merges into an existing `Select` regardless of its
    /// projection, which is what makes `t.select(p).where(q)` and
    /// `t.where(q).select(p)` build to the same node (spec §8).
    pub fn where_<I, E>(self, conds: I) -> Result<Stmt>
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        let mut inner = self.ensure_select();
        // Validate against the *source*'s schema only: `inner.output_schema`
        // describes this select's own projected columns, which is what an
        // outside `.col()` lookup on this select indexes into (see
        // `Stmt::col`), not what a clause filtering/ordering the source's
        // rows should resolve against.
        let schema = effective_schema(&inner.source);
        let mut new_conds: Vec<Expr> = conds.into_iter().map(Into::into).collect();
        if let Some(schema) = &schema {
            new_conds = new_conds
                .into_iter()
                .map(|c| eager_resolve_expr(c, schema, "where"))
                .collect::<Result<_>>()?;
        }
        inner.where_.append(&mut new_conds);
        Ok(Stmt::Select(inner))
    }

    fn select_with_distinct<I, S>(self, items: I, distinct: bool) -> Result<Stmt>
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        let items: Vec<SelectItem> = items.into_iter().map(Into::into).collect();
        match self {
            Stmt::Select(mut inner) => {
                let mergeable = matches!(inner.projection, Projection::Wildcard)
                    && inner.limit.is_none()
                    && inner.offset.is_none()
                    && inner.group_by.is_none();
                if mergeable {
                    let schema = effective_schema(&inner.source);
                    let items = eager_resolve_items(items, schema.as_ref(), &stmt_label(&inner.source))?;
                    inner.projection = if items.is_empty() {
                        Projection::Wildcard
                    } else {
                        Projection::Items(items)
                    };
                    inner.distinct = distinct;
                    inner.output_schema = compute_output_schema(&inner.projection);
                    Ok(Stmt::Select(inner))
                } else {
                    let is_noop = items.is_empty() && distinct == inner.distinct;
                    if is_noop {
                        return Ok(Stmt::Select(inner));
                    }
                    let schema = inner.output_schema.clone();
                    let items = eager_resolve_items(items, schema.as_ref(), "<subquery>")?;
                    let projection = if items.is_empty() {
                        Projection::Wildcard
                    } else {
                        Projection::Items(items)
                    };
                    let output_schema = compute_output_schema(&projection);
                    let mut node = SelectNode::bare(Stmt::Select(inner));
                    node.projection = projection;
                    node.distinct = distinct;
                    node.output_schema = output_schema;
                    Ok(Stmt::Select(Box::new(node)))
                }
            }
            other => {
                let schema = effective_schema(&other);
                let items = eager_resolve_items(items, schema.as_ref(), &stmt_label(&other))?;
                let projection = if items.is_empty() {
                    Projection::Wildcard
                } else {
                    Projection::Items(items)
                };
                let output_schema = compute_output_schema(&projection);
                let mut node = SelectNode::bare(other);
                node.projection = projection;
                node.distinct = distinct;
                node.output_schema = output_schema;
                Ok(Stmt::Select(Box::new(node)))
            }
        }
    }

    /// `.select` (§4.2 rule 2/3): folds into an existing wildcard `Select`
    /// with no `LIMIT`/`OFFSET`/`GROUP BY` attached; otherwise either drops
    /// a genuine no-op call or wraps the existing node as an aliased
    /// subquery.
    pub fn select<I, S>(self, items: I) -> Result<Stmt>
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        self.select_with_distinct(items, false)
    }

    /// Same as [`Stmt::select`], with `DISTINCT` set.
    pub fn select_distinct<I, S>(self, items: I) -> Result<Stmt>
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        self.select_with_distinct(items, true)
    }

    /// Sets (or clears) the `DISTINCT` flag on the current `Select` without
    /// otherwise touching its projection — equivalent to calling
    /// [`Stmt::select`] with no items.
    pub fn distinct(self, flag: bool) -> Result<Stmt> {
        self.select_with_distinct(std::iter::empty::<SelectItem>(), flag)
    }

    /// `.group_by` (§4.2 rule 4): attaches to a plain select in place,
    /// rewriting its projection to `keys ++ values`; otherwise wraps as a
    /// subquery, same as an ordinary re-`.select()`.
    pub fn group_by(self, keys: Vec<Expr>, values: Vec<Expr>) -> Result<Stmt> {
        let n_keys = keys.len();
        let mut items: Vec<SelectItem> = keys.into_iter().map(SelectItem::Expr).collect();
        items.extend(values.into_iter().map(SelectItem::Expr));

        match self {
            Stmt::Select(mut inner)
                if matches!(inner.projection, Projection::Wildcard)
                    && inner.group_by.is_none()
                    && inner.limit.is_none()
                    && inner.offset.is_none() =>
            {
                let schema = effective_schema(&inner.source);
                let items = eager_resolve_items(items, schema.as_ref(), &stmt_label(&inner.source))?;
                let (keys, values) = split_group_items(items.clone(), n_keys);
                inner.projection = Projection::Items(items);
                inner.output_schema = compute_output_schema(&inner.projection);
                inner.group_by = Some(GroupBy { keys, values });
                Ok(Stmt::Select(inner))
            }
            other => {
                let schema = effective_schema(&other);
                let items = eager_resolve_items(items, schema.as_ref(), &stmt_label(&other))?;
                let (keys, values) = split_group_items(items.clone(), n_keys);
                let projection = Projection::Items(items);
                let output_schema = compute_output_schema(&projection);
                let mut node = SelectNode::bare(other);
                node.projection = projection;
                node.output_schema = output_schema;
                node.group_by = Some(GroupBy { keys, values });
                Ok(Stmt::Select(Box::new(node)))
            }
        }
    }

    /// `.having` (§4.2 rule 5): attaches to the nearest `GROUP BY` on the
    /// current `Select`; a structural error if none exists.
    pub fn having(self, cond: impl Into<Expr>) -> Result<Stmt> {
        match self {
            Stmt::Select(mut inner) if inner.group_by.is_some() => {
                // See the note in `where_`: validate against the source's
                // schema, not this select's own output schema.
                let schema = effective_schema(&inner.source);
                let cond = match &schema {
                    Some(schema) => eager_resolve_expr(cond.into(), schema, "having")?,
                    None => cond.into(),
                };
                inner.having = Some(cond);
                Ok(Stmt::Select(inner))
            }
            _ => Err(SqlGenError::Structural(
                "HAVING without GROUP BY".to_string(),
            )),
        }
    }

    pub fn order_by<I, E>(self, items: I) -> Result<Stmt>
    where
        I: IntoIterator<Item = E>,
        E: Into<OrderByItem>,
    {
        let mut inner = self.ensure_select();
        // See the note in `where_`: validate against the source's schema,
        // not this select's own output schema.
        let schema = effective_schema(&inner.source);
        for item in items {
            let item: OrderByItem = item.into();
            let expr = match &schema {
                Some(schema) => eager_resolve_expr(item.expr, schema, "order_by")?,
                None => item.expr,
            };
            inner.order_by.push(OrderByItem {
                expr,
                asc: item.asc,
            });
        }
        Ok(Stmt::Select(inner))
    }

    /// `.limit`/`.offset` (§4.2 rule 6): attach to the current `Select`; a
    /// subsequent `.select` call with its own projection forces the
    /// wrapping-subquery path in [`Stmt::select_with_distinct`].
    pub fn limit(self, n: i64) -> Stmt {
        let mut inner = self.ensure_select();
        inner.limit = Some(n);
        Stmt::Select(inner)
    }

    pub fn offset(self, n: i64) -> Stmt {
        let mut inner = self.ensure_select();
        inner.offset = Some(n);
        Stmt::Select(inner)
    }

    pub fn union(self, other: Stmt, all: bool) -> Stmt {
        Stmt::Union {
            left: Box::new(self),
            right: Box::new(other),
            all,
        }
    }
}

fn split_group_items(items: Vec<SelectItem>, n_keys: usize) -> (Vec<Expr>, Vec<Expr>) {
    let mut keys = Vec::with_capacity(n_keys);
    let mut values = Vec::with_capacity(items.len().saturating_sub(n_keys));
    for (i, item) in items.into_iter().enumerate() {
        let expr = item.expr().cloned().unwrap_or(Expr::Random);
        if i < n_keys {
            keys.push(expr);
        } else {
            values.push(expr);
        }
    }
    (keys, values)
}
