//! The compiler: walks an [`Stmt`] tree and renders it to SQL text against a
//! bound [`Dialect`].
//!
//! Rendering is centralized here rather than on the AST nodes themselves
//! (contrast the per-node `Display`-style rendering of a typical AST-to-text
//! crate) because it is inherently stateful: alias allocation, CTE
//! deduplication, and scope-qualified column resolution all need state that
//! outlives any single node. A `Compiler` is built once per compilation and
//! is not meant to be shared across threads — see [`Compiler::new`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::expr::{CastType, Expr, Literal, UnaryOpKind};
use crate::ast::stmt::{
    effective_schema, CteNode, GroupBy, JoinKind, JoinNode, Projection, SelectItem, SelectNode,
    Stmt,
};
use crate::dialect::Dialect;
use crate::error::{Result, SqlGenError};
use crate::schema::Schema;

#[derive(Debug, Clone)]
struct ScopeSource {
    /// What this source is rendered as when qualifying a column
    /// (`<alias>.<col>`) — the table's own name for a lone `FROM` source,
    /// a freshly minted `tmpN` for a join operand or nested subquery.
    alias: String,
    /// The name an explicit `Column { source: Some(name) }` tag must match
    /// to target this source — the originating table's name, regardless
    /// of what alias it ends up rendered under. `None` for sources that can
    /// never be explicitly tagged (CTEs, nested statements).
    origin: Option<String>,
    schema: Option<Schema>,
}

#[derive(Debug, Clone)]
struct Scope {
    sources: Vec<ScopeSource>,
}

struct CompiledCte {
    alias: String,
    sql: String,
    params: Option<Vec<String>>,
}

/// Renders one [`Stmt`] tree to SQL text against `dialect`.
///
/// Holds per-compilation state behind `Cell`/`RefCell` so its methods take
/// `&self`: callers may reuse one `Compiler` across several `.compile()`
/// calls (the original test suite this crate's tests are ported from does
/// exactly this), and the alias counter and CTE table accumulate across
/// those calls rather than resetting. Not `Sync` — a `Compiler` belongs to
/// one compilation thread at a time.
pub struct Compiler<'d> {
    dialect: &'d dyn Dialect,
    alias_counter: Cell<u32>,
    scopes: RefCell<Vec<Scope>>,
    ctes: RefCell<IndexMap<*const CteNode, CompiledCte>>,
}

impl<'d> Compiler<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Compiler {
            dialect,
            alias_counter: Cell::new(0),
            scopes: RefCell::new(Vec::new()),
            ctes: RefCell::new(IndexMap::new()),
        }
    }

    /// Renders `stmt` to a complete SQL statement, prefixed with a `WITH`
    /// clause covering every CTE transitively registered while rendering
    /// it (in first-registration order, depth-first, post-order — an inner
    /// CTE referenced only from within another CTE's body is registered,
    /// and so numbered, before its referrer).
    pub fn compile(&self, stmt: &Stmt) -> Result<String> {
        let body = self.render_top(stmt)?;
        self.prepend_with_clause(body)
    }

    /// Compiles `stmt` and wraps the result in the dialect's `EXPLAIN`
    /// syntax via [`Dialect::explain_as_text`].
    pub fn explain(&self, stmt: &Stmt) -> Result<String> {
        let sql = self.compile(stmt)?;
        Ok(self.dialect.explain_as_text(&sql))
    }

    fn next_alias(&self) -> String {
        let n = self.alias_counter.get() + 1;
        self.alias_counter.set(n);
        let alias = format!("tmp{}", n);
        log::trace!("allocated alias {}", alias);
        alias
    }

    fn prepend_with_clause(&self, body: String) -> Result<String> {
        let ctes = self.ctes.borrow();
        if ctes.is_empty() {
            return Ok(body);
        }
        let mut out = String::from("WITH ");
        for (i, (_, compiled)) in ctes.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&self.dialect.quote(&compiled.alias));
            if let Some(params) = &compiled.params {
                out.push('(');
                let quoted: Vec<String> = params.iter().map(|p| self.dialect.quote(p)).collect();
                out.push_str(&quoted.join(", "));
                out.push(')');
            }
            out.push_str(" AS (");
            out.push_str(&compiled.sql);
            out.push(')');
        }
        out.push(' ');
        out.push_str(&body);
        Ok(out)
    }

    fn resolve_cte(&self, node: &Rc<CteNode>) -> Result<String> {
        let ptr = Rc::as_ptr(node);
        {
            let ctes = self.ctes.borrow();
            if let Some(compiled) = ctes.get(&ptr) {
                return Ok(compiled.alias.clone());
            }
        }
        // Depth-first, post-order: the inner body (which may itself
        // reference other CTEs) is fully compiled, and any CTEs it touches
        // registered, before this one mints its own alias.
        let inner_sql = self.render_top(&node.inner)?;
        let alias = self.next_alias();
        log::debug!("registered CTE {}", alias);
        self.ctes.borrow_mut().insert(
            ptr,
            CompiledCte {
                alias: alias.clone(),
                sql: inner_sql,
                params: node.params.clone(),
            },
        );
        Ok(alias)
    }

    fn render_top(&self, stmt: &Stmt) -> Result<String> {
        match stmt {
            Stmt::Select(node) => self.render_select(node),
            Stmt::Union { left, right, all } => self.render_union(left, right, *all),
            other => self.render_select(&SelectNode::bare(other.clone())),
        }
    }

    fn render_union(&self, left: &Stmt, right: &Stmt, all: bool) -> Result<String> {
        let l = self.render_top(left)?;
        let r = self.render_top(right)?;
        let kw = if all { "UNION ALL" } else { "UNION" };
        Ok(format!("{} {} {}", l, kw, r))
    }

    fn render_select(&self, node: &SelectNode) -> Result<String> {
        let (from_text, scope) = self.from_clause_and_scope(&node.source)?;
        self.scopes.borrow_mut().push(scope);
        let result = self.render_select_body(node, &from_text);
        self.scopes.borrow_mut().pop();
        result
    }

    fn render_select_body(&self, node: &SelectNode, from_text: &str) -> Result<String> {
        let mut sql = self.render_projection(&node.projection, node.distinct)?;
        sql.push_str(" FROM ");
        sql.push_str(from_text);

        if !node.where_.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.render_conjuncts(&node.where_)?);
        }
        if let Some(group_by) = &node.group_by {
            sql.push(' ');
            sql.push_str(&Self::render_group_by(group_by));
        }
        if let Some(having) = &node.having {
            sql.push_str(" HAVING ");
            sql.push_str(&self.render_expr(having)?);
        }
        if !node.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let mut rendered = Vec::with_capacity(node.order_by.len());
            for item in &node.order_by {
                let e = self.render_expr(&item.expr)?;
                rendered.push(if item.asc { e } else { format!("{} DESC", e) });
            }
            sql.push_str(&rendered.join(", "));
        }
        let offset_limit = self.dialect.offset_limit(node.offset, node.limit);
        if !offset_limit.is_empty() {
            sql.push(' ');
            sql.push_str(&offset_limit);
        }
        Ok(sql)
    }

    fn render_group_by(group_by: &GroupBy) -> String {
        let positions: Vec<String> = (1..=group_by.keys.len()).map(|i| i.to_string()).collect();
        format!("GROUP BY {}", positions.join(", "))
    }

    fn render_projection(&self, projection: &Projection, distinct: bool) -> Result<String> {
        let keyword = if distinct { "SELECT DISTINCT" } else { "SELECT" };
        let body = match projection {
            Projection::Wildcard => "*".to_string(),
            Projection::Items(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.render_select_item(item)?);
                }
                rendered.join(", ")
            }
        };
        Ok(format!("{} {}", keyword, body))
    }

    fn render_select_item(&self, item: &SelectItem) -> Result<String> {
        match item {
            SelectItem::Wildcard => Ok("*".to_string()),
            SelectItem::Expr(e) => self.render_expr(e),
            SelectItem::Aliased(e, alias) => {
                Ok(format!("{} AS {}", self.render_expr(e)?, self.dialect.quote(alias)))
            }
        }
    }

    /// Builds the `FROM`/join fragment for `source` and the scope it
    /// establishes for resolving unqualified and qualified columns within
    /// the statement being built on top of it.
    fn from_clause_and_scope(&self, source: &Stmt) -> Result<(String, Scope)> {
        match source {
            Stmt::Join(join) => self.render_join(join),
            other => {
                let (text, scope_source) = self.render_operand(other)?;
                Ok((
                    text,
                    Scope {
                        sources: vec![scope_source],
                    },
                ))
            }
        }
    }

    /// A join operand is always given its own alias, even a base table —
    /// unlike a lone `FROM` source, which stays bare (see
    /// [`Compiler::render_operand`]). Two occurrences of the same table
    /// name on either side of a join would otherwise be unqualifiable.
    fn render_join_operand(&self, stmt: &Stmt) -> Result<(String, ScopeSource)> {
        let base_text = match stmt {
            Stmt::Table(t) => self.dialect.quote(&t.name),
            Stmt::Cte(node) => {
                let alias = self.resolve_cte(node)?;
                self.dialect.quote(&alias)
            }
            other => format!("({})", self.render_top(other)?),
        };
        let origin = match stmt {
            Stmt::Table(t) => Some(t.name.clone()),
            _ => None,
        };
        let alias = self.next_alias();
        let schema = effective_schema(stmt);
        let text = format!("{} {}", base_text, self.dialect.quote(&alias));
        Ok((
            text,
            ScopeSource {
                alias,
                origin,
                schema,
            },
        ))
    }

    fn render_join(&self, join: &JoinNode) -> Result<(String, Scope)> {
        let (left_text, left_scope) = self.render_join_operand(&join.left)?;
        let (right_text, right_scope) = self.render_join_operand(&join.right)?;
        let scope = Scope {
            sources: vec![left_scope, right_scope],
        };
        self.scopes.borrow_mut().push(scope.clone());
        let on_sql = self.render_conjuncts(&join.on);
        self.scopes.borrow_mut().pop();
        let on_sql = on_sql?;
        let kw = match join.kind {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT OUTER JOIN",
            JoinKind::Right => "RIGHT OUTER JOIN",
            JoinKind::Full => "FULL OUTER JOIN",
        };
        let text = format!("{} {} {} ON {}", left_text, kw, right_text, on_sql);
        Ok((text, scope))
    }

    /// Renders a single, non-join `FROM` source. A base table or an
    /// already materialized CTE reference bare, with its own name standing
    /// in as the scope alias; anything else (a nested `Select`, `Join`, or
    /// `Union`) is compiled, then wrapped and given a fresh alias —
    /// allocated only once the inner body is fully rendered, so alias
    /// numbers always reflect post-order construction.
    fn render_operand(&self, stmt: &Stmt) -> Result<(String, ScopeSource)> {
        match stmt {
            Stmt::Table(t) => {
                let text = self.dialect.quote(&t.name);
                Ok((
                    text,
                    ScopeSource {
                        alias: t.name.clone(),
                        origin: Some(t.name.clone()),
                        schema: t.schema.clone(),
                    },
                ))
            }
            Stmt::Cte(node) => {
                let alias = self.resolve_cte(node)?;
                let schema = effective_schema(stmt);
                Ok((
                    self.dialect.quote(&alias),
                    ScopeSource {
                        alias,
                        origin: None,
                        schema,
                    },
                ))
            }
            other => {
                let inner_sql = self.render_top(other)?;
                let alias = self.next_alias();
                let schema = effective_schema(other);
                let text = format!("({}) {}", inner_sql, self.dialect.quote(&alias));
                Ok((
                    text,
                    ScopeSource {
                        alias,
                        origin: None,
                        schema,
                    },
                ))
            }
        }
    }

    fn render_conjuncts(&self, conds: &[Expr]) -> Result<String> {
        let mut rendered = Vec::with_capacity(conds.len());
        for cond in conds {
            rendered.push(format!("({})", self.render_expr(cond)?));
        }
        Ok(rendered.join(" AND "))
    }

    fn render_expr(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Column { name, source } => self.render_column(name, source.as_deref()),
            Expr::Deferred(name) => self.render_column(name, None),
            Expr::Literal(l) => Ok(self.render_literal_dialect(l)),
            Expr::Random => Ok(self.dialect.random()),
            Expr::BinOp { op, lhs, rhs } => {
                let l = self.render_expr(lhs)?;
                let r = self.render_expr(rhs)?;
                Ok(format!("({} {} {})", l, op.sql_symbol(), r))
            }
            Expr::UnaryOp { op, operand } => {
                let o = self.render_expr(operand)?;
                Ok(match op {
                    UnaryOpKind::Neg => format!("(-{})", o),
                    UnaryOpKind::Not => format!("(NOT {})", o),
                })
            }
            Expr::Func { name, args } => {
                let mut rendered = Vec::with_capacity(args.len());
                for a in args {
                    rendered.push(self.render_expr(a)?);
                }
                Ok(format!("{}({})", name, rendered.join(", ")))
            }
            Expr::Concat(parts) => {
                let mut rendered = Vec::with_capacity(parts.len());
                for p in parts {
                    rendered.push(self.render_expr(p)?);
                }
                Ok(self.dialect.concat(&rendered))
            }
            Expr::Aggregate {
                kind,
                operand,
                distinct,
            } => {
                let o = self.render_expr(operand)?;
                Ok(if *distinct {
                    format!("{}(DISTINCT {})", kind.sql_name(), o)
                } else {
                    format!("{}({})", kind.sql_name(), o)
                })
            }
            Expr::Case { branches, else_ } => {
                let mut s = String::from("CASE");
                for (cond, result) in branches {
                    s.push_str(" WHEN ");
                    s.push_str(&self.render_expr(cond)?);
                    s.push_str(" THEN ");
                    s.push_str(&self.render_expr(result)?);
                }
                if let Some(e) = else_ {
                    s.push_str(" ELSE ");
                    s.push_str(&self.render_expr(e)?);
                }
                s.push_str(" END");
                Ok(s)
            }
            Expr::IsDistinctFrom { lhs, rhs } => {
                let l = self.render_expr(lhs)?;
                let r = self.render_expr(rhs)?;
                Ok(self.dialect.is_distinct_from(&l, &r))
            }
            Expr::Like { operand, pattern } => {
                let o = self.render_expr(operand)?;
                let p = self.render_expr(pattern)?;
                Ok(format!("({} LIKE {})", o, p))
            }
            Expr::Cast { operand, to } => {
                let o = self.render_expr(operand)?;
                Ok(match to {
                    CastType::Str => self.dialect.to_string_cast(&o),
                    CastType::Int => format!("CAST({} AS INT)", o),
                    CastType::Float => format!("CAST({} AS FLOAT)", o),
                    CastType::Bool => format!("CAST({} AS BOOLEAN)", o),
                    CastType::Timestamp => format!("CAST({} AS TIMESTAMP)", o),
                })
            }
            Expr::Aliased { expr, alias } => {
                Ok(format!("{} AS {}", self.render_expr(expr)?, self.dialect.quote(alias)))
            }
        }
    }

    fn render_literal(l: &Literal) -> String {
        match l {
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => f.to_string(),
            Literal::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Literal::Str(s) => format!("'{}'", s.replace('\'', "''")),
            Literal::Null => "NULL".to_string(),
        }
    }

    fn render_literal_dialect(&self, l: &Literal) -> String {
        match l {
            Literal::Timestamp(t) => self.dialect.timestamp_value(t),
            other => Self::render_literal(other),
        }
    }

    /// Resolves `name` against the innermost active scope. A single-source
    /// scope always renders bare, ignoring any qualification tag (a
    /// deferred or explicitly-qualified reference under a table with only
    /// one relation in play is unambiguous by construction). A
    /// multi-source (join) scope requires either an explicit, matching
    /// qualification or a name unique to exactly one schema-bearing
    /// source.
    fn render_column(&self, name: &str, source: Option<&str>) -> Result<String> {
        let scopes = self.scopes.borrow();
        let scope = scopes
            .last()
            .expect("render_expr called with no active scope");

        if scope.sources.len() == 1 {
            let resolved = Self::resolve_in_source(&scope.sources[0], name)?;
            return Ok(self.dialect.quote(&resolved));
        }

        match source {
            Some(src) => {
                let matching: Vec<&ScopeSource> =
                    scope
                        .sources
                        .iter()
                        .filter(|s| s.origin.as_deref() == Some(src))
                        .collect();
                match matching.as_slice() {
                    [one] => {
                        let resolved = Self::resolve_in_source(one, name)?;
                        Ok(format!(
                            "{}.{}",
                            self.dialect.quote(&one.alias),
                            self.dialect.quote(&resolved)
                        ))
                    }
                    _ => Err(SqlGenError::ScopeMiss {
                        column: name.to_string(),
                    }),
                }
            }
            None => {
                let found: Vec<&ScopeSource> = scope
                    .sources
                    .iter()
                    .filter(|s| matches!(&s.schema, Some(schema) if schema.contains(name)))
                    .collect();
                match found.as_slice() {
                    [one] => {
                        let resolved = Self::resolve_in_source(one, name)?;
                        Ok(format!(
                            "{}.{}",
                            self.dialect.quote(&one.alias),
                            self.dialect.quote(&resolved)
                        ))
                    }
                    [] => Err(SqlGenError::ScopeMiss {
                        column: name.to_string(),
                    }),
                    _ => Err(SqlGenError::AmbiguousReference {
                        column: name.to_string(),
                        sources: found.iter().map(|s| s.alias.clone()).collect(),
                    }),
                }
            }
        }
    }

    fn resolve_in_source(source: &ScopeSource, name: &str) -> Result<String> {
        match &source.schema {
            Some(schema) => schema.resolve(name, &source.alias),
            None => Ok(name.to_string()),
        }
    }
}
