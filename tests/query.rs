use pretty_assertions::assert_eq;

use chrono::{TimeZone, Utc};
use sqeleton::ast::{
    concat, cte, outerjoin, or_all, random, table, table_with_schema, this, when, Expr, Literal,
    SelectItem,
};
use sqeleton::dialect::mock::MockDialect;
use sqeleton::{ColumnType, Compiler, Schema};

#[test]
fn test_basic() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);

    let t = table("point");
    let t2 = t
        .clone()
        .select([
            (this.col("x") + 1).alias("x"),
            (t.col("y").unwrap() + this.col("x")).alias("y"),
        ])
        .unwrap();
    assert_eq!(
        compiler.compile(&t2).unwrap(),
        "SELECT (x + 1) AS x, (y + x) AS y FROM point"
    );

    let t = table("point")
        .where_([this.col("x").eq(1), this.col("y").eq(2)])
        .unwrap();
    assert_eq!(
        compiler.compile(&t).unwrap(),
        "SELECT * FROM point WHERE (x = 1) AND (y = 2)"
    );

    let t = table("point").select(["x", "y"]).unwrap();
    assert_eq!(compiler.compile(&t).unwrap(), "SELECT x, y FROM point");
}

#[test]
fn test_outerjoin() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let a = table("a");
    let b = table("b");

    let j = outerjoin(a.clone(), b.clone()).on([
        a.col("x").unwrap().eq(b.col("x").unwrap()),
        a.col("y").unwrap().eq(b.col("y").unwrap()),
    ]);

    assert_eq!(
        compiler.compile(&j).unwrap(),
        "SELECT * FROM a tmp1 FULL OUTER JOIN b tmp2 ON (tmp1.x = tmp2.x) AND (tmp1.y = tmp2.y)"
    );
}

/// Supplements the commented-out continuation of the outer-join scenario
/// above: a wildcard projection extended with computed diff columns, then
/// aggregated in an outer query.
#[test]
fn test_outerjoin_diff_aggregation() {
    let dialect = MockDialect;
    let a = table("a");
    let b = table("b");

    let j = outerjoin(a.clone(), b.clone()).on([
        a.col("x").unwrap().eq(b.col("x").unwrap()),
        a.col("y").unwrap().eq(b.col("y").unwrap()),
    ]);

    let diffed = j
        .select([
            SelectItem::Wildcard,
            a.col("u")
                .unwrap()
                .is_distinct_from(b.col("u").unwrap())
                .alias("is_diff_col_u"),
            a.col("v")
                .unwrap()
                .is_distinct_from(b.col("v").unwrap())
                .alias("is_diff_col_v"),
        ])
        .unwrap();

    let total_diff = or_all([
        diffed.col("is_diff_col_u").unwrap(),
        diffed.col("is_diff_col_v").unwrap(),
    ])
    .unwrap()
    .sum();

    let t = diffed
        .clone()
        .select([
            diffed
                .col("is_diff_col_u")
                .unwrap()
                .sum()
                .alias("total_diff_col_u"),
            diffed
                .col("is_diff_col_v")
                .unwrap()
                .sum()
                .alias("total_diff_col_v"),
            total_diff.alias("total_diff"),
        ])
        .unwrap();

    let compiler = Compiler::new(&dialect);
    assert_eq!(
        compiler.compile(&t).unwrap(),
        "SELECT SUM(is_diff_col_u) AS total_diff_col_u, SUM(is_diff_col_v) AS total_diff_col_v, \
         SUM((is_diff_col_u OR is_diff_col_v)) AS total_diff FROM \
         (SELECT *, tmp1.u is distinct from tmp2.u AS is_diff_col_u, \
         tmp1.v is distinct from tmp2.v AS is_diff_col_v FROM a tmp1 FULL OUTER JOIN b tmp2 \
         ON (tmp1.x = tmp2.x) AND (tmp1.y = tmp2.y)) tmp3"
    );
}

#[test]
fn test_schema() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let schema = [("id", ColumnType::Int), ("comment", ColumnType::Str)];

    let t = table_with_schema("a", Schema::case_insensitive(schema));
    let q = t
        .clone()
        .select([this.col("Id"), t.col("COMMENT").unwrap()])
        .unwrap();
    assert_eq!(compiler.compile(&q).unwrap(), "SELECT id, comment FROM a");

    let t2 = table_with_schema("a", Schema::case_sensitive(schema));
    assert!(t2.clone().col("Id").is_err());
    assert!(t2.clone().select([this.col("Id")]).is_err());

    let q = t2.select([this.col("id")]).unwrap();
    assert!(q.col("comment").is_err());

    let s = Schema::case_insensitive([("x", ColumnType::Int), ("y", ColumnType::Int)]);
    let a = table_with_schema("a", s.clone());
    let b = table_with_schema("b", s);
    let j = outerjoin(a.clone(), b.clone()).on([
        a.col("x").unwrap().eq(b.col("x").unwrap()),
        a.col("y").unwrap().eq(b.col("y").unwrap()),
    ]);
    let j = j
        .select([
            SelectItem::from(a.col("x").unwrap()),
            SelectItem::from(b.col("y").unwrap()),
            (a.col("x").unwrap() + b.col("x").unwrap()).alias("xsum"),
        ])
        .unwrap();
    assert!(j.col("x").is_ok());
    assert!(j.col("y").is_ok());
    assert!(j.col("xsum").is_ok());
    assert!(j.col("ysum").is_err());
}

#[test]
fn test_commutable_select() {
    let t = table("a");
    let q1 = t.clone().select(["a"]).unwrap().where_([this.col("b")]).unwrap();
    let q2 = t.where_([this.col("b")]).unwrap().select(["a"]).unwrap();
    assert_eq!(q1, q2);
}

#[test]
fn test_cte() {
    let dialect = MockDialect;
    let t = table("a");

    let t2 = cte(t.clone().select([this.col("x")]).unwrap(), None);
    let t3 = t2.select([this.col("x")]).unwrap();
    let compiler = Compiler::new(&dialect);
    assert_eq!(
        compiler.compile(&t3).unwrap(),
        "WITH tmp1 AS (SELECT x FROM a) SELECT x FROM tmp1"
    );

    let t4 = cte(t3, None).select([this.col("x")]).unwrap();
    let compiler = Compiler::new(&dialect);
    assert_eq!(
        compiler.compile(&t4).unwrap(),
        "WITH tmp1 AS (SELECT x FROM a), tmp2 AS (SELECT x FROM tmp1) SELECT x FROM tmp2"
    );

    let t2 = cte(t.select([this.col("x")]).unwrap(), Some(vec!["y".to_string()]));
    let t3 = t2.select([this.col("y")]).unwrap();
    let compiler = Compiler::new(&dialect);
    assert_eq!(
        compiler.compile(&t3).unwrap(),
        "WITH tmp1(y) AS (SELECT x FROM a) SELECT y FROM tmp1"
    );
}

#[test]
fn test_funcs() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let t = table("a");

    let q = t.order_by([random()]).unwrap().limit(10);
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT * FROM a ORDER BY random() LIMIT 10"
    );
}

#[test]
fn test_select_distinct() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let t = table("a");

    let q = t.clone().select_distinct([this.col("b")]).unwrap();
    assert_eq!(compiler.compile(&q).unwrap(), "SELECT DISTINCT b FROM a");

    // Selects merge: a wildcard select with no limit/offset/group-by folds
    // an immediately following select in place.
    let q = t
        .clone()
        .where_([this.col("b").gt(10)])
        .unwrap()
        .select_distinct([this.col("b")])
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT DISTINCT b FROM a WHERE (b > 10)"
    );

    // Selects stay apart: a LIMIT forces the next select to wrap.
    let q = t.clone().limit(10).select_distinct([this.col("b")]).unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT DISTINCT b FROM (SELECT * FROM a LIMIT 10) tmp1"
    );

    let q = t
        .select_distinct([this.col("b")])
        .unwrap()
        .distinct(false)
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT * FROM (SELECT DISTINCT b FROM a) tmp2"
    );
}

#[test]
fn test_union() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let a = table("a").select(["x"]).unwrap();
    let b = table("b").select(["y"]).unwrap();

    let q = a.union(b, false);
    assert_eq!(compiler.compile(&q).unwrap(), "SELECT x FROM a UNION SELECT y FROM b");
}

#[test]
fn test_ops() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let t = table("a");

    let q = t.clone().select([this.col("b") + this.col("c")]).unwrap();
    assert_eq!(compiler.compile(&q).unwrap(), "SELECT (b + c) FROM a");

    let q = t
        .clone()
        .select([this.col("b").like(this.col("c"))])
        .unwrap();
    assert_eq!(compiler.compile(&q).unwrap(), "SELECT (b LIKE c) FROM a");

    let q = t.select([-(this.col("b").sum())]).unwrap();
    assert_eq!(compiler.compile(&q).unwrap(), "SELECT (-SUM(b)) FROM a");
}

#[test]
fn test_group_by() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let t = table("a");

    let q = t
        .clone()
        .group_by(vec![this.col("b")], vec![this.col("c")])
        .unwrap();
    assert_eq!(compiler.compile(&q).unwrap(), "SELECT b, c FROM a GROUP BY 1");

    let q = t
        .clone()
        .where_([this.col("b").gt(1)])
        .unwrap()
        .group_by(vec![this.col("b")], vec![this.col("c")])
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT b, c FROM a WHERE (b > 1) GROUP BY 1"
    );

    let q = t
        .clone()
        .select([this.col("b")])
        .unwrap()
        .group_by(vec![this.col("b")], vec![])
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT b FROM (SELECT b FROM a) tmp1 GROUP BY 1"
    );

    // Having
    let q = t
        .clone()
        .group_by(vec![this.col("b")], vec![this.col("c")])
        .unwrap()
        .having(this.col("b").gt(1))
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT b, c FROM a GROUP BY 1 HAVING (b > 1)"
    );

    let q = t
        .clone()
        .select([this.col("b")])
        .unwrap()
        .group_by(vec![this.col("b")], vec![])
        .unwrap()
        .having(this.col("b").gt(1))
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT b FROM (SELECT b FROM a) tmp2 GROUP BY 1 HAVING (b > 1)"
    );

    // Having sum
    let q = t
        .group_by(vec![this.col("b")], vec![this.col("c")])
        .unwrap()
        .having(this.col("b").sum().gt(1))
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT b, c FROM a GROUP BY 1 HAVING (SUM(b) > 1)"
    );
}

#[test]
fn test_dialect_hooks() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let t = table("a");

    let q = t
        .clone()
        .select([concat(vec![this.col("b"), this.col("c")]).alias("bc")])
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT concat(b, c) AS bc FROM a"
    );

    let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let q = t
        .clone()
        .where_([this.col("b").eq(Expr::Literal(Literal::Timestamp(ts)))])
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        format!("SELECT * FROM a WHERE (b = timestamp '{}')", ts)
    );

    let q = t.select(["b"]).unwrap();
    assert_eq!(
        compiler.explain(&q).unwrap(),
        "explain SELECT b FROM a"
    );
}

#[test]
fn test_case_when() {
    let dialect = MockDialect;
    let compiler = Compiler::new(&dialect);
    let t = table("a");

    let q = t
        .clone()
        .select([when(this.col("b")).then(this.col("c"))])
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT CASE WHEN b THEN c END FROM a"
    );

    let q = t
        .select([when(this.col("b")).then(this.col("c")).else_(this.col("d"))])
        .unwrap();
    assert_eq!(
        compiler.compile(&q).unwrap(),
        "SELECT CASE WHEN b THEN c ELSE d END FROM a"
    );
}
