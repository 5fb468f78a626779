use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use polysql::{DbType, DbVersion, OmitStrategy, Paging, SqlBuffer, create_dialect};

/// SELECT COL0, COL1, ... FROM T WHERE COL0=:$1$f0 AND COL1=:$2$f1 ...
fn build_select(n: usize) -> SqlBuffer {
    let mut sql = SqlBuffer::of("SELECT");
    for i in 0..n {
        if i > 0 {
            sql.push(", ");
        }
        sql.push(&format!("COL{i}"));
    }
    sql.append("\nFROM T\nWHERE");
    for i in 0..n {
        if i > 0 {
            sql.append("AND");
        }
        sql.append(&format!("COL{i}="))
            .add_named_variable(&format!("f{i}"), i as i64);
    }
    sql
}

fn bench_render_named(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_buffer/render_named");

    for n in [1, 5, 10, 50, 100] {
        let sql = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(sql.render_named()));
        });
    }

    group.finish();
}

fn bench_paginate(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_buffer/paginate");

    for db in [DbType::MySql, DbType::Oracle, DbType::Db2, DbType::PostgreSql] {
        let dialect = create_dialect(&DbVersion::new(db.clone(), 12, 0)).expect("known dialect");
        group.bench_function(db.name().to_string(), |b| {
            b.iter(|| {
                let mut sql = build_select(10);
                dialect.paginate(&mut sql, &Paging::new(20, 10));
                black_box(sql.render_named());
            });
        });
    }

    group.finish();
}

fn bench_render_literal_omitted(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_buffer/render_literal_omitted");
    let dialect = create_dialect(&DbVersion::new(DbType::MySql, 8, 0)).expect("known dialect");
    let omit = OmitStrategy::default();

    for n in [10, 100, 1000] {
        let mut sql = SqlBuffer::of("INSERT INTO T(ID, NAME) VALUES");
        for row in 0..n {
            sql.mark_row(row);
            if row > 0 {
                sql.push(",");
            }
            sql.push("\n\t(")
                .add_named_variable("id", row as i64)
                .push(", ")
                .add_named_variable("name", format!("user-{row}"))
                .push(")");
        }
        sql.mark_rows_end();

        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(sql.render_literal_omitted(&*dialect, &omit)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_render_named,
    bench_paginate,
    bench_render_literal_omitted
);
criterion_main!(benches);
