use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use polysql::{
    BatchConfig, CountSqlDeriver, DbType, DbVersion, Entity, EntityMapping, FragmentBuilder,
    InsertRegistry, PkEntity, SqlBuffer, SqlValue, UpdateRegistry, create_dialect,
};

fn mapping() -> EntityMapping {
    EntityMapping::builder("SYS_USER")
        .primary_key("id")
        .field("userName")
        .field("deptCode")
        .build()
        .expect("valid mapping")
}

fn rows(n: usize) -> Vec<PkEntity> {
    (0..n)
        .map(|i| {
            let entity: Entity = [
                ("userName".to_string(), SqlValue::from(format!("user-{i}"))),
                ("deptCode".to_string(), SqlValue::from("D01")),
            ]
            .into_iter()
            .collect();
            PkEntity::new(i as i64, entity)
        })
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_build/insert");
    let mapping = mapping();
    let registry = InsertRegistry::with_defaults(&BatchConfig::default()).expect("default registry");

    for db in [DbType::MySql, DbType::Oracle] {
        let version = DbVersion::new(db.clone(), 19, 0);
        let dialect = create_dialect(&version).expect("known dialect");
        let helper = FragmentBuilder::new(&mapping, &*dialect);
        for n in [10, 100, 1000] {
            let rows = rows(n);
            group.bench_with_input(BenchmarkId::new(db.name().to_string(), n), &rows, |b, rows| {
                b.iter(|| black_box(registry.build(&version, rows, &helper).expect("batch builds")));
            });
        }
    }

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_build/update");
    let mapping = mapping();
    let registry = UpdateRegistry::with_defaults(&BatchConfig::default()).expect("default registry");

    for db in [DbType::MySql, DbType::Oracle] {
        let version = DbVersion::new(db.clone(), 19, 0);
        let dialect = create_dialect(&version).expect("known dialect");
        let helper = FragmentBuilder::new(&mapping, &*dialect);
        for n in [10, 100, 1000] {
            let rows = rows(n);
            group.bench_with_input(BenchmarkId::new(db.name().to_string(), n), &rows, |b, rows| {
                b.iter(|| black_box(registry.build(&version, rows, &helper).expect("batch builds")));
            });
        }
    }

    group.finish();
}

fn bench_count_derive(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_build/count_derive");
    let mut sql = SqlBuffer::of("SELECT ID, USER_NAME\nFROM SYS_USER\nWHERE DEPT_CODE=");
    sql.add_named_variable("deptCode", "D01")
        .append("\nORDER BY ID DESC\nLIMIT")
        .add_named_variable("_start_", 20_i64)
        .push(",")
        .add_named_variable("_rows_", 10_i64);
    let named = sql.render_named();

    let deriver = CountSqlDeriver::new();
    group.bench_function("cached", |b| {
        b.iter(|| black_box(deriver.derive(&named).expect("count derives")));
    });
    group.bench_function("uncached", |b| {
        b.iter(|| black_box(polysql::derive_count_sql(&named.sql)));
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_update, bench_count_derive);
criterion_main!(benches);
