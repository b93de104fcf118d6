use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use emapper::registry::EntityRegistry;
use emapper::statement::{JoinKind, OrderDirection};
use emapper::{
    Dialect, Entity, EntityBase, EntityRef, MsSqlDialect, MySqlDialect, PostgresDialect,
    SqliteDialect, Statement, Translator,
};

#[derive(Debug, Default, Entity)]
#[orm(table = "bench_user", alias = "u")]
struct BenchUser {
    #[orm(base)]
    base: EntityBase,
    #[orm(required, len = "1..=32")]
    name: String,
    age: i32,
    #[orm(email)]
    email: Option<String>,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "bench_role", alias = "r")]
struct BenchRole {
    #[orm(base)]
    base: EntityBase,
    user_id: i64,
    role_id: i64,
}

/// A paged join with `n` OR-ed comparisons in the filter.
fn build_select(n: usize) -> Statement {
    let mut stmt = Statement::select(EntityRef::of::<BenchUser>());
    stmt.add_join(
        EntityRef::of::<BenchRole>(),
        JoinKind::Inner,
        Some(BenchUser::COL_ID.eq_col(BenchRole::COL_USER_ID)),
    );
    let any = emapper::Predicate::any((0..n).map(|i| BenchUser::COL_AGE.eq(i as i64)));
    if let Some(filter) = any {
        stmt.add_filter(filter.and(BenchUser::COL_NAME.starts_with("a")));
    }
    stmt.set_order(BenchUser::COL_ID.into(), OrderDirection::Desc);
    stmt.set_page(3, 20);
    stmt
}

fn bench_translate(c: &mut Criterion) {
    let registry = EntityRegistry::new();
    let dialects: Vec<Box<dyn Dialect>> = vec![
        Box::new(SqliteDialect::new()),
        Box::new(PostgresDialect::new()),
        Box::new(MySqlDialect::new()),
        Box::new(MsSqlDialect::new()),
    ];

    let mut group = c.benchmark_group("translate_select");
    for dialect in &dialects {
        for n in [1usize, 8, 32] {
            group.bench_with_input(BenchmarkId::new(dialect.name(), n), &n, |b, &n| {
                b.iter(|| {
                    Translator::new(dialect.as_ref(), &registry)
                        .translate(black_box(build_select(n)))
                        .unwrap()
                })
            });
        }
    }
    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let registry = EntityRegistry::new();
    let dialect = SqliteDialect::new();

    let mut group = c.benchmark_group("fingerprint");
    for n in [1usize, 8, 32] {
        let result = Translator::new(&dialect, &registry)
            .translate(build_select(n))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &result, |b, result| {
            b.iter(|| black_box(result).fingerprint())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_translate, bench_fingerprint);
criterion_main!(benches);
