//! Round trip against a live PostgreSQL server.
//!
//! Runs only with the `postgres` feature and `DATABASE_URL` set (a `.env`
//! file is honored); otherwise the test returns early.

#![cfg(feature = "postgres")]

use emapper::prelude::*;

#[derive(Debug, Default, Entity)]
#[orm(table = "emapper_pg_item", alias = "i")]
struct Item {
    #[orm(base)]
    base: EntityBase,
    #[orm(required, len = "1..=40")]
    title: String,
    quantity: i32,
    price: f64,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS emapper_pg_item (
    id BIGSERIAL PRIMARY KEY,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    add_time TIMESTAMPTZ,
    last_modify_time TIMESTAMPTZ,
    title VARCHAR(40) NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 0,
    price DOUBLE PRECISION NOT NULL DEFAULT 0
)";

fn try_context() -> Option<std::sync::Arc<MapperContext>> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").ok()?;
    Some(MapperContext::new(
        MapperOptions::new()
            .use_postgres()
            .connection_string_name("DATABASE_URL")
            .no_cache(),
    ))
}

#[test]
fn add_update_query_remove() {
    let Some(ctx) = try_context() else {
        return;
    };
    let mut mapper = ctx.create_mapper();
    mapper.sql_query(SCHEMA, Vec::new()).unwrap();
    mapper.sql_query("TRUNCATE emapper_pg_item", Vec::new()).unwrap();

    let mut item = Item::default();
    item.set_title("widget");
    item.set_quantity(3);
    item.set_price(2.5);
    let id = mapper.add(&mut item).unwrap();
    assert!(id > 0);

    item.set_quantity(4);
    assert!(mapper.update_by_id(&mut item).unwrap());

    let loaded = mapper
        .query::<Item>()
        .filter(Item::COL_TITLE.contains("idg"))
        .first_or_default()
        .unwrap()
        .unwrap();
    assert_eq!(loaded.id(), id);
    assert_eq!(*loaded.quantity(), 4);
    assert_eq!(*loaded.price(), 2.5);
    assert!(loaded.base.add_time().is_some());

    assert_eq!(
        mapper.query::<Item>().page(1, 10).order_by_desc(Item::COL_ID).to_list().unwrap().len(),
        1
    );

    mapper
        .transaction(|m| {
            let mut other = Item::default();
            other.set_title("gadget");
            m.add(&mut other)?;
            Err::<(), _>(OrmError::Other("rolled back".into()))
        })
        .unwrap_err();
    assert_eq!(mapper.query::<Item>().count().unwrap(), 1);

    assert!(mapper.remove(&mut item).unwrap());
    assert!(!mapper.query::<Item>().exists().unwrap());

    assert!(!mapper
        .execute_idempotent_removal("DROP INDEX emapper_missing_ix")
        .unwrap());
}
