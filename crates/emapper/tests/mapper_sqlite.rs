//! End-to-end mapper behavior against a temporary SQLite database.

#![allow(dead_code)]

use emapper::driver::sqlite::SqliteConnection;
use emapper::prelude::*;
use emapper::{Connection, Connector, MySqlDialect, ValidationCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const SCHEMA: &str = "
CREATE TABLE newcrm_user (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    add_time TEXT,
    last_modify_time TEXT,
    name TEXT NOT NULL,
    login_password TEXT NOT NULL,
    age INTEGER NOT NULL DEFAULT 0,
    email TEXT
);
CREATE TABLE newcrm_user_role (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    add_time TEXT,
    last_modify_time TEXT,
    user_id INTEGER NOT NULL,
    role_id INTEGER NOT NULL
);
";

#[derive(Debug, Default, Entity)]
#[orm(table = "newcrm_user", alias = "u")]
struct User {
    #[orm(base)]
    base: EntityBase,
    #[orm(required, len = "4..=10")]
    name: String,
    #[orm(required)]
    login_password: String,
    age: i32,
    #[orm(email)]
    email: Option<String>,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "newcrm_user_role", alias = "ur")]
struct UserRole {
    #[orm(base)]
    base: EntityBase,
    #[orm(required)]
    user_id: i64,
    #[orm(required)]
    role_id: i64,
}

/// Opens SQLite connections and counts them.
struct CountingConnector {
    path: String,
    opened: AtomicUsize,
}

impl CountingConnector {
    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Connector for CountingConnector {
    fn connect(&self) -> OrmResult<Box<dyn Connection>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        SqliteConnection::open(&self.path)
            .map(|c| Box::new(c) as Box<dyn Connection>)
            .map_err(|e| e.into_data_access("<connect>", Vec::new()))
    }
}

struct TestDb {
    _dir: tempfile::TempDir,
    path: String,
}

impl TestDb {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emapper.db").to_string_lossy().into_owned();
        SqliteConnection::open(&path)
            .unwrap()
            .execute_batch(SCHEMA)
            .unwrap();
        Self { _dir: dir, path }
    }

    fn options(&self) -> MapperOptions {
        MapperOptions::new()
            .use_sqlite()
            .connection_string(self.path.clone())
    }

    fn context(&self) -> Arc<MapperContext> {
        MapperContext::new(self.options())
    }

    fn counted(&self, options: MapperOptions) -> (Arc<MapperContext>, Arc<CountingConnector>) {
        let connector = Arc::new(CountingConnector {
            path: self.path.clone(),
            opened: AtomicUsize::new(0),
        });
        let ctx = MapperContext::new(options.connector(connector.clone()));
        (ctx, connector)
    }
}

fn user(name: &str, age: i32) -> User {
    let mut u = User::default();
    u.set_name(name);
    u.set_login_password("secret");
    u.set_age(age);
    u
}

fn user_by_id(mapper: &mut Mapper, id: i64) -> Option<User> {
    mapper
        .query::<User>()
        .filter(User::COL_ID.eq(id))
        .first_or_default()
        .unwrap()
}

#[test]
fn add_assigns_id_and_stamps_times() {
    let db = TestDb::new();
    let mut mapper = db.context().create_mapper();

    let mut ann = user("annie", 31);
    ann.set_email(Some("annie@example.com".to_string()));
    let id = mapper.add(&mut ann).unwrap();

    assert!(id > 0);
    assert_eq!(ann.id(), id);
    assert!(ann.base.tracker().is_empty());
    assert!(ann.base.add_time().is_some());

    let loaded = user_by_id(&mut mapper, id).unwrap();
    assert_eq!(loaded.name(), "annie");
    assert_eq!(*loaded.age(), 31);
    assert_eq!(loaded.email().as_deref(), Some("annie@example.com"));
    assert!(!loaded.base.is_deleted());
    assert!(loaded.base.add_time().is_some());
    assert!(loaded.base.tracker().is_empty());
}

#[test]
fn invalid_entity_is_rejected_before_any_sql() {
    let db = TestDb::new();
    let (ctx, connector) = db.counted(db.options());
    let mut mapper = ctx.create_mapper();

    let mut no_password = User::default();
    no_password.set_name("annie");
    let err = mapper.add(&mut no_password).unwrap_err();

    let detail = err.validation_error().unwrap();
    assert_eq!(detail.field, "login_password");
    assert_eq!(detail.code, ValidationCode::Required);
    assert_eq!(connector.opened(), 0);
    assert_eq!(no_password.id(), 0);

    let err = mapper.add(&mut user("al", 5)).unwrap_err();
    assert_eq!(err.validation_error().unwrap().code, ValidationCode::Len);
}

#[test]
fn validation_can_be_disabled() {
    let db = TestDb::new();
    let ctx = MapperContext::new(db.options().enable_model_validation(false));
    let mut mapper = ctx.create_mapper();

    let mut short = user("al", 5);
    assert!(mapper.add(&mut short).unwrap() > 0);
}

#[test]
fn update_writes_changed_fields_only() {
    let db = TestDb::new();
    let mut mapper = db.context().create_mapper();

    let mut bob = user("bobby", 20);
    let id = mapper.add(&mut bob).unwrap();
    let added_at = bob.base.last_modify_time();

    bob.set_age(21);
    assert!(mapper.update_by_id(&mut bob).unwrap());
    assert!(bob.base.tracker().is_empty());
    assert!(bob.base.last_modify_time() >= added_at);

    let loaded = user_by_id(&mut mapper, id).unwrap();
    assert_eq!(*loaded.age(), 21);
    assert_eq!(loaded.name(), "bobby");
}

#[test]
fn clearing_an_optional_field_writes_null() {
    let db = TestDb::new();
    let mut mapper = MapperContext::new(db.options().no_cache()).create_mapper();

    let mut cleo = user("cleoo", 28);
    cleo.set_email(Some("a@b.co".to_string()));
    let id = mapper.add(&mut cleo).unwrap();
    assert_eq!(
        user_by_id(&mut mapper, id).unwrap().email().as_deref(),
        Some("a@b.co")
    );

    cleo.set_email(None::<String>);
    assert!(mapper.update_by_id(&mut cleo).unwrap());
    assert!(cleo.base.tracker().is_empty());

    let loaded = user_by_id(&mut mapper, id).unwrap();
    assert_eq!(*loaded.email(), None);
    assert_eq!(*loaded.age(), 28);
}

#[test]
fn update_with_filter_reports_missing_rows() {
    let db = TestDb::new();
    let mut mapper = db.context().create_mapper();

    let mut patch = User::default();
    patch.set_age(99);
    let hit = mapper.update(&mut patch, User::COL_NAME.eq("nobody")).unwrap();
    assert!(!hit);
}

#[test]
fn update_without_changes_fails() {
    let db = TestDb::new();
    let (ctx, connector) = db.counted(db.options());
    let mut mapper = ctx.create_mapper();

    let mut cara = user("carla", 40);
    mapper.add(&mut cara).unwrap();
    let opened = connector.opened();

    let err = mapper.update_by_id(&mut cara).unwrap_err();
    assert_eq!(
        err.validation_error().map(|e| e.code.clone()),
        Some(ValidationCode::NoChanges)
    );
    assert_eq!(connector.opened(), opened);

    let err = mapper.update_by_id(&mut User::default()).unwrap_err();
    assert!(err.is_argument());
}

#[test]
fn invalid_change_keeps_pending_fields() {
    let db = TestDb::new();
    let mut mapper = db.context().create_mapper();

    let mut dina = user("dinah", 40);
    mapper.add(&mut dina).unwrap();

    dina.set_email(Some("not-an-email".to_string()));
    let err = mapper.update_by_id(&mut dina).unwrap_err();
    assert_eq!(err.validation_error().unwrap().code, ValidationCode::Email);
    assert_eq!(dina.base.tracker().changes().len(), 1);
}

#[test]
fn remove_is_a_soft_delete() {
    let db = TestDb::new();
    let mut mapper = db.context().create_mapper();

    let mut eve = user("evelyn", 28);
    let id = mapper.add(&mut eve).unwrap();
    assert!(mapper.remove(&mut eve).unwrap());
    assert!(eve.base.is_deleted());

    assert!(user_by_id(&mut mapper, id).is_none());

    let raw = mapper
        .sql_query(
            "SELECT is_deleted FROM newcrm_user WHERE id = @id",
            vec![Parameter::new("id", id).unwrap()],
        )
        .unwrap();
    assert_eq!(raw.scalar::<i64>().unwrap(), Some(1));
}

#[test]
fn repeated_reads_are_served_from_cache() {
    let db = TestDb::new();
    let (ctx, connector) = db.counted(db.options());
    let mut mapper = ctx.create_mapper();

    let mut fay = user("fayes", 50);
    let id = mapper.add(&mut fay).unwrap();
    assert_eq!(connector.opened(), 1);

    assert_eq!(*user_by_id(&mut mapper, id).unwrap().age(), 50);
    assert_eq!(*user_by_id(&mut mapper, id).unwrap().age(), 50);
    assert_eq!(connector.opened(), 2);

    // Writes do not invalidate cached reads.
    fay.set_age(51);
    mapper.update_by_id(&mut fay).unwrap();
    assert_eq!(connector.opened(), 3);
    assert_eq!(*user_by_id(&mut mapper, id).unwrap().age(), 50);
    assert_eq!(connector.opened(), 3);

    ctx.cache().clear();
    assert_eq!(*user_by_id(&mut mapper, id).unwrap().age(), 51);
    assert_eq!(connector.opened(), 4);
}

#[test]
fn disabled_cache_always_hits_the_database() {
    let db = TestDb::new();
    let (ctx, connector) = db.counted(db.options().no_cache());
    let mut mapper = ctx.create_mapper();

    mapper.query::<User>().count().unwrap();
    mapper.query::<User>().count().unwrap();
    assert_eq!(connector.opened(), 2);
}

#[test]
fn transaction_commits_on_ok() {
    let db = TestDb::new();
    let ctx = MapperContext::new(db.options().no_cache());
    let mut mapper = ctx.create_mapper();

    let id = mapper
        .transaction(|m| {
            let mut gil = user("gilly", 33);
            let id = m.add(&mut gil)?;
            assert!(m.in_transaction());
            assert!(user_by_id(m, id).is_some());
            Ok(id)
        })
        .unwrap();

    assert!(!mapper.in_transaction());
    assert!(user_by_id(&mut mapper, id).is_some());
}

#[test]
fn transaction_rolls_back_on_err() {
    let db = TestDb::new();
    let ctx = MapperContext::new(db.options().no_cache());
    let mut mapper = ctx.create_mapper();

    let err = mapper
        .transaction(|m| {
            m.add(&mut user("henry", 44))?;
            Err::<(), _>(OrmError::Other("abort".to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, OrmError::Other(ref message) if message == "abort"));
    assert!(!mapper.in_transaction());
    assert_eq!(mapper.query::<User>().count().unwrap(), 0);
}

#[test]
fn reads_inside_a_transaction_bypass_the_cache() {
    let db = TestDb::new();
    let (ctx, connector) = db.counted(db.options());

    let mut writer = ctx.create_mapper();
    writer.open_transaction().unwrap();
    let id = writer.add(&mut user("olive", 36)).unwrap();
    assert!(user_by_id(&mut writer, id).is_some());
    writer.rollback().unwrap();
    let opened = connector.opened();

    // The rolled-back row must not be served to anyone else.
    let mut reader = ctx.create_mapper();
    assert!(user_by_id(&mut reader, id).is_none());
    assert_eq!(connector.opened(), opened + 1);
    assert!(user_by_id(&mut reader, id).is_none());
    assert_eq!(connector.opened(), opened + 1);
}

#[test]
fn explicit_transaction_and_abandoned_rollback() {
    let db = TestDb::new();
    let ctx = MapperContext::new(db.options().no_cache());

    let mut mapper = ctx.create_mapper();
    mapper.open_transaction().unwrap();
    assert!(mapper.open_transaction().unwrap_err().is_argument());
    mapper.add(&mut user("irene", 23)).unwrap();
    mapper.commit().unwrap();
    assert!(mapper.commit().unwrap_err().is_argument());

    {
        let mut abandoned = ctx.create_mapper();
        abandoned.open_transaction().unwrap();
        abandoned.add(&mut user("jacob", 24)).unwrap();
    }

    assert_eq!(mapper.query::<User>().count().unwrap(), 1);
}

#[test]
fn query_terminals() {
    let db = TestDb::new();
    let ctx = MapperContext::new(db.options().no_cache());
    let mut mapper = ctx.create_mapper();
    for (name, age) in [("kenny", 20), ("laura", 30), ("maria", 40)] {
        mapper.add(&mut user(name, age)).unwrap();
    }

    assert_eq!(mapper.query::<User>().count().unwrap(), 3);
    assert_eq!(
        mapper.query::<User>().filter(User::COL_AGE.ge(30)).count().unwrap(),
        2
    );
    assert!(!mapper.query::<User>().filter(User::COL_AGE.gt(100)).exists().unwrap());
    assert!(mapper.query::<User>().filter(User::COL_NAME.starts_with("lau")).exists().unwrap());

    let oldest = mapper
        .query::<User>()
        .order_by_desc(User::COL_AGE)
        .first_or_default()
        .unwrap()
        .unwrap();
    assert_eq!(oldest.name(), "maria");

    let second_page = mapper
        .query::<User>()
        .order_by_asc(User::COL_AGE)
        .page(2, 1)
        .to_list()
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].name(), "laura");

    let picked = mapper
        .query::<User>()
        .filter(User::COL_NAME.in_list(["kenny", "maria"]))
        .order_by_asc(User::COL_NAME)
        .to_list()
        .unwrap();
    let names: Vec<&str> = picked.iter().map(|u| u.name().as_str()).collect();
    assert_eq!(names, ["kenny", "maria"]);
}

#[test]
fn criteria_and_cursor_paging() {
    let db = TestDb::new();
    let ctx = MapperContext::new(db.options().no_cache());
    let mut mapper = ctx.create_mapper();
    let mut ids = Vec::new();
    for (name, age) in [("nancy", 25), ("oscar", 35), ("pablo", 45), ("quinn", 55)] {
        ids.push(mapper.add(&mut user(name, age)).unwrap());
    }

    let young = Criteria::<User>::new()
        .filter(User::COL_AGE.lt(50))
        .order_by_desc(User::COL_AGE);
    let not_nancy = Criteria::<User>::new().filter(User::COL_NAME.eq("nancy")).not();
    let list = mapper
        .query::<User>()
        .apply(young.and(not_nancy))
        .to_list()
        .unwrap();
    let ages: Vec<i32> = list.iter().map(|u| *u.age()).collect();
    assert_eq!(ages, [45, 35]);

    let below_last = mapper.query::<User>().after_key(ids[3], 2).to_list().unwrap();
    let got: Vec<i64> = below_last.iter().map(|u| u.id()).collect();
    assert_eq!(got, [ids[2], ids[1]]);
}

#[test]
fn joins_filter_on_related_rows() {
    let db = TestDb::new();
    let ctx = MapperContext::new(db.options().no_cache());
    let mut mapper = ctx.create_mapper();

    let admin = mapper.add(&mut user("admin", 30)).unwrap();
    mapper.add(&mut user("guest", 30)).unwrap();
    let mut role = UserRole::default();
    role.set_user_id(admin);
    role.set_role_id(7);
    mapper.add(&mut role).unwrap();

    let admins = mapper
        .query::<User>()
        .inner_join::<UserRole>(User::COL_ID.eq_col(UserRole::COL_USER_ID))
        .filter(UserRole::COL_ROLE_ID.eq(7))
        .to_list()
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].id(), admin);

    let everyone = mapper
        .query::<User>()
        .left_join::<UserRole>(User::COL_ID.eq_col(UserRole::COL_USER_ID))
        .count()
        .unwrap();
    assert_eq!(everyone, 2);
}

#[test]
fn projections_read_as_rows() {
    let db = TestDb::new();
    let mut mapper = db.context().create_mapper();
    mapper.add(&mut user("rosie", 61)).unwrap();

    let rows = mapper
        .query::<User>()
        .select(
            Projection::new()
                .column(User::COL_NAME)
                .column_as(User::COL_AGE, "years"),
        )
        .to_rows()
        .unwrap();
    assert_eq!(rows.columns, ["name", "years"]);
    let first = rows.iter().next().unwrap();
    assert_eq!(first.try_get::<i64>("years").unwrap(), 61);
}

#[test]
fn raw_sql_and_idempotent_removal() {
    let db = TestDb::new();
    let mut mapper = db.context().create_mapper();

    let created = mapper
        .sql_query("CREATE INDEX ix_user_age ON newcrm_user (age)", Vec::new())
        .unwrap();
    assert_eq!(created, RawResult::Affected(0));

    assert!(mapper.execute_idempotent_removal("DROP INDEX ix_user_age").unwrap());
    assert!(!mapper.execute_idempotent_removal("DROP INDEX ix_user_age").unwrap());

    let err = mapper.execute_idempotent_removal("DROP INDEXX ix").unwrap_err();
    assert!(err.is_data_access());
    assert_eq!(err.failed_sql(), Some("DROP INDEXX ix"));

    mapper.add(&mut user("sammy", 19)).unwrap();
    let listed = mapper
        .sql_query(
            "SELECT * FROM newcrm_user WHERE age < @age",
            vec![Parameter::new("age", 20).unwrap()],
        )
        .unwrap()
        .list::<User>()
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name(), "sammy");
}

#[test]
fn dialect_is_frozen_after_first_translation() {
    let db = TestDb::new();
    let ctx = db.context();
    let mut mapper = ctx.create_mapper();

    ctx.set_dialect(Arc::new(emapper::SqliteDialect::new())).unwrap();
    mapper.query::<User>().count().unwrap();

    let err = ctx.set_dialect(Arc::new(MySqlDialect::new())).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(ctx.dialect().unwrap().name(), "sqlite");
}
