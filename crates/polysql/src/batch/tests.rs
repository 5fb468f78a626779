use super::*;
use crate::config::PolysqlConfig;
use crate::dialect::{SqlDialect, create_dialect};
use crate::mapping::EntityMapping;
use crate::sql::OmitStrategy;

fn users() -> EntityMapping {
    EntityMapping::builder("SYS_USER")
        .primary_key("id")
        .field("userName")
        .field("deptCode")
        .build()
        .unwrap()
}

fn version(db: DbType, major: u32) -> DbVersion {
    DbVersion::new(db, major, 0)
}

fn dialect(db: DbType) -> Arc<dyn SqlDialect> {
    create_dialect(&version(db, 8)).unwrap()
}

fn row(id: i64, fields: &[(&str, &str)]) -> PkEntity {
    let entity = fields
        .iter()
        .map(|(k, v)| (k.to_string(), SqlValue::from(*v)))
        .collect();
    PkEntity::new(id, entity)
}

fn sql_of(statements: &BatchStatements) -> Vec<String> {
    statements
        .statements()
        .iter()
        .map(|s| s.render_named().sql)
        .collect()
}

fn defaults() -> (InsertRegistry, UpdateRegistry) {
    let config = BatchConfig::default();
    (
        InsertRegistry::with_defaults(&config).unwrap(),
        UpdateRegistry::with_defaults(&config).unwrap(),
    )
}

#[test]
fn selects_fastest_supported_insert() {
    let (inserts, _) = defaults();
    assert_eq!(
        inserts.names(),
        ["multi_row_values", "union_all_dual", "multi_statement", "per_row"]
    );
    let pick = |db, major| inserts.select(&version(db, major)).unwrap().name();
    assert_eq!(pick(DbType::MySql, 8), "multi_row_values");
    assert_eq!(pick(DbType::MariaDb, 10), "multi_row_values");
    assert_eq!(pick(DbType::Oracle, 19), "union_all_dual");
    assert_eq!(pick(DbType::PostgreSql, 15), "multi_row_values");
    assert_eq!(pick(DbType::PostgreSql, 8), "per_row");
    assert_eq!(pick(DbType::Db2, 11), "per_row");
    assert_eq!(pick(DbType::SqlServer, 16), "per_row");
    assert_eq!(pick(DbType::Unknown("informix".into()), 14), "per_row");
}

#[test]
fn selects_fastest_supported_update() {
    let (_, updates) = defaults();
    let pick = |db| updates.select(&version(db, 8)).unwrap().name();
    assert_eq!(pick(DbType::MySql), "join_using");
    assert_eq!(pick(DbType::Oracle), "case_when");
    assert_eq!(pick(DbType::Db2), "case_when");
    assert_eq!(pick(DbType::PostgreSql), "per_row");
    assert_eq!(pick(DbType::Sqlite), "per_row");
}

#[test]
fn multi_statement_requires_configuration() {
    let config = PolysqlConfig::default()
        .with_multi_statement(true)
        .disable_strategy("multi_row_values")
        .disable_strategy("join_using")
        .disable_strategy("case_when");
    let inserts = InsertRegistry::with_defaults(&config.batch).unwrap();
    let updates = UpdateRegistry::with_defaults(&config.batch).unwrap();
    let mysql = version(DbType::MySql, 8);
    assert_eq!(inserts.select(&mysql).unwrap().name(), "multi_statement");
    assert_eq!(updates.select(&mysql).unwrap().name(), "multi_statement");

    let config = PolysqlConfig::default().disable_strategy("multi_row_values");
    let inserts = InsertRegistry::with_defaults(&config.batch).unwrap();
    assert_eq!(inserts.select(&mysql).unwrap().name(), "per_row");
}

#[test]
fn override_replaces_allow_list() {
    let config = PolysqlConfig::default()
        .override_strategy("multi_row_values", vec![DbType::Db2])
        .override_strategy("case_when", vec![DbType::PostgreSql]);
    let inserts = InsertRegistry::with_defaults(&config.batch).unwrap();
    let updates = UpdateRegistry::with_defaults(&config.batch).unwrap();

    assert_eq!(
        inserts.select(&version(DbType::Db2, 11)).unwrap().name(),
        "multi_row_values"
    );
    // MySQL is no longer on the list; it falls through to the next supporting entry.
    assert_eq!(
        inserts.select(&version(DbType::MySql, 8)).unwrap().name(),
        "per_row"
    );
    assert_eq!(
        updates.select(&version(DbType::PostgreSql, 15)).unwrap().name(),
        "case_when"
    );
}

#[test]
fn override_does_not_bypass_multi_statement_flag() {
    let config = PolysqlConfig::default()
        .override_strategy("multi_statement", vec![DbType::MySql])
        .disable_strategy("multi_row_values")
        .disable_strategy("join_using")
        .disable_strategy("case_when");
    config.validate().unwrap();
    let inserts = InsertRegistry::with_defaults(&config.batch).unwrap();
    let updates = UpdateRegistry::with_defaults(&config.batch).unwrap();
    let mysql = version(DbType::MySql, 8);
    assert_eq!(inserts.select(&mysql).unwrap().name(), "per_row");
    assert_eq!(updates.select(&mysql).unwrap().name(), "per_row");

    let config = config.with_multi_statement(true);
    let inserts = InsertRegistry::with_defaults(&config.batch).unwrap();
    assert_eq!(inserts.select(&mysql).unwrap().name(), "multi_statement");
}

#[test]
fn fallback_stays_available_for_every_database() {
    let config = PolysqlConfig::default().override_strategy("per_row", vec![DbType::Oracle]);
    assert!(InsertRegistry::with_defaults(&config.batch)
        .unwrap_err()
        .is_config_error());
    assert!(UpdateRegistry::with_defaults(&config.batch)
        .unwrap_err()
        .is_config_error());

    let (inserts, updates) = defaults();
    for db in [DbType::Db2, DbType::SqlServer, DbType::Unknown("informix".into())] {
        assert!(inserts.select(&version(db.clone(), 11)).is_ok());
        assert!(updates.select(&version(db, 11)).is_ok());
    }
}

#[test]
fn custom_strategy_can_be_registered_first() {
    #[derive(Debug)]
    struct CopyInsert;
    impl BatchStrategy for CopyInsert {
        fn name(&self) -> &'static str {
            "copy"
        }
        fn supports(&self, version: &DbVersion) -> bool {
            version.db_type == DbType::PostgreSql
        }
    }
    impl BatchInsertStrategy for CopyInsert {
        fn build(&self, _: &BatchInput<'_>, _: &FragmentBuilder<'_>) -> OrmResult<BatchStatements> {
            Ok(BatchStatements::One(SqlBuffer::of("COPY SYS_USER FROM STDIN")))
        }
    }

    let (mut inserts, _) = defaults();
    inserts.prepend(Arc::new(CopyInsert));
    assert_eq!(inserts.names()[0], "copy");
    assert_eq!(
        inserts.select(&version(DbType::PostgreSql, 15)).unwrap().name(),
        "copy"
    );
    assert_eq!(
        inserts.select(&version(DbType::Oracle, 19)).unwrap().name(),
        "union_all_dual"
    );
}

#[test]
fn empty_registry_reports_exhaustion() {
    let registry = InsertRegistry::empty("insert");
    let err = registry.select(&version(DbType::MySql, 8)).unwrap_err();
    assert!(matches!(err, OrmError::NoBatchStrategy { kind: "insert", .. }));
}

#[test]
fn disabling_unknown_strategy_fails() {
    let (mut inserts, _) = defaults();
    assert!(inserts.disable("join_using").unwrap_err().is_config_error());
}

#[test]
fn multi_row_values_shape() {
    let m = users();
    let d = dialect(DbType::MySql);
    let f = FragmentBuilder::new(&m, &*d);
    let rows = [row(1, &[("userName", "a")]), row(2, &[("userName", "b")])];
    let out = MultiRowValuesInsert
        .build(&BatchInput::for_insert(&rows, &f).unwrap(), &f)
        .unwrap();
    assert_eq!(
        sql_of(&out),
        ["INSERT INTO SYS_USER(ID, USER_NAME) VALUES\n\t(:$1$id, :$2$userName),\n\t(:$3$id, :$4$userName)"]
    );
}

#[test]
fn union_all_dual_shape() {
    let m = users();
    let d = dialect(DbType::Oracle);
    let f = FragmentBuilder::new(&m, &*d);
    let rows = [row(1, &[("userName", "a")]), row(2, &[("userName", "b")])];
    let out = UnionAllDualInsert
        .build(&BatchInput::for_insert(&rows, &f).unwrap(), &f)
        .unwrap();
    assert_eq!(
        sql_of(&out),
        ["INSERT INTO SYS_USER(ID, USER_NAME)\n\
          SELECT :$1$id, :$2$userName FROM DUAL\n\
          UNION ALL SELECT :$3$id, :$4$userName FROM DUAL"]
    );
}

#[test]
fn multi_statement_insert_shape() {
    let m = users();
    let d = dialect(DbType::MySql);
    let f = FragmentBuilder::new(&m, &*d);
    let rows = [row(1, &[("userName", "a")]), row(2, &[("userName", "b")])];
    let out = MultiStatementInsert::new(true)
        .build(&BatchInput::for_insert(&rows, &f).unwrap(), &f)
        .unwrap();
    assert_eq!(
        sql_of(&out),
        ["INSERT INTO SYS_USER(ID, USER_NAME) VALUES(:$1$id, :$2$userName);\n\
          INSERT INTO SYS_USER(ID, USER_NAME) VALUES(:$3$id, :$4$userName)"]
    );
}

#[test]
fn missing_insert_fields_bind_null() {
    let m = users();
    let d = dialect(DbType::Db2);
    let f = FragmentBuilder::new(&m, &*d);
    let rows = [row(1, &[("userName", "a")]), row(2, &[("deptCode", "D")])];
    let out = PerRowInsert
        .build(&BatchInput::for_insert(&rows, &f).unwrap(), &f)
        .unwrap();
    let statements = out.statements();
    assert_eq!(statements.len(), 2);
    let second = statements[1].render_named();
    assert_eq!(
        second.sql,
        "INSERT INTO SYS_USER(ID, USER_NAME, DEPT_CODE) VALUES(:$1$id, :$2$userName, :$3$deptCode)"
    );
    assert_eq!(second.get("$2$userName"), Some(&SqlValue::Null));
    assert_eq!(second.get("$3$deptCode"), Some(&SqlValue::from("D")));
}

#[test]
fn case_when_shape() {
    let m = users();
    let d = dialect(DbType::Oracle);
    let f = FragmentBuilder::new(&m, &*d);
    let rows = [
        row(1, &[("userName", "a"), ("deptCode", "D")]),
        row(2, &[("userName", "b")]),
    ];
    let out = CaseWhenUpdate
        .build(&BatchInput::for_update(&rows, &f).unwrap(), &f)
        .unwrap();
    assert_eq!(
        sql_of(&out),
        ["UPDATE SYS_USER SET\n\
          \tUSER_NAME=(CASE ID\n\
          \t\tWHEN :$1$id THEN :$2$userName\n\
          \t\tWHEN :$3$id THEN :$4$userName\n\
          \t\tELSE USER_NAME END),\n\
          \tDEPT_CODE=(CASE ID\n\
          \t\tWHEN :$5$id THEN :$6$deptCode\n\
          \t\tELSE DEPT_CODE END)\n\
          WHERE ID IN (\n\
          \t:$7$id,\n\
          \t:$8$id\n\
          )"]
    );
}

#[test]
fn join_using_shape() {
    let m = users();
    let d = dialect(DbType::MySql);
    let f = FragmentBuilder::new(&m, &*d);
    let rows = [
        row(1, &[("userName", "a"), ("deptCode", "D")]),
        row(2, &[("userName", "b")]),
    ];
    let out = JoinUsingUpdate
        .build(&BatchInput::for_update(&rows, &f).unwrap(), &f)
        .unwrap();
    assert_eq!(
        sql_of(&out),
        ["UPDATE SYS_USER A JOIN (\n\
          \tSELECT :$1$id AS ID, :$2$userName AS USER_NAME, :$3$deptCode AS DEPT_CODE\n\
          \tUNION SELECT :$4$id, :$5$userName, :$6$deptCode\n\
          ) B USING(ID)\n\
          SET A.USER_NAME=B.USER_NAME, A.DEPT_CODE=COALESCE(B.DEPT_CODE, A.DEPT_CODE)"]
    );
}

#[test]
fn per_row_update_sets_only_present_fields() {
    let m = users();
    let d = dialect(DbType::PostgreSql);
    let f = FragmentBuilder::new(&m, &*d);
    let rows = [
        row(1, &[("userName", "a"), ("deptCode", "D")]),
        row(2, &[("userName", "b")]),
    ];
    let (_, updates) = defaults();
    let out = updates
        .build(&version(DbType::PostgreSql, 15), &rows, &f)
        .unwrap();
    assert_eq!(
        sql_of(&out),
        [
            "UPDATE SYS_USER SET USER_NAME=:$1$userName, DEPT_CODE=:$2$deptCode\nWHERE ID=:$3$id",
            "UPDATE SYS_USER SET USER_NAME=:$1$userName\nWHERE ID=:$2$id",
        ]
    );
}

#[test]
fn per_row_update_follows_mapping_order() {
    let m = EntityMapping::builder("SYS_USER")
        .primary_key("id")
        .field("zone")
        .field("age")
        .build()
        .unwrap();
    let d = dialect(DbType::MySql);
    let f = FragmentBuilder::new(&m, &*d);
    let mut entity = Entity::new();
    entity.insert("age".to_string(), SqlValue::Int(30));
    entity.insert("zone".to_string(), SqlValue::from("EU"));
    let rows = [PkEntity::new(1, entity)];
    let batch = BatchInput::for_update(&rows, &f).unwrap();

    let per_row = PerRowUpdate.build(&batch, &f).unwrap();
    assert_eq!(
        sql_of(&per_row),
        ["UPDATE SYS_USER SET ZONE=:$1$zone, AGE=:$2$age\nWHERE ID=:$3$id"]
    );
    let multi = MultiStatementUpdate::new(true).build(&batch, &f).unwrap();
    assert_eq!(sql_of(&multi), sql_of(&per_row));
}

#[test]
fn update_never_sets_primary_key() {
    let m = users();
    let d = dialect(DbType::Oracle);
    let f = FragmentBuilder::new(&m, &*d);
    let mut r = row(1, &[("userName", "a")]);
    r.entity.insert("id".into(), SqlValue::Int(99));
    let batch = BatchInput::for_update(&[r], &f).unwrap();
    assert_eq!(batch.fields, ["userName"]);
    assert!(!batch.rows[0].entity.contains_key("id"));
}

#[test]
fn rejects_bad_batches() {
    let m = users();
    let d = dialect(DbType::MySql);
    let f = FragmentBuilder::new(&m, &*d);
    let (inserts, updates) = defaults();
    let mysql = version(DbType::MySql, 8);

    assert!(matches!(
        inserts.build(&mysql, &[], &f),
        Err(OrmError::Validation(_))
    ));

    let keyless = PkEntity::new(SqlValue::Null, Entity::new());
    assert!(matches!(
        inserts.build(&mysql, &[keyless], &f),
        Err(OrmError::PrimaryKeyRequired(_))
    ));
    let blank = PkEntity::new(" ", Entity::new());
    assert!(matches!(
        updates.build(&mysql, &[blank], &f),
        Err(OrmError::PrimaryKeyRequired(_))
    ));

    let unknown = row(1, &[("nickName", "x")]);
    assert!(inserts.build(&mysql, &[unknown], &f).unwrap_err().is_unsupported_field());

    let nothing = row(1, &[]);
    assert!(matches!(
        updates.build(&mysql, &[nothing], &f),
        Err(OrmError::Validation(_))
    ));
}

#[test]
fn large_batch_log_render_is_bounded() {
    let m = users();
    let d = dialect(DbType::MySql);
    let f = FragmentBuilder::new(&m, &*d);
    let rows: Vec<PkEntity> = (1..=1200)
        .map(|i| {
            let name = format!("user{i}");
            row(i, &[("userName", name.as_str())])
        })
        .collect();
    let (inserts, _) = defaults();
    let out = inserts.build(&version(DbType::MySql, 8), &rows, &f).unwrap();
    let [sql] = out.statements() else {
        panic!("expected one statement");
    };

    let named = sql.render_named();
    assert_eq!(named.params.len(), 2400);
    assert_eq!(named.sql.matches("\n\t(").count(), 1200);

    let logged = sql.render_literal_omitted(&*d, &OmitStrategy::new(8, 3));
    assert_eq!(logged.matches("\n\t(").count(), 6);
    assert_eq!(logged.matches("rows omitted").count(), 1);
    assert!(logged.contains("\n\t/* ... 1194 rows omitted ... */"));
    assert!(logged.contains("(1, 'user1')"));
    assert!(logged.contains("(3, 'user3')"));
    assert!(!logged.contains("'user4'"));
    assert!(!logged.contains("'user1197'"));
    assert!(logged.contains("(1198, 'user1198')"));
    assert!(logged.ends_with("(1200, 'user1200')"));
}

#[test]
fn case_when_omits_every_run() {
    let m = users();
    let d = dialect(DbType::Oracle);
    let f = FragmentBuilder::new(&m, &*d);
    let rows: Vec<PkEntity> = (1..=20).map(|i| row(i, &[("userName", "u")])).collect();
    let (_, updates) = defaults();
    let out = updates.build(&version(DbType::Oracle, 19), &rows, &f).unwrap();
    let logged = out.statements()[0].render_literal_omitted(&*d, &OmitStrategy::new(8, 3));
    // one run of WHEN arms and one run of IN-list keys
    assert_eq!(logged.matches("14 rows omitted").count(), 2);
    assert!(logged.contains("\n\t\t/* ... 14 rows omitted ... */"));
    assert!(logged.contains("\n\t/* ... 14 rows omitted ... */"));
}
