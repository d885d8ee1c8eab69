//! Tests for the DuckDB connector: bootstrap, transactional apply, tenant
//! onboarding and version queries.

use super::*;
use mg_core::MigrationKind;

// ── Helpers ────────────────────────────────────────────────────────────

fn connector() -> DuckDbConnector {
    let mut connector = DuckDbConnector::in_memory(ConnectorSettings::default());
    connector.init().unwrap();
    connector
}

fn count(connector: &DuckDbConnector, sql: &str) -> i64 {
    connector
        .conn()
        .unwrap()
        .query_row(sql, [], |row| row.get::<_, i64>(0))
        .unwrap()
}

fn table_exists(connector: &DuckDbConnector, schema: &str, table: &str) -> bool {
    count(
        connector,
        &format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = '{schema}' AND table_name = '{table}'"
        ),
    ) > 0
}

fn single(name: &str, dir: &str, sql: &str) -> MigrationDefinition {
    MigrationDefinition::new(name, dir, MigrationKind::SingleMigration, sql)
}

fn tenant(name: &str, sql: &str) -> MigrationDefinition {
    MigrationDefinition::new(name, "tenants", MigrationKind::TenantMigration, sql)
}

fn tenant_name(name: &str) -> TenantName {
    TenantName::try_new(name).unwrap()
}

fn add_tenant(connector: &mut DuckDbConnector, name: &str) -> VersionSummary {
    connector
        .add_tenant_and_apply_migrations(ApplyMode::Apply, "onboard", &tenant_name(name), &[])
        .unwrap()
}

// ── Bootstrap ──────────────────────────────────────────────────────────

#[test]
fn init_creates_migrator_tables() {
    let connector = connector();
    assert!(table_exists(&connector, "migrator", "migrator_migrations"));
    assert!(table_exists(&connector, "migrator", "migrator_tenants"));
    assert!(table_exists(&connector, "migrator", "migrator_versions"));
    assert!(connector.tenants().unwrap().is_empty());
    assert!(connector.versions().unwrap().is_empty());
}

#[test]
fn init_is_idempotent() {
    let mut connector = connector();
    connector.init().unwrap();
    connector.init().unwrap();
    assert!(connector.versions().unwrap().is_empty());
}

#[test]
fn init_retrofits_initial_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.duckdb");
    let dialect = DuckDbDialect::new();
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(&dialect.create_schema_sql(MIGRATOR_SCHEMA))
            .unwrap();
        conn.execute_batch(&dialect.create_migrations_table_sql())
            .unwrap();
        for name in ["201602220000.sql", "201602220001.sql"] {
            conn.execute(
                "INSERT INTO migrator.migrator_migrations \
                 (id, name, source_dir, filename, type, db_schema, contents, checksum) \
                 VALUES (nextval('migrator.migrator_migrations_id_seq'), ?, 'source', ?, 1, 'source', 'select 1', 'abc')",
                params![name, format!("source/{name}")],
            )
            .unwrap();
        }
    }

    let mut connector =
        DuckDbConnector::new(path.to_str().unwrap(), ConnectorSettings::default());
    connector.init().unwrap();
    connector.init().unwrap();

    let versions = connector.versions().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].name, Version::INITIAL_VERSION_NAME);

    let applied = connector.applied_migrations().unwrap();
    assert_eq!(applied.len(), 2);
    assert!(applied.iter().all(|m| m.version.id == versions[0].id));
    connector.dispose();
}

#[test]
fn failed_retrofit_leaves_no_initial_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.duckdb");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE SCHEMA migrator; \
             CREATE SEQUENCE migrator.migrator_migrations_id_seq; \
             CREATE TABLE migrator.migrator_migrations ( \
               id BIGINT NOT NULL DEFAULT nextval('migrator.migrator_migrations_id_seq'), \
               name VARCHAR NOT NULL, source_dir VARCHAR NOT NULL, filename VARCHAR NOT NULL, \
               type INTEGER NOT NULL, db_schema VARCHAR NOT NULL, \
               created TIMESTAMP NOT NULL DEFAULT current_timestamp, \
               contents VARCHAR NOT NULL, checksum VARCHAR NOT NULL, \
               version_id BIGINT CHECK (version_id < 0)); \
             INSERT INTO migrator.migrator_migrations \
               (name, source_dir, filename, type, db_schema, contents, checksum) \
               VALUES ('001.sql', 'source', 'source/001.sql', 1, 'source', 'select 1', 'abc');",
        )
        .unwrap();
    }

    let mut connector =
        DuckDbConnector::new(path.to_str().unwrap(), ConnectorSettings::default());
    let result = connector.init();
    assert!(matches!(result, Err(DbError::BootstrapError { .. })));
    assert!(!table_exists(&connector, "migrator", "migrator_versions"));
    assert!(!table_exists(&connector, "migrator", "migrator_tenants"));

    // a second attempt hits the same wall instead of stacking versions
    assert!(connector.init().is_err());
    assert!(!table_exists(&connector, "migrator", "migrator_versions"));
    connector.dispose();
}

#[test]
fn panic_inside_transaction_rolls_back() {
    let mut conn = Connection::open_in_memory().unwrap();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        in_transaction(&mut conn, |tx| -> DbResult<()> {
            tx.execute_batch("CREATE TABLE main.leak (id INTEGER)").unwrap();
            panic!("statement loop blew up");
        })
    }));
    assert!(outcome.is_err());

    // no transaction is left open on the connection
    conn.execute_batch("BEGIN TRANSACTION; ROLLBACK;").unwrap();
    let leaked: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'leak'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(leaked, 0);
}

#[test]
fn in_transaction_commits_on_success() {
    let mut conn = Connection::open_in_memory().unwrap();
    let value = in_transaction(&mut conn, |tx| {
        tx.execute_batch("CREATE TABLE main.kept (id INTEGER); INSERT INTO main.kept VALUES (7);")
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(42)
    })
    .unwrap();
    assert_eq!(value, 42);
    let kept: i64 = conn
        .query_row("SELECT id FROM main.kept", [], |row| row.get(0))
        .unwrap();
    assert_eq!(kept, 7);
}

#[test]
fn init_with_tenant_select_override_skips_default_table() {
    let settings = ConnectorSettings {
        tenant_select_sql: Some("SELECT name FROM main.customers ORDER BY name".to_string()),
        tenant_insert_sql: Some("INSERT INTO main.customers (name) VALUES (?)".to_string()),
        ..ConnectorSettings::default()
    };
    let mut connector = DuckDbConnector::in_memory(settings);
    connector.init().unwrap();
    assert!(!table_exists(&connector, "migrator", "migrator_tenants"));

    connector
        .conn()
        .unwrap()
        .execute_batch("CREATE TABLE main.customers (name VARCHAR NOT NULL UNIQUE)")
        .unwrap();
    add_tenant(&mut connector, "acme");
    assert_eq!(connector.tenants().unwrap(), vec!["acme"]);
    assert_eq!(count(&connector, "SELECT COUNT(*) FROM main.customers"), 1);
}

#[test]
fn unusable_data_source_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no/such/dir/db.duckdb");
    let mut connector =
        DuckDbConnector::new(missing.to_str().unwrap(), ConnectorSettings::default());
    assert!(matches!(
        connector.init(),
        Err(DbError::ConnectionError(_))
    ));
    assert!(!connector.is_connected());
}

// ── Apply ──────────────────────────────────────────────────────────────

#[test]
fn apply_with_nothing_to_do_creates_no_version() {
    let mut connector = connector();
    let summary = connector
        .apply_migrations(ApplyMode::Apply, "empty", &[])
        .unwrap();
    assert!(summary.version.is_none());
    assert!(connector.versions().unwrap().is_empty());

    // tenant-scoped work with zero tenants is also nothing to do
    let summary = connector
        .apply_migrations(
            ApplyMode::Apply,
            "no tenants",
            &[tenant("001.sql", "CREATE TABLE {schema}.t (id INT)")],
        )
        .unwrap();
    assert_eq!(summary.applied_count(), 0);
    assert!(summary.version.is_none());
    assert!(connector.versions().unwrap().is_empty());
}

#[test]
fn apply_replicates_tenant_migrations() {
    let mut connector = connector();
    add_tenant(&mut connector, "abc");
    add_tenant(&mut connector, "def");
    assert_eq!(connector.tenants().unwrap(), vec!["abc", "def"]);

    let defs = vec![
        single(
            "201602220000.sql",
            "source",
            "CREATE SCHEMA IF NOT EXISTS {schema}; CREATE TABLE {schema}.customers (id INT)",
        ),
        tenant("201602220001.sql", "CREATE TABLE {schema}.orders (id INT)"),
    ];
    let summary = connector
        .apply_migrations(ApplyMode::Apply, "release", &defs)
        .unwrap();

    assert_eq!(summary.tenants, 2);
    assert_eq!(summary.migrations_grand_total, 3);
    let version = summary.version.unwrap();
    assert_eq!(version.name, "release");

    assert!(table_exists(&connector, "source", "customers"));
    assert!(table_exists(&connector, "abc", "orders"));
    assert!(table_exists(&connector, "def", "orders"));

    let detail = connector.version_by_id(version.id).unwrap().unwrap();
    let schemas: Vec<&str> = detail
        .migrations
        .iter()
        .map(|m| m.schema.as_str())
        .collect();
    assert_eq!(schemas, vec!["source", "abc", "def"]);
    // the recorded contents keep the placeholder
    assert!(detail.migrations[1].definition.contents.contains("{schema}"));
}

#[test]
fn failing_statement_rolls_back_everything() {
    let mut connector = connector();
    let defs = vec![
        single("001.sql", "a", "CREATE SCHEMA a; CREATE TABLE a.t (id INT)"),
        single("002.sql", "b", "CREATE SCHEMA b"),
        single("003.sql", "c", "THIS IS NOT SQL"),
        single("004.sql", "d", "CREATE SCHEMA d"),
        single("005.sql", "e", "CREATE SCHEMA e"),
    ];
    let err = connector
        .apply_migrations(ApplyMode::Apply, "broken", &defs)
        .unwrap_err();
    match err {
        DbError::ExecutionError { schema, file, .. } => {
            assert_eq!(schema, "c");
            assert_eq!(file, "c/003.sql");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!table_exists(&connector, "a", "t"));
    assert_eq!(
        count(&connector, "SELECT COUNT(*) FROM migrator.migrator_migrations"),
        0
    );
    assert!(connector.versions().unwrap().is_empty());

    // the connection is still usable after the rollback
    let summary = connector
        .apply_migrations(ApplyMode::Apply, "fixed", &defs[..2])
        .unwrap();
    assert!(summary.version.is_some());
    assert_eq!(connector.versions().unwrap().len(), 1);
    assert_eq!(connector.applied_migrations().unwrap().len(), 2);
}

#[test]
fn dry_run_touches_nothing() {
    let mut connector = connector();
    add_tenant(&mut connector, "abc");
    let defs = vec![tenant("001.sql", "CREATE TABLE {schema}.t (id INT)")];
    let summary = connector
        .apply_migrations(ApplyMode::DryRun, "preview", &defs)
        .unwrap();
    assert_eq!(summary.tenant_migrations_total, 1);
    assert!(summary.version.is_none());
    assert!(!table_exists(&connector, "abc", "t"));
    assert_eq!(connector.versions().unwrap().len(), 1);
}

#[test]
fn custom_placeholder_is_substituted() {
    let settings = ConnectorSettings {
        schema_placeholder: ":tenant".to_string(),
        ..ConnectorSettings::default()
    };
    let mut connector = DuckDbConnector::in_memory(settings);
    connector.init().unwrap();
    add_tenant(&mut connector, "abc");
    connector
        .apply_migrations(
            ApplyMode::Apply,
            "custom",
            &[tenant("001.sql", "CREATE TABLE :tenant.t (id INT)")],
        )
        .unwrap();
    assert!(table_exists(&connector, "abc", "t"));
}

#[test]
fn version_ids_without_returning() {
    let mut connector = DuckDbConnector::in_memory(ConnectorSettings::default())
        .with_dialect(DuckDbDialect::without_returning());
    connector.init().unwrap();

    for (i, name) in ["one", "two", "three"].iter().enumerate() {
        let summary = connector
            .apply_migrations(
                ApplyMode::Apply,
                name,
                &[single(
                    &format!("00{i}.sql"),
                    "main",
                    &format!("CREATE TABLE main.t{i} (id INT)"),
                )],
            )
            .unwrap();
        assert_eq!(summary.version_id(), Some(i as i64 + 1));
    }
    let names: Vec<String> = connector
        .versions()
        .unwrap()
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(names, vec!["three", "two", "one"]);
}

// ── Tenants ────────────────────────────────────────────────────────────

#[test]
fn add_tenant_replays_tenant_definitions_only() {
    let mut connector = connector();
    let defs = vec![
        single("000.sql", "main", "CREATE TABLE main.should_not_run (id INT)"),
        tenant("001.sql", "CREATE TABLE {schema}.orders (id INT)"),
        MigrationDefinition::new(
            "grants.sql",
            "tenant-scripts",
            MigrationKind::TenantScript,
            "CREATE VIEW {schema}.v AS SELECT 1 AS x",
        ),
    ];
    let summary = connector
        .add_tenant_and_apply_migrations(ApplyMode::Apply, "onboard", &tenant_name("xyz"), &defs)
        .unwrap();

    assert_eq!(summary.tenants, 1);
    assert_eq!(summary.single_migrations, 0);
    assert_eq!(summary.applied_count(), 2);
    assert!(table_exists(&connector, "xyz", "orders"));
    assert!(!table_exists(&connector, "main", "should_not_run"));
    assert_eq!(connector.tenants().unwrap(), vec!["xyz"]);
    assert_eq!(connector.applied_migrations().unwrap().len(), 2);
}

#[test]
fn add_tenant_failure_leaves_no_trace() {
    let mut connector = connector();
    let defs = vec![tenant("001.sql", "THIS IS NOT SQL")];
    let result = connector.add_tenant_and_apply_migrations(
        ApplyMode::Apply,
        "onboard",
        &tenant_name("broken"),
        &defs,
    );
    assert!(matches!(result, Err(DbError::ExecutionError { .. })));
    assert!(connector.tenants().unwrap().is_empty());
    assert!(connector.versions().unwrap().is_empty());
    assert_eq!(
        count(
            &connector,
            "SELECT COUNT(*) FROM information_schema.schemata WHERE schema_name = 'broken'"
        ),
        0
    );
}

#[test]
fn add_duplicate_tenant_is_rejected_by_registry() {
    let mut connector = connector();
    add_tenant(&mut connector, "abc");
    let result = connector.add_tenant_and_apply_migrations(
        ApplyMode::Apply,
        "again",
        &tenant_name("abc"),
        &[],
    );
    assert!(matches!(result, Err(DbError::TenantError { .. })));
    assert_eq!(connector.versions().unwrap().len(), 1);
}

#[test]
fn add_tenant_differing_only_in_case_is_rejected() {
    let mut connector = connector();
    let defs = vec![tenant(
        "001.sql",
        "CREATE TABLE {schema}.t (id INTEGER); INSERT INTO {schema}.t VALUES (1);",
    )];
    connector
        .add_tenant_and_apply_migrations(ApplyMode::Apply, "onboard", &tenant_name("abc"), &defs)
        .unwrap();

    for mode in [ApplyMode::DryRun, ApplyMode::Apply] {
        let result = connector.add_tenant_and_apply_migrations(
            mode,
            "again",
            &tenant_name("ABC"),
            &defs,
        );
        match result {
            Err(DbError::TenantError { tenant, message }) => {
                assert_eq!(tenant, "ABC");
                assert!(message.contains("'abc'"), "{message}");
            }
            other => panic!("expected TenantError, got {other:?}"),
        }
    }

    assert_eq!(connector.tenants().unwrap(), vec!["abc"]);
    assert_eq!(connector.versions().unwrap().len(), 1);
    assert_eq!(count(&connector, "SELECT COUNT(*) FROM abc.t"), 1);
}

#[test]
fn add_tenant_over_existing_schema_is_rejected() {
    let mut connector = connector();
    connector
        .conn()
        .unwrap()
        .execute_batch("CREATE SCHEMA squatter; CREATE TABLE squatter.t (id INTEGER);")
        .unwrap();

    let result = connector.add_tenant_and_apply_migrations(
        ApplyMode::Apply,
        "onboard",
        &tenant_name("squatter"),
        &[],
    );
    assert!(matches!(result, Err(DbError::TenantError { .. })));
    assert!(connector.tenants().unwrap().is_empty());
    assert!(connector.versions().unwrap().is_empty());
    assert!(table_exists(&connector, "squatter", "t"));
}

#[test]
fn add_tenant_dry_run() {
    let mut connector = connector();
    let summary = connector
        .add_tenant_and_apply_migrations(
            ApplyMode::DryRun,
            "preview",
            &tenant_name("abc"),
            &[tenant("001.sql", "CREATE TABLE {schema}.t (id INT)")],
        )
        .unwrap();
    assert_eq!(summary.tenant_migrations_total, 1);
    assert!(summary.version.is_none());
    assert!(connector.tenants().unwrap().is_empty());
}

// ── Queries ────────────────────────────────────────────────────────────

#[test]
fn version_queries() {
    let mut connector = connector();
    let first = connector
        .apply_migrations(
            ApplyMode::Apply,
            "first",
            &[single("001.sql", "main", "CREATE TABLE main.a (id INT)")],
        )
        .unwrap();
    let second = connector
        .apply_migrations(
            ApplyMode::Apply,
            "second",
            &[
                single("002.sql", "main", "CREATE TABLE main.b (id INT)"),
                MigrationDefinition::new(
                    "refresh.sql",
                    "main",
                    MigrationKind::SingleScript,
                    "INSERT INTO main.b VALUES (1)",
                ),
            ],
        )
        .unwrap();
    let first_id = first.version_id().unwrap();
    let second_id = second.version_id().unwrap();
    assert!(second_id > first_id);

    let by_file = connector.versions_by_file("main/002.sql").unwrap();
    assert_eq!(by_file.len(), 1);
    assert_eq!(by_file[0].id, second_id);
    assert!(connector.versions_by_file("main/missing.sql").unwrap().is_empty());

    let detail = connector.version_by_id(second_id).unwrap().unwrap();
    assert_eq!(detail.version.name, "second");
    assert_eq!(detail.migrations.len(), 2);
    assert_eq!(detail.migrations[1].definition.kind, MigrationKind::SingleScript);
    assert!(connector.version_by_id(999).unwrap().is_none());

    let record = &detail.migrations[0];
    let fetched = connector.applied_migration_by_id(record.id).unwrap().unwrap();
    assert_eq!(&fetched, record);
    assert!(connector.applied_migration_by_id(999).unwrap().is_none());

    let applied = connector.applied_migrations().unwrap();
    let names: Vec<&str> = applied.iter().map(|m| m.definition.name.as_str()).collect();
    assert_eq!(names, vec!["001.sql", "002.sql", "refresh.sql"]);
}

// ── Lifecycle ──────────────────────────────────────────────────────────

#[test]
fn dispose_is_safe_before_init_and_repeatedly() {
    let mut connector = DuckDbConnector::in_memory(ConnectorSettings::default());
    connector.dispose();
    assert!(matches!(connector.tenants(), Err(DbError::NotConnected)));

    connector.init().unwrap();
    assert!(connector.is_connected());
    connector.dispose();
    connector.dispose();
    assert!(!connector.is_connected());
    assert!(matches!(
        connector.apply_migrations(ApplyMode::Apply, "late", &[]),
        Err(DbError::NotConnected)
    ));
}

#[test]
fn file_database_persists_across_connectors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tenants.duckdb");
    let data_source = path.to_str().unwrap();

    let mut connector = DuckDbConnector::new(data_source, ConnectorSettings::default());
    connector.init().unwrap();
    add_tenant(&mut connector, "abc");
    connector.dispose();

    let mut reopened = DuckDbConnector::new(data_source, ConnectorSettings::default());
    reopened.init().unwrap();
    assert_eq!(reopened.tenants().unwrap(), vec!["abc"]);
    assert_eq!(reopened.versions().unwrap().len(), 1);
}
