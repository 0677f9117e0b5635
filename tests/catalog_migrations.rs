use spesr_lib::features::migrations::{MigrationService, RevertScope};
use spesr_lib::features::schema::{AccessRule, CatalogDao};
use spesr_lib::shared::database::open_catalog;

#[test]
fn migrations_persist_across_reopen_and_revert_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let backup_dir = dir.path().join("backups");
    let service = MigrationService::new()
        .unwrap()
        .with_backup_dir(&backup_dir);

    {
        let mut conn = open_catalog(&db_path).unwrap();
        let result = service.run_pending(&mut conn).unwrap();
        assert_eq!(result.migrations.len(), service.registry().count());
        assert!(result.backup_path.is_some());
    }

    let mut conn = open_catalog(&db_path).unwrap();
    let status = service.status(&conn).unwrap();
    assert!(!status.has_pending_migrations());
    assert_eq!(status.last_applied.as_deref(), Some("1719742711_updated_expenses"));

    let rerun = service.run_pending(&mut conn).unwrap();
    assert!(rerun.migrations.is_empty());

    let expenses = CatalogDao::new(&conn).require_collection("expenses").unwrap();
    assert!(matches!(
        AccessRule::from_stored(expenses.rules.list.as_deref()).unwrap(),
        AccessRule::Expr(_)
    ));

    service.revert(&mut conn, RevertScope::All).unwrap();
    assert!(CatalogDao::new(&conn).list_collections().unwrap().is_empty());
    assert_eq!(service.status(&conn).unwrap().total_applied, 0);

    assert!(std::fs::read_dir(&backup_dir).unwrap().count() >= 1);
}
