mod common;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use common::{ALICE, BOB, CAROL, StandardPeople, db_path, test_service};
use sharetab::application::LedgerService;
use sharetab::domain::{ExpenseDraft, Ledger, LedgerConfig, LedgerError};
use sharetab::storage::Repository;
use sqlx::SqlitePool;
use std::time::Duration;

#[tokio::test]
async fn test_history_survives_reopen() -> Result<()> {
    let (service, temp) = test_service().await?;
    StandardPeople::register_trio(&service).await?;
    service
        .add_expense(
            &ExpenseDraft::new("Dinner")
                .participant(ALICE, 100, 50)
                .participant(BOB, 0, 50),
        )
        .await?;
    service
        .add_expense(
            &ExpenseDraft::new("Museum")
                .participant(CAROL, 1800, 600)
                .participant(ALICE, 0, 600)
                .participant(BOB, 0, 600),
        )
        .await?;
    let before = service.list_expenses().await;
    drop(service);

    let reopened = LedgerService::connect(&db_path(&temp), LedgerConfig::default()).await?;
    assert_eq!(reopened.expense_count().await, 2);
    assert_eq!(reopened.list_expenses().await, before);
    assert_eq!(reopened.net_balance(ALICE).await?, 50 - 600);
    assert_eq!(reopened.net_balance(BOB).await?, -50 - 600);
    assert_eq!(reopened.net_balance(CAROL).await?, 1200);

    let names: Vec<_> = reopened
        .list_registered()
        .await
        .into_iter()
        .map(|p| p.display_name)
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol"]);

    // Ids continue where the stored history left off
    let id = reopened
        .add_expense(&ExpenseDraft::new("Coffee").participant(BOB, 300, 300))
        .await?;
    assert_eq!(id, 2);

    Ok(())
}

#[tokio::test]
async fn test_rejected_writes_are_not_persisted() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.register(ALICE, "Alice").await?;
    let _ = service.register(ALICE, "Again").await;
    let _ = service
        .add_expense(&ExpenseDraft::new("Bad").participant(ALICE, -1, 0))
        .await;
    drop(service);

    let reopened = LedgerService::connect(&db_path(&temp), LedgerConfig::default()).await?;
    assert_eq!(reopened.list_registered().await.len(), 1);
    assert_eq!(reopened.get_person(ALICE).await?.display_name, "Alice");
    assert_eq!(reopened.expense_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_stored_history_is_append_only() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.register(ALICE, "Alice").await?;
    service
        .add_expense(&ExpenseDraft::new("Lunch").participant(ALICE, 1000, 1000))
        .await?;

    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path(&temp))).await?;

    assert!(
        sqlx::query("UPDATE expenses SET label = 'Edited'")
            .execute(&pool)
            .await
            .is_err()
    );
    assert!(
        sqlx::query("DELETE FROM participations")
            .execute(&pool)
            .await
            .is_err()
    );
    assert!(
        sqlx::query("UPDATE people SET display_name = 'Mallory'")
            .execute(&pool)
            .await
            .is_err()
    );

    assert_eq!(service.get_expense(0).await?.label, "Lunch");
    assert!(service.check_integrity().await?.is_healthy());

    Ok(())
}

#[tokio::test]
async fn test_integrity_check_sees_rows_written_behind_the_ledger() -> Result<()> {
    let (service, temp) = test_service().await?;
    service
        .add_expense(&ExpenseDraft::new("Lunch").participant(ALICE, 1000, 1000))
        .await?;

    // An extra row inserted by something other than the ledger
    let pool = SqlitePool::connect(&format!("sqlite:{}", db_path(&temp))).await?;
    sqlx::query("INSERT INTO expenses (id, label, timestamp) VALUES (5, 'Ghost', ?)")
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await?;

    let report = service.check_integrity().await?;
    assert!(!report.is_healthy());
    assert!(report.issues.iter().any(|i| i.contains("not contiguous")));

    // Reloading refuses the broken history
    drop(service);
    let err = LedgerService::connect(&db_path(&temp), LedgerConfig::default())
        .await
        .err()
        .expect("corrupt history must not load");
    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::CorruptHistory(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_commit_instant_comes_from_the_ledger_clock() -> Result<()> {
    let temp = tempfile::TempDir::new()?;
    let url = format!("sqlite:{}?mode=rwc", db_path(&temp));
    let instant = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();

    let repo = Repository::init(&url).await?;
    let ledger = Ledger::new(LedgerConfig::default()).with_clock(move || instant);
    let service = LedgerService::open(repo, ledger).await?;

    let person = service.register(ALICE, "Alice").await?;
    let id = service
        .add_expense(&ExpenseDraft::new("Pi day").participant(ALICE, 314, 314))
        .await?;

    assert_eq!(person.registered_at, instant);
    assert_eq!(service.get_expense(id).await?.timestamp, instant);

    drop(service);
    let reopened = LedgerService::connect(&db_path(&temp), LedgerConfig::default()).await?;
    assert_eq!(reopened.get_expense(id).await?.timestamp, instant);
    assert_eq!(reopened.get_person(ALICE).await?.registered_at, instant);

    Ok(())
}

#[tokio::test]
async fn test_policies_do_not_apply_to_stored_history() -> Result<()> {
    let (service, temp) = test_service().await?;
    service
        .add_expense(&ExpenseDraft::new("Gift").participant(ALICE, 0, 900))
        .await?;
    drop(service);

    let strict = LedgerConfig {
        require_registered: true,
        require_balanced: true,
    };
    let reopened = LedgerService::connect(&db_path(&temp), strict).await?;
    assert_eq!(reopened.net_balance(ALICE).await?, -900);

    let err = reopened
        .add_expense(&ExpenseDraft::new("Gift").participant(ALICE, 0, 900))
        .await
        .unwrap_err();
    assert!(matches!(
        err.ledger_error(),
        Some(LedgerError::UnregisteredParticipant(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_abandoned_submissions_leave_stores_in_step() -> Result<()> {
    let (service, temp) = test_service().await?;
    service.register(ALICE, "Alice").await?;

    // Give up on submissions at every point between locking and committing
    for micros in 0..200 {
        let _ = tokio::time::timeout(
            Duration::from_micros(micros),
            service.add_expense(&ExpenseDraft::new("Coffee").participant(ALICE, 100, 0)),
        )
        .await;
        let _ = tokio::time::timeout(
            Duration::from_micros(micros),
            service.register(BOB, "Bob"),
        )
        .await;
    }

    let count = service.expense_count().await;
    let id = service
        .add_expense(&ExpenseDraft::new("Lunch").participant(ALICE, 500, 500))
        .await?;
    assert_eq!(id, count);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "{:?}", report.issues);

    drop(service);
    let reopened = LedgerService::connect(&db_path(&temp), LedgerConfig::default()).await?;
    assert_eq!(reopened.expense_count().await, count + 1);
    assert_eq!(reopened.net_balance(ALICE).await?, 100 * count as i64);

    Ok(())
}
