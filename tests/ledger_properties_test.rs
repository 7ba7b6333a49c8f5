use bountyledger::db::init_db;
use bountyledger::domain::{Balance, EntryType, Micros, Uid};
use bountyledger::{Ledger, LedgerError, Repository};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_ledger() -> (Ledger, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Ledger::new(Arc::new(Repository::new(pool))), temp_dir)
}

fn m(v: i64) -> Micros {
    Micros::new(v)
}

async fn assert_conserved(ledger: &Ledger, uid: Uid) -> Balance {
    let balance = ledger.get_balance_snapshot(uid).await.unwrap();
    assert!(balance.is_conserved(), "pools not conserved: {:?}", balance);
    balance
}

#[tokio::test]
async fn test_conservation_holds_after_every_operation() {
    let (ledger, _temp) = setup_ledger().await;
    let uid = Uid::new(1);

    ledger.credit_deposit(uid, m(10_000_000), "0xd1", None).await.unwrap();
    assert_conserved(&ledger, uid).await;

    ledger.reserve(uid, m(4_000_000), "b1", None).await.unwrap();
    assert_conserved(&ledger, uid).await;

    ledger.reserve(uid, m(3_000_000), "b2", None).await.unwrap();
    assert_conserved(&ledger, uid).await;

    ledger.spend(uid, m(2_500_000), "b1", None).await.unwrap();
    assert_conserved(&ledger, uid).await;

    ledger.release(uid, m(1_500_000), "b1", None).await.unwrap();
    assert_conserved(&ledger, uid).await;

    // Rejected operations keep conservation too.
    assert!(ledger.reserve(uid, m(100_000_000), "b3", None).await.is_err());
    assert!(ledger.spend(uid, m(4_000_000), "b2", None).await.is_err());
    ledger.refund(uid, m(500_000), "0xr1", None).await.unwrap();

    let balance = assert_conserved(&ledger, uid).await;
    assert_eq!(balance.available, m(5_000_000));
    assert_eq!(balance.reserved, m(3_000_000));
    assert_eq!(balance.total_deposited, m(10_500_000));
    assert_eq!(balance.total_spent, m(2_500_000));
}

#[tokio::test]
async fn test_ledger_completeness_folds_to_stored_balance() {
    let (ledger, _temp) = setup_ledger().await;
    let uid = Uid::new(2);

    ledger.credit_deposit(uid, m(7_000), "0xa", None).await.unwrap();
    ledger.credit_deposit(uid, m(3_000), "0xb", None).await.unwrap();
    ledger.reserve(uid, m(6_000), "b1", None).await.unwrap();
    ledger.spend(uid, m(6_000), "b1", None).await.unwrap();
    ledger.reserve(uid, m(1_000), "b2", None).await.unwrap();
    ledger.release(uid, m(1_000), "b2", None).await.unwrap();

    let mut entries = ledger.get_recent_transactions(uid, 100).await.unwrap();
    entries.reverse();
    let folded = Balance::fold(uid, &entries).unwrap();
    let stored = ledger.get_balance_snapshot(uid).await.unwrap();
    assert!(folded.same_pools(&stored));

    let report = ledger.reconcile(uid).await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.entry_count, 6);
}

#[tokio::test]
async fn test_deposit_idempotence() {
    let (ledger, _temp) = setup_ledger().await;
    let uid = Uid::new(3);

    for _ in 0..5 {
        ledger.credit_deposit(uid, m(2_000_000), "0xHASH", None).await.unwrap();
    }

    let balance = ledger.get_balance_snapshot(uid).await.unwrap();
    assert_eq!(balance.available, m(2_000_000));
    assert_eq!(balance.total_deposited, m(2_000_000));
    assert_eq!(ledger.get_recent_transactions(uid, 20).await.unwrap().len(), 1);
    assert!(ledger.exists_reference("0xhash", EntryType::Deposit).await.unwrap());
}

#[tokio::test]
async fn test_reserve_release_round_trip() {
    let (ledger, _temp) = setup_ledger().await;
    let uid = Uid::new(4);
    ledger.credit_deposit(uid, m(900), "0xd", None).await.unwrap();
    let before = ledger.get_balance_snapshot(uid).await.unwrap();

    ledger.reserve(uid, m(700), "b1", None).await.unwrap();
    ledger.release(uid, m(700), "b1", None).await.unwrap();

    let after = ledger.get_balance_snapshot(uid).await.unwrap();
    assert!(before.same_pools(&after));
    assert_eq!(ledger.get_recent_transactions(uid, 20).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_insufficient_funds_has_no_effect() {
    let (ledger, _temp) = setup_ledger().await;
    let uid = Uid::new(5);
    ledger.credit_deposit(uid, m(100), "0xd", None).await.unwrap();
    let before = ledger.get_balance_snapshot(uid).await.unwrap();
    let entries_before = ledger.get_recent_transactions(uid, 20).await.unwrap();

    let err = ledger.reserve(uid, m(101), "b1", None).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    let after = ledger.get_balance_snapshot(uid).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(entries_before, ledger.get_recent_transactions(uid, 20).await.unwrap());
}

#[tokio::test]
async fn test_reserved_matches_active_reservations() {
    let (ledger, _temp) = setup_ledger().await;
    let uid = Uid::new(6);
    ledger.credit_deposit(uid, m(1_000), "0xd", None).await.unwrap();
    ledger.reserve(uid, m(300), "b1", None).await.unwrap();
    ledger.reserve(uid, m(200), "b2", None).await.unwrap();
    ledger.spend(uid, m(300), "b1", None).await.unwrap();
    ledger.spend(uid, m(50), "b2", None).await.unwrap();

    let report = ledger.reconcile(uid).await.unwrap();
    assert_eq!(report.active_reserved, m(150));
    assert_eq!(report.stored.reserved, m(150));

    let active = ledger
        .list_reservations(uid, Some(bountyledger::ReservationState::Active))
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].reference_id, "b2");
}

#[tokio::test]
async fn test_users_are_isolated() {
    let (ledger, _temp) = setup_ledger().await;
    ledger.credit_deposit(Uid::new(10), m(500), "0x10", None).await.unwrap();
    ledger.credit_deposit(Uid::new(11), m(800), "0x11", None).await.unwrap();
    ledger.reserve(Uid::new(10), m(500), "b", None).await.unwrap();

    let other = ledger.get_balance_snapshot(Uid::new(11)).await.unwrap();
    assert_eq!(other.available, m(800));
    assert_eq!(other.reserved, m(0));
    assert_eq!(ledger.get_recent_transactions(Uid::new(11), 20).await.unwrap().len(), 1);
}
