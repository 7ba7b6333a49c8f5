//! Deposit ingestion adapter.
//!
//! Turns address-activity notifications into `try_credit_deposit` calls.
//! A batch is never aborted by one bad record: every record ends up in
//! exactly one counter of the [`IngestionReport`].

pub mod directory;
pub mod notification;

pub use directory::{DirectoryError, SqliteUserDirectory, StaticUserDirectory, UserDirectory};
pub use notification::{Activity, ActivityEvent, ActivityNotification, DepositCandidate, RawContract, Skip};

use crate::config::Config;
use crate::domain::{Address, Micros};
use crate::ledger::{CreditOutcome, Ledger};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Filters applied to every activity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub vault_address: Address,
    /// When set, only transfers of this token contract are credited.
    pub accepted_token: Option<Address>,
    pub min_deposit: Micros,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            vault_address: config.vault_address.clone(),
            accepted_token: config.accepted_token_address.clone(),
            min_deposit: config.min_deposit_micros,
        }
    }
}

/// Per-batch outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub received: usize,
    pub credited: usize,
    pub replayed: usize,
    pub skipped_filtered: usize,
    pub skipped_below_minimum: usize,
    pub skipped_unknown_user: usize,
    pub failed: usize,
}

impl IngestionReport {
    /// Records successfully applied; a replay counts as applied.
    pub fn processed(&self) -> usize {
        self.credited + self.replayed
    }
}

#[derive(Clone)]
pub struct DepositIngestor {
    ledger: Ledger,
    directory: Arc<dyn UserDirectory>,
    settings: IngestSettings,
}

impl DepositIngestor {
    pub fn new(ledger: Ledger, directory: Arc<dyn UserDirectory>, settings: IngestSettings) -> Self {
        Self {
            ledger,
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Credit every qualifying record of `notification`.
    pub async fn ingest(&self, notification: &ActivityNotification) -> IngestionReport {
        let mut report = IngestionReport::default();
        if !notification.is_address_activity() {
            debug!(kind = %notification.kind, "notification type not handled");
            return report;
        }

        for activity in notification.activities() {
            report.received += 1;
            self.ingest_activity(activity, &mut report).await;
        }

        info!(
            webhook_id = ?notification.webhook_id,
            received = report.received,
            credited = report.credited,
            replayed = report.replayed,
            failed = report.failed,
            "deposit batch processed"
        );
        report
    }

    async fn ingest_activity(&self, activity: &Activity, report: &mut IngestionReport) {
        let candidate = match activity.classify(&self.settings) {
            Ok(candidate) => candidate,
            Err(Skip::Filtered(reason)) => {
                debug!(hash = ?activity.hash, reason, "activity filtered");
                report.skipped_filtered += 1;
                return;
            }
            Err(Skip::BelowMinimum(amount)) => {
                info!(
                    hash = ?activity.hash,
                    amount = %amount,
                    minimum = %self.settings.min_deposit,
                    "deposit below minimum"
                );
                report.skipped_below_minimum += 1;
                return;
            }
        };

        let uid = match self
            .directory
            .resolve_uid_by_address(candidate.from.as_str())
            .await
        {
            Ok(Some(uid)) => uid,
            Ok(None) => {
                warn!(address = %candidate.from, hash = %candidate.tx_hash, "no user for depositing address");
                report.skipped_unknown_user += 1;
                return;
            }
            Err(e) => {
                warn!(address = %candidate.from, hash = %candidate.tx_hash, error = %e, "user lookup failed");
                report.failed += 1;
                return;
            }
        };

        let description = format!("USDC deposit from {}", candidate.from.short());
        match self
            .ledger
            .try_credit_deposit(uid, candidate.amount, &candidate.tx_hash, Some(&description))
            .await
        {
            Ok(CreditOutcome::Credited(_)) => report.credited += 1,
            Ok(CreditOutcome::Replayed(_)) => report.replayed += 1,
            Err(e) => {
                warn!(uid = %uid, hash = %candidate.tx_hash, error = %e, "deposit credit failed");
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, Repository};
    use crate::domain::Uid;
    use std::str::FromStr;
    use tempfile::TempDir;

    const VAULT: &str = "0x00000000000000000000000000000000000000aa";
    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    async fn setup_ingestor(directory: StaticUserDirectory) -> (DepositIngestor, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let ledger = Ledger::new(Arc::new(Repository::new(pool)));
        let settings = IngestSettings {
            vault_address: Address::from_str(VAULT).unwrap(),
            accepted_token: None,
            min_deposit: Micros::new(1_000_000),
        };
        (
            DepositIngestor::new(ledger, Arc::new(directory), settings),
            temp_dir,
        )
    }

    fn transfer(from: &str, raw_value: &str, hash: &str) -> Activity {
        Activity {
            from_address: Some(from.to_string()),
            to_address: Some(VAULT.to_string()),
            hash: Some(hash.to_string()),
            category: Some("erc20".to_string()),
            raw_contract: Some(RawContract {
                raw_value: Some(raw_value.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn notification(activity: Vec<Activity>) -> ActivityNotification {
        ActivityNotification {
            kind: "ADDRESS_ACTIVITY".to_string(),
            event: Some(ActivityEvent {
                network: Some("BASE_MAINNET".to_string()),
                activity,
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ingest_credits_and_counts_each_record() {
        let directory = StaticUserDirectory::new().with_address(ALICE, Uid::new(1));
        let (ingestor, _temp) = setup_ingestor(directory).await;

        let report = ingestor
            .ingest(&notification(vec![
                transfer(ALICE, "0x1e8480", "0xaaa"),
                transfer(BOB, "0x1e8480", "0xbbb"),
                transfer(ALICE, "0x10", "0xccc"),
            ]))
            .await;

        assert_eq!(report.received, 3);
        assert_eq!(report.credited, 1);
        assert_eq!(report.skipped_unknown_user, 1);
        assert_eq!(report.skipped_below_minimum, 1);
        assert_eq!(report.processed(), 1);

        let balance = ingestor.ledger.get_balance_snapshot(Uid::new(1)).await.unwrap();
        assert_eq!(balance.available, Micros::new(2_000_000));
        let entries = ingestor.ledger.get_recent_transactions(Uid::new(1), 5).await.unwrap();
        assert_eq!(
            entries[0].description.as_deref(),
            Some("USDC deposit from 0x11111111...")
        );
    }

    #[tokio::test]
    async fn test_redelivery_is_replayed_not_double_credited() {
        let directory = StaticUserDirectory::new().with_address(ALICE, Uid::new(1));
        let (ingestor, _temp) = setup_ingestor(directory).await;
        let batch = notification(vec![transfer(ALICE, "0xf4240", "0xABC")]);

        assert_eq!(ingestor.ingest(&batch).await.credited, 1);
        let again = ingestor.ingest(&batch).await;
        assert_eq!(again.credited, 0);
        assert_eq!(again.replayed, 1);
        assert_eq!(again.processed(), 1);

        let balance = ingestor.ledger.get_balance_snapshot(Uid::new(1)).await.unwrap();
        assert_eq!(balance.available, Micros::new(1_000_000));
    }

    #[tokio::test]
    async fn test_directory_failure_does_not_abort_batch() {
        let directory = StaticUserDirectory::new()
            .with_address(ALICE, Uid::new(1))
            .with_failure(BOB);
        let (ingestor, _temp) = setup_ingestor(directory).await;

        let report = ingestor
            .ingest(&notification(vec![
                transfer(BOB, "0x1e8480", "0xb1"),
                transfer(ALICE, "0x1e8480", "0xa1"),
            ]))
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.credited, 1);
    }

    #[tokio::test]
    async fn test_other_notification_types_are_ignored() {
        let directory = StaticUserDirectory::new().with_address(ALICE, Uid::new(1));
        let (ingestor, _temp) = setup_ingestor(directory).await;

        let mut batch = notification(vec![transfer(ALICE, "0x1e8480", "0xaaa")]);
        batch.kind = "MINED_TRANSACTION".to_string();

        let report = ingestor.ingest(&batch).await;
        assert_eq!(report, IngestionReport::default());
    }
}
