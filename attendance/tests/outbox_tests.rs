
use std::sync::Arc;
use std::time::Duration;

use attendance::Outbox;
use attendance::outbox::OUTBOX_KEY;
use gateway::types::SyncStatus;
use mock_api::{Fault, MockApi, submission};
use proptest::prelude::*;
use session::KeyValueStore;
use session::store::MemoryStore;

fn ids(outbox: &Outbox) -> Vec<String> {
    outbox
        .snapshot()
        .iter()
        .map(|s| s.session_id().to_string())
        .collect()
}

#[tokio::test]
async fn empty_outbox_makes_no_call() {
    let api = MockApi::new();
    let report = Outbox::new().sync(&*api).await.unwrap();

    assert_eq!(report.sent, 0);
    assert!(report.result.is_none());
    assert_eq!(api.syncs(), 0);
}

#[tokio::test]
async fn accepted_and_duplicate_items_are_removed() {
    let api = MockApi::new();
    api.set_verdict(|item| match item.session_id() {
        "dup" => Some(SyncStatus::Skipped),
        "far" => Some(SyncStatus::Failed),
        "lost" => None,
        _ => Some(SyncStatus::Success),
    });
    let outbox = Outbox::from_items(vec![
        submission("s1"),
        submission("dup"),
        submission("far"),
        submission("lost"),
    ]);

    let report = outbox.sync(&*api).await.unwrap();

    assert_eq!(report.sent, 4);
    assert_eq!(report.removed, 2);
    assert_eq!(report.remaining, 2);
    assert_eq!(ids(&outbox), ["far", "lost"]);

    let result = report.result.unwrap();
    assert_eq!((result.success, result.failed, result.skipped), (1, 1, 1));
}

#[tokio::test]
async fn failed_sync_keeps_everything() {
    let api = MockApi::new();
    *api.sync_fault.lock() = Some(Fault::Network);
    let outbox = Outbox::from_items(vec![submission("s1"), submission("s2")]);

    let err = outbox.sync(&*api).await.unwrap_err();

    assert!(err.is_network());
    assert_eq!(ids(&outbox), ["s1", "s2"]);
}

#[tokio::test]
async fn items_queued_during_sync_survive() {
    let api = MockApi::new();
    *api.sync_delay.lock() = Duration::from_millis(100);
    let outbox = Outbox::from_items(vec![submission("s1")]);

    let syncing = {
        let outbox = outbox.clone();
        let api = api.clone();
        tokio::spawn(async move { outbox.sync(&*api).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    outbox.push(submission("s2"));

    let report = syncing.await.unwrap().unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(ids(&outbox), ["s2"]);
}

#[tokio::test]
async fn overlapping_syncs_do_not_resend() {
    let api = MockApi::new();
    *api.sync_delay.lock() = Duration::from_millis(50);
    let outbox = Outbox::from_items(vec![submission("s1"), submission("s2")]);

    let (a, b) = tokio::join!(outbox.sync(&*api), outbox.sync(&*api));
    a.unwrap();
    b.unwrap();

    assert_eq!(api.syncs(), 1);
    assert!(outbox.is_empty());
}

#[tokio::test]
async fn persisted_outbox_survives_restart() {
    let store = Arc::new(MemoryStore::new());
    let outbox = Outbox::from_items(vec![submission("s1")]);
    outbox.persist(&*store).await.unwrap();

    let raw = store.get(OUTBOX_KEY).await.unwrap().unwrap();
    assert!(raw.contains("\"sessionId\":\"s1\""));

    let restored = Outbox::restore(&*store).await;
    assert_eq!(restored.snapshot(), outbox.snapshot());
}

fn verdict_of(code: u8) -> Option<SyncStatus> {
    match code {
        0 => Some(SyncStatus::Success),
        1 => Some(SyncStatus::Skipped),
        2 => Some(SyncStatus::Failed),
        _ => None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sync_is_idempotent(
        picks in prop::collection::vec(0usize..12, 0..24),
        table in prop::collection::vec(0u8..4, 12),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let api = MockApi::new();
            let verdicts = table.clone();
            api.set_verdict(move |item| {
                let idx: usize = item.session_id()[1..].parse().unwrap();
                verdict_of(verdicts[idx])
            });

            let items: Vec<_> = picks.iter().map(|i| submission(&format!("s{i}"))).collect();
            let outbox = Outbox::from_items(items.clone());

            outbox.sync(&*api).await.unwrap();
            let after_first = outbox.snapshot();

            let expected: Vec<_> = items
                .iter()
                .filter(|item| {
                    let idx: usize = item.session_id()[1..].parse().unwrap();
                    !matches!(
                        verdict_of(table[idx]),
                        Some(SyncStatus::Success | SyncStatus::Skipped)
                    )
                })
                .cloned()
                .collect();
            prop_assert_eq!(&after_first, &expected);

            outbox.sync(&*api).await.unwrap();
            prop_assert_eq!(outbox.snapshot(), after_first);

            if let Some(second) = api.batches.lock().get(1) {
                for item in second {
                    let idx: usize = item.session_id()[1..].parse().unwrap();
                    prop_assert!(!matches!(
                        verdict_of(table[idx]),
                        Some(SyncStatus::Success | SyncStatus::Skipped)
                    ));
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
