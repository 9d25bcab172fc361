//! TV selection integration tests.
//!
//! These tests drive the engine through full items:
//! search -> classify -> pick -> download -> record -> notify -> next episode

use std::fs;

use tempfile::TempDir;

use mediagrab_core::{
    testing::{
        fixtures::{engine_config, harness, link, result, Harness},
        MockOperation,
    },
    ConnectorError, ContinuationOutcome, DownloadLedger, ItemOutcome, JsonLedger, LedgerKey,
    MediaMode, WantedItem,
};

struct TvTest {
    h: Harness,
    dir: TempDir,
}

impl TvTest {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let h = harness(engine_config(MediaMode::Tv), &dir.path().join("tv.json"));
        Self { h, dir }
    }

    /// Fresh engine and mocks over the same ledger file, like a second run.
    fn rerun(&self) -> Harness {
        harness(engine_config(MediaMode::Tv), &self.dir.path().join("tv.json"))
    }

    fn ledger_file(&self) -> Vec<String> {
        let contents = fs::read_to_string(self.dir.path().join("tv.json")).unwrap_or_default();
        serde_json::from_str(&contents).unwrap_or_default()
    }
}

fn foo(episode: u32) -> WantedItem {
    WantedItem::tv("Foo", Some(episode))
}

#[tokio::test]
async fn test_range_match_then_single_continuation() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![
            result("Foo [第5-6集] 1080p", 1),
            result("Foo [第7集] 1080p", 2),
        ])
        .await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    assert_eq!(
        outcome,
        ItemOutcome::Downloaded {
            key: "Foo_1080p_foo [第5-6集] 1080p".to_string(),
            resolution: "1080p".to_string(),
            recorded: true,
            continuation: Some(ContinuationOutcome::Downloaded {
                episode: 7,
                key: "Foo_1080p_foo [第7集] 1080p".to_string(),
                recorded: true,
            }),
        }
    );

    // One search for the item, one for episode 7, none for episode 8.
    assert_eq!(t.h.connector.search_count().await, 2);
    assert_eq!(t.h.connector.opened_details().await, vec![link(1), link(2)]);
    assert_eq!(
        t.ledger_file(),
        vec![
            "Foo_1080p_foo [第5-6集] 1080p".to_string(),
            "Foo_1080p_foo [第7集] 1080p".to_string(),
        ]
    );
    assert_eq!(
        t.h.notifier.bodies().await,
        vec![
            "Foo - 1080p - foo [第5-6集] 1080p".to_string(),
            "Foo - 1080p - foo [第7集] 1080p".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_continuation_never_recurses() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![
            result("Foo [第5-6集] 1080p", 1),
            result("Foo [第7集] 1080p", 2),
            result("Foo [第8集] 1080p", 3),
        ])
        .await;

    t.h.engine.process_item(&foo(5)).await;

    assert_eq!(t.h.connector.search_count().await, 2);
    assert_eq!(t.h.connector.downloads().await.len(), 2);
    assert!(!t.h.connector.opened_details().await.contains(&link(3)));
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let t = TvTest::new();
    let results = vec![
        result("Foo [第5-6集] 1080p", 1),
        result("Foo [第7集] 1080p", 2),
    ];
    t.h.connector.set_results(results.clone()).await;
    t.h.engine.process_item(&foo(5)).await;
    let first_run = t.ledger_file();

    let again = t.rerun();
    again.connector.set_results(results).await;
    let outcome = again.engine.process_item(&foo(5)).await;

    assert_eq!(
        outcome,
        ItemOutcome::AlreadyRecorded {
            key: "Foo_1080p_foo [第5-6集] 1080p".to_string(),
        }
    );
    assert!(again.connector.downloads().await.is_empty());
    assert!(again.notifier.notifications().await.is_empty());
    assert_eq!(t.ledger_file(), first_run);
}

#[tokio::test]
async fn test_excluded_result_is_never_selected() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![result("Foo 特效 1080p [第5集]", 1)])
        .await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    assert_eq!(outcome, ItemOutcome::Exhausted);
    // Both rungs searched, nothing opened.
    assert_eq!(t.h.connector.search_count().await, 2);
    assert!(t.h.connector.opened_details().await.is_empty());
    assert!(t.ledger_file().is_empty());
}

#[tokio::test]
async fn test_full_set_wins_over_earlier_episode() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![
            result("Foo [第5集] 1080p", 1),
            result("Foo 全12集 1080p", 2),
        ])
        .await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    match outcome {
        ItemOutcome::Downloaded { key, .. } => assert_eq!(key, "Foo_1080p_foo 全12集 1080p"),
        other => panic!("expected download, got {:?}", other),
    }
    assert_eq!(t.h.connector.opened_details().await[0], link(2));
}

#[tokio::test]
async fn test_full_set_already_recorded_uses_real_title() {
    let t = TvTest::new();
    fs::write(
        t.dir.path().join("tv.json"),
        r#"["Foo_1080p_foo 全12集 1080p"]"#,
    )
    .unwrap();
    let h = t.rerun();
    h.connector
        .set_results(vec![result("Foo 全12集 1080p", 1)])
        .await;

    let outcome = h.engine.process_item(&foo(1)).await;

    assert_eq!(
        outcome,
        ItemOutcome::AlreadyRecorded {
            key: "Foo_1080p_foo 全12集 1080p".to_string(),
        }
    );
    assert!(h.connector.downloads().await.is_empty());
}

#[tokio::test]
async fn test_fallback_resolution_sticks_for_continuation() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![
            result("Foo [第5集] 720p", 1),
            result("Foo [第6集] 1080p", 2),
        ])
        .await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    assert_eq!(
        outcome,
        ItemOutcome::Downloaded {
            key: "Foo_720p_foo [第5集] 720p".to_string(),
            resolution: "720p".to_string(),
            recorded: true,
            continuation: Some(ContinuationOutcome::NoMatch { episode: 6 }),
        }
    );
    // 1080p rung, 720p rung, continuation.
    assert_eq!(t.h.connector.search_count().await, 3);
    assert_eq!(t.h.connector.downloads().await.len(), 1);
}

#[tokio::test]
async fn test_padded_episode_marker() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![result("Foo [第03集] 1080p", 1)])
        .await;

    let outcome = t.h.engine.process_item(&foo(3)).await;
    assert_eq!(outcome.label(), "downloaded");
}

#[tokio::test]
async fn test_missing_episode_data_starts_at_one() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![
            result("Foo [第2集] 1080p", 2),
            result("Foo [第01集] 1080p", 1),
        ])
        .await;

    let outcome = t.h.engine.process_item(&WantedItem::tv("Foo", None)).await;

    match outcome {
        ItemOutcome::Downloaded { key, continuation, .. } => {
            assert_eq!(key, "Foo_1080p_foo [第01集] 1080p");
            assert!(matches!(
                continuation,
                Some(ContinuationOutcome::Downloaded { episode: 2, .. })
            ));
        }
        other => panic!("expected download, got {:?}", other),
    }
}

#[tokio::test]
async fn test_placeholder_record_skips_item() {
    let t = TvTest::new();
    fs::write(t.dir.path().join("tv.json"), r#"["Foo_1080p_未知标题"]"#).unwrap();
    let h = t.rerun();
    h.connector
        .set_results(vec![result("Foo [第5集] 1080p", 1)])
        .await;

    let outcome = h.engine.process_item(&foo(5)).await;

    assert_eq!(
        outcome,
        ItemOutcome::Skipped {
            key: "Foo_1080p_未知标题".to_string(),
        }
    );
    assert_eq!(h.connector.search_count().await, 0);
}

#[tokio::test]
async fn test_search_failure_moves_to_next_rung() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![result("Foo [第5集] 720p", 1)])
        .await;
    t.h.connector
        .set_next_error(MockOperation::Search, ConnectorError::Timeout)
        .await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    match outcome {
        ItemOutcome::Downloaded { resolution, .. } => assert_eq!(resolution, "720p"),
        other => panic!("expected download, got {:?}", other),
    }
}

#[tokio::test]
async fn test_detail_failure_aborts_without_record() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![result("Foo [第5集] 1080p", 1)])
        .await;
    t.h.connector
        .set_next_error(
            MockOperation::OpenDetail,
            ConnectorError::ElementNotFound("detail page content".to_string()),
        )
        .await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    assert!(matches!(outcome, ItemOutcome::Failed { .. }));
    assert!(t.h.ledger.entries().is_empty());
    assert!(t.ledger_file().is_empty());
    assert!(t.h.notifier.notifications().await.is_empty());
    // The fallback rung is not tried after a site failure.
    assert_eq!(t.h.connector.search_count().await, 1);
}

#[tokio::test]
async fn test_download_failure_aborts_without_record() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![result("Foo [第5集] 1080p", 1)])
        .await;
    t.h.connector
        .set_next_error(
            MockOperation::Download,
            ConnectorError::HttpStatus {
                status: 404,
                url: "https://forum.example/forum.php?mod=attachment".to_string(),
            },
        )
        .await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    assert!(matches!(outcome, ItemOutcome::Failed { .. }));
    assert!(t.ledger_file().is_empty());
}

#[tokio::test]
async fn test_missing_torrent_link_records_nothing() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![result("Foo [第5集] 1080p", 1)])
        .await;
    t.h.connector.remove_torrent_link(&link(1)).await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    assert_eq!(
        outcome,
        ItemOutcome::NoTorrentLink {
            resolution: "1080p".to_string(),
            title: "foo [第5集] 1080p".to_string(),
        }
    );
    assert!(t.ledger_file().is_empty());
    assert!(t.h.connector.downloads().await.is_empty());
}

#[tokio::test]
async fn test_continuation_failure_keeps_first_record() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![
            result("Foo [第5集] 1080p", 1),
            result("Foo [第6集] 1080p", 2),
        ])
        .await;
    t.h.connector.remove_torrent_link(&link(2)).await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    match outcome {
        ItemOutcome::Downloaded { continuation, .. } => {
            assert_eq!(continuation, Some(ContinuationOutcome::NoTorrentLink { episode: 6 }));
        }
        other => panic!("expected download, got {:?}", other),
    }
    assert_eq!(t.ledger_file(), vec!["Foo_1080p_foo [第5集] 1080p".to_string()]);
}

#[tokio::test]
async fn test_notification_failure_does_not_affect_ledger() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![result("Foo [第5集] 1080p", 1)])
        .await;
    t.h.notifier.set_failing(true).await;

    let outcome = t.h.engine.process_item(&foo(5)).await;

    match outcome {
        ItemOutcome::Downloaded { recorded, .. } => assert!(recorded),
        other => panic!("expected download, got {:?}", other),
    }
    assert_eq!(t.ledger_file(), vec!["Foo_1080p_foo [第5集] 1080p".to_string()]);
    assert_eq!(t.h.notifier.notifications().await.len(), 1);
}

#[tokio::test]
async fn test_unwritable_ledger_still_reports_download() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let h = harness(engine_config(MediaMode::Tv), &blocker.join("tv.json"));
    h.connector
        .set_results(vec![result("Foo [第5集] 1080p", 1)])
        .await;

    let outcome = h.engine.process_item(&foo(5)).await;

    match outcome {
        ItemOutcome::Downloaded { recorded, .. } => assert!(!recorded),
        other => panic!("expected download, got {:?}", other),
    }
    // Held in memory so the same run cannot fetch it twice.
    assert_eq!(h.ledger.entries(), vec!["Foo_1080p_foo [第5集] 1080p".to_string()]);
}

#[tokio::test]
async fn test_continuation_skips_recorded_next_episode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tv.json");
    fs::write(&path, r#"["Foo_1080p_foo [第7集] 1080p"]"#).unwrap();
    let h = harness(engine_config(MediaMode::Tv), &path);
    h.connector
        .set_results(vec![
            result("Foo [第5-6集] 1080p", 1),
            result("Foo [第7集] 1080p", 2),
        ])
        .await;

    let outcome = h.engine.process_item(&foo(5)).await;

    assert_eq!(
        outcome,
        ItemOutcome::Downloaded {
            key: "Foo_1080p_foo [第5-6集] 1080p".to_string(),
            resolution: "1080p".to_string(),
            recorded: true,
            continuation: Some(ContinuationOutcome::AlreadyRecorded {
                episode: 7,
                key: "Foo_1080p_foo [第7集] 1080p".to_string(),
            }),
        }
    );
    assert_eq!(h.connector.search_count().await, 2);
    assert_eq!(h.connector.opened_details().await, vec![link(1)]);
    assert_eq!(h.connector.downloads().await.len(), 1);
    assert_eq!(h.notifier.notifications().await.len(), 1);
}

#[tokio::test]
async fn test_continuation_sees_record_written_after_load() {
    let t = TvTest::new();
    t.h.connector
        .set_results(vec![
            result("Foo [第5-6集] 1080p", 1),
            result("Foo [第7集] 1080p", 2),
        ])
        .await;

    // Another process records episode 7 after this run loaded the ledger.
    let other = JsonLedger::new(t.dir.path().join("tv.json"));
    other
        .append(&LedgerKey::new("Foo", "1080p", "foo [第7集] 1080p"))
        .unwrap();
    assert!(t.h.ledger.entries().is_empty());

    let outcome = t.h.engine.process_item(&foo(5)).await;

    match outcome {
        ItemOutcome::Downloaded { continuation, .. } => assert_eq!(
            continuation,
            Some(ContinuationOutcome::AlreadyRecorded {
                episode: 7,
                key: "Foo_1080p_foo [第7集] 1080p".to_string(),
            })
        ),
        other => panic!("expected download, got {:?}", other),
    }
    assert_eq!(t.h.connector.downloads().await.len(), 1);
    assert_eq!(
        t.ledger_file(),
        vec![
            "Foo_1080p_foo [第7集] 1080p".to_string(),
            "Foo_1080p_foo [第5-6集] 1080p".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_unwritable_ledger_keeps_keys_through_continuation() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let h = harness(engine_config(MediaMode::Tv), &blocker.join("tv.json"));
    h.connector
        .set_results(vec![
            result("Foo [第5-6集] 1080p", 1),
            result("Foo [第7集] 1080p", 2),
        ])
        .await;

    let outcome = h.engine.process_item(&foo(5)).await;

    match outcome {
        ItemOutcome::Downloaded {
            recorded,
            continuation,
            ..
        } => {
            assert!(!recorded);
            assert_eq!(
                continuation,
                Some(ContinuationOutcome::Downloaded {
                    episode: 7,
                    key: "Foo_1080p_foo [第7集] 1080p".to_string(),
                    recorded: false,
                })
            );
        }
        other => panic!("expected download, got {:?}", other),
    }
    assert_eq!(
        h.ledger.entries(),
        vec![
            "Foo_1080p_foo [第5-6集] 1080p".to_string(),
            "Foo_1080p_foo [第7集] 1080p".to_string(),
        ]
    );

    // The same run does not fetch either release again.
    let again = h.engine.process_item(&foo(5)).await;
    assert_eq!(again.label(), "already_recorded");
    assert_eq!(h.connector.downloads().await.len(), 2);
}
