mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeDelivery, Journal, JournalPacer};
use partner_export::app::dispatch_use_case::DispatchUseCase;
use partner_export::constants::INVALID_PHONE_REASON;
use partner_export::pipeline::processing::phone::IndiaRule;

fn use_case(configured: bool, reject: &[&str], delay_ms: u64) -> (DispatchUseCase, Arc<Journal>) {
    let journal = Arc::new(Journal::default());
    let delivery = FakeDelivery {
        configured,
        reject: reject.iter().map(|s| s.to_string()).collect(),
        journal: journal.clone(),
    };
    let pacer = JournalPacer {
        journal: journal.clone(),
    };
    let dispatch = DispatchUseCase::new(
        Arc::new(delivery),
        Arc::new(pacer),
        Arc::new(IndiaRule::default()),
        Duration::from_millis(delay_ms),
    );
    (dispatch, journal)
}

fn phones(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_sends_in_order_with_pauses_between() {
    let (dispatch, journal) = use_case(true, &[], 2000);

    let report = dispatch
        .send_bulk(phones(&["98765 43210", "+91-91234-56789"]), "Diwali offer".into())
        .await;

    assert_eq!((report.total, report.sent, report.failed), (2, 2, 0));
    assert_eq!(report.results[0].phone, "98765 43210");
    assert_eq!(report.results[0].message_id.as_deref(), Some("wamid.919876543210"));
    assert_eq!(
        journal.entries(),
        vec!["send 919876543210", "pause 2000ms", "send 919123456789"]
    );
}

#[tokio::test]
async fn test_invalid_phone_is_skipped_without_pause() {
    let (dispatch, journal) = use_case(true, &[], 500);

    let report = dispatch
        .send_bulk(phones(&["12345", "9876543210", "abc"]), "hi".into())
        .await;

    assert_eq!((report.total, report.sent, report.failed), (3, 1, 2));
    assert_eq!(report.results[0].error.as_deref(), Some(INVALID_PHONE_REASON));
    assert_eq!(report.results[2].error.as_deref(), Some(INVALID_PHONE_REASON));
    // the pause follows a send whenever another recipient is still queued
    assert_eq!(journal.entries(), vec!["send 919876543210", "pause 500ms"]);
}

#[tokio::test]
async fn test_provider_failure_does_not_stop_the_batch() {
    let (dispatch, journal) = use_case(true, &["919876543210"], 100);

    let report = dispatch
        .send_bulk(phones(&["9876543210", "9812345678"]), "hi".into())
        .await;

    assert_eq!((report.sent, report.failed), (1, 1));
    assert!(!report.results[0].success);
    assert!(report.results[0].error.as_deref().unwrap().contains("connection reset"));
    assert!(report.results[1].success);
    assert_eq!(
        journal.entries(),
        vec!["send 919876543210", "pause 100ms", "send 919812345678"]
    );
}

#[tokio::test]
async fn test_unconfigured_delivery_fails_every_recipient() {
    let (dispatch, journal) = use_case(false, &[], 2000);

    let report = dispatch
        .send_bulk(phones(&["9876543210", "9123456789"]), "hi".into())
        .await;

    assert_eq!((report.total, report.sent, report.failed), (2, 0, 2));
    for outcome in &report.results {
        assert_eq!(outcome.error.as_deref(), Some("WhatsApp access token not configured"));
    }
    assert!(journal.entries().is_empty());
    assert!(!dispatch.verify_credentials().await);
}

#[tokio::test]
async fn test_report_serializes_for_the_api() {
    let (dispatch, _journal) = use_case(true, &[], 0);

    let report = dispatch.send_bulk(phones(&["9876543210"]), "hi".into()).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["total"], 1);
    assert_eq!(json["results"][0]["success"], true);
    assert!(json["results"][0].get("error").is_none());
    assert!(json["timestamp"].is_string());
}
