use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::app::ports::{DeliveryPort, PacerPort};
use crate::constants::INVALID_PHONE_REASON;
use crate::error::DeliveryError;
use crate::pipeline::processing::phone::PhoneRule;

/// One bulk send: recipients in order, a message, and the pause between sends
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub recipients: Vec<String>,
    pub message: String,
    pub delay: Duration,
}

/// Result for a single recipient. `phone` is the recipient as given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub phone: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome {
    fn sent(phone: &str, message_id: String) -> Self {
        Self {
            phone: phone.to_string(),
            success: true,
            message_id: Some(message_id),
            error: None,
        }
    }

    fn failed(phone: &str, reason: impl Into<String>) -> Self {
        Self {
            phone: phone.to_string(),
            success: false,
            message_id: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<DispatchOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl DispatchReport {
    fn start(total: usize) -> Self {
        Self {
            total,
            sent: 0,
            failed: 0,
            results: Vec::with_capacity(total),
            timestamp: Utc::now(),
        }
    }

    fn push(&mut self, outcome: DispatchOutcome) {
        if outcome.success {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }
}

/// Sequential, paced delivery of one message to many recipients.
///
/// Exactly one send is in flight at a time. A recipient's failure is recorded
/// and the batch moves on; the report is returned only once every recipient
/// has been handled.
pub struct Dispatcher<'a> {
    delivery: &'a dyn DeliveryPort,
    pacer: &'a dyn PacerPort,
    rule: &'a dyn PhoneRule,
}

impl<'a> Dispatcher<'a> {
    pub fn new(delivery: &'a dyn DeliveryPort, pacer: &'a dyn PacerPort, rule: &'a dyn PhoneRule) -> Self {
        Self { delivery, pacer, rule }
    }

    pub async fn dispatch(&self, job: &DispatchJob) -> DispatchReport {
        let mut report = DispatchReport::start(job.recipients.len());

        if !self.delivery.is_configured() {
            let reason = DeliveryError::NotConfigured.to_string();
            warn!("Delivery credential missing; failing {} recipients", job.recipients.len());
            for phone in &job.recipients {
                report.push(DispatchOutcome::failed(phone, reason.clone()));
            }
            return report;
        }

        let last = job.recipients.len().saturating_sub(1);
        for (idx, phone) in job.recipients.iter().enumerate() {
            let canonical = self.rule.canonicalize(phone);
            if !self.rule.is_usable(&canonical) {
                debug!("Rejecting recipient {:?}: {}", phone, INVALID_PHONE_REASON);
                report.push(DispatchOutcome::failed(phone, INVALID_PHONE_REASON));
                continue;
            }

            let outcome = match self.delivery.send_text(&canonical, &job.message).await {
                Ok(message_id) => DispatchOutcome::sent(phone, message_id),
                Err(e) => {
                    warn!("Delivery to {} failed: {}", canonical, e);
                    DispatchOutcome::failed(phone, e.to_string())
                }
            };
            report.push(outcome);

            if idx < last && !job.delay.is_zero() {
                self.pacer.pause(job.delay).await;
            }
        }

        info!(
            "Dispatch finished: {} sent, {} failed of {}",
            report.sent, report.failed, report.total
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::phone::IndiaRule;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl Events {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        fn all(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct ScriptedDelivery<'e> {
        configured: bool,
        events: &'e Events,
        fail_for: Option<&'static str>,
    }

    #[async_trait]
    impl DeliveryPort for ScriptedDelivery<'_> {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn send_text(&self, phone: &str, _body: &str) -> Result<String, DeliveryError> {
            self.events.push(format!("send {phone}"));
            if self.fail_for == Some(phone) {
                return Err(DeliveryError::Provider(serde_json::json!({"error": {"code": 131026}})));
            }
            Ok(format!("wamid.{phone}"))
        }

        async fn verify_credentials(&self) -> bool {
            self.configured
        }
    }

    struct RecordingPacer<'e>(&'e Events);

    #[async_trait]
    impl PacerPort for RecordingPacer<'_> {
        async fn pause(&self, delay: Duration) {
            self.0.push(format!("pause {}ms", delay.as_millis()));
        }
    }

    fn job(recipients: &[&str]) -> DispatchJob {
        DispatchJob {
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
            message: "Diwali offer".to_string(),
            delay: Duration::from_millis(2000),
        }
    }

    #[tokio::test]
    async fn test_valid_then_invalid_recipient() {
        let events = Events::default();
        let delivery = ScriptedDelivery { configured: true, events: &events, fail_for: None };
        let pacer = RecordingPacer(&events);
        let rule = IndiaRule::default();

        let report = Dispatcher::new(&delivery, &pacer, &rule)
            .dispatch(&job(&["9876543210", "123"]))
            .await;

        assert_eq!(report.total, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert!(report.results[0].success);
        assert_eq!(report.results[0].message_id.as_deref(), Some("wamid.919876543210"));
        assert!(!report.results[1].success);
        assert_eq!(report.results[1].error.as_deref(), Some("invalid phone number"));
        assert_eq!(events.all(), vec!["send 919876543210", "pause 2000ms"]);
    }

    #[tokio::test]
    async fn test_no_pause_after_last_recipient() {
        let events = Events::default();
        let delivery = ScriptedDelivery { configured: true, events: &events, fail_for: None };
        let pacer = RecordingPacer(&events);
        let rule = IndiaRule::default();

        Dispatcher::new(&delivery, &pacer, &rule)
            .dispatch(&job(&["9876543210", "9123456780"]))
            .await;

        assert_eq!(
            events.all(),
            vec!["send 919876543210", "pause 2000ms", "send 919123456780"]
        );
    }

    #[tokio::test]
    async fn test_provider_error_does_not_abort_batch() {
        let events = Events::default();
        let delivery = ScriptedDelivery {
            configured: true,
            events: &events,
            fail_for: Some("919876543210"),
        };
        let pacer = RecordingPacer(&events);
        let rule = IndiaRule::default();

        let report = Dispatcher::new(&delivery, &pacer, &rule)
            .dispatch(&job(&["+91 98765-43210", "09123456780"]))
            .await;

        assert_eq!((report.sent, report.failed), (1, 1));
        assert_eq!(report.results[0].phone, "+91 98765-43210");
        assert!(report.results[0].error.as_deref().unwrap().contains("131026"));
        assert!(report.results[1].success);
    }

    #[tokio::test]
    async fn test_unconfigured_fails_everyone_without_sending() {
        let events = Events::default();
        let delivery = ScriptedDelivery { configured: false, events: &events, fail_for: None };
        let pacer = RecordingPacer(&events);
        let rule = IndiaRule::default();

        let report = Dispatcher::new(&delivery, &pacer, &rule)
            .dispatch(&job(&["9876543210", "9123456780", ""]))
            .await;

        assert_eq!(report.total, 3);
        assert_eq!(report.failed, 3);
        assert!(report
            .results
            .iter()
            .all(|o| o.error.as_deref() == Some("WhatsApp access token not configured")));
        assert!(events.all().is_empty());
    }

    #[tokio::test]
    async fn test_report_json_shape() {
        let events = Events::default();
        let delivery = ScriptedDelivery { configured: true, events: &events, fail_for: None };
        let pacer = RecordingPacer(&events);
        let rule = IndiaRule::default();

        let report = Dispatcher::new(&delivery, &pacer, &rule)
            .dispatch(&job(&["9876543210", "bad"]))
            .await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["total"], 2);
        assert_eq!(json["results"][0]["message_id"], "wamid.919876543210");
        assert!(json["results"][0].get("error").is_none());
        assert_eq!(json["results"][1]["success"], false);
        assert!(json["timestamp"].is_string());
    }
}
