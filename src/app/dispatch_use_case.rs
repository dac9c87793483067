use std::sync::Arc;
use std::time::Duration;

use crate::app::ports::{DeliveryPort, PacerPort};
use crate::constants::PHONE_FIELD;
use crate::pipeline::dispatch::{DispatchJob, DispatchReport, Dispatcher};
use crate::pipeline::processing::phone::PhoneRule;
use crate::types::EnrichedRow;

/// Bulk messaging with the configured provider, pacing and phone rule
pub struct DispatchUseCase {
    delivery: Arc<dyn DeliveryPort>,
    pacer: Arc<dyn PacerPort>,
    rule: Arc<dyn PhoneRule>,
    delay: Duration,
}

impl DispatchUseCase {
    pub fn new(
        delivery: Arc<dyn DeliveryPort>,
        pacer: Arc<dyn PacerPort>,
        rule: Arc<dyn PhoneRule>,
        delay: Duration,
    ) -> Self {
        Self {
            delivery,
            pacer,
            rule,
            delay,
        }
    }

    pub async fn send_bulk(&self, phones: Vec<String>, message: String) -> DispatchReport {
        let job = DispatchJob {
            recipients: phones,
            message,
            delay: self.delay,
        };
        let report = Dispatcher::new(self.delivery.as_ref(), self.pacer.as_ref(), self.rule.as_ref())
            .dispatch(&job)
            .await;
        crate::metrics::dispatch_finished(report.sent, report.failed);
        report
    }

    pub async fn verify_credentials(&self) -> bool {
        self.delivery.verify_credentials().await
    }
}

/// Phone column of export rows, in row order, skipping blanks and Odoo's
/// normalized `false` marker
pub fn phones_from_rows(rows: &[EnrichedRow]) -> Vec<String> {
    rows.iter()
        .map(|r| r.get(PHONE_FIELD).trim())
        .filter(|p| !p.is_empty() && *p != "False")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phones_from_rows() {
        let rows: Vec<EnrichedRow> = [("A", "98765 43210"), ("B", ""), ("C", "0912345678"), ("D", "False")]
            .iter()
            .map(|(name, phone)| {
                [("name".to_string(), name.to_string()), ("phone".to_string(), phone.to_string())]
                    .into_iter()
                    .collect()
            })
            .collect();
        assert_eq!(phones_from_rows(&rows), vec!["98765 43210", "0912345678"]);
    }
}
