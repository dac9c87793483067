use crate::app::ports::PacerPort;
use async_trait::async_trait;
use std::time::Duration;

/// Pauses on the tokio timer
pub struct TokioPacer;

#[async_trait]
impl PacerPort for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pause_waits_at_least_the_delay() {
        let start = tokio::time::Instant::now();
        TokioPacer.pause(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
