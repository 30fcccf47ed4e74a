// Delayed re-entry. A scheduled check is a cooperative continuation posted
// back onto the serial engine queue after a settle delay; it carries a
// snapshot of the context it was scheduled for, and the orchestrator makes
// it a no-op when that snapshot no longer matches reality. There is no
// cancellation primitive: stale records cancel themselves by observation.

use crate::orchestrator::EngineMsg;
use tokio::sync::mpsc;
use tokio::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    ChatSearch,
    LinkSearch,
}

#[derive(Debug, Clone)]
pub struct ScheduledCheck {
    pub id: Uuid,
    /// Package the check was scheduled against.
    pub package: String,
    /// Context generation captured at schedule time. Re-validated on
    /// resumption; elapsed time is never trusted.
    pub generation: u64,
    pub step: WorkflowStep,
}

pub struct RetryScheduler {
    tx: mpsc::Sender<EngineMsg>,
}

impl RetryScheduler {
    pub fn new(tx: mpsc::Sender<EngineMsg>) -> Self {
        Self { tx }
    }

    pub fn schedule(&self, delay: Duration, package: &str, generation: u64, step: WorkflowStep) {
        let check = ScheduledCheck {
            id: Uuid::new_v4(),
            package: package.to_string(),
            generation,
            step,
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(EngineMsg::Retry(check)).await.is_err() {
                eprintln!("⚠️ Engine queue closed before a scheduled check fired");
            }
        });
    }
}
