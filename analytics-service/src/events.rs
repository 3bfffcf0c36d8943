use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use shared::messaging::{EventHandler, LearningEvent};

use crate::store::AnalyticsStore;

/// The concrete handler plugged into the event dispatcher: decodes learning
/// events and folds them into the analytics store.
///
/// Idempotent under redelivery because the store deduplicates by event id.
/// A payload that fails to decode is reported as a handler error, so it is
/// never acknowledged and stays on the queue.
pub struct AnalyticsEventHandler {
    store: Arc<AnalyticsStore>,
}

impl AnalyticsEventHandler {
    pub fn new(store: Arc<AnalyticsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for AnalyticsEventHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let event: LearningEvent =
            serde_json::from_slice(payload).context("malformed learning event payload")?;

        let applied = self.store.apply(&event).await;
        if applied {
            info!(
                event_id = %event.event_id(),
                user_id = %event.user_id(),
                "recorded learning event"
            );
        } else {
            debug!(event_id = %event.event_id(), "duplicate learning event ignored");
        }

        Ok(())
    }
}
