use std::sync::Arc;
use tracing::warn;

use shared::messaging::{BrokerResult, EventEnvelope, EventHandler, EventStream};

/// Hands each delivered envelope to the registered handler and acknowledges
/// on success.
///
/// Acknowledgment happens only after the handler returns `Ok`, which makes
/// delivery at-least-once: a crash between handling and ack leads the broker
/// to redeliver the same envelope. The injected handler must therefore be
/// idempotent under redelivery.
pub struct EventDispatcher {
    handler: Arc<dyn EventHandler>,
}

impl EventDispatcher {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self { handler }
    }

    /// Process one envelope. Returns `Err` only for broker failures (e.g. an
    /// ack on a severed connection); a failing handler is not an error here,
    /// the envelope is simply left unacknowledged for redelivery.
    pub async fn dispatch(
        &self,
        stream: &mut dyn EventStream,
        envelope: EventEnvelope,
    ) -> BrokerResult<()> {
        match self.handler.handle(&envelope.payload).await {
            Ok(()) => stream.ack(&envelope.ack_token).await,
            Err(err) => {
                warn!(
                    error = %err,
                    "event handler failed, leaving event unacknowledged for redelivery"
                );
                Ok(())
            }
        }
    }
}
