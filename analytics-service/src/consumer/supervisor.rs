use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use shared::messaging::{BrokerResult, EventStream, EventTransport, QueueDescriptor};

use super::dispatcher::EventDispatcher;

/// Lifecycle of the broker connection, owned exclusively by the supervisor.
///
/// Advances `Disconnected -> Connecting -> Bound -> Consuming`, regresses to
/// `Disconnected` on any recoverable error, and only repeated connect
/// failures can reach the absorbing `Exhausted` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Bound,
    Consuming,
    Exhausted,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Bound => "bound",
            ConnectionState::Consuming => "consuming",
            ConnectionState::Exhausted => "exhausted",
        }
    }
}

/// Retry policy for the initial-connection budget
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_connect_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_connect_attempts: 10,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Read-only view of the supervisor's connection state.
///
/// This is the only seam through which the rest of the service may observe
/// consumer health; nothing outside the supervisor mutates the state.
#[derive(Clone)]
pub struct ConsumerStatus {
    rx: watch::Receiver<ConnectionState>,
}

impl ConsumerStatus {
    pub fn state(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    pub fn is_consuming(&self) -> bool {
        self.state() == ConnectionState::Consuming
    }

    /// Wait until the supervisor reaches `target`. Used by readiness probes
    /// and tests; returns immediately if already there.
    pub async fn wait_for(&mut self, target: ConnectionState) {
        let _ = self.rx.wait_for(|state| *state == target).await;
    }
}

#[cfg(test)]
impl ConsumerStatus {
    /// Status pinned to one state, for handler tests that need an AppState
    /// without running a supervisor.
    pub(crate) fn fixed(state: ConnectionState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }
}

/// Owns the broker connection lifecycle: connect, bind the durable queue,
/// run the dispatch loop, and decide per error class whether to retry,
/// give up, or fail fast.
pub struct ConnectionSupervisor {
    transport: Arc<dyn EventTransport>,
    dispatcher: EventDispatcher,
    queue: QueueDescriptor,
    policy: RetryPolicy,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        dispatcher: EventDispatcher,
        queue: QueueDescriptor,
        policy: RetryPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            dispatcher,
            queue,
            policy,
            state_tx,
        }
    }

    pub fn status(&self) -> ConsumerStatus {
        ConsumerStatus {
            rx: self.state_tx.subscribe(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Run the consumer until the retry budget is exhausted or an unexpected
    /// fault ends the loop. Meant to be spawned once on its own task so that
    /// broker downtime never touches request handling.
    pub async fn run(self) {
        // Counts consecutive failed connect attempts; resets to zero on every
        // transition into Consuming, so a mid-stream disconnect gets a fresh
        // budget.
        let mut failed_attempts: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);

            let mut conn = match self.establish().await {
                Ok(conn) => conn,
                Err(err) if err.is_connection_error() => {
                    failed_attempts += 1;
                    if failed_attempts >= self.policy.max_connect_attempts {
                        error!(
                            attempts = failed_attempts,
                            error = %err,
                            "broker unreachable, giving up until process restart"
                        );
                        self.set_state(ConnectionState::Exhausted);
                        return;
                    }

                    warn!(
                        attempt = failed_attempts,
                        max_attempts = self.policy.max_connect_attempts,
                        retry_in_secs = self.policy.retry_delay.as_secs(),
                        error = %err,
                        "broker connection failed, retrying"
                    );
                    self.set_state(ConnectionState::Disconnected);
                    sleep(self.policy.retry_delay).await;
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "unexpected broker failure, stopping consumer");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            };

            self.set_state(ConnectionState::Consuming);
            failed_attempts = 0;
            info!(queue = %self.queue.name, "consuming events");

            match self.consume(conn.as_mut()).await {
                Err(err) if err.is_connection_error() => {
                    warn!(error = %err, "connection lost while consuming, reconnecting");
                    self.set_state(ConnectionState::Disconnected);
                }
                Err(err) => {
                    error!(error = %err, "unexpected failure while consuming, stopping consumer");
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
                Ok(()) => unreachable!("consume loop only returns on error"),
            }
        }
    }

    /// Connect and bind the durable queue. A binding failure is routed back
    /// through the same retry path as an unreachable broker.
    async fn establish(&self) -> BrokerResult<Box<dyn EventStream>> {
        let mut conn = self.transport.connect().await?;
        self.set_state(ConnectionState::Bound);
        conn.bind(&self.queue).await?;
        Ok(conn)
    }

    async fn consume(&self, conn: &mut dyn EventStream) -> BrokerResult<()> {
        loop {
            let envelope = conn.next_event().await?;
            self.dispatcher.dispatch(conn, envelope).await?;
        }
    }
}
