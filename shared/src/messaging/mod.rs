/// Messaging and event handling utilities
pub mod event_types;
pub mod redis_stream;

pub use event_types::*;
pub use redis_stream::RedisStreamTransport;

use async_trait::async_trait;

/// Opaque handle identifying one delivery to the broker.
///
/// Valid only until it is acknowledged or the connection that delivered it is
/// closed; closing the connection without an ack implicitly returns the
/// delivery to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckToken(pub String);

/// One delivered event: the raw message body plus its delivery handle.
///
/// The payload is opaque at this layer; interpreting it (e.g. JSON decoding)
/// is the consuming handler's job, not the transport's.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub payload: Vec<u8>,
    pub ack_token: AckToken,
}

/// Static description of the queue a consumer attaches to.
#[derive(Debug, Clone)]
pub struct QueueDescriptor {
    pub name: String,
    pub durable: bool,
}

impl QueueDescriptor {
    pub fn durable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            durable: true,
        }
    }
}

/// Broker errors, split by what the retry policy should do with them
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Queue binding error: {0}")]
    Binding(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BrokerError {
    /// True for connection-layer failures that a supervisor should retry.
    /// Everything else is treated as a programming error and is fatal to the
    /// consumer loop.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BrokerError::Connection(_) | BrokerError::Binding(_) | BrokerError::ConnectionLost(_)
        )
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Factory for broker connections. Knows how to reach the broker, nothing
/// about event semantics.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Establish a fresh transport-level connection.
    async fn connect(&self) -> BrokerResult<Box<dyn EventStream>>;
}

/// One live connection to the broker, carrying a stream of deliveries.
#[async_trait]
pub trait EventStream: Send {
    /// Declare/attach the named durable queue. Idempotent: repeating the
    /// call on a live connection must not fail or duplicate the queue.
    async fn bind(&mut self, queue: &QueueDescriptor) -> BrokerResult<()>;

    /// Wait for the next delivery. Resolves only with a delivery or with the
    /// error that severed the connection.
    async fn next_event(&mut self) -> BrokerResult<EventEnvelope>;

    /// Acknowledge one delivery. Each token is acknowledged at most once.
    async fn ack(&mut self, token: &AckToken) -> BrokerResult<()>;
}

/// Seam for the business logic a service plugs into its consumer.
///
/// Handlers must be idempotent with respect to redelivery: acknowledgment
/// happens only after `handle` returns `Ok`, so a crash between handling and
/// ack makes the broker deliver the same payload again.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_class_errors_are_retryable() {
        assert!(BrokerError::Connection("refused".into()).is_connection_error());
        assert!(BrokerError::Binding("declare failed".into()).is_connection_error());
        assert!(BrokerError::ConnectionLost("reset by peer".into()).is_connection_error());
    }

    #[test]
    fn protocol_errors_are_fatal() {
        assert!(!BrokerError::Protocol("unexpected reply".into()).is_connection_error());
    }

    #[test]
    fn queue_descriptor_is_durable() {
        let queue = QueueDescriptor::durable("analytics_queue");
        assert_eq!(queue.name, "analytics_queue");
        assert!(queue.durable);
    }
}
