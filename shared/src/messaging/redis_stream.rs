//! Redis-streams broker transport.
//!
//! The durable queue is a redis stream plus a consumer group: `XGROUP CREATE
//! ... MKSTREAM` declares it, `XREADGROUP` delivers entries, and an entry id
//! acts as the ack token until `XACK` releases it. Entries read but never
//! acknowledged stay in the group's pending list and are re-offered to the
//! consumer on its next connection.

use async_trait::async_trait;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use std::collections::VecDeque;
use tracing::{debug, warn};

use super::{AckToken, BrokerError, BrokerResult, EventEnvelope, EventStream, EventTransport, QueueDescriptor};

/// Stream entry field carrying the raw event body
const PAYLOAD_FIELD: &str = "payload";

/// How long one XREADGROUP call blocks before the read loop polls again, ms
const BLOCK_TIMEOUT_MS: usize = 5_000;

const READ_BATCH_SIZE: usize = 16;

/// Connection factory for the redis-streams broker.
pub struct RedisStreamTransport {
    client: redis::Client,
    group: String,
    consumer_name: String,
}

impl RedisStreamTransport {
    pub fn new(url: &str, group: &str, consumer_name: &str) -> BrokerResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BrokerError::Connection(format!("invalid broker url: {}", e)))?;

        Ok(Self {
            client,
            group: group.to_string(),
            consumer_name: consumer_name.to_string(),
        })
    }
}

#[async_trait]
impl EventTransport for RedisStreamTransport {
    async fn connect(&self) -> BrokerResult<Box<dyn EventStream>> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Box::new(RedisStreamConnection {
            conn,
            group: self.group.clone(),
            consumer_name: self.consumer_name.clone(),
            stream: None,
            backlog: VecDeque::new(),
            pending_scan: PendingScan::new(),
        }))
    }
}

/// Cursor for the once-per-connection scan over this consumer's pending
/// entries.
///
/// The scan starts at id 0 and only moves forward, so every pending entry is
/// offered exactly once on this connection. An entry whose handler fails is
/// left in the pending list for the next connection instead of being
/// re-fetched here, and once a read comes back empty the scan is done and
/// reads switch to new deliveries.
struct PendingScan {
    cursor: Option<String>,
}

impl PendingScan {
    fn new() -> Self {
        Self {
            cursor: Some("0".to_string()),
        }
    }

    /// Position to read from, or `None` once the scan has drained.
    fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Record the outcome of one batch read: advance past the last id
    /// fetched, or mark the scan drained when the batch was empty.
    fn advance(&mut self, last_fetched: Option<String>) {
        self.cursor = last_fetched;
    }
}

struct RedisStreamConnection {
    conn: redis::aio::MultiplexedConnection,
    group: String,
    consumer_name: String,
    /// Stream key, set once the queue is bound.
    stream: Option<String>,
    /// Entries already fetched but not yet handed to the dispatcher.
    backlog: VecDeque<EventEnvelope>,
    pending_scan: PendingScan,
}

impl RedisStreamConnection {
    fn bound_stream(&self) -> BrokerResult<&str> {
        self.stream
            .as_deref()
            .ok_or_else(|| BrokerError::Protocol("queue not bound on this connection".to_string()))
    }
}

/// Queue every entry of one XREADGROUP reply and return the id of the last
/// entry fetched, if any.
fn queue_reply(reply: StreamReadReply, backlog: &mut VecDeque<EventEnvelope>) -> Option<String> {
    let mut last_id = None;
    for key in reply.keys {
        for entry in key.ids {
            let payload = match entry.map.get(PAYLOAD_FIELD) {
                Some(value) => redis::from_redis_value::<Vec<u8>>(value).unwrap_or_default(),
                None => {
                    warn!(entry_id = %entry.id, "stream entry has no payload field");
                    Vec::new()
                }
            };
            last_id = Some(entry.id.clone());
            backlog.push_back(EventEnvelope {
                payload,
                ack_token: AckToken(entry.id),
            });
        }
    }
    last_id
}

#[async_trait]
impl EventStream for RedisStreamConnection {
    async fn bind(&mut self, queue: &QueueDescriptor) -> BrokerResult<()> {
        // A consumer group reading from id 0 sees every entry still in the
        // stream, which is what a durable queue binding means here.
        let created: Result<String, RedisError> = self
            .conn
            .xgroup_create_mkstream(&queue.name, &self.group, "0")
            .await;

        match created {
            Ok(_) => debug!(queue = %queue.name, group = %self.group, "declared consumer group"),
            // Idempotent: the group already existing is not a failure.
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!(queue = %queue.name, group = %self.group, "consumer group already exists")
            }
            Err(e) if is_connection_error(&e) => {
                return Err(BrokerError::Binding(e.to_string()));
            }
            Err(e) => return Err(BrokerError::Protocol(e.to_string())),
        }

        self.stream = Some(queue.name.clone());
        self.pending_scan = PendingScan::new();
        Ok(())
    }

    async fn next_event(&mut self) -> BrokerResult<EventEnvelope> {
        loop {
            if let Some(envelope) = self.backlog.pop_front() {
                return Ok(envelope);
            }

            let stream = self.bound_stream()?.to_string();

            if let Some(cursor) = self.pending_scan.cursor().map(str::to_string) {
                // Entries delivered to this consumer before a crash are still
                // pending in the group; offer each of them once before taking
                // new ones. XREADGROUP with an explicit id returns pending
                // entries strictly after that id, so the cursor never
                // revisits an entry on this connection.
                let opts = StreamReadOptions::default()
                    .group(&self.group, &self.consumer_name)
                    .count(READ_BATCH_SIZE);
                let reply: Option<StreamReadReply> = self
                    .conn
                    .xread_options(&[stream.as_str()], &[cursor.as_str()], &opts)
                    .await
                    .map_err(map_stream_error)?;

                let last_fetched = reply.and_then(|r| queue_reply(r, &mut self.backlog));
                self.pending_scan.advance(last_fetched);
                continue;
            }

            let opts = StreamReadOptions::default()
                .group(&self.group, &self.consumer_name)
                .count(READ_BATCH_SIZE)
                .block(BLOCK_TIMEOUT_MS);
            let reply: Option<StreamReadReply> = self
                .conn
                .xread_options(&[stream.as_str()], &[">"], &opts)
                .await
                .map_err(map_stream_error)?;

            // A nil reply means the block timed out with nothing new.
            if let Some(reply) = reply {
                queue_reply(reply, &mut self.backlog);
            }
        }
    }

    async fn ack(&mut self, token: &AckToken) -> BrokerResult<()> {
        let stream = self.bound_stream()?.to_string();
        let _acked: i64 = self
            .conn
            .xack(stream.as_str(), &self.group, &[token.0.as_str()])
            .await
            .map_err(map_stream_error)?;
        Ok(())
    }
}

fn is_connection_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

fn map_stream_error(e: RedisError) -> BrokerError {
    if is_connection_error(&e) {
        BrokerError::ConnectionLost(e.to_string())
    } else {
        BrokerError::Protocol(e.to_string())
    }
}
