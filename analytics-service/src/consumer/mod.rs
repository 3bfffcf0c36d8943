//! Background event consumer.
//!
//! One supervisor task per process owns the broker connection lifecycle and
//! drives connect, queue binding and dispatch. The HTTP surface never calls
//! into this pipeline; the only thing it may observe is the read-only
//! [`ConsumerStatus`] snapshot.

pub mod dispatcher;
pub mod supervisor;

pub use dispatcher::EventDispatcher;
pub use supervisor::{ConnectionState, ConnectionSupervisor, ConsumerStatus, RetryPolicy};

/// Durable queue the analytics consumer attaches to
pub const ANALYTICS_QUEUE: &str = "analytics_queue";

/// Consumer group name used by the redis-streams transport
pub const CONSUMER_GROUP: &str = "analytics-service";
