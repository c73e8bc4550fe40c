//! shipyard-logfan — in-process pub/sub of structured log records.
//!
//! A single hub task owns the subscriber set and processes three commands:
//! register, unregister, broadcast. Delivery is non-blocking everywhere:
//! the hub's intake is bounded (messages are dropped when it is full) and
//! each subscriber channel holds 64 records — a subscriber that stops
//! draining is evicted and its channel closed, so back-pressure can never
//! reach a log producer.
//!
//! [`BroadcastLayer`] plugs the hub into `tracing`: every event that the
//! primary sink accepts is also serialized to one JSON line and handed to
//! the hub.

pub mod hub;
pub mod layer;

pub use hub::{LogHub, Subscription, SUBSCRIBER_BUFFER};
pub use layer::BroadcastLayer;
