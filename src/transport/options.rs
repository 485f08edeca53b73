//! Options passed through to the transport when handles are created.
//!
//! The pool never interprets these; they exist so registrations and
//! configuration documents can carry broker settings to the connection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a receiver settles messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// Messages are locked on receive and removed once completed.
    #[default]
    PeekLock,
    /// Messages are removed as soon as they are received.
    ReceiveAndDelete,
}

/// Retry policy handed to the transport client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetryPolicy {
    NoRetry,
    Exponential {
        min_backoff_ms: u64,
        max_backoff_ms: u64,
        max_retries: u32,
    },
}

impl RetryPolicy {
    pub fn exponential(min_backoff: Duration, max_backoff: Duration, max_retries: u32) -> Self {
        RetryPolicy::Exponential {
            min_backoff_ms: millis(min_backoff),
            max_backoff_ms: millis(max_backoff),
            max_retries,
        }
    }
}

// Saturates instead of truncating
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for RetryPolicy {
    /// Exponential backoff between 0s and 30s, five attempts.
    fn default() -> Self {
        RetryPolicy::Exponential {
            min_backoff_ms: 0,
            max_backoff_ms: 30_000,
            max_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    pub receive_mode: ReceiveMode,
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicOptions {
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionOptions {
    pub receive_mode: ReceiveMode,
    pub retry_policy: RetryPolicy,
}

impl SubscriptionOptions {
    pub fn receive_and_delete() -> Self {
        Self {
            receive_mode: ReceiveMode::ReceiveAndDelete,
            ..Self::default()
        }
    }
}
