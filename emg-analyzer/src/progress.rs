// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! A single-producer, multi-consumer progress bus. Each
//! processing run owns one. Delivery is bounded and lossy —
//! the bus never blocks the producer.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Capacity of each subscriber's delivery channel.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 10;

/// Default rate-limit window: successive updates within this window are
/// suppressed unless the new percentage is 100.
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
    pub percentage: f64,
    pub status: String,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn new(processed: u64, total: u64, status: impl Into<String>, elapsed: Duration) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (processed as f64 / total as f64 * 100.0).min(100.0)
        };

        let estimated_remaining = if processed == 0 || percentage >= 100.0 {
            None
        } else {
            let per_unit = elapsed.as_secs_f64() / processed as f64;
            let remaining_units = total.saturating_sub(processed) as f64;
            Some(Duration::from_secs_f64(per_unit * remaining_units))
        };

        ProgressSnapshot {
            processed,
            total,
            percentage,
            status: status.into(),
            elapsed,
            estimated_remaining,
        }
    }

    pub fn terminal(status: impl Into<String>, elapsed: Duration, total: u64) -> Self {
        ProgressSnapshot {
            processed: total,
            total,
            percentage: 100.0,
            status: status.into(),
            elapsed,
            estimated_remaining: None,
        }
    }
}

type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<ProgressSnapshot>,
}

struct Inner {
    subscribers: Vec<Subscriber>,
    next_id: SubscriberId,
    last_update_at: Option<Instant>,
    rate_limit: Duration,
    stopped: bool,
}

/// Owns the subscriber list and rate-limit state for one processing run.
pub struct ProgressBus {
    inner: Mutex<Inner>,
}

pub struct SubscriptionHandle(SubscriberId);

impl ProgressBus {
    pub fn new() -> Arc<Self> {
        Self::with_rate_limit(DEFAULT_RATE_LIMIT)
    }

    pub fn with_rate_limit(rate_limit: Duration) -> Arc<Self> {
        Arc::new(ProgressBus {
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                next_id: 0,
                last_update_at: None,
                rate_limit,
                stopped: false,
            }),
        })
    }

    /// Registers a new subscriber, returning its stream and a handle for
    /// [`ProgressBus::unsubscribe`].
    pub fn subscribe(&self) -> (SubscriptionHandle, ReceiverStream<ProgressSnapshot>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let mut inner = self.inner.lock().expect("progress bus mutex poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber { id, sender: tx });
        (SubscriptionHandle(id), ReceiverStream::new(rx))
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().expect("progress bus mutex poisoned");
        inner.subscribers.retain(|s| s.id != handle.0);
    }

    /// Publishes a snapshot to all live subscribers. Suppressed by the
    /// rate-limit window unless `snapshot.percentage == 100.0`. A
    /// subscriber whose channel is full is dropped rather than blocking
    /// the producer.
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        let mut inner = self.inner.lock().expect("progress bus mutex poisoned");
        if inner.stopped {
            return;
        }

        let now = Instant::now();
        let rate_limited = snapshot.percentage < 100.0
            && inner
                .last_update_at
                .is_some_and(|last| now.duration_since(last) < inner.rate_limit);

        if rate_limited {
            return;
        }
        inner.last_update_at = Some(now);

        inner
            .subscribers
            .retain(|s| s.sender.try_send(snapshot.clone()).is_ok());
    }

    /// Closes every subscriber stream and disables further publishes.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().expect("progress bus mutex poisoned");
        inner.stopped = true;
        inner.subscribers.clear();
    }
}
