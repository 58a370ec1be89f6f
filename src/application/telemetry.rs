//! Live meter fan-out
//!
//! Streams MeterValues samples to subscribed operator clients. Delivery is
//! non-blocking per subscriber: a full or closed sink drops only that
//! subscriber, never the publisher or its peers. Ordering is preserved per
//! publisher; publishers interleave freely.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::SampledValue;

/// Queue depth per subscriber; a consumer this far behind is dropped.
const SUBSCRIBER_QUEUE_DEPTH: usize = 64;

/// One published meter sample group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSample {
    pub charge_point_id: String,
    pub connector_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub sampled_values: Vec<SampledValue>,
}

/// Sink for handler-side publication. Handlers depend on this trait only;
/// the operator API owns the concrete hub.
pub trait MeterPublisher: Send + Sync {
    fn publish(&self, sample: MeterSample);
}

/// No-op publisher for contexts without live subscribers (tests, tools).
pub struct NullMeterPublisher;

impl MeterPublisher for NullMeterPublisher {
    fn publish(&self, _sample: MeterSample) {}
}

/// Subscription filter: `None` fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeterFilter {
    pub charge_point_id: Option<String>,
    pub connector_id: Option<u32>,
}

impl MeterFilter {
    pub fn matches(&self, sample: &MeterSample) -> bool {
        if let Some(ref cp) = self.charge_point_id {
            if *cp != sample.charge_point_id {
                return false;
            }
        }
        if let Some(connector) = self.connector_id {
            if connector != sample.connector_id {
                return false;
            }
        }
        true
    }
}

struct Subscriber {
    filter: MeterFilter,
    sink: mpsc::Sender<MeterSample>,
}

/// Receiver half of a subscription. Dropping it detaches the subscriber
/// from the hub (the next matching publish also cleans it up).
pub struct MeterSubscription {
    id: u64,
    receiver: mpsc::Receiver<MeterSample>,
}

impl MeterSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<MeterSample> {
        self.receiver.recv().await
    }
}

/// Fan-out hub holding the subscriber set.
pub struct MeterStreamHub {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
}

impl MeterStreamHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, filter: MeterFilter) -> MeterSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
        self.subscribers.insert(id, Subscriber { filter, sink: tx });
        debug!(subscriber_id = id, total = self.subscribers.len(), "Meter subscriber added");
        MeterSubscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            debug!(subscriber_id = id, total = self.subscribers.len(), "Meter subscriber removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for MeterStreamHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterPublisher for MeterStreamHub {
    fn publish(&self, sample: MeterSample) {
        let mut dropped: Vec<u64> = Vec::new();

        for entry in self.subscribers.iter() {
            if !entry.filter.matches(&sample) {
                continue;
            }
            if let Err(e) = entry.sink.try_send(sample.clone()) {
                // Closed or full either way: the consumer is gone or too
                // slow, and must not hold up anyone else.
                warn!(
                    subscriber_id = *entry.key(),
                    error = %e,
                    "Dropping meter subscriber"
                );
                dropped.push(*entry.key());
            }
        }

        for id in dropped {
            self.subscribers.remove(&id);
            metrics::counter!("ocpp_meter_subscribers_dropped").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cp: &str, connector: u32) -> MeterSample {
        MeterSample {
            charge_point_id: cp.to_string(),
            connector_id: connector,
            transaction_id: None,
            timestamp: Utc::now(),
            sampled_values: vec![],
        }
    }

    #[tokio::test]
    async fn filtered_delivery() {
        let hub = MeterStreamHub::new();
        let mut all = hub.subscribe(MeterFilter::default());
        let mut cp1_only = hub.subscribe(MeterFilter {
            charge_point_id: Some("CP001".into()),
            connector_id: None,
        });
        let mut cp1_c2 = hub.subscribe(MeterFilter {
            charge_point_id: Some("CP001".into()),
            connector_id: Some(2),
        });

        hub.publish(sample("CP001", 1));
        hub.publish(sample("CP002", 2));

        assert_eq!(all.recv().await.unwrap().charge_point_id, "CP001");
        assert_eq!(all.recv().await.unwrap().charge_point_id, "CP002");

        let got = cp1_only.recv().await.unwrap();
        assert_eq!((got.charge_point_id.as_str(), got.connector_id), ("CP001", 1));

        hub.publish(sample("CP001", 2));
        let got = cp1_c2.recv().await.unwrap();
        assert_eq!(got.connector_id, 2);
    }

    #[tokio::test]
    async fn closed_sink_is_removed_others_unaffected() {
        let hub = MeterStreamHub::new();
        let dead = hub.subscribe(MeterFilter::default());
        let mut live = hub.subscribe(MeterFilter::default());
        assert_eq!(hub.subscriber_count(), 2);

        drop(dead);
        hub.publish(sample("CP001", 1));

        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(live.recv().await.unwrap().connector_id, 1);
    }

    #[tokio::test]
    async fn slow_consumer_is_dropped_at_queue_depth() {
        let hub = MeterStreamHub::new();
        let mut slow = hub.subscribe(MeterFilter::default());

        // Never reading: queue fills, the overflowing publish drops the sink
        for i in 0..(SUBSCRIBER_QUEUE_DEPTH as u32 + 1) {
            hub.publish(sample("CP001", i));
        }
        assert_eq!(hub.subscriber_count(), 0);

        // The queued samples remain readable up to the overflow point
        assert!(slow.recv().await.is_some());
    }

    #[tokio::test]
    async fn per_publisher_order_is_preserved() {
        let hub = MeterStreamHub::new();
        let mut sub = hub.subscribe(MeterFilter::default());

        for i in 0..10 {
            hub.publish(sample("CP001", i));
        }
        for i in 0..10 {
            assert_eq!(sub.recv().await.unwrap().connector_id, i);
        }
    }

    #[tokio::test]
    async fn unsubscribe_detaches() {
        let hub = MeterStreamHub::new();
        let sub = hub.subscribe(MeterFilter::default());
        hub.unsubscribe(sub.id());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
