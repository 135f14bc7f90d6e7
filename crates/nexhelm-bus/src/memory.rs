//! Bounded in-memory pub/sub.
//!
//! One topic per workflow. Each subscriber gets its own bounded channel;
//! the publisher fans out sequentially, so every subscriber observes a
//! workflow's events in publication order.

use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};

use crate::envelope::{Event, EventType};

/// What to do when a subscriber's buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Block the publisher until the subscriber drains.
    #[default]
    Block,
    /// Drop non-critical events for the slow subscriber. Critical events
    /// still block.
    DropNonCritical,
}

/// Event bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Per-subscriber channel capacity.
    pub buffer_size: usize,
    /// Back-pressure behavior for slow subscribers.
    pub overflow: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            overflow: OverflowPolicy::Block,
        }
    }
}

/// In-process event bus with per-workflow topics.
pub struct EventBus {
    topics: RwLock<HashMap<String, Vec<mpsc::Sender<Event>>>>,
    config: BusConfig,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Subscribe to one workflow's event stream.
    ///
    /// The subscription ends (yields `None`) when the workflow publishes
    /// its terminal event or the stream is closed explicitly.
    pub async fn subscribe(&self, workflow_id: &str) -> EventSubscription {
        let (tx, rx) = mpsc::channel(self.config.buffer_size);
        self.topics
            .write()
            .await
            .entry(workflow_id.to_string())
            .or_default()
            .push(tx);
        debug!(workflow_id = %workflow_id, "Subscriber attached");
        EventSubscription {
            workflow_id: workflow_id.to_string(),
            rx,
        }
    }

    /// Publish an event to all subscribers of its workflow.
    ///
    /// Publishing with no subscribers is legal; the event is discarded.
    /// After a terminal event is delivered the workflow's channels are
    /// closed and subscribers observe end-of-stream.
    pub async fn publish(&self, event: Event) {
        let workflow_id = event.workflow_id.clone();
        let critical = event.event_type.is_critical();
        let terminal = event.event_type.is_terminal();

        // Snapshot the senders so a slow subscriber on this workflow never
        // blocks publishers of other workflows.
        let senders = {
            let topics = self.topics.read().await;
            match topics.get(&workflow_id) {
                Some(senders) if !senders.is_empty() => senders.clone(),
                _ => {
                    trace!(workflow_id = %workflow_id, event = %event.event_type.as_str(),
                        "No subscribers, discarding");
                    return;
                }
            }
        };

        let mut saw_closed = false;
        for sender in &senders {
            if critical || self.config.overflow == OverflowPolicy::Block {
                saw_closed |= sender.send(event.clone()).await.is_err();
            } else {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(workflow_id = %workflow_id,
                            event = %event.event_type.as_str(),
                            "Subscriber full, shedding non-critical event");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }

        if saw_closed {
            let mut topics = self.topics.write().await;
            if let Some(senders) = topics.get_mut(&workflow_id) {
                senders.retain(|s| !s.is_closed());
            }
        }

        if terminal {
            self.close(&workflow_id).await;
        }
    }

    /// Close a workflow's stream; subscribers observe end-of-stream.
    pub async fn close(&self, workflow_id: &str) {
        if self.topics.write().await.remove(workflow_id).is_some() {
            debug!(workflow_id = %workflow_id, "Stream closed");
        }
    }

    /// Number of live subscribers for a workflow.
    pub async fn subscriber_count(&self, workflow_id: &str) -> usize {
        self.topics
            .read()
            .await
            .get(workflow_id)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

/// A subscription to one workflow's events.
pub struct EventSubscription {
    workflow_id: String,
    rx: mpsc::Receiver<Event>,
}

impl EventSubscription {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Next event, or `None` at end-of-stream.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Drain everything remaining on the stream.
    pub async fn collect_all(mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventSubscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
