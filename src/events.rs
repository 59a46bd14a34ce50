use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
/// Iteration reports and their pub/sub fan-out.
///
/// Every polling cycle produces one [`IterationReport`]; observers (a UI
/// log pane, tests) subscribe and receive them over a channel.
use std::sync::Arc;
use std::time::SystemTime;

use crate::matching::MatchOutcome;
use crate::policy::Alert;

/// One region's result within an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionReading {
    pub detected: bool,
    pub outcome: MatchOutcome,
}

impl From<MatchOutcome> for RegionReading {
    fn from(outcome: MatchOutcome) -> Self {
        Self {
            detected: outcome.detected(),
            outcome,
        }
    }
}

/// Everything one polling cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub timestamp: SystemTime,
    pub local: RegionReading,
    pub overview: RegionReading,
    pub monster: RegionReading,
    pub alert: Alert,
}

impl IterationReport {
    /// The per-cycle log line, e.g.
    /// `⚠️ alert: MIXED [L:1(0.97) | O:0(0.41) | M:1(0.96)]` or
    /// `✅ clear [L:0(no templates loaded) | O:0(0.12) | M:0(0.08)]`.
    pub fn status_line(&self) -> String {
        let flags = format!(
            "[L:{}({}) | O:{}({}) | M:{}({})]",
            self.local.detected as u8,
            self.local.outcome,
            self.overview.detected as u8,
            self.overview.outcome,
            self.monster.detected as u8,
            self.monster.outcome,
        );

        if self.alert.is_active() {
            format!(
                "⚠️ alert: {} {}",
                self.alert.wire_name().to_uppercase(),
                flags
            )
        } else {
            format!("✅ clear {}", flags)
        }
    }
}

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<IterationReport>,
}

/// Broadcasts iteration reports to all subscribers.
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<RwLock<usize>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(RwLock::new(0)),
        }
    }

    /// Subscribe to reports, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<IterationReport>, SubscriberId) {
        let (tx, rx) = unbounded();

        let mut next_id = self.next_id.write();
        let id = SubscriberId(*next_id);
        *next_id += 1;
        drop(next_id);

        self.subscribers.write().push(Subscriber { id, sender: tx });

        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Publish a report to all subscribers (non-blocking).
    pub fn publish(&self, report: IterationReport) {
        let subscribers = self.subscribers.read();

        for subscriber in subscribers.iter() {
            // If send fails, the subscriber channel is closed - that's ok
            let _ = subscriber.sender.try_send(report.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            next_id: Arc::clone(&self.next_id),
        }
    }
}
