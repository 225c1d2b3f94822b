//! Change notifications for chart edits.
//!
//! Subscribers own a receiving end of a channel. The chart keeps the senders
//! and drops them on `unsubscribe` or once the receiver is gone.

use super::hit_object::{HitObjectId, HitObjectInfo};
use crossbeam_channel::{Receiver, Sender, unbounded};

/// An edit applied to the chart.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartEvent {
    HitObjectAdded(HitObjectId),
    /// Carries the removed object since it no longer exists in the chart.
    HitObjectRemoved(HitObjectInfo),
    /// Time or lane of the object changed.
    HitObjectChanged(HitObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Owned list of chart subscribers.
#[derive(Default)]
pub struct ChartSubscribers {
    next_id: u64,
    senders: Vec<(SubscriptionId, Sender<ChartEvent>)>,
}

impl ChartSubscribers {
    pub fn subscribe(&mut self) -> (SubscriptionId, Receiver<ChartEvent>) {
        let (tx, rx) = unbounded();
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.senders.push((id, tx));
        (id, rx)
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.senders.len();
        self.senders.retain(|(sid, _)| *sid != id);
        self.senders.len() != before
    }

    pub fn emit(&mut self, event: ChartEvent) {
        self.senders.retain(|(id, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                log::debug!("CHART: Pruning closed subscription {:?}", id);
            }
            alive
        });
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl std::fmt::Debug for ChartSubscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartSubscribers")
            .field("count", &self.senders.len())
            .finish()
    }
}
