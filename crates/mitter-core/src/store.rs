use std::collections::{BTreeMap, HashMap};

use crate::types::{ChannelReferencingMessage, OrderKey};

/// Counts describing what a merge did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Identifiers seen for the first time.
    pub inserted: usize,
    /// Known identifiers whose content changed; the newer copy won.
    pub replaced: usize,
    /// Known identifiers re-delivered with identical content.
    pub unchanged: usize,
}

impl MergeReport {
    /// Whether the merge changed the visible sequence.
    pub fn changed(&self) -> bool {
        self.inserted > 0 || self.replaced > 0
    }
}

/// Accumulated messages of one channel in canonical oldest-to-newest order.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    ordered: BTreeMap<OrderKey, ChannelReferencingMessage>,
    keys_by_id: HashMap<String, OrderKey>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.keys_by_id.contains_key(message_id)
    }

    pub fn get(&self, message_id: &str) -> Option<&ChannelReferencingMessage> {
        self.keys_by_id
            .get(message_id)
            .and_then(|key| self.ordered.get(key))
    }

    /// Oldest message held.
    pub fn oldest(&self) -> Option<&ChannelReferencingMessage> {
        self.ordered.values().next()
    }

    /// Newest message held.
    pub fn newest(&self) -> Option<&ChannelReferencingMessage> {
        self.ordered.values().next_back()
    }

    /// Canonical-ordered copy of everything held.
    pub fn view(&self) -> Vec<ChannelReferencingMessage> {
        self.ordered.values().cloned().collect()
    }

    /// Merge a batch in any order.
    pub fn merge<I>(&mut self, items: I) -> MergeReport
    where
        I: IntoIterator<Item = ChannelReferencingMessage>,
    {
        let mut report = MergeReport::default();
        for item in items {
            match self.upsert(item) {
                Upsert::Inserted => report.inserted += 1,
                Upsert::Replaced => report.replaced += 1,
                Upsert::Unchanged => report.unchanged += 1,
            }
        }
        report
    }

    /// Insert one message, replacing a divergent copy with the same identifier.
    pub fn upsert(&mut self, item: ChannelReferencingMessage) -> Upsert {
        let key = item.order_key();
        match self.keys_by_id.get(&item.message_id) {
            None => {
                self.keys_by_id.insert(item.message_id.clone(), key.clone());
                self.ordered.insert(key, item);
                Upsert::Inserted
            }
            Some(existing_key) => {
                if self.ordered.get(existing_key) == Some(&item) {
                    return Upsert::Unchanged;
                }
                // Send time may differ between copies, so the slot can move.
                let existing_key = existing_key.clone();
                self.ordered.remove(&existing_key);
                self.keys_by_id.insert(item.message_id.clone(), key.clone());
                self.ordered.insert(key, item);
                Upsert::Replaced
            }
        }
    }

    pub fn clear(&mut self) {
        self.ordered.clear();
        self.keys_by_id.clear();
    }
}

/// Result of a single-message upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
    Unchanged,
}
