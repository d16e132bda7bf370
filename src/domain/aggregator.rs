//! Consolidation of several independently updating entities into one stream.
//!
//! Each entity publishes a full snapshot. Publishing replaces that entity's slot
//! and re-derives the sum of every slot under the same lock, so a reader never
//! sees a sum mixing a half-applied update with stale slots.

use crate::domain::cashflow::CashflowEvent;
use crate::domain::valuation::ValuationPoint;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// The default entity, for records carrying no entity id.
    Root,
    Id(String),
}

impl EntityKey {
    pub fn from_id(id: &str) -> Self {
        let id = id.trim();
        if id.is_empty() {
            EntityKey::Root
        } else {
            EntityKey::Id(id.to_string())
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Root => f.write_str("(root)"),
            EntityKey::Id(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySnapshot {
    pub valuations: Vec<ValuationPoint>,
    pub cashflows: Vec<CashflowEvent>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Combined {
    /// Incremented once per applied update.
    pub version: u64,
    pub entities: Vec<EntityKey>,
    pub valuations: Vec<ValuationPoint>,
    pub cashflows: Vec<CashflowEvent>,
}

#[derive(Debug, Default)]
struct AggregatorState {
    slots: HashMap<EntityKey, EntitySnapshot>,
    version: u64,
    combined: Arc<Combined>,
}

impl AggregatorState {
    fn resum(&mut self) -> Arc<Combined> {
        self.version += 1;

        let mut entities: Vec<EntityKey> = self.slots.keys().cloned().collect();
        entities.sort();

        // Sum in key order so the result does not depend on hash iteration.
        let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut cashflows = Vec::new();
        for key in &entities {
            let snapshot = &self.slots[key];
            for point in &snapshot.valuations {
                *by_day.entry(point.date).or_insert(0.0) += point.value;
            }
            cashflows.extend(snapshot.cashflows.iter().cloned());
        }
        cashflows.sort_by_key(|e| e.date);

        let combined = Arc::new(Combined {
            version: self.version,
            entities,
            valuations: by_day
                .into_iter()
                .map(|(date, value)| ValuationPoint { date, value })
                .collect(),
            cashflows,
        });
        self.combined = Arc::clone(&combined);
        combined
    }
}

/// Per-entity snapshot map with a single update path.
#[derive(Debug, Default)]
pub struct Aggregator {
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        // A panic while holding the lock cannot leave a torn sum: `combined`
        // is only swapped after the full re-sum.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace `key`'s slot and return the re-derived sum.
    pub fn publish(&self, key: EntityKey, snapshot: EntitySnapshot) -> Arc<Combined> {
        let mut state = self.lock();
        tracing::debug!(
            entity = %key,
            points = snapshot.valuations.len(),
            cashflows = snapshot.cashflows.len(),
            "entity snapshot published"
        );
        state.slots.insert(key, snapshot);
        state.resum()
    }

    pub fn remove(&self, key: &EntityKey) -> Arc<Combined> {
        let mut state = self.lock();
        if state.slots.remove(key).is_none() {
            return Arc::clone(&state.combined);
        }
        state.resum()
    }

    /// The last derived sum. Entities that never published contribute nothing.
    pub fn current(&self) -> Arc<Combined> {
        Arc::clone(&self.lock().combined)
    }

    pub fn snapshot_of(&self, key: &EntityKey) -> Option<EntitySnapshot> {
        self.lock().slots.get(key).cloned()
    }
}
