//! Shared state handlers are threaded through via `State`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use governance_core::DecisionTrace;

/// Bounded in-memory record of recently-issued decision traces, keyed by
/// intent id, so `/override` and `/explain` can look one back up by id
/// after `/intents` already returned it to the caller.
///
/// This is API-layer bookkeeping, not part of the governance engine
/// itself: the audit chain is the durable record, this is just a cache
/// over the last [`TraceStore::CAPACITY`] decisions.
pub struct TraceStore {
    capacity: usize,
    order: Mutex<VecDeque<String>>,
    traces: Mutex<HashMap<String, DecisionTrace>>,
}

impl TraceStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: Mutex::new(VecDeque::with_capacity(capacity)),
            traces: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, trace: DecisionTrace) {
        let id = trace.intent_id.clone();
        let mut order = self.order.lock().expect("trace order lock poisoned");
        let mut traces = self.traces.lock().expect("trace map lock poisoned");

        if traces.insert(id.clone(), trace).is_none() {
            order.push_back(id);
        }
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                traces.remove(&oldest);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<DecisionTrace> {
        self.traces.lock().expect("trace map lock poisoned").get(id).cloned()
    }
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new(1000)
    }
}
