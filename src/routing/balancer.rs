//! Weighted round-robin service balancer (C10 balancer).

use std::sync::RwLock;

struct Entry {
    id: String,
    weight: f64,
    /// Smooth weighted round-robin deficit counter.
    current: f64,
}

/// Picks the next service id via smooth weighted round robin: every call
/// adds each service's weight to its running counter, returns the id with
/// the largest counter (first-registered breaks ties), then subtracts the
/// total weight from the winner. Over many calls this converges each
/// service's selection share to `weight / total_weight` (spec §4.10).
#[derive(Default)]
pub struct ServiceBalancer {
    services: RwLock<Vec<Entry>>,
}

impl ServiceBalancer {
    /// Creates an empty balancer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` with `weight` (the spec's default is `1.0`).
    /// Re-registering an existing id updates its weight in place, preserving
    /// its position (and therefore its tie-break priority).
    pub fn register_service(&self, id: impl Into<String>, weight: f64) {
        let id = id.into();
        let mut services = self.services.write().expect("lock poisoned");
        if let Some(entry) = services.iter_mut().find(|e| e.id == id) {
            entry.weight = weight;
        } else {
            services.push(Entry { id, weight, current: 0.0 });
        }
    }

    /// Removes `id`. Safe to call with no live cursor to invalidate: the
    /// balancer holds no external index, only per-service counters.
    pub fn unregister_service(&self, id: &str) {
        self.services.write().expect("lock poisoned").retain(|e| e.id != id);
    }

    /// Returns the next service id, or `None` if no services are registered.
    pub fn get_next_service(&self) -> Option<String> {
        let mut services = self.services.write().expect("lock poisoned");
        if services.is_empty() {
            return None;
        }

        let total_weight: f64 = services.iter().map(|e| e.weight).sum();
        for entry in services.iter_mut() {
            entry.current += entry.weight;
        }

        let mut winner = 0usize;
        for (i, entry) in services.iter().enumerate().skip(1) {
            if entry.current > services[winner].current {
                winner = i;
            }
        }

        services[winner].current -= total_weight;
        Some(services[winner].id.clone())
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().expect("lock poisoned").len()
    }

    /// `true` iff no services are registered.
    pub fn is_empty(&self) -> bool {
        self.services.read().expect("lock poisoned").is_empty()
    }
}
