//! Keyword- and property-based service routing (C10 router).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::value::{FilterMap, Metadata, MetadataValue, matches_all};

struct ServiceEntry {
    keywords: Vec<String>,
    properties: Metadata,
}

/// Picks a service id either by keyword overlap with a free-text request,
/// or by equality match against a caller-supplied property filter.
#[derive(Default)]
pub struct ServiceRouter {
    services: RwLock<HashMap<String, ServiceEntry>>,
    /// Registration order, for keyword-match tie-breaking (spec §4.10:
    /// "ties → first registered").
    order: RwLock<Vec<String>>,
}

impl ServiceRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service_id` with its keyword list (for
    /// [`Self::route_by_keyword`]) and property map (for
    /// [`Self::route_by_property`] / [`Self::get_services_with_property`]).
    /// Re-registering an id refreshes its entry without disturbing its
    /// position in registration order.
    pub fn register_service(
        &self,
        service_id: impl Into<String>,
        keywords: Vec<String>,
        properties: Metadata,
    ) {
        let service_id = service_id.into();
        let mut services = self.services.write().expect("lock poisoned");
        let is_new = !services.contains_key(&service_id);
        services.insert(service_id.clone(), ServiceEntry { keywords, properties });
        if is_new {
            self.order.write().expect("lock poisoned").push(service_id);
        }
    }

    /// Removes `service_id` from the registry.
    pub fn unregister_service(&self, service_id: &str) {
        self.services.write().expect("lock poisoned").remove(service_id);
        self.order.write().expect("lock poisoned").retain(|id| id != service_id);
    }

    /// Scores every registered service by the count of its keywords that
    /// appear (case-insensitively) as a substring of `text`. Returns the
    /// highest-scoring id, with ties broken by registration order, or
    /// `None` if no service scores above zero.
    pub fn route_by_keyword(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let services = self.services.read().expect("lock poisoned");
        let order = self.order.read().expect("lock poisoned");

        let mut best: Option<(String, usize)> = None;
        for id in order.iter() {
            let Some(entry) = services.get(id) else { continue };
            let score = entry
                .keywords
                .iter()
                .filter(|kw| lower.contains(&kw.to_lowercase()))
                .count();
            if score == 0 {
                continue;
            }
            if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
                best = Some((id.clone(), score));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Returns every candidate whose properties satisfy every entry in
    /// `filters`, optionally breaking ties by the numeric value of
    /// `priority_key` (highest wins; missing/non-numeric sorts last).
    /// Returns a single winner: the first candidate after that ordering.
    pub fn route_by_property(&self, filters: &FilterMap, priority_key: Option<&str>) -> Option<String> {
        let mut candidates = self.get_matching(filters);
        if candidates.len() <= 1 {
            return candidates.pop().map(|(id, _)| id);
        }

        if let Some(key) = priority_key {
            candidates.sort_by(|(_, a), (_, b)| {
                let a = a.get(key).and_then(MetadataValue::as_f64).unwrap_or(f64::MIN);
                let b = b.get(key).and_then(MetadataValue::as_f64).unwrap_or(f64::MIN);
                b.total_cmp(&a)
            });
        }

        candidates.into_iter().next().map(|(id, _)| id)
    }

    /// Returns every registered service whose `key` property equals `value`.
    pub fn get_services_with_property(&self, key: &str, value: &MetadataValue) -> Vec<String> {
        let services = self.services.read().expect("lock poisoned");
        let order = self.order.read().expect("lock poisoned");
        order
            .iter()
            .filter(|id| services.get(*id).and_then(|e| e.properties.get(key)) == Some(value))
            .cloned()
            .collect()
    }

    fn get_matching(&self, filters: &FilterMap) -> Vec<(String, Metadata)> {
        let services = self.services.read().expect("lock poisoned");
        let order = self.order.read().expect("lock poisoned");
        order
            .iter()
            .filter_map(|id| {
                let entry = services.get(id)?;
                matches_all(&entry.properties, filters).then(|| (id.clone(), entry.properties.clone()))
            })
            .collect()
    }
}
