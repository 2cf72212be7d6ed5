use super::*;
use crate::value::Metadata;

fn retrieved(id: &str, score: f32) -> RetrievedDocument {
    RetrievedDocument {
        id: id.to_string(),
        title: id.to_string(),
        content: String::new(),
        metadata: Metadata::new(),
        score,
        updated_at: 0,
    }
}

#[test]
fn exact_key_hit_returns_stored_documents() {
    let cache = RetrievalCache::new();
    let docs = vec![retrieved("a", 1.0), retrieved("b", 0.5)];
    cache.put("  What is Rust?  ", Some(2), &docs);

    let hit = cache.get("what is rust?", Some(2));
    assert_eq!(hit, Some(docs));
}

#[test]
fn smaller_top_k_slices_unbounded_entry() {
    let cache = RetrievalCache::new();
    let docs = vec![retrieved("a", 1.0), retrieved("b", 0.5), retrieved("c", 0.1)];
    cache.put("query", None, &docs);

    let hit = cache.get("query", Some(2));
    assert_eq!(hit, Some(docs[..2].to_vec()));
}

#[test]
fn never_widens_a_smaller_cached_entry() {
    let cache = RetrievalCache::new();
    cache.put("query", Some(1), &[retrieved("a", 1.0)]);

    assert_eq!(cache.get("query", Some(5)), None);
}

#[test]
fn put_stores_a_copy_not_an_alias() {
    let cache = RetrievalCache::new();
    let mut docs = vec![retrieved("a", 1.0)];
    cache.put("query", Some(1), &docs);

    docs[0].score = 99.0;

    let hit = cache.get("query", Some(1)).unwrap();
    assert_eq!(hit[0].score, 1.0);
}

#[test]
fn clear_removes_everything() {
    let cache = RetrievalCache::new();
    cache.put("query", None, &[retrieved("a", 1.0)]);
    cache.clear();
    cache.run_pending_tasks();

    assert!(cache.is_empty());
    assert_eq!(cache.get("query", None), None);
}
