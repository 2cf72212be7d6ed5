use super::*;

fn doc(id: &str, title: &str, content: &str) -> Document {
    Document::new(Some(id.to_string()), title, content)
}

#[test]
fn add_and_get_roundtrip() {
    let store = DocumentStore::new();
    store.add(doc("1", "Title", "Content"));
    assert_eq!(store.get("1").unwrap().title, "Title");
}

#[test]
fn get_missing_returns_none() {
    let store = DocumentStore::new();
    assert!(store.get("missing").is_none());
}

#[test]
fn update_missing_document_errors() {
    let store = DocumentStore::new();
    let result = store.update("missing", |d| d);
    assert_eq!(result, Err(DocumentError::NotFound("missing".to_string())));
}

#[test]
fn update_replaces_content_and_bumps_updated_at() {
    let store = DocumentStore::new();
    let original = store.add(doc("1", "Title", "Content"));

    let updated = store
        .update("1", |mut d| {
            d.content = "New content".to_string();
            d
        })
        .unwrap();

    assert_eq!(updated.content, "New content");
    assert!(updated.updated_at >= original.updated_at);
}

#[test]
fn delete_removes_document() {
    let store = DocumentStore::new();
    store.add(doc("1", "Title", "Content"));
    store.delete("1");
    assert!(store.get("1").is_none());
}

#[test]
fn auto_generated_id_has_expected_prefix() {
    let d = Document::new(None, "t", "c");
    assert!(d.id.starts_with("doc_"));
}

#[test]
fn collection_crud_does_not_cascade_to_documents() {
    let store = DocumentStore::new();
    let mut d = doc("1", "T", "C");
    d.collection_id = Some("col1".to_string());
    store.add(d);
    store.create_collection(DocumentCollection::new(Some("col1".to_string()), "My Collection"));

    store.delete_collection("col1");

    assert!(store.get_collection("col1").is_none());
    assert!(store.get("1").is_some());
}

#[test]
fn documents_in_collection_filters_correctly() {
    let store = DocumentStore::new();
    let mut a = doc("1", "A", "a");
    a.collection_id = Some("col1".to_string());
    let mut b = doc("2", "B", "b");
    b.collection_id = Some("col2".to_string());
    store.add(a);
    store.add(b);

    let docs = store.documents_in_collection("col1");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "1");
}

#[test]
fn delete_documents_in_collection_only_removes_members() {
    let store = DocumentStore::new();
    let mut a = doc("1", "A", "a");
    a.collection_id = Some("col1".to_string());
    store.add(a);
    store.add(doc("2", "B", "b"));

    let removed = store.delete_documents_in_collection("col1");

    assert_eq!(removed, 1);
    assert!(store.get("1").is_none());
    assert!(store.get("2").is_some());
}

#[test]
fn find_similar_ranks_by_cosine_descending() {
    let store = DocumentStore::new();
    store.add(doc("same", "T", "C").with_embedding(vec![1.0, 0.0]));
    store.add(doc("orthogonal", "T", "C").with_embedding(vec![0.0, 1.0]));
    store.add(doc("no_embedding", "T", "C"));

    let results = store.find_similar(&[1.0, 0.0], 10, None);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].document.id, "same");
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[test]
fn find_similar_ties_preserve_insertion_order() {
    let store = DocumentStore::new();
    store.add(doc("a", "T", "C").with_embedding(vec![1.0, 0.0, 0.0]));
    store.add(doc("b", "T", "C").with_embedding(vec![0.0, 1.0, 0.0]));

    let results = store.find_similar(&[1.0, 1.0, 0.0], 2, None);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].document.id, "a");
    assert_eq!(results[1].document.id, "b");
}

#[test]
fn find_similar_respects_min_score() {
    let store = DocumentStore::new();
    store.add(doc("a", "T", "C").with_embedding(vec![1.0, 0.0]));
    store.add(doc("b", "T", "C").with_embedding(vec![0.0, 1.0]));

    let results = store.find_similar(&[1.0, 0.0], 10, Some(0.5));

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.id, "a");
}

#[test]
fn find_similar_in_collection_scopes_the_search() {
    let store = DocumentStore::new();
    let mut a = doc("a", "T", "C").with_embedding(vec![1.0, 0.0]);
    a.collection_id = Some("col1".to_string());
    let mut b = doc("b", "T", "C").with_embedding(vec![1.0, 0.0]);
    b.collection_id = Some("col2".to_string());
    store.add(a);
    store.add(b);

    let results = store.find_similar_in_collection("col1", &[1.0, 0.0], 10, None);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.id, "a");
}

#[test]
fn search_by_content_exact_title_scores_highest() {
    let store = DocumentStore::new();
    store.add(doc("exact", "rust programming", "something else"));
    store.add(doc("partial_title", "advanced rust programming guide", "other"));
    store.add(doc("content_only", "guide", "deep dive into rust programming"));

    let results = store.search_by_content("rust programming", 10);

    assert_eq!(results[0].document.id, "exact");
    assert!(results[0].score > results[1].score);
}

#[test]
fn search_by_content_drops_zero_score_documents() {
    let store = DocumentStore::new();
    store.add(doc("match", "rust", "rust content"));
    store.add(doc("no_match", "python", "python content"));

    let results = store.search_by_content("rust", 10);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.id, "match");
}

#[test]
fn search_by_content_counts_extra_occurrences() {
    let store = DocumentStore::new();
    store.add(doc("one", "title", "rust appears once here"));
    store.add(doc("three", "title", "rust rust rust appears three times"));

    let results = store.search_by_content("rust", 10);
    let one = results.iter().find(|r| r.document.id == "one").unwrap();
    let three = results.iter().find(|r| r.document.id == "three").unwrap();

    assert!(three.score > one.score);
}
