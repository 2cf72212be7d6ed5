//! Qdrant-backed [`VectorStore`] (C5 remote backend), one collection per
//! namespace.

use std::collections::HashMap;
use std::sync::RwLock;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder, PointStruct,
    PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use uuid::Uuid;

use crate::value::{FilterMap, Metadata, matches_all};

use super::store::{VectorDocument, VectorMatch, VectorStore, VectorStoreError, resolve_namespace};

/// Qdrant point IDs must be a `u64` or a UUID; document/embedding ids here
/// are arbitrary strings, so each id is mapped to a deterministic v5 UUID
/// derived from the id itself. The original string is kept in the payload
/// so results can be returned under their caller-supplied id.
fn point_id_for(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
}

fn metadata_to_payload(id: &str, metadata: &Metadata) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert("id".to_string(), id.to_string().into());
    let json = serde_json::to_string(metadata).unwrap_or_default();
    payload.insert("metadata_json".to_string(), json.into());
    payload
}

fn payload_to_metadata(payload: &HashMap<String, Value>) -> Metadata {
    payload
        .get("metadata_json")
        .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => serde_json::from_str(s).ok(),
            _ => None,
        })
        .unwrap_or_default()
}

fn payload_to_id(payload: &HashMap<String, Value>, fallback: &str) -> String {
    match payload.get("id").map(|v| &v.kind) {
        Some(Some(Kind::StringValue(s))) => s.clone(),
        _ => fallback.to_string(),
    }
}

/// Remote [`VectorStore`] backend over a Qdrant instance. Namespaces map to
/// collections named `"{prefix}__{ns}"`, created lazily on first write with
/// the dimension of the first stored embedding.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_prefix: String,
    dimensions: RwLock<HashMap<String, usize>>,
}

impl QdrantVectorStore {
    /// Connects to `url`, scoping every namespace's collection name under
    /// `collection_prefix`.
    pub async fn connect(url: &str, collection_prefix: impl Into<String>) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url).build().map_err(|e| VectorStoreError::State {
            message: format!("failed to connect to qdrant at {url}: {e}"),
        })?;
        Ok(Self {
            client,
            collection_prefix: collection_prefix.into(),
            dimensions: RwLock::new(HashMap::new()),
        })
    }

    fn collection_name(&self, ns: &str) -> String {
        format!("{}__{}", self.collection_prefix, ns)
    }

    fn cached_dimension(&self, ns: &str) -> Option<usize> {
        self.dimensions.read().expect("lock poisoned").get(ns).copied()
    }

    async fn ensure_collection_for(&self, ns: &str, dimension: usize) -> Result<(), VectorStoreError> {
        if let Some(known) = self.cached_dimension(ns) {
            if known != dimension {
                return Err(VectorStoreError::dimension_mismatch(known, dimension));
            }
            return Ok(());
        }

        let collection = self.collection_name(ns);
        let exists = self.client.collection_exists(&collection).await.map_err(|e| VectorStoreError::State {
            message: format!("failed to check collection {collection}: {e}"),
        })?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
                )
                .await
                .map_err(|e| VectorStoreError::State {
                    message: format!("failed to create collection {collection}: {e}"),
                })?;
        }

        self.dimensions.write().expect("lock poisoned").insert(ns.to_string(), dimension);
        Ok(())
    }

    async fn upsert_one(&self, ns: &str, id: &str, vector: Vec<f32>, metadata: Metadata) -> Result<(), VectorStoreError> {
        self.ensure_collection_for(ns, vector.len()).await?;
        let point = PointStruct::new(point_id_for(id), vector, metadata_to_payload(id, &metadata));
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name(ns), vec![point]).wait(true))
            .await
            .map_err(|e| VectorStoreError::State { message: format!("upsert failed: {e}") })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantVectorStore {
    async fn store_embedding(
        &self,
        id: &str,
        embedding: Vec<f32>,
        metadata: Option<Metadata>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        self.upsert_one(ns, id, embedding, metadata.unwrap_or_default()).await
    }

    async fn store_embedding_batch(
        &self,
        items: Vec<(String, Vec<f32>, Option<Metadata>)>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        let Some(dimension) = items.first().map(|(_, v, _)| v.len()) else {
            return Ok(());
        };
        self.ensure_collection_for(ns, dimension).await?;

        let points: Vec<PointStruct> = items
            .into_iter()
            .map(|(id, vector, metadata)| {
                let metadata = metadata.unwrap_or_default();
                PointStruct::new(point_id_for(&id), vector, metadata_to_payload(&id, &metadata))
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection_name(ns), points).wait(true))
            .await
            .map_err(|e| VectorStoreError::State { message: format!("batch upsert failed: {e}") })?;
        Ok(())
    }

    async fn find_similar(
        &self,
        query_embedding: &[f32],
        limit: usize,
        threshold: Option<f32>,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let ns = resolve_namespace(ns);
        let collection = self.collection_name(ns);

        if !self.client.collection_exists(&collection).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        // Over-fetch when filters are supplied: Qdrant's native filter DSL
        // isn't driven here, so `matches_all` is applied client-side and the
        // candidate pool must be wider than `limit` to still fill it.
        let fetch_limit = if filters.is_some() { (limit * 5).max(50) } else { limit } as u64;

        let result = self
            .client
            .search_points(SearchPointsBuilder::new(&collection, query_embedding.to_vec(), fetch_limit).with_payload(true))
            .await
            .map_err(|e| VectorStoreError::State { message: format!("search failed: {e}") })?;

        let mut matches: Vec<VectorMatch> = result
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload;
                let metadata = payload_to_metadata(&payload);
                if filters.is_some_and(|f| !matches_all(&metadata, f)) {
                    return None;
                }
                if threshold.is_some_and(|t| point.score < t) {
                    return None;
                }
                let id = payload_to_id(&payload, &point.id.map(|p| format!("{p:?}")).unwrap_or_default());
                Some(VectorMatch { id, score: point.score, metadata })
            })
            .collect();

        matches.truncate(limit);
        Ok(matches)
    }

    async fn delete(&self, id: &str, ns: Option<&str>) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        let collection = self.collection_name(ns);
        if !self.client.collection_exists(&collection).await.unwrap_or(false) {
            return Ok(());
        }
        self.client
            .delete_points(
                DeletePointsBuilder::new(&collection)
                    .points(PointsIdsList { ids: vec![point_id_for(id).into()] })
                    .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::State { message: format!("delete failed: {e}") })?;
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String], ns: Option<&str>) -> Result<(), VectorStoreError> {
        let ns = resolve_namespace(ns);
        let collection = self.collection_name(ns);
        if ids.is_empty() || !self.client.collection_exists(&collection).await.unwrap_or(false) {
            return Ok(());
        }
        let point_ids = ids.iter().map(|id| point_id_for(id).into()).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&collection).points(PointsIdsList { ids: point_ids }).wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::State { message: format!("batch delete failed: {e}") })?;
        Ok(())
    }

    async fn exists(&self, id: &str, ns: Option<&str>) -> Result<bool, VectorStoreError> {
        Ok(self.get_embedding(id, ns).await?.is_some())
    }

    async fn get_embedding(&self, id: &str, ns: Option<&str>) -> Result<Option<Vec<f32>>, VectorStoreError> {
        let ns = resolve_namespace(ns);
        let collection = self.collection_name(ns);
        if !self.client.collection_exists(&collection).await.unwrap_or(false) {
            return Ok(None);
        }

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&collection, vec![point_id_for(id).into()])
                    .with_vectors(true)
                    .with_payload(false),
            )
            .await
            .map_err(|e| VectorStoreError::State { message: format!("get failed: {e}") })?;

        Ok(response.result.into_iter().next().and_then(|p| p.vectors).and_then(|v| v.vectors_options).and_then(|v| {
            use qdrant_client::qdrant::vectors::VectorsOptions;
            match v {
                VectorsOptions::Vector(vector) => Some(vector.data),
                VectorsOptions::Vectors(_) => None,
            }
        }))
    }

    async fn create_namespace(&self, ns: &str) -> Result<(), VectorStoreError> {
        // Qdrant collections require a vector size up front; an explicit,
        // embedding-less namespace create is deferred to the first write.
        self.dimensions.write().expect("lock poisoned").entry(ns.to_string()).or_insert(0);
        Ok(())
    }

    async fn delete_namespace(&self, ns: &str) -> Result<(), VectorStoreError> {
        let collection = self.collection_name(ns);
        if self.client.collection_exists(&collection).await.unwrap_or(false) {
            self.client.delete_collection(&collection).await.map_err(|e| VectorStoreError::State {
                message: format!("failed to delete collection {collection}: {e}"),
            })?;
        }
        self.dimensions.write().expect("lock poisoned").remove(ns);
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, VectorStoreError> {
        let response = self.client.list_collections().await.map_err(|e| VectorStoreError::State {
            message: format!("failed to list collections: {e}"),
        })?;
        let prefix = format!("{}__", self.collection_prefix);
        Ok(response
            .collections
            .into_iter()
            .filter_map(|c| c.name.strip_prefix(&prefix).map(|ns| ns.to_string()))
            .collect())
    }

    async fn upsert_document(&self, document: VectorDocument, ns: Option<&str>) -> Result<(), VectorStoreError> {
        if document.vector.is_empty() {
            return Err(VectorStoreError::Validation {
                message: format!("document '{}' has no embedding", document.id),
            });
        }
        self.store_embedding(&document.id, document.vector, Some(document.metadata), ns).await
    }

    async fn upsert_document_batch(
        &self,
        documents: Vec<VectorDocument>,
        ns: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        for document in &documents {
            if document.vector.is_empty() {
                return Err(VectorStoreError::Validation {
                    message: format!("document '{}' has no embedding", document.id),
                });
            }
        }
        let items = documents.into_iter().map(|d| (d.id, d.vector, Some(d.metadata))).collect();
        self.store_embedding_batch(items, ns).await
    }

    async fn get_document(&self, id: &str, ns: Option<&str>) -> Result<Option<VectorDocument>, VectorStoreError> {
        let ns = resolve_namespace(ns);
        let collection = self.collection_name(ns);
        if !self.client.collection_exists(&collection).await.unwrap_or(false) {
            return Ok(None);
        }

        let response = self
            .client
            .get_points(GetPointsBuilder::new(&collection, vec![point_id_for(id).into()]).with_vectors(true).with_payload(true))
            .await
            .map_err(|e| VectorStoreError::State { message: format!("get failed: {e}") })?;

        Ok(response.result.into_iter().next().and_then(|p| {
            let metadata = payload_to_metadata(&p.payload);
            let vector = p.vectors.and_then(|v| v.vectors_options).and_then(|v| {
                use qdrant_client::qdrant::vectors::VectorsOptions;
                match v {
                    VectorsOptions::Vector(vector) => Some(vector.data),
                    VectorsOptions::Vectors(_) => None,
                }
            })?;
            Some(VectorDocument { id: id.to_string(), vector, metadata })
        }))
    }

    async fn find_similar_documents(
        &self,
        query_embedding: &[f32],
        limit: usize,
        threshold: Option<f32>,
        ns: Option<&str>,
        filters: Option<&FilterMap>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        self.find_similar(query_embedding, limit, threshold, ns, filters).await
    }

    async fn close(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}
