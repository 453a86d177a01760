use std::collections::HashSet;
use std::path::{Path, PathBuf};

use nalgebra::DVector;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};

use super::{IndexHit, IndexRecord, Metadata, NewRecord};
use crate::error::{RagError, Result};

const DIMENSION_KEY: &str = "dimension";

/// A named, durable collection of embedded records.
///
/// Each collection is a pair of sled trees inside the database at
/// `storage_dir`: one holding bincode-encoded records keyed by id, one holding
/// collection metadata (the vector dimension). Clones share the same database.
#[derive(Clone)]
pub struct VectorStore {
    db: Db,
    records: Tree,
    meta: Tree,
    collection: String,
    storage_dir: PathBuf,
}

impl VectorStore {
    /// Open `collection` under `storage_dir`, creating either if absent.
    pub fn open(storage_dir: impl AsRef<Path>, collection: &str) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        if collection.trim().is_empty() {
            return Err(RagError::Index("Collection name must not be empty".to_string()));
        }

        std::fs::create_dir_all(&storage_dir).map_err(|e| {
            RagError::Index(format!(
                "Failed to create storage directory {}: {}",
                storage_dir.display(),
                e
            ))
        })?;

        let db = sled::open(&storage_dir).map_err(|e| {
            RagError::Index(format!(
                "Failed to open vector store at {}: {}",
                storage_dir.display(),
                e
            ))
        })?;
        let records = db.open_tree(format!("{}::records", collection))?;
        let meta = db.open_tree(format!("{}::meta", collection))?;

        tracing::info!(
            storage_dir = %storage_dir.display(),
            collection,
            records = records.len(),
            "Vector store opened"
        );

        Ok(Self {
            db,
            records,
            meta,
            collection: collection.to_string(),
            storage_dir,
        })
    }

    /// Another collection in the same database.
    pub fn with_collection(&self, collection: &str) -> Result<Self> {
        if collection.trim().is_empty() {
            return Err(RagError::Index("Collection name must not be empty".to_string()));
        }

        Ok(Self {
            db: self.db.clone(),
            records: self.db.open_tree(format!("{}::records", collection))?,
            meta: self.db.open_tree(format!("{}::meta", collection))?,
            collection: collection.to_string(),
            storage_dir: self.storage_dir.clone(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Add `texts` with their `vectors` and `metadatas` as one batch.
    ///
    /// The three sequences must have the same length.
    pub fn add_texts(
        &self,
        texts: Vec<String>,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<Metadata>,
    ) -> Result<Vec<String>> {
        if texts.len() != vectors.len() || texts.len() != metadatas.len() {
            return Err(RagError::Validation(format!(
                "The number of texts ({}), embeddings ({}) and metadata entries ({}) must match",
                texts.len(),
                vectors.len(),
                metadatas.len()
            )));
        }

        let records = texts
            .into_iter()
            .zip(vectors)
            .zip(metadatas)
            .map(|((text, vector), metadata)| NewRecord {
                id: None,
                text,
                vector,
                metadata,
            })
            .collect();

        self.add(records)
    }

    /// Write one atomic batch and return the record ids in input order.
    ///
    /// Either every record is stored and flushed to disk, or none is. Ids must
    /// not collide with each other or with existing records; missing ids are
    /// generated.
    pub fn add(&self, records: Vec<NewRecord>) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let dimension = records[0].vector.len();
        if dimension == 0 {
            return Err(RagError::Validation("Embeddings must not be empty".to_string()));
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut seen = HashSet::new();
        let mut encoded = Vec::with_capacity(records.len());

        for record in records {
            if record.vector.len() != dimension {
                return Err(RagError::Validation(format!(
                    "Dimension mismatch within batch: expected {}, got {}",
                    dimension,
                    record.vector.len()
                )));
            }
            if record.vector.iter().any(|v| !v.is_finite()) {
                return Err(RagError::Validation(
                    "Embeddings must contain only finite values".to_string(),
                ));
            }

            let id = record.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            if !seen.insert(id.clone()) {
                return Err(RagError::Validation(format!("Duplicate record id '{}' in batch", id)));
            }

            let stored = IndexRecord {
                id: id.clone(),
                text: record.text,
                vector: record.vector,
                metadata: record.metadata,
                created_at,
            };
            encoded.push((id, bincode::serialize(&stored)?));
        }

        let collection = self.collection.as_str();
        let outcome: TransactionResult<(), String> =
            (&self.records, &self.meta).transaction(|(records, meta)| {
                match meta.get(DIMENSION_KEY)? {
                    Some(stored) => {
                        let stored = decode_dimension(&stored);
                        if stored != dimension {
                            return Err(ConflictableTransactionError::Abort(format!(
                                "Collection '{}' holds {}-dimensional embeddings, got {}",
                                collection, stored, dimension
                            )));
                        }
                    }
                    None => {
                        meta.insert(DIMENSION_KEY, &(dimension as u64).to_be_bytes()[..])?;
                    }
                }

                for (id, bytes) in &encoded {
                    if records.get(id.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(format!(
                            "Record id '{}' already exists in collection '{}'",
                            id, collection
                        )));
                    }
                    records.insert(id.as_bytes(), bytes.as_slice())?;
                }
                Ok(())
            });

        match outcome {
            Ok(()) => {}
            Err(TransactionError::Abort(message)) => return Err(RagError::Validation(message)),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        }

        self.db.flush()?;

        tracing::info!(collection, count = encoded.len(), "Added records to vector store");
        Ok(encoded.into_iter().map(|(id, _)| id).collect())
    }

    /// Up to `top_k` records nearest to `vector` by cosine distance, ascending.
    ///
    /// Records at equal distance keep key order. An empty collection yields an
    /// empty result.
    pub fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexHit>> {
        if top_k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }
        if vector.is_empty() {
            return Err(RagError::Validation("Query embedding must not be empty".to_string()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::Validation(
                "Query embedding must contain only finite values".to_string(),
            ));
        }
        if let Some(dimension) = self.dimension()? {
            if dimension != vector.len() {
                return Err(RagError::Validation(format!(
                    "Query embedding has {} dimensions, collection '{}' holds {}",
                    vector.len(),
                    self.collection,
                    dimension
                )));
            }
        }

        let mut scored = Vec::new();
        for item in self.records.iter() {
            let (_, value) = item?;
            let record: IndexRecord = bincode::deserialize(&value)?;
            let distance = cosine_distance(vector, &record.vector);
            scored.push((distance, record));
        }

        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (distance, record))| IndexHit {
                record,
                distance,
                rank: i + 1,
            })
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        match self.records.get(id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All records, oldest first.
    pub fn records(&self) -> Result<Vec<IndexRecord>> {
        let mut records = Vec::new();
        for item in self.records.iter() {
            let (_, value) = item?;
            records.push(bincode::deserialize::<IndexRecord>(&value)?);
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Dimension fixed by the first batch added to the collection.
    pub fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.meta.get(DIMENSION_KEY)?.map(|v| decode_dimension(&v)))
    }
}

fn decode_dimension(bytes: &[u8]) -> usize {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    u64::from_be_bytes(buf) as usize
}

/// Cosine similarity in [-1, 1]; 0 when either vector has no length or the
/// result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let vec_a = DVector::from_column_slice(a);
    let vec_b = DVector::from_column_slice(b);

    let dot_product = vec_a.dot(&vec_b);
    let norm_a = vec_a.norm();
    let norm_b = vec_b.norm();

    let similarity = dot_product / (norm_a * norm_b);
    if norm_a == 0.0 || norm_b == 0.0 || !similarity.is_finite() {
        0.0
    } else {
        similarity.clamp(-1.0, 1.0)
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
