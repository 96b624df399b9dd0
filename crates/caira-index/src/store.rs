//! In-memory flat index plus its metadata side table.

use std::io::Write;
use std::path::Path;

use caira_core::{CairaError, ChunkRecord, EmbeddedChunk, IndexStats};

use crate::codec;

/// Flat vector index with one [`ChunkRecord`] per vector.
///
/// Starts empty; [`IndexStore::build`] or [`IndexStore::load`] populate it.
/// Searching an empty store fails with [`CairaError::NotLoaded`].
///
/// # Examples
///
/// ```
/// use caira_index::IndexStore;
///
/// let store = IndexStore::new();
/// assert!(!store.is_loaded());
/// assert!(store.stats().is_err());
/// ```
#[derive(Debug, Default)]
pub struct IndexStore {
    state: Option<FlatIndex>,
}

#[derive(Debug)]
struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
    records: Vec<ChunkRecord>,
}

impl FlatIndex {
    fn vector(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}

impl IndexStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an index has been built or loaded.
    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Number of indexed vectors (0 when nothing is loaded).
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.records.len())
    }

    /// Whether the store holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata and text for the vector at `position`.
    pub fn record(&self, position: usize) -> Option<&ChunkRecord> {
        self.state.as_ref()?.records.get(position)
    }

    /// Build from embedded chunks, replacing any current contents.
    ///
    /// # Errors
    ///
    /// See [`IndexStore::build_from_parts`].
    pub fn build(&mut self, embedded: &[EmbeddedChunk]) -> Result<(), CairaError> {
        let embeddings: Vec<&[f32]> = embedded.iter().map(|e| e.embedding.as_slice()).collect();
        let records: Vec<ChunkRecord> = embedded.iter().map(|e| ChunkRecord::from(&e.chunk)).collect();
        self.install(&embeddings, records)
    }

    /// Build from parallel embedding and record sequences.
    ///
    /// Position `i` of the index holds `embeddings[i]` and `records[i]`.
    ///
    /// # Errors
    ///
    /// - [`CairaError::InvalidInput`] if the sequences differ in length or
    ///   are empty.
    /// - [`CairaError::DimensionMismatch`] if the vectors do not all share
    ///   the first vector's dimension.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::path::PathBuf;
    /// # use caira_core::{ChunkMetadata, ChunkRecord, DocumentMetadata};
    /// use caira_index::IndexStore;
    /// # let record = ChunkRecord {
    /// #     metadata: ChunkMetadata {
    /// #         document: DocumentMetadata {
    /// #             source_path: PathBuf::from("data/runbooks/db.md"),
    /// #             filename: "db.md".into(),
    /// #             doc_type: "runbooks".into(),
    /// #             size: 1,
    /// #             modified_time: String::new(),
    /// #         },
    /// #         chunk_id: 0, start_token: 0, end_token: 1, token_count: 1, total_chunks: 1,
    /// #     },
    /// #     chunk_text: "restart".into(),
    /// # };
    ///
    /// let mut store = IndexStore::new();
    /// store
    ///     .build_from_parts(&[vec![0.0, 1.0], vec![1.0, 0.0]], &[record.clone(), record])
    ///     .unwrap();
    /// let hits = store.search(&[0.9, 0.1], 1).unwrap();
    /// assert_eq!(hits[0].0, 1);
    /// ```
    pub fn build_from_parts(
        &mut self,
        embeddings: &[Vec<f32>],
        records: &[ChunkRecord],
    ) -> Result<(), CairaError> {
        if embeddings.len() != records.len() {
            return Err(CairaError::InvalidInput(format!(
                "{} embeddings but {} metadata records",
                embeddings.len(),
                records.len()
            )));
        }
        let embeddings: Vec<&[f32]> = embeddings.iter().map(Vec::as_slice).collect();
        self.install(&embeddings, records.to_vec())
    }

    fn install(
        &mut self,
        embeddings: &[&[f32]],
        records: Vec<ChunkRecord>,
    ) -> Result<(), CairaError> {
        let Some(first) = embeddings.first() else {
            return Err(CairaError::InvalidInput(
                "cannot build an index from zero chunks".into(),
            ));
        };
        let dimension = first.len();
        if dimension == 0 {
            return Err(CairaError::InvalidInput("embeddings are empty".into()));
        }

        let mut vectors = Vec::with_capacity(embeddings.len() * dimension);
        for embedding in embeddings {
            if embedding.len() != dimension {
                return Err(CairaError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            vectors.extend_from_slice(embedding);
        }

        tracing::info!(vectors = records.len(), dimension, "built flat index");
        self.state = Some(FlatIndex {
            dimension,
            vectors,
            records,
        });
        Ok(())
    }

    /// Write the index and metadata files, creating parent directories.
    ///
    /// Both files are fully written to temporaries in their target
    /// directories before either is renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::NotLoaded`] if the store is empty, or
    /// [`CairaError::Io`] / [`CairaError::Serialization`] on write failure.
    pub fn persist(&self, index_path: &Path, metadata_path: &Path) -> Result<(), CairaError> {
        let state = self.state.as_ref().ok_or(CairaError::NotLoaded)?;

        let index_bytes = codec::encode(state.dimension, &state.vectors)?;
        let index_tmp = write_temp(index_path, &index_bytes)?;

        let metadata_bytes = serde_json::to_vec_pretty(&state.records)?;
        let metadata_tmp = write_temp(metadata_path, &metadata_bytes)?;

        index_tmp.persist(index_path).map_err(|e| e.error)?;
        metadata_tmp.persist(metadata_path).map_err(|e| e.error)?;

        tracing::info!(
            index = %index_path.display(),
            metadata = %metadata_path.display(),
            vectors = state.records.len(),
            "persisted index"
        );
        Ok(())
    }

    /// Replace the contents with a previously persisted index.
    ///
    /// On error the current contents are left untouched.
    ///
    /// # Errors
    ///
    /// - [`CairaError::NotFound`] if either file is missing.
    /// - [`CairaError::CorruptIndex`] if the index file is malformed, the
    ///   metadata is not a record array, or the counts disagree.
    pub fn load(&mut self, index_path: &Path, metadata_path: &Path) -> Result<(), CairaError> {
        for path in [index_path, metadata_path] {
            if !path.exists() {
                return Err(CairaError::NotFound(path.to_path_buf()));
            }
        }

        let decoded = codec::decode(&std::fs::read(index_path)?)?;
        let records: Vec<ChunkRecord> = serde_json::from_slice(&std::fs::read(metadata_path)?)
            .map_err(|e| CairaError::CorruptIndex(format!("unreadable metadata: {e}")))?;

        if decoded.count != records.len() {
            return Err(CairaError::CorruptIndex(format!(
                "index has {} vectors but metadata has {} entries",
                decoded.count,
                records.len()
            )));
        }

        tracing::info!(
            vectors = decoded.count,
            dimension = decoded.dimension,
            "loaded index"
        );
        self.state = Some(FlatIndex {
            dimension: decoded.dimension,
            vectors: decoded.vectors,
            records,
        });
        Ok(())
    }

    /// The `top_k` nearest vectors to `query` as `(position, distance)`.
    ///
    /// Distance is squared Euclidean. Results are sorted ascending by
    /// distance; equal distances are ordered by lower position first.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::NotLoaded`] before build/load, or
    /// [`CairaError::DimensionMismatch`] if `query` has the wrong length.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>, CairaError> {
        let state = self.state.as_ref().ok_or(CairaError::NotLoaded)?;
        if query.len() != state.dimension {
            return Err(CairaError::DimensionMismatch {
                expected: state.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..state.records.len())
            .map(|pos| (pos, squared_l2(query, state.vector(pos))))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Vector count, dimension and metadata count.
    ///
    /// # Errors
    ///
    /// Returns [`CairaError::NotLoaded`] before build/load.
    pub fn stats(&self) -> Result<IndexStats, CairaError> {
        let state = self.state.as_ref().ok_or(CairaError::NotLoaded)?;
        Ok(IndexStats {
            total_vectors: state.records.len(),
            dimension: state.dimension,
            metadata_count: state.records.len(),
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn write_temp(target: &Path, bytes: &[u8]) -> Result<tempfile::NamedTempFile, CairaError> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caira_core::{ChunkMetadata, DocumentMetadata};
    use std::path::PathBuf;

    fn record(i: usize) -> ChunkRecord {
        ChunkRecord {
            metadata: ChunkMetadata {
                document: DocumentMetadata {
                    source_path: PathBuf::from(format!("data/incidents/inc-{i}.md")),
                    filename: format!("inc-{i}.md"),
                    doc_type: "incidents".into(),
                    size: 100,
                    modified_time: "2024-05-01T10:00:00+00:00".into(),
                },
                chunk_id: 0,
                start_token: 0,
                end_token: 10,
                token_count: 10,
                total_chunks: 1,
            },
            chunk_text: format!("incident {i}"),
        }
    }

    fn built(vectors: &[Vec<f32>]) -> IndexStore {
        let records: Vec<ChunkRecord> = (0..vectors.len()).map(record).collect();
        let mut store = IndexStore::new();
        store.build_from_parts(vectors, &records).unwrap();
        store
    }

    #[test]
    fn search_orders_by_distance() {
        let store = built(&[vec![0.0, 0.0], vec![3.0, 4.0], vec![1.0, 0.0]]);
        let hits = store.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits, vec![(0, 0.0), (2, 1.0), (1, 25.0)]);
    }

    #[test]
    fn ties_go_to_lower_position() {
        let store = built(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![5.0, 5.0]]);
        let hits = store.search(&[0.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn top_k_truncates_and_zero_is_empty() {
        let store = built(&[vec![0.0], vec![1.0], vec![2.0]]);
        assert_eq!(store.search(&[0.0], 2).unwrap().len(), 2);
        assert_eq!(store.search(&[0.0], 10).unwrap().len(), 3);
        assert!(store.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn query_dimension_must_match() {
        let store = built(&[vec![0.0, 1.0]]);
        let err = store.search(&[1.0, 2.0, 3.0], 1).unwrap_err();
        assert!(matches!(
            err,
            CairaError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn empty_store_is_not_loaded() {
        let store = IndexStore::new();
        assert!(matches!(store.search(&[1.0], 1), Err(CairaError::NotLoaded)));
        assert!(matches!(store.stats(), Err(CairaError::NotLoaded)));
        assert!(store.is_empty());
        assert!(store.record(0).is_none());
    }

    #[test]
    fn build_rejects_length_mismatch() {
        let mut store = IndexStore::new();
        let err = store
            .build_from_parts(&[vec![1.0], vec![2.0]], &[record(0)])
            .unwrap_err();
        assert!(matches!(err, CairaError::InvalidInput(_)));
        assert!(!store.is_loaded());
    }

    #[test]
    fn build_rejects_mixed_dimensions() {
        let mut store = IndexStore::new();
        let err = store
            .build_from_parts(&[vec![1.0, 2.0], vec![1.0]], &[record(0), record(1)])
            .unwrap_err();
        assert!(matches!(
            err,
            CairaError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn build_rejects_zero_chunks() {
        let mut store = IndexStore::new();
        assert!(matches!(
            store.build_from_parts(&[], &[]),
            Err(CairaError::InvalidInput(_))
        ));
        assert!(matches!(store.build(&[]), Err(CairaError::InvalidInput(_))));
    }

    #[test]
    fn stats_after_build() {
        let store = built(&[vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]]);
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_vectors, 2);
        assert_eq!(stats.dimension, 3);
        assert_eq!(stats.metadata_count, 2);
        assert_eq!(store.record(1).unwrap().chunk_text, "incident 1");
    }

    #[test]
    fn persist_requires_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new();
        let err = store
            .persist(&dir.path().join("i.bin"), &dir.path().join("m.json"))
            .unwrap_err();
        assert!(matches!(err, CairaError::NotLoaded));
    }

    #[test]
    fn failed_load_keeps_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = built(&[vec![1.0, 2.0]]);
        let err = store
            .load(&dir.path().join("missing.bin"), &dir.path().join("missing.json"))
            .unwrap_err();
        assert!(matches!(err, CairaError::NotFound(_)));
        assert_eq!(store.len(), 1);
    }
}
