//! In-process HNSW index over chunk vectors

use hnsw_rs::filter::FilterT;
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::Chunk;

/// A point currently visible to search
struct LivePoint {
    data_id: usize,
    chunk: Chunk,
    vector: Vec<f32>,
}

struct IndexState {
    graph: Hnsw<'static, f32, DistCosine>,
    /// Live points by stable point id
    points: HashMap<Uuid, LivePoint>,
    /// Live point ids per document, in chunk order
    by_document: HashMap<Uuid, Vec<Uuid>>,
    /// Graph node id -> live point id
    nodes: HashMap<usize, Uuid>,
    next_data_id: usize,
}

/// Restricts graph search to the live nodes of one document
struct DocumentFilter {
    /// Sorted graph node ids
    allowed: Vec<usize>,
}

impl FilterT for DocumentFilter {
    fn hnsw_filter(&self, id: &usize) -> bool {
        self.allowed.binary_search(id).is_ok()
    }
}

/// Cosine-distance HNSW graph with per-document point sets.
///
/// `hnsw_rs` graphs are append-only, so replacing a document inserts fresh nodes and
/// retires the old ones from the live set; retired nodes never pass the search filter.
/// Once retired nodes outnumber live ones the graph is rebuilt from the live points.
/// The graph only proposes candidates: every reported score is exact cosine similarity.
pub struct HnswIndex {
    state: RwLock<IndexState>,
    dimensions: usize,
    m: usize,
    max_elements: usize,
    ef_construction: usize,
    ef_search: usize,
    exact_search_below: usize,
}

impl HnswIndex {
    const MAX_LAYERS: usize = 16;

    pub fn new(config: &VectorDbConfig, dimensions: usize) -> Self {
        Self {
            state: RwLock::new(IndexState {
                graph: Self::empty_graph(
                    config.hnsw_m,
                    config.hnsw_max_elements,
                    config.hnsw_ef_construction,
                ),
                points: HashMap::new(),
                by_document: HashMap::new(),
                nodes: HashMap::new(),
                next_data_id: 0,
            }),
            dimensions,
            m: config.hnsw_m,
            max_elements: config.hnsw_max_elements,
            ef_construction: config.hnsw_ef_construction,
            ef_search: config.hnsw_ef_search,
            exact_search_below: config.exact_search_below,
        }
    }

    fn empty_graph(m: usize, max_elements: usize, ef_construction: usize) -> Hnsw<'static, f32, DistCosine> {
        Hnsw::<f32, DistCosine>::new(m, max_elements, Self::MAX_LAYERS, ef_construction, DistCosine {})
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Replace the document's point set with one point per chunk
    pub fn upsert(&self, document_id: Uuid, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(Error::vector_db(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(Error::vector_db(format!(
                "Vector has {} dimensions, index expects {}",
                bad.len(),
                self.dimensions
            )));
        }
        if let Some(stray) = chunks.iter().find(|c| c.document_id != document_id) {
            return Err(Error::vector_db(format!(
                "Chunk {} belongs to document {}, not {}",
                stray.chunk_index, stray.document_id, document_id
            )));
        }

        let mut state = self.state.write();

        if let Some(old) = state.by_document.remove(&document_id) {
            for point_id in old {
                if let Some(point) = state.points.remove(&point_id) {
                    state.nodes.remove(&point.data_id);
                }
            }
        }

        let mut point_ids = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let data_id = state.next_data_id;
            state.next_data_id += 1;
            state.graph.insert((vector.as_slice(), data_id));

            let point_id = chunk.point_id();
            // A repeated chunk index within one batch keeps the last occurrence
            if let Some(previous) = state.points.insert(
                point_id,
                LivePoint {
                    data_id,
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                },
            ) {
                state.nodes.remove(&previous.data_id);
            } else {
                point_ids.push(point_id);
            }
            state.nodes.insert(data_id, point_id);
        }

        let written = point_ids.len();
        state.by_document.insert(document_id, point_ids);

        let live = state.nodes.len();
        let retired = state.next_data_id - live;
        if retired > live {
            self.rebuild(&mut state);
            tracing::debug!("Rebuilt HNSW graph: {} live nodes, {} retired dropped", live, retired);
        }
        Ok(written)
    }

    /// Replace the graph with one holding only the live points, renumbering nodes
    fn rebuild(&self, state: &mut IndexState) {
        let mut graph = Self::empty_graph(self.m, self.max_elements.max(state.points.len()), self.ef_construction);
        let mut nodes = HashMap::with_capacity(state.points.len());
        let mut data_id = 0;

        for (point_id, point) in state.points.iter_mut() {
            graph.insert((point.vector.as_slice(), data_id));
            point.data_id = data_id;
            nodes.insert(data_id, *point_id);
            data_id += 1;
        }

        state.graph = graph;
        state.nodes = nodes;
        state.next_data_id = data_id;
    }

    /// Score the document's points against `query`.
    ///
    /// Returns up to `top_k` candidates; ranking and threshold filtering are the caller's.
    pub fn search(&self, document_id: Uuid, query: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>> {
        if query.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let state = self.state.read();
        let Some(point_ids) = state.by_document.get(&document_id) else {
            return Ok(Vec::new());
        };
        let points: Vec<&LivePoint> = point_ids.iter().filter_map(|id| state.points.get(id)).collect();

        if points.len() <= self.exact_search_below {
            return Ok(points
                .into_iter()
                .map(|p| (p.chunk.clone(), cosine_similarity(query, &p.vector)))
                .collect());
        }

        let mut allowed: Vec<usize> = points.iter().map(|p| p.data_id).collect();
        allowed.sort_unstable();
        let filter = DocumentFilter { allowed };

        let neighbours = state.graph.search_filter(
            query,
            top_k,
            self.ef_search.max(top_k),
            Some(&filter as &dyn FilterT),
        );

        Ok(neighbours
            .into_iter()
            .filter_map(|n| {
                let point_id = state.nodes.get(&n.d_id)?;
                let point = state.points.get(point_id)?;
                Some((point.chunk.clone(), cosine_similarity(query, &point.vector)))
            })
            .collect())
    }

    pub fn contains_document(&self, document_id: Uuid) -> bool {
        self.state
            .read()
            .by_document
            .get(&document_id)
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Live points across all documents
    pub fn len(&self) -> usize {
        self.state.read().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nodes held by the graph, live and retired
    pub fn graph_nodes(&self) -> usize {
        self.state.read().next_data_id
    }
}

/// Cosine similarity; zero when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
