//! Approximate nearest-neighbor search over node vector properties.

mod distance;
/// HNSW graph implementation.
pub mod hnsw;
mod registry;

pub use distance::{cosine_distance, dot_product, euclidean_distance, VectorMetric};
pub use hnsw::{HnswIndex, HnswParams};
pub use registry::{
    VectorHit, VectorIndexConfig, VectorIndexInfo, VectorRegistry, DEFAULT_EF_CONSTRUCTION,
    DEFAULT_M, MAX_DIMENSIONS, MAX_K, MIN_DIMENSIONS, MIN_DEFAULT_EF,
};
