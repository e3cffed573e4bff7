use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{GraphError, Result};

/// Distance metric of a vector index. Lower distance always means closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VectorMetric {
    /// `1 - cos(a, b)`, in `[0, 2]`.
    #[default]
    Cosine,
    /// L2 distance, in `[0, inf)`.
    Euclidean,
    /// Negated dot product.
    DotProduct,
}

impl VectorMetric {
    /// Distance between two vectors of equal length.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            VectorMetric::Cosine => cosine_distance(a, b),
            VectorMetric::Euclidean => euclidean_distance(a, b),
            VectorMetric::DotProduct => -dot_product(a, b),
        }
    }

    /// Similarity score reported to callers for a distance under this metric.
    ///
    /// Cosine gives `1 - d`, Euclidean `1 / (1 + d)` and dot product `-d`.
    pub fn score(self, distance: f32) -> f32 {
        match self {
            VectorMetric::Cosine => 1.0 - distance,
            VectorMetric::Euclidean => 1.0 / (1.0 + distance),
            VectorMetric::DotProduct => -distance,
        }
    }

    /// Lowercase name used in configuration and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Euclidean => "euclidean",
            VectorMetric::DotProduct => "dot_product",
        }
    }
}

impl fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorMetric {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(VectorMetric::Cosine),
            "euclidean" | "l2" => Ok(VectorMetric::Euclidean),
            "dot_product" | "dotproduct" | "dot" => Ok(VectorMetric::DotProduct),
            other => Err(GraphError::invalid(format!("unknown vector metric '{other}'"))),
        }
    }
}

/// Dot product of two vectors, accumulated in `f64`.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    dot_f64(a, b) as f32
}

fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

/// Euclidean (L2) distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Cosine distance, clamped to `[0, 2]`. A zero vector is treated as orthogonal
/// to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot_f64(a, a).sqrt();
    let norm_b = dot_f64(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let distance = 1.0 - dot_f64(a, b) / (norm_a * norm_b);
    if distance.is_nan() {
        return 1.0;
    }
    distance.clamp(0.0, 2.0) as f32
}
