//! Dense scoring primitives: row-major embedding matrix, cosine similarity
//! and min-max score normalisation.

use std::collections::HashMap;

/// Embedding matrix whose row `i` belongs to record `i` of its index.
/// Vectors are stored un-normalised; cosine computes explicit norms.
#[derive(Debug)]
pub struct DenseMatrix {
    rows: Vec<Vec<f32>>,
}

impl DenseMatrix {
    pub fn new(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn as_rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Cosine similarity of `query` against every row, keyed by ordinal.
    pub fn scores(&self, query: &[f32]) -> Vec<(usize, f32)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(ordinal, row)| (ordinal, cosine_similarity(query, row)))
            .collect()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + 1e-8)
}

/// Min-max normalise a score list to `[0, 1]`, keyed by ordinal.
/// A constant list maps every entry to 1.0; an empty list maps to nothing.
pub fn min_max_normalize(scored: &[(usize, f32)]) -> HashMap<usize, f32> {
    let mut out = HashMap::with_capacity(scored.len());
    if scored.is_empty() {
        return out;
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &(_, score) in scored {
        min = min.min(score);
        max = max.max(score);
    }
    if max == min {
        for &(ordinal, _) in scored {
            out.insert(ordinal, 1.0);
        }
    } else {
        let span = max - min;
        for &(ordinal, score) in scored {
            out.insert(ordinal, (score - min) / span);
        }
    }
    out
}
