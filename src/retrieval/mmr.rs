//! Maximal Marginal Relevance (MMR) selection
//!
//! Each step picks the unselected candidate maximizing
//! `λ × sim(candidate, query) − (1 − λ) × max(sim(candidate, selected))`.
//!
//! λ = 1.0: plain top-k by similarity
//! λ = 0.0: pure diversity after the first (most relevant) pick

use crate::embedding::VectorIndexError;
use ndarray::{Array1, Array2};

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vec![0.0; v.len()]
    } else {
        v.iter().map(|x| x / norm).collect()
    }
}

/// Select up to `k` candidate indices by maximal marginal relevance
///
/// # Arguments
/// * `query` - Query embedding
/// * `embeddings` - Candidate embeddings, same dimension as the query
/// * `k` - Number of candidates to select
/// * `lambda_mult` - Relevance weight (0.0 = diversity, 1.0 = relevance)
///
/// # Returns
/// `min(k, embeddings.len())` indices into `embeddings`, in selection order.
/// The first index is always the candidate most similar to the query; ties
/// go to the lower index.
pub fn maximal_marginal_relevance(
    query: &[f32],
    embeddings: &[&[f32]],
    k: usize,
    lambda_mult: f32,
) -> Result<Vec<usize>, VectorIndexError> {
    let n = embeddings.len();
    let k = k.min(n);
    if k == 0 {
        return Ok(Vec::new());
    }

    let dim = query.len();
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
        return Err(VectorIndexError::InvalidDimension {
            expected: dim,
            actual: bad.len(),
        });
    }

    let flat: Vec<f32> = embeddings.iter().flat_map(|e| normalized(e)).collect();
    let matrix = Array2::from_shape_vec((n, dim), flat).map_err(|e| {
        VectorIndexError::InitializationError(format!("candidate matrix: {}", e))
    })?;
    let query = Array1::from(normalized(query));

    let relevance = matrix.dot(&query);
    let pairwise = matrix.dot(&matrix.t());

    let Some(first) = argmax((0..n).map(|i| relevance[i])) else {
        return Ok(Vec::new());
    };

    let mut selected = Vec::with_capacity(k);
    let mut taken = vec![false; n];
    // Max similarity of every candidate to anything selected so far
    let mut redundancy = vec![f32::NEG_INFINITY; n];

    let mut pick = first;
    loop {
        selected.push(pick);
        taken[pick] = true;
        for (j, r) in redundancy.iter_mut().enumerate() {
            *r = r.max(pairwise[[pick, j]]);
        }

        if selected.len() == k {
            break;
        }

        let scores = (0..n).map(|i| {
            if taken[i] {
                f32::NAN
            } else {
                lambda_mult * relevance[i] - (1.0 - lambda_mult) * redundancy[i]
            }
        });
        match argmax(scores) {
            Some(next) => pick = next,
            None => break,
        }
    }

    Ok(selected)
}

/// Index of the first strictly greatest value, ignoring NaN
fn argmax(values: impl Iterator<Item = f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}
