use atelier_core::error::{AtelierError, Result};

/// Exact nearest-neighbor index over fixed-length vectors.
///
/// A flat L2 scan: rebuilt wholesale on load by repeated inserts,
/// extended by a single insert per save. No update or delete.
/// Dimensionality is fixed by the first vector inserted.
#[derive(Debug, Default)]
pub struct FlatIndex {
    entries: Vec<(String, Vec<f32>)>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensionality established by the first inserted vector, if any.
    pub fn dim(&self) -> Option<usize> {
        self.entries.first().map(|(_, v)| v.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a vector under an id.
    ///
    /// Fails if the vector's length disagrees with the established
    /// dimensionality.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        if let Some(dim) = self.dim() {
            if vector.len() != dim {
                return Err(AtelierError::CorruptStore(format!(
                    "embedding dimensionality mismatch: expected {}, got {}",
                    dim,
                    vector.len()
                )));
            }
        }
        self.entries.push((id.into(), vector));
        Ok(())
    }

    /// Stored (id, vector) pairs in insertion order.
    pub fn entries(&self) -> &[(String, Vec<f32>)] {
        &self.entries
    }

    /// Return the `k` nearest ids by Euclidean distance, ascending.
    /// `k` is clamped to the number of stored vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if let Some(dim) = self.dim() {
            if query.len() != dim {
                return Err(AtelierError::CorruptStore(format!(
                    "query dimensionality mismatch: expected {}, got {}",
                    dim,
                    query.len()
                )));
            }
        }

        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|(id, v)| (id.clone(), euclidean_distance(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k.min(self.entries.len()));
        Ok(scored)
    }
}

/// Euclidean (L2) distance between two equal-length vectors.
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
