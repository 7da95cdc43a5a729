use std::cmp::Ordering;

use docrag_core::error::{Error, Result};

/// Row-major matrix of unit-normalized passage vectors.
///
/// Row `i` belongs to passage `i` of the build input. The index never changes
/// after `build`.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    data: Vec<f32>,
    dim: usize,
    len: usize,
}

impl DenseIndex {
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dim = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| Error::EmptyInput("dense index needs at least one vector".into()))?;
        // Zero-length vectors cannot carry a similarity; reported as a
        // dimension error with the smallest usable dimension as `expected`.
        if dim == 0 {
            return Err(Error::DimensionMismatch { expected: 1, found: 0 });
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        for v in &vectors {
            if v.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, found: v.len() });
            }
            data.extend_from_slice(v);
        }
        tracing::debug!(vectors = vectors.len(), dim, "built dense index");
        Ok(Self { data, dim, len: vectors.len() })
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn dim(&self) -> usize { self.dim }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        (position < self.len).then(|| &self.data[position * self.dim..(position + 1) * self.dim])
    }

    /// Top `k` rows by inner product with `vector`, clamped to [-1, 1].
    ///
    /// Results are sorted by descending similarity, ties by ascending
    /// position, and never longer than `min(k, len)`.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, found: vector.len() });
        }
        let k = k.min(self.len);
        if k == 0 { return Ok(Vec::new()); }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .map(|row| dot(row, vector).clamp(-1.0, 1.0))
            .enumerate()
            .collect();
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_similarity);
            scored.truncate(k);
        }
        scored.sort_by(by_similarity);
        Ok(scored)
    }
}

fn by_similarity(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
