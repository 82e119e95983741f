//! Exact inner-product vector index.
//!
//! Binary layout (little-endian):
//! `[magic "CSVI":4][version:2][dimension:4][count:4][count * dimension f32]`
//!
//! Vectors are stored contiguously in insertion order. Position `i` in the
//! index is the ordinal of the `i`-th appended vector and lines up 1:1 with
//! row `i` of the metadata store.

use std::cmp::Ordering;
use std::io::{Cursor, Read};

use crate::error::IndexError;

const MAGIC: &[u8; 4] = b"CSVI";
const VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 4;

/// Tolerance used when checking that a vector is unit-length.
pub const NORM_TOLERANCE: f32 = 1e-3;

/// Brute-force inner-product index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

/// A `(position, score)` search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub position: usize,
    pub score: f32,
}

impl VectorIndex {
    /// Create an empty index bound to `dimension`.
    pub fn build(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::Corrupt {
                message: "index dimension must be greater than zero".into(),
            });
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors in order. Every vector must match the index dimension
    /// and be unit-length within [`NORM_TOLERANCE`]. The whole batch is
    /// validated before any vector is stored, so a failed call leaves the
    /// index unchanged.
    ///
    /// Returns the position assigned to the first appended vector.
    pub fn add<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<usize, IndexError> {
        for (index, v) in vectors.iter().enumerate() {
            let v = v.as_ref();
            if v.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: v.len(),
                });
            }
            let norm = l2_norm(v);
            if (norm - 1.0).abs() > NORM_TOLERANCE {
                return Err(IndexError::NotNormalized { index, norm });
            }
        }
        let first = self.len();
        self.data.reserve(vectors.len() * self.dimension);
        for v in vectors {
            self.data.extend_from_slice(v.as_ref());
        }
        Ok(first)
    }

    /// Vector stored at `position`, if any.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Exact top-`k` search by inner product.
    ///
    /// Hits are ordered by descending score; equal scores are ordered by
    /// ascending position. Returns fewer than `k` hits when the index holds
    /// fewer vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>, IndexError> {
        if self.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Hit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, v)| Hit {
                position,
                score: dot_product(query, v),
            })
            .collect();

        let k = k.min(hits.len());
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, rank_order);
            hits.truncate(k);
        }
        hits.sort_by(rank_order);
        Ok(hits)
    }

    /// Serialize into the binary layout described in the module docs.
    ///
    /// Fails when the dimension or vector count exceeds the `u32` header
    /// fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let dimension = header_u32("dimension", self.dimension)?;
        let count = header_u32("count", self.len())?;
        let mut buf = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&dimension.to_le_bytes());
        buf.extend_from_slice(&count.to_le_bytes());
        for &val in &self.data {
            buf.extend_from_slice(&val.to_le_bytes());
        }
        Ok(buf)
    }

    /// Parse an index from bytes produced by [`VectorIndex::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let mut cursor = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        read_exact(&mut cursor, &mut magic, "magic")?;
        if &magic != MAGIC {
            return Err(corrupt("bad magic bytes"));
        }

        let mut u16_buf = [0u8; 2];
        read_exact(&mut cursor, &mut u16_buf, "version")?;
        let version = u16::from_le_bytes(u16_buf);
        if version != VERSION {
            return Err(corrupt(format!("unsupported version {version}")));
        }

        let mut u32_buf = [0u8; 4];
        read_exact(&mut cursor, &mut u32_buf, "dimension")?;
        let dimension = u32::from_le_bytes(u32_buf) as usize;
        read_exact(&mut cursor, &mut u32_buf, "count")?;
        let count = u32::from_le_bytes(u32_buf) as usize;

        if dimension == 0 {
            return Err(corrupt("zero dimension"));
        }
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt("size overflow"))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            return Err(corrupt(format!(
                "expected {} payload bytes for {} vectors of dimension {}, found {}",
                expected,
                count,
                dimension,
                payload.len()
            )));
        }

        let data = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { dimension, data })
    }
}

/// Descending score, then ascending position.
fn rank_order(a: &Hit, b: &Hit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

fn header_u32(field: &'static str, value: usize) -> Result<u32, IndexError> {
    u32::try_from(value).map_err(|_| IndexError::HeaderOverflow { field, value })
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8], field: &str) -> Result<(), IndexError> {
    cursor
        .read_exact(buf)
        .map_err(|_| corrupt(format!("truncated header ({field})")))
}

fn corrupt(message: impl Into<String>) -> IndexError {
    IndexError::Corrupt {
        message: message.into(),
    }
}

/// Inner product of two equal-length vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Whether `v` has unit L2 norm within [`NORM_TOLERANCE`].
pub fn is_unit(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= NORM_TOLERANCE
}
