//! Append-only flat vector index with exact squared-Euclidean search.
//!
//! Row ids are assigned at insertion time (0-based, insertion order) and are
//! never reused or reordered, which is what lets callers encode positional
//! relationships in them. Search is brute force and O(n·d); the corpora this
//! serves are a few thousand articles.
//!
//! The on-disk format is little-endian:
//! `magic "NRVX" | version u32 | dim u32 | rows u64 | rows * dim f32`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use newsrag_core::error::{NewsRagError, Result};
use tracing::debug;

const MAGIC: &[u8; 4] = b"NRVX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// A single hit returned from a vector search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// Row id of the matching vector.
    pub row: usize,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

/// Flat, append-only vector index.
///
/// Built single-threaded and then shared read-only: `search` takes `&self`
/// and the type is `Send + Sync`, so any number of readers may query it
/// concurrently once it has been published.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dim: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index for vectors of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows stored.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors in order. Returns the row id of the first new vector.
    ///
    /// Either every vector is appended or, on a dimension mismatch, none is.
    pub fn add<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<usize> {
        if let Some((pos, bad)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.as_ref().len() != self.dim)
        {
            return Err(NewsRagError::Index(format!(
                "vector {} has dimension {}, index expects {}",
                pos,
                bad.as_ref().len(),
                self.dim
            )));
        }
        let first_row = self.len();
        self.data.reserve(vectors.len() * self.dim);
        for vector in vectors {
            self.data.extend_from_slice(vector.as_ref());
        }
        Ok(first_row)
    }

    /// Vector stored at `row`.
    pub fn get(&self, row: usize) -> Option<&[f32]> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// The `k` nearest rows to `query`, by ascending squared Euclidean
    /// distance. Equal distances are ordered by row id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(NewsRagError::Index(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dim
            )));
        }

        let mut hits: Vec<IndexHit> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(row, vector)| IndexHit {
                row,
                distance: squared_l2(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        hits.truncate(k);
        Ok(hits)
    }

    /// Write the index to `path`, replacing any existing file atomically.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            self.write_to(&mut writer)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), rows = self.len(), dim = self.dim, "Vector index persisted");
        Ok(())
    }

    /// Read an index previously written by [`VectorIndex::persist`].
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let index = Self::read_from(&mut reader)
            .map_err(|e| NewsRagError::Index(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), rows = index.len(), dim = index.dim, "Vector index loaded");
        Ok(index)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dim as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut R) -> std::result::Result<Self, String> {
        let mut header = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut header)
            .map_err(|e| format!("truncated header: {}", e))?;
        if &header[0..4] != MAGIC {
            return Err("not a vector index file".to_string());
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {}", version));
        }
        let dim = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let mut rows_bytes = [0u8; 8];
        rows_bytes.copy_from_slice(&header[12..20]);
        let rows = u64::from_le_bytes(rows_bytes) as usize;

        let values = rows
            .checked_mul(dim)
            .ok_or_else(|| "row count overflow".to_string())?;
        let mut payload = Vec::new();
        reader
            .read_to_end(&mut payload)
            .map_err(|e| format!("read payload: {}", e))?;
        if payload.len() != values * 4 {
            return Err(format!(
                "payload is {} bytes, expected {} for {} rows of dimension {}",
                payload.len(),
                values * 4,
                rows,
                dim
            ));
        }

        let data = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { dim, data })
    }
}

/// Squared Euclidean distance. Monotone in true L2, so rankings match.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
