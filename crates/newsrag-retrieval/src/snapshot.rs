//! The index snapshot and its on-disk form.
//!
//! A snapshot is the unit of publication: article metadata, the article
//! vector index, the expansion vector index, the enriched expansion
//! metadata, and the name of the embedder that produced the vectors. It is
//! validated before it is written and after it is read, so a
//! stride-violating snapshot is never persisted or served.
//!
//! On disk the four data files are accompanied by a manifest. The manifest
//! is removed before any data file is replaced and renamed into place last,
//! so a directory holding a half-replaced snapshot is never reported as
//! complete.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use newsrag_core::config::IndexConfig;
use newsrag_core::error::{NewsRagError, Result};
use newsrag_core::types::{Article, ExpansionRecord, EXPANSION_STRIDE};
use newsrag_vector::{DynEmbeddingService, VectorIndex};

const STAGING_SUFFIX: &str = "staging";

/// A complete, immutable index built from one corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    /// `model_id` of the embedding service that built the vectors.
    pub embedder: String,
    pub articles: Vec<Article>,
    pub article_index: VectorIndex,
    pub expansion_index: VectorIndex,
    pub expansions: Vec<ExpansionRecord>,
}

impl IndexSnapshot {
    /// A snapshot with no articles and two empty indices of dimension `dim`.
    pub fn empty(embedder: impl Into<String>, dim: usize) -> Self {
        Self {
            embedder: embedder.into(),
            articles: Vec::new(),
            article_index: VectorIndex::new(dim),
            expansion_index: VectorIndex::new(dim),
            expansions: Vec::new(),
        }
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    pub fn expansion_rows(&self) -> usize {
        self.expansion_index.len()
    }

    pub fn dim(&self) -> usize {
        self.expansion_index.dim()
    }

    pub fn article(&self, id: usize) -> Option<&Article> {
        self.articles.get(id)
    }

    /// Fail unless `embedder` is the service these vectors came from.
    pub fn check_embedder(&self, embedder: &dyn DynEmbeddingService) -> Result<()> {
        let serving = embedder.model_id();
        if serving != self.embedder {
            return Err(NewsRagError::EmbedderMismatch {
                built_with: self.embedder.clone(),
                serving,
            });
        }
        if self.dim() != embedder.dimensions() {
            return Err(NewsRagError::Index(format!(
                "snapshot dimension {} does not match embedder dimension {}",
                self.dim(),
                embedder.dimensions()
            )));
        }
        Ok(())
    }

    /// Check every structural invariant the retrieval path relies on.
    pub fn validate(&self) -> Result<()> {
        if self.embedder.trim().is_empty() {
            return Err(NewsRagError::MetadataMismatch(
                "snapshot does not name its embedder".to_string(),
            ));
        }

        for (position, article) in self.articles.iter().enumerate() {
            if article.id != position {
                return Err(NewsRagError::IdGap {
                    position,
                    found: article.id,
                });
            }
        }

        let articles = self.articles.len();
        if self.article_index.len() != articles {
            return Err(NewsRagError::MetadataMismatch(format!(
                "article index has {} rows for {} articles",
                self.article_index.len(),
                articles
            )));
        }

        let rows = self.expansion_index.len();
        if rows != articles * EXPANSION_STRIDE {
            return Err(NewsRagError::StrideViolation {
                articles,
                rows,
                stride: EXPANSION_STRIDE,
            });
        }

        if self.expansions.len() != articles {
            return Err(NewsRagError::MetadataMismatch(format!(
                "{} expansion records for {} articles",
                self.expansions.len(),
                articles
            )));
        }
        for (record, article) in self.expansions.iter().zip(&self.articles) {
            if record.article != *article {
                return Err(NewsRagError::MetadataMismatch(format!(
                    "expansion record for article {} does not match article metadata",
                    article.id
                )));
            }
            if record.queries.len() != EXPANSION_STRIDE {
                return Err(NewsRagError::MalformedExpansion {
                    expected: EXPANSION_STRIDE,
                    got: record.queries.len(),
                });
            }
        }

        if self.article_index.dim() != self.expansion_index.dim() {
            return Err(NewsRagError::MetadataMismatch(format!(
                "article index dimension {} differs from expansion index dimension {}",
                self.article_index.dim(),
                self.expansion_index.dim()
            )));
        }
        Ok(())
    }
}

/// Locations of the four snapshot files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub article_meta: PathBuf,
    pub article_index: PathBuf,
    pub expansion_index: PathBuf,
    pub expansion_meta: PathBuf,
    pub manifest: PathBuf,
}

impl SnapshotPaths {
    pub fn from_config(dir: &Path, config: &IndexConfig) -> Self {
        Self {
            article_meta: dir.join(&config.article_meta_file),
            article_index: dir.join(&config.article_index_file),
            expansion_index: dir.join(&config.expansion_index_file),
            expansion_meta: dir.join(&config.expansion_meta_file),
            manifest: dir.join(&config.manifest_file),
        }
    }

    /// Default file names under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::from_config(dir, &IndexConfig::default())
    }

    /// The four data files, without the manifest.
    fn data(&self) -> [&Path; 4] {
        [
            &self.article_meta,
            &self.article_index,
            &self.expansion_index,
            &self.expansion_meta,
        ]
    }

    fn staged(&self) -> Self {
        Self {
            article_meta: staging_path(&self.article_meta),
            article_index: staging_path(&self.article_index),
            expansion_index: staging_path(&self.expansion_index),
            expansion_meta: staging_path(&self.expansion_meta),
            manifest: staging_path(&self.manifest),
        }
    }
}

/// Summary written beside the data files and checked against them on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub embedder: String,
    pub dim: usize,
    pub stride: usize,
    pub articles: usize,
    pub expansion_rows: usize,
}

impl SnapshotManifest {
    pub fn describe(snapshot: &IndexSnapshot) -> Self {
        Self {
            embedder: snapshot.embedder.clone(),
            dim: snapshot.dim(),
            stride: EXPANSION_STRIDE,
            articles: snapshot.article_count(),
            expansion_rows: snapshot.expansion_rows(),
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

/// Reads and writes snapshots at a fixed set of paths.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    paths: SnapshotPaths,
}

impl SnapshotStore {
    pub fn new(paths: SnapshotPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }

    /// True when the manifest and all four data files are present.
    pub fn exists(&self) -> bool {
        self.paths.manifest.is_file() && self.paths.data().iter().all(|p| p.is_file())
    }

    /// Validate and write `snapshot`, replacing any snapshot already there.
    ///
    /// Every file is staged first. The old manifest is then removed, the
    /// data files renamed over their targets, and the new manifest renamed
    /// last. A failure before the renames leaves the old snapshot intact; a
    /// failure during them leaves no complete snapshot.
    pub fn persist(&self, snapshot: &IndexSnapshot) -> Result<()> {
        snapshot.validate()?;

        let staged = self.paths.staged();
        if let Some(parent) = self.paths.manifest.parent() {
            fs::create_dir_all(parent)?;
        }
        for path in self.paths.data() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        write_json(&staged.article_meta, &snapshot.articles)?;
        snapshot.article_index.persist(&staged.article_index)?;
        snapshot.expansion_index.persist(&staged.expansion_index)?;
        write_json(&staged.expansion_meta, &snapshot.expansions)?;
        write_json(&staged.manifest, &SnapshotManifest::describe(snapshot))?;

        if self.paths.manifest.exists() {
            fs::remove_file(&self.paths.manifest)?;
            debug!(path = %self.paths.manifest.display(), "Retired previous manifest");
        }
        for (from, to) in staged.data().iter().zip(self.paths.data()) {
            fs::rename(from, to)?;
        }
        fs::rename(&staged.manifest, &self.paths.manifest)?;

        info!(
            articles = snapshot.article_count(),
            expansion_rows = snapshot.expansion_rows(),
            embedder = %snapshot.embedder,
            dir = %self.paths.manifest.parent().unwrap_or(Path::new(".")).display(),
            "Index snapshot persisted"
        );
        Ok(())
    }

    /// Read and validate the snapshot. A missing file is a `Snapshot` error;
    /// files that disagree with the manifest are a `MetadataMismatch`.
    pub fn load(&self) -> Result<IndexSnapshot> {
        let missing = std::iter::once(self.paths.manifest.as_path())
            .chain(self.paths.data())
            .find(|p| !p.is_file());
        if let Some(missing) = missing {
            return Err(NewsRagError::Snapshot(format!(
                "missing snapshot file {}",
                missing.display()
            )));
        }

        let manifest: SnapshotManifest = read_json(&self.paths.manifest)?;
        let snapshot = IndexSnapshot {
            embedder: manifest.embedder.clone(),
            articles: read_json(&self.paths.article_meta)?,
            article_index: VectorIndex::load(&self.paths.article_index)?,
            expansion_index: VectorIndex::load(&self.paths.expansion_index)?,
            expansions: read_json(&self.paths.expansion_meta)?,
        };
        snapshot.validate()?;

        let found = SnapshotManifest::describe(&snapshot);
        if found != manifest {
            return Err(NewsRagError::MetadataMismatch(format!(
                "snapshot files describe {:?}, manifest says {:?}",
                found, manifest
            )));
        }

        info!(
            articles = snapshot.article_count(),
            expansion_rows = snapshot.expansion_rows(),
            embedder = %snapshot.embedder,
            "Index snapshot loaded"
        );
        Ok(snapshot)
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| NewsRagError::Snapshot(format!("{}: {}", path.display(), e)))
}
