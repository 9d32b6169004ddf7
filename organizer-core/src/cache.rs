//! Persistent classification result cache
//!
//! A single JSON document mapping fingerprint to [`CacheEntry`]. Every write
//! rewrites the whole document to `<path>.tmp`, syncs it, and renames it over
//! the previous file, so a crash mid-write leaves the old document intact.
//!
//! The cache is the only state shared by categorization workers; all access
//! goes through one async mutex.

use crate::error::{OrganizerError, OrganizerResult};
use chrono::{DateTime, Utc};
use organizer_common::Recipe;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const CACHE_FORMAT_VERSION: u32 = 1;

/// Cached classification for one fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub recipe_id: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        fingerprint: impl Into<String>,
        recipe_id: impl Into<String>,
        categories: Vec<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            recipe_id: recipe_id.into(),
            categories,
            tags,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

/// Version marker of an allowed-taxonomy set
///
/// Order-insensitive; any added, removed or renamed name changes it.
pub fn taxonomy_version(categories: &[String], tags: &[String]) -> String {
    let mut categories: Vec<&str> = categories.iter().map(String::as_str).collect();
    let mut tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    categories.sort_unstable();
    tags.sort_unstable();

    let mut hasher = Sha256::new();
    for name in categories {
        hasher.update(b"c:");
        hasher.update(name.as_bytes());
        hasher.update([0]);
    }
    for name in tags {
        hasher.update(b"t:");
        hasher.update(name.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Cache key: recipe content, provider, model and taxonomy version
pub fn fingerprint(
    recipe: &Recipe,
    provider_id: &str,
    model_id: &str,
    taxonomy_version: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [
        recipe.content_fingerprint().as_str(),
        provider_id,
        model_id,
        taxonomy_version,
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}

/// Durable fingerprint → result store
pub struct ResultCache {
    /// `None` keeps the cache in memory only
    path: Option<PathBuf>,
    document: Mutex<CacheDocument>,
    recovered: bool,
}

impl ResultCache {
    /// Load the cache at `path`. A missing file is an empty cache; an
    /// unreadable one is logged and replaced by an empty cache.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (document, recovered) = match Self::load(&path).await {
            Ok(document) => (document, false),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Result cache unreadable, treating every recipe as a cache miss"
                );
                (CacheDocument::default(), true)
            }
        };

        tracing::debug!(
            path = %path.display(),
            entries = document.entries.len(),
            "Result cache loaded"
        );

        Self {
            path: Some(path),
            document: Mutex::new(document),
            recovered,
        }
    }

    /// Cache that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            document: Mutex::new(CacheDocument::default()),
            recovered: false,
        }
    }

    async fn load(path: &Path) -> OrganizerResult<CacheDocument> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheDocument::default());
            }
            Err(e) => return Err(OrganizerError::CacheCorruption(e.to_string())),
        };

        if content.trim().is_empty() {
            return Ok(CacheDocument::default());
        }

        let document: CacheDocument = serde_json::from_str(&content)
            .map_err(|e| OrganizerError::CacheCorruption(e.to_string()))?;

        if document.version != CACHE_FORMAT_VERSION {
            return Err(OrganizerError::CacheCorruption(format!(
                "unsupported cache format version {}",
                document.version
            )));
        }

        Ok(document)
    }

    /// Whether the file on disk was unreadable when opened
    pub fn was_recovered(&self) -> bool {
        self.recovered
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self, fingerprint: &str) -> Option<CacheEntry> {
        self.document.lock().await.entries.get(fingerprint).cloned()
    }

    /// Insert or replace an entry and persist the document
    pub async fn put(&self, fingerprint: &str, mut entry: CacheEntry) -> OrganizerResult<()> {
        let mut document = self.document.lock().await;
        entry.fingerprint = fingerprint.to_string();
        document.entries.insert(fingerprint.to_string(), entry);
        self.persist(&document).await
    }

    /// Remove every entry matching `predicate`; returns how many were removed
    pub async fn purge<P>(&self, predicate: P) -> OrganizerResult<usize>
    where
        P: Fn(&CacheEntry) -> bool,
    {
        let mut document = self.document.lock().await;
        let before = document.entries.len();
        document.entries.retain(|_, entry| !predicate(entry));
        let removed = before - document.entries.len();

        if removed > 0 {
            self.persist(&document).await?;
            tracing::info!(removed, "Purged result cache entries");
        }
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.document.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rewrite the whole document atomically. Caller holds the lock.
    async fn persist(&self, document: &CacheDocument) -> OrganizerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot = CacheDocument {
            version: CACHE_FORMAT_VERSION,
            entries: document.entries.clone(),
        };
        let content = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| OrganizerError::Common(e.into()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}
