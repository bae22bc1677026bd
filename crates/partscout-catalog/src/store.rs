//! Catalog persistence: the [`CatalogStore`] capability and an in-memory
//! implementation backed by a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use partscout_core::{CatalogCandidate, Category, ScrapedProduct};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Bytes of raw HTML kept alongside a snapshot digest.
pub const SNAPSHOT_EXCERPT_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("catalog entry {0} does not exist")]
    UnknownEntry(i64),

    #[error("catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Write types
// ---------------------------------------------------------------------------

/// Bounded record of the page a price was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Lowercase hex SHA-256 of the full page.
    pub sha256: String,
    pub excerpt: String,
    pub original_len: usize,
}

impl RawSnapshot {
    #[must_use]
    pub fn from_html(html: &str) -> Self {
        let mut end = html.len().min(SNAPSHOT_EXCERPT_BYTES);
        while !html.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            sha256: format!("{:x}", Sha256::digest(html.as_bytes())),
            excerpt: html[..end].to_string(),
            original_len: html.len(),
        }
    }
}

/// One vendor's current price for one catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub catalog_id: i64,
    pub vendor: String,
    pub price: i64,
    pub url: String,
    pub in_stock: bool,
    pub status: String,
    pub snapshot: Option<RawSnapshot>,
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    #[must_use]
    pub fn from_product(catalog_id: i64, product: &ScrapedProduct) -> Self {
        let snapshot = (!product.raw_snapshot.is_empty())
            .then(|| RawSnapshot::from_html(&product.raw_snapshot));
        Self {
            catalog_id,
            vendor: product.vendor.clone(),
            price: product.price,
            url: product.url.clone(),
            in_stock: product.in_stock(),
            status: product.status.clone(),
            snapshot,
            observed_at: product.scraped_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCatalogEntry {
    pub canonical_name: String,
    pub category: Category,
    pub image_url: Option<String>,
    pub specs: BTreeMap<String, String>,
}

impl NewCatalogEntry {
    #[must_use]
    pub fn from_product(product: &ScrapedProduct, category: Category) -> Self {
        Self {
            canonical_name: product.name.clone(),
            category,
            image_url: product.image_url.clone(),
            specs: product.specs.clone(),
        }
    }
}

/// A single write inside an [`CatalogStore::apply_batch`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogWrite {
    Price(PriceQuote),
    /// Creates the entry, then records `quote` against the new id. The
    /// quote's `catalog_id` is ignored.
    CreateWithPrice {
        entry: NewCatalogEntry,
        quote: Option<PriceQuote>,
    },
}

// ---------------------------------------------------------------------------
// Store capability
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn candidates_for(&self, category: Category) -> Result<Vec<CatalogCandidate>, StoreError>;

    /// Inserts or replaces the price for `(quote.catalog_id, quote.vendor)`.
    async fn upsert_price(&self, quote: PriceQuote) -> Result<(), StoreError>;

    /// Creates an entry and returns its id.
    async fn create_entry(&self, entry: NewCatalogEntry) -> Result<i64, StoreError>;

    /// Applies every write or none of them. Returns the ids of entries
    /// created by the batch, in order.
    async fn apply_batch(&self, writes: Vec<CatalogWrite>) -> Result<Vec<i64>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub canonical_name: String,
    pub category: Category,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl CatalogEntry {
    #[must_use]
    pub fn candidate(&self) -> CatalogCandidate {
        CatalogCandidate {
            id: self.id,
            canonical_name: self.canonical_name.clone(),
            category: self.category,
        }
    }
}

/// On-disk layout of a catalog file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
    #[serde(default)]
    pub prices: Vec<PriceQuote>,
}

impl CatalogData {
    fn next_id(&self) -> i64 {
        self.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1
    }

    fn contains(&self, id: i64) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    fn insert_entry(&mut self, entry: NewCatalogEntry) -> i64 {
        let id = self.next_id();
        self.entries.push(CatalogEntry {
            id,
            canonical_name: entry.canonical_name,
            category: entry.category,
            image_url: entry.image_url,
            specs: entry.specs,
            created_at: Utc::now(),
        });
        id
    }

    fn upsert_price(&mut self, quote: PriceQuote) -> Result<(), StoreError> {
        if !self.contains(quote.catalog_id) {
            return Err(StoreError::UnknownEntry(quote.catalog_id));
        }
        match self
            .prices
            .iter_mut()
            .find(|p| p.catalog_id == quote.catalog_id && p.vendor == quote.vendor)
        {
            Some(existing) => *existing = quote,
            None => self.prices.push(quote),
        }
        Ok(())
    }

    fn apply(&mut self, write: CatalogWrite, created: &mut Vec<i64>) -> Result<(), StoreError> {
        match write {
            CatalogWrite::Price(quote) => self.upsert_price(quote),
            CatalogWrite::CreateWithPrice { entry, quote } => {
                let id = self.insert_entry(entry);
                created.push(id);
                match quote {
                    Some(quote) => self.upsert_price(PriceQuote {
                        catalog_id: id,
                        ..quote
                    }),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Catalog held in memory, optionally loaded from and saved to a JSON file.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    data: Mutex<CatalogData>,
}

impl MemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_data(data: CatalogData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// Loads a catalog file. A missing file yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read, or
    /// [`StoreError::Json`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "catalog file not found, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let data: CatalogData = serde_json::from_str(&content).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            path = %path.display(),
            entries = data.entries.len(),
            prices = data.prices.len(),
            "loaded catalog"
        );
        Ok(Self::from_data(data))
    }

    /// Writes the catalog to `path` through a sibling temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] or [`StoreError::Json`] on failure.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let data = self.snapshot();
        let json = serde_json::to_string_pretty(&data).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Clone of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> CatalogData {
        self.lock().clone()
    }

    #[must_use]
    pub fn prices_for(&self, catalog_id: i64) -> Vec<PriceQuote> {
        self.lock()
            .prices
            .iter()
            .filter(|p| p.catalog_id == catalog_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn candidates_for(
        &self,
        category: Category,
    ) -> Result<Vec<CatalogCandidate>, StoreError> {
        Ok(self
            .lock()
            .entries
            .iter()
            .filter(|e| e.category == category)
            .map(CatalogEntry::candidate)
            .collect())
    }

    async fn upsert_price(&self, quote: PriceQuote) -> Result<(), StoreError> {
        self.lock().upsert_price(quote)
    }

    async fn create_entry(&self, entry: NewCatalogEntry) -> Result<i64, StoreError> {
        Ok(self.lock().insert_entry(entry))
    }

    async fn apply_batch(&self, writes: Vec<CatalogWrite>) -> Result<Vec<i64>, StoreError> {
        let mut guard = self.lock();
        let mut staged = guard.clone();
        let mut created = Vec::new();
        for write in writes {
            staged.apply(write, &mut created)?;
        }
        *guard = staged;
        Ok(created)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
