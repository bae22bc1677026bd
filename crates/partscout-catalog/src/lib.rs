//! Catalog side of the crawler: fuzzy name matching with category vetoes,
//! catalog persistence, and batched ingest of scraped products.

pub mod ingest;
pub mod matcher;
pub mod rules;
pub mod similarity;
pub mod store;

pub use ingest::{CatalogIngestor, IngestReport, DEFAULT_INGEST_BATCH_SIZE};
pub use matcher::{MatchDecision, MatchOutcome, NormalizationEngine, DEFAULT_THRESHOLD};
pub use rules::{veto, VetoReason};
pub use similarity::{token_set_ratio, tokenize};
pub use store::{
    CatalogData, CatalogEntry, CatalogStore, CatalogWrite, MemoryCatalogStore, NewCatalogEntry,
    PriceQuote, RawSnapshot, StoreError,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("product at {url} has no name or a negative price")]
    InvalidProduct { url: String },
}
