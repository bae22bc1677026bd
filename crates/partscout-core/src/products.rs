use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PC component category a listing belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cpu,
    Motherboard,
    Ram,
    Gpu,
    Storage,
    Psu,
    Case,
    Cooler,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Cpu,
        Category::Motherboard,
        Category::Ram,
        Category::Gpu,
        Category::Storage,
        Category::Psu,
        Category::Case,
        Category::Cooler,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cpu => "cpu",
            Category::Motherboard => "motherboard",
            Category::Ram => "ram",
            Category::Gpu => "gpu",
            Category::Storage => "storage",
            Category::Psu => "psu",
            Category::Case => "case",
            Category::Cooler => "cooler",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// A product record produced by a vendor extractor from one product page.
///
/// Immutable once built. `price` is an integer in the smallest unit the
/// vendor quotes (whole taka for the shops crawled today); a value of `0`
/// means the extractor could not parse a price, not that the item is free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedProduct {
    pub name: String,
    pub vendor: String,
    pub price: i64,
    pub url: String,
    pub image_url: Option<String>,
    /// Stock label exactly as the vendor shows it, e.g. `"In Stock"`.
    pub status: String,
    pub specs: BTreeMap<String, String>,
    /// Raw page HTML. Never serialized into reports.
    #[serde(skip)]
    pub raw_snapshot: String,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedProduct {
    /// Builds a product, trimming the name and clamping negative prices to 0.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        price: i64,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            vendor: vendor.into(),
            price: price.max(0),
            url: url.into(),
            image_url: None,
            status: "Unknown".to_string(),
            specs: BTreeMap::new(),
            raw_snapshot: String::new(),
            scraped_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    #[must_use]
    pub fn with_specs(mut self, specs: BTreeMap<String, String>) -> Self {
        self.specs = specs;
        self
    }

    #[must_use]
    pub fn with_raw_snapshot(mut self, raw: impl Into<String>) -> Self {
        self.raw_snapshot = raw.into();
        self
    }

    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("in stock")
    }

    /// `true` if the product satisfies the invariants required before
    /// matching: a non-empty name and a non-negative price.
    #[must_use]
    pub fn is_matchable(&self) -> bool {
        !self.name.is_empty() && self.price >= 0
    }

    /// `true` when the extractor failed to read a price.
    #[must_use]
    pub fn has_unparsed_price(&self) -> bool {
        self.price == 0
    }
}

/// Read-only view of a catalog entry used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    pub id: i64,
    pub canonical_name: String,
    pub category: Category,
}
