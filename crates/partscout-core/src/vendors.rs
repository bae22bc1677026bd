use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::products::Category;
use crate::ConfigError;

/// CSS selectors used by the configuration-driven extractor.
///
/// Selector lists are tried in order; the first one that yields a value wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Anchors on a listing page that link to product pages.
    pub listing_link: Vec<String>,
    /// Anchor pointing at the next listing page.
    #[serde(default)]
    pub next_page: Vec<String>,
    pub name: Vec<String>,
    /// Visible price elements, used when no price `<meta>` tag is present.
    #[serde(default)]
    pub price: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
    /// Table rows holding specification key/value cells.
    #[serde(default)]
    pub spec_rows: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    pub name: String,
    /// Trusted vendors may create new catalog entries for unmatched products.
    #[serde(default)]
    pub trusted: bool,
    pub selectors: SelectorConfig,
    /// Seed listing URL per category.
    pub categories: BTreeMap<Category, String>,
}

impl VendorConfig {
    /// Generate a lowercase, dash-separated slug from the vendor name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorsFile {
    pub vendors: Vec<VendorConfig>,
}

impl VendorsFile {
    /// Finds a vendor by name or slug, case-insensitively.
    #[must_use]
    pub fn find(&self, name_or_slug: &str) -> Option<&VendorConfig> {
        let needle = name_or_slug.to_lowercase();
        self.vendors
            .iter()
            .find(|v| v.name.to_lowercase() == needle || v.slug() == needle)
    }
}

/// Load and validate the vendors configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_vendors(path: &Path) -> Result<VendorsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::VendorsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_vendors(&content)
}

/// Parse and validate a vendors YAML document.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_vendors(content: &str) -> Result<VendorsFile, ConfigError> {
    let vendors_file: VendorsFile = serde_yaml::from_str(content)?;
    validate_vendors(&vendors_file)?;
    Ok(vendors_file)
}

fn validate_vendors(vendors_file: &VendorsFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();

    for vendor in &vendors_file.vendors {
        if vendor.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "vendor name must be non-empty".to_string(),
            ));
        }

        let slug = vendor.slug();
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate vendor: '{}' (slug '{slug}')",
                vendor.name
            )));
        }

        if vendor.categories.is_empty() {
            return Err(ConfigError::Validation(format!(
                "vendor '{}' has no category seed URLs",
                vendor.name
            )));
        }

        for (category, seed) in &vendor.categories {
            url::Url::parse(seed).map_err(|e| {
                ConfigError::Validation(format!(
                    "vendor '{}' has an invalid {category} seed URL '{seed}': {e}",
                    vendor.name
                ))
            })?;
        }

        if vendor.selectors.listing_link.is_empty() || vendor.selectors.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "vendor '{}' must define listing_link and name selectors",
                vendor.name
            )));
        }
    }

    Ok(())
}
