//! Turning vendor HTML into listing URLs and product records.
//!
//! Extraction is pure: no I/O, no clock reads beyond stamping `scraped_at`.
//! Vendors plug in by implementing [`Extractor`]; most are covered by
//! [`SelectorExtractor`], which is driven by the CSS selectors in the
//! vendors file.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use partscout_core::{ScrapedProduct, VendorConfig};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::ScraperError;

pub trait Extractor: Send + Sync {
    /// Display name of the vendor this extractor understands.
    fn vendor(&self) -> &str;

    /// Absolute product URLs linked from a listing page, in page order.
    fn extract_listing_urls(&self, html: &str, page_url: &str) -> Vec<String>;

    /// Absolute URL of the next listing page, if any.
    fn extract_next_page_url(&self, html: &str, page_url: &str) -> Option<String>;

    /// Parses a product page. `None` means the page is not a product page
    /// this extractor can read.
    fn parse_product(&self, html: &str, url: &str) -> Option<ScrapedProduct>;
}

/// Converts a displayed price such as `"৳ 12,500"` or `"Tk 1,999.00"` into an
/// integer. Decimals are truncated. Returns `0` when nothing parses.
#[must_use]
pub fn clean_price(raw: &str) -> i64 {
    let cleaned: String = raw
        .replace('৳', "")
        .replace("Tk", "")
        .replace("TK", "")
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0;
    }

    if let Ok(value) = cleaned.parse::<i64>() {
        return value.max(0);
    }
    match cleaned.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(value) if value.is_finite() && value >= 0.0 && value < 9.0e15 => value.trunc() as i64,
        _ => {
            tracing::debug!(raw, "could not parse price");
            0
        }
    }
}

fn resolve(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = match Url::parse(page_url) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn compile(vendor: &str, selectors: &[String]) -> Result<Vec<Selector>, ScraperError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| ScraperError::InvalidSelector {
                vendor: vendor.to_owned(),
                selector: s.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

static META_PRICE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[property='product:price:amount'], meta[itemprop='price']")
        .expect("valid meta price selector")
});

static OG_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("meta[property='og:image']").expect("valid og:image selector")
});

static ROW_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").expect("valid table cell selector"));

/// Extractor configured entirely from a vendor's selector lists.
pub struct SelectorExtractor {
    vendor: String,
    listing_link: Vec<Selector>,
    next_page: Vec<Selector>,
    name: Vec<Selector>,
    price: Vec<Selector>,
    status: Vec<Selector>,
    image: Vec<Selector>,
    spec_rows: Vec<Selector>,
}

impl std::fmt::Debug for SelectorExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorExtractor")
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

impl SelectorExtractor {
    /// Compiles the vendor's selectors.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSelector`] for the first selector that
    /// does not parse.
    pub fn from_vendor(vendor: &VendorConfig) -> Result<Self, ScraperError> {
        let name = vendor.name.as_str();
        let sel = &vendor.selectors;
        Ok(Self {
            vendor: vendor.name.clone(),
            listing_link: compile(name, &sel.listing_link)?,
            next_page: compile(name, &sel.next_page)?,
            name: compile(name, &sel.name)?,
            price: compile(name, &sel.price)?,
            status: compile(name, &sel.status)?,
            image: compile(name, &sel.image)?,
            spec_rows: compile(name, &sel.spec_rows)?,
        })
    }

    fn first_text(doc: &Html, selectors: &[Selector]) -> Option<String> {
        selectors.iter().find_map(|sel| {
            doc.select(sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty())
        })
    }

    fn price(&self, doc: &Html) -> i64 {
        let meta = doc
            .select(&META_PRICE)
            .filter_map(|el| el.value().attr("content"))
            .map(clean_price)
            .find(|p| *p > 0);
        if let Some(price) = meta {
            return price;
        }
        self.price
            .iter()
            .flat_map(|sel| doc.select(sel))
            .map(|el| clean_price(&element_text(&el)))
            .find(|p| *p > 0)
            .unwrap_or(0)
    }

    fn status(&self, doc: &Html) -> String {
        if let Some(status) = Self::first_text(doc, &self.status) {
            return status;
        }
        let text = doc.root_element().text().collect::<String>();
        if text.contains("In Stock") {
            "In Stock".to_string()
        } else if text.contains("Out of Stock") {
            "Out of Stock".to_string()
        } else {
            "Unknown".to_string()
        }
    }

    fn image(&self, doc: &Html, url: &str) -> Option<String> {
        let og = doc
            .select(&OG_IMAGE)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|src| resolve(url, src));
        og.or_else(|| {
            self.image
                .iter()
                .flat_map(|sel| doc.select(sel))
                .filter_map(|el| {
                    el.value()
                        .attr("src")
                        .or_else(|| el.value().attr("data-src"))
                })
                .find_map(|src| resolve(url, src))
        })
    }

    fn specs(&self, doc: &Html) -> BTreeMap<String, String> {
        let mut specs = BTreeMap::new();
        for row in self.spec_rows.iter().flat_map(|sel| doc.select(sel)) {
            let cells: Vec<String> = row.select(&ROW_CELLS).map(|c| element_text(&c)).collect();
            if let [key, value, ..] = cells.as_slice() {
                if !key.is_empty() && !value.is_empty() {
                    specs.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        specs
    }
}

impl Extractor for SelectorExtractor {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    /// The first selector that yields any link wins; later ones are
    /// fallbacks for alternate page layouts.
    fn extract_listing_urls(&self, html: &str, page_url: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        for sel in &self.listing_link {
            let mut urls: Vec<String> = Vec::new();
            for href in doc.select(sel).filter_map(|el| el.value().attr("href")) {
                if let Some(u) = resolve(page_url, href) {
                    if !urls.contains(&u) {
                        urls.push(u);
                    }
                }
            }
            if !urls.is_empty() {
                return urls;
            }
        }
        Vec::new()
    }

    fn extract_next_page_url(&self, html: &str, page_url: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let current = resolve(page_url, page_url);
        self.next_page
            .iter()
            .flat_map(|sel| doc.select(sel))
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| resolve(page_url, href))
            .find(|u| Some(u) != current.as_ref())
    }

    fn parse_product(&self, html: &str, url: &str) -> Option<ScrapedProduct> {
        let doc = Html::parse_document(html);
        let name = Self::first_text(&doc, &self.name)?;

        let product = ScrapedProduct::new(name, self.vendor.clone(), self.price(&doc), url)
            .with_status(self.status(&doc))
            .with_image_url(self.image(&doc, url))
            .with_specs(self.specs(&doc))
            .with_raw_snapshot(html);
        Some(product)
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
