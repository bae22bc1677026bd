//! Mapping a scraped product onto a catalog entry.

use partscout_core::{CatalogCandidate, Category, ScrapedProduct};
use serde::Serialize;

use crate::rules::{veto, VetoReason};
use crate::similarity::token_set_ratio;
use crate::store::CatalogStore;
use crate::CatalogError;

/// Minimum token-set score for a candidate to be considered.
pub const DEFAULT_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched,
    NoCandidates,
    BelowThreshold,
    Vetoed { reason: VetoReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchDecision {
    /// Set only when `outcome` is [`MatchOutcome::Matched`].
    pub catalog_id: Option<i64>,
    /// Highest-scoring candidate, whether or not it was accepted.
    pub best_candidate: Option<CatalogCandidate>,
    pub score: u8,
    pub outcome: MatchOutcome,
}

impl MatchDecision {
    fn no_candidates() -> Self {
        Self {
            catalog_id: None,
            best_candidate: None,
            score: 0,
            outcome: MatchOutcome::NoCandidates,
        }
    }

    #[must_use]
    pub fn is_match(&self) -> bool {
        self.catalog_id.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizationEngine {
    threshold: u8,
}

impl Default for NormalizationEngine {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl NormalizationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_threshold(threshold: u8) -> Self {
        Self {
            threshold: threshold.min(100),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Scores `name` against every candidate and applies the category veto
    /// to the best one. Ties keep the earliest candidate.
    #[must_use]
    pub fn match_name(
        &self,
        name: &str,
        category: Category,
        candidates: &[CatalogCandidate],
    ) -> MatchDecision {
        let mut best: Option<(&CatalogCandidate, u8)> = None;
        for candidate in candidates {
            let score = token_set_ratio(name, &candidate.canonical_name);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }
        let Some((candidate, score)) = best else {
            return MatchDecision::no_candidates();
        };

        let outcome = if score < self.threshold {
            MatchOutcome::BelowThreshold
        } else if let Some(reason) = veto(category, name, &candidate.canonical_name) {
            MatchOutcome::Vetoed { reason }
        } else {
            MatchOutcome::Matched
        };

        MatchDecision {
            catalog_id: (outcome == MatchOutcome::Matched).then_some(candidate.id),
            best_candidate: Some(candidate.clone()),
            score,
            outcome,
        }
    }

    #[must_use]
    pub fn match_product(
        &self,
        product: &ScrapedProduct,
        category: Category,
        candidates: &[CatalogCandidate],
    ) -> MatchDecision {
        self.match_name(&product.name, category, candidates)
    }

    /// Looks up candidates for `category` and matches `product` against them.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidProduct`] for a product with an empty
    /// name or negative price, and [`CatalogError::Store`] if the candidate
    /// lookup fails.
    pub async fn normalize(
        &self,
        store: &dyn CatalogStore,
        product: &ScrapedProduct,
        category: Category,
    ) -> Result<MatchDecision, CatalogError> {
        if !product.is_matchable() {
            return Err(CatalogError::InvalidProduct {
                url: product.url.clone(),
            });
        }
        let candidates = store.candidates_for(category).await?;
        let decision = self.match_product(product, category, &candidates);
        log_decision(product, category, &decision);
        Ok(decision)
    }
}

pub(crate) fn log_decision(product: &ScrapedProduct, category: Category, decision: &MatchDecision) {
    let candidate = decision
        .best_candidate
        .as_ref()
        .map_or("", |c| c.canonical_name.as_str());
    match &decision.outcome {
        MatchOutcome::Matched => tracing::debug!(
            vendor = %product.vendor,
            category = %category,
            name = %product.name,
            candidate,
            score = decision.score,
            "matched"
        ),
        MatchOutcome::Vetoed { reason } => tracing::info!(
            vendor = %product.vendor,
            category = %category,
            name = %product.name,
            candidate,
            score = decision.score,
            reason = %reason,
            "match vetoed"
        ),
        MatchOutcome::BelowThreshold | MatchOutcome::NoCandidates => tracing::debug!(
            vendor = %product.vendor,
            category = %category,
            name = %product.name,
            score = decision.score,
            "no match"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryCatalogStore, NewCatalogEntry};

    fn candidate(id: i64, name: &str, category: Category) -> CatalogCandidate {
        CatalogCandidate {
            id,
            canonical_name: name.to_string(),
            category,
        }
    }

    #[test]
    fn empty_candidates_yield_no_match() {
        let d = NormalizationEngine::new().match_name("RTX 3060", Category::Gpu, &[]);
        assert_eq!(d.outcome, MatchOutcome::NoCandidates);
        assert!(!d.is_match());
    }

    #[test]
    fn best_candidate_is_matched() {
        let candidates = [
            candidate(1, "AMD Ryzen 7 5800X", Category::Cpu),
            candidate(2, "AMD Ryzen 5 5600X", Category::Cpu),
        ];
        let d = NormalizationEngine::new().match_name(
            "AMD Ryzen 5 5600X Desktop Processor",
            Category::Cpu,
            &candidates,
        );
        assert_eq!(d.catalog_id, Some(2));
        assert_eq!(d.score, 100);
        assert_eq!(d.outcome, MatchOutcome::Matched);
    }

    #[test]
    fn cpu_suffix_variant_is_vetoed_not_matched() {
        let candidates = [candidate(1, "AMD Ryzen 5 5600G", Category::Cpu)];
        let d =
            NormalizationEngine::new().match_name("AMD Ryzen 5 5600X", Category::Cpu, &candidates);
        assert!(d.score >= DEFAULT_THRESHOLD);
        assert!(matches!(d.outcome, MatchOutcome::Vetoed { .. }));
        assert_eq!(d.catalog_id, None);
        assert_eq!(d.best_candidate.unwrap().id, 1);
    }

    #[test]
    fn unrelated_name_is_below_threshold() {
        let candidates = [candidate(1, "Corsair RM750e", Category::Psu)];
        let engine = NormalizationEngine::new();
        let d = engine.match_name("Lian Li O11 Dynamic", Category::Psu, &candidates);
        assert_eq!(d.outcome, MatchOutcome::BelowThreshold);
        assert!(d.score < DEFAULT_THRESHOLD);
    }

    #[test]
    fn ties_keep_first_candidate() {
        let candidates = [
            candidate(5, "RTX 3060", Category::Gpu),
            candidate(6, "RTX 3060", Category::Gpu),
        ];
        let d = NormalizationEngine::new().match_name("RTX 3060", Category::Gpu, &candidates);
        assert_eq!(d.catalog_id, Some(5));
    }

    #[test]
    fn threshold_is_capped_at_100() {
        assert_eq!(NormalizationEngine::with_threshold(250).threshold(), 100);
    }

    #[tokio::test]
    async fn normalize_reads_candidates_from_store() {
        let store = MemoryCatalogStore::new();
        store
            .create_entry(NewCatalogEntry {
                canonical_name: "Corsair Vengeance 8GB DDR4 3200MHz".into(),
                category: Category::Ram,
                image_url: None,
                specs: Default::default(),
            })
            .await
            .unwrap();

        let engine = NormalizationEngine::new();
        let ddr4 = ScrapedProduct::new(
            "Corsair Vengeance LPX 8GB DDR4 3200MHz",
            "StarTech",
            2_900,
            "u",
        );
        let d = engine.normalize(&store, &ddr4, Category::Ram).await.unwrap();
        assert_eq!(d.catalog_id, Some(1));

        let ddr5 =
            ScrapedProduct::new("Corsair Vengeance 8GB DDR5 5200MHz", "StarTech", 4_100, "u");
        let d = engine.normalize(&store, &ddr5, Category::Ram).await.unwrap();
        assert!(matches!(d.outcome, MatchOutcome::Vetoed { .. }));
    }

    #[tokio::test]
    async fn normalize_rejects_unnamed_product() {
        let store = MemoryCatalogStore::new();
        let p = ScrapedProduct::new("  ", "StarTech", 100, "https://s/p");
        let err = NormalizationEngine::new()
            .normalize(&store, &p, Category::Cpu)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidProduct { .. }));
    }
}
