//! The `match` command: score one product name against the catalog file.
//! Useful when tuning the threshold or checking why a listing was vetoed.

use anyhow::Context;
use partscout_catalog::{
    token_set_ratio, CatalogStore, MatchDecision, MemoryCatalogStore, NormalizationEngine,
};
use partscout_core::{AppConfig, CatalogCandidate, Category};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ScoredCandidate {
    pub id: i64,
    pub canonical_name: String,
    pub score: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct MatchExplanation {
    pub name: String,
    pub category: Category,
    pub threshold: u8,
    pub decision: MatchDecision,
    pub top_candidates: Vec<ScoredCandidate>,
}

/// Scores `name` against `candidates` and keeps the best `top`, highest
/// first.
pub(crate) fn explain(
    engine: &NormalizationEngine,
    name: &str,
    category: Category,
    candidates: &[CatalogCandidate],
    top: usize,
) -> MatchExplanation {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|c| ScoredCandidate {
            id: c.id,
            canonical_name: c.canonical_name.clone(),
            score: token_set_ratio(name, &c.canonical_name),
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(top);

    MatchExplanation {
        name: name.to_string(),
        category,
        threshold: engine.threshold(),
        decision: engine.match_name(name, category, candidates),
        top_candidates: scored,
    }
}

pub(crate) async fn run_match(
    config: &AppConfig,
    category: Category,
    name: &str,
    threshold: u8,
    top: usize,
) -> anyhow::Result<()> {
    let store = MemoryCatalogStore::load(&config.catalog_path)
        .with_context(|| format!("loading catalog from {}", config.catalog_path.display()))?;
    let candidates = store.candidates_for(category).await?;
    if candidates.is_empty() {
        tracing::warn!(category = %category, "catalog has no entries for this category");
    }

    let engine = NormalizationEngine::with_threshold(threshold);
    let explanation = explain(&engine, name, category, &candidates, top);
    println!(
        "{}",
        serde_json::to_string_pretty(&explanation).context("serializing match result")?
    );
    Ok(())
}
