//! Order- and subset-insensitive name similarity.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

/// Lowercased alphanumeric tokens of `name`; everything else separates.
#[must_use]
pub fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-set similarity on a 0–100 scale.
///
/// Both names are reduced to sorted unique token sets. The shared tokens are
/// compared against each side's full set, and the best of the three pairwise
/// scores wins, so word order and extra words on one side ("Processor",
/// "Desktop") barely move the score.
#[must_use]
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let left: BTreeSet<String> = tokenize(a).into_iter().collect();
    let right: BTreeSet<String> = tokenize(b).into_iter().collect();
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let common: Vec<&str> = left.intersection(&right).map(String::as_str).collect();
    let only_left: Vec<&str> = left.difference(&right).map(String::as_str).collect();
    let only_right: Vec<&str> = right.difference(&left).map(String::as_str).collect();

    let base = common.join(" ");
    let with_left = join(&[base.as_str(), only_left.join(" ").as_str()]);
    let with_right = join(&[base.as_str(), only_right.join(" ").as_str()]);

    let best = [
        ratio(&base, &with_left),
        ratio(&base, &with_right),
        ratio(&with_left, &with_right),
    ]
    .into_iter()
    .fold(0.0_f64, f64::max);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = (best * 100.0).round().clamp(0.0, 100.0) as u8;
    score
}
